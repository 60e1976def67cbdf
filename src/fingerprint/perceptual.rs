//! Perceptual page fingerprints (DCT-based pHash).
//!
//! A page (or image) is reduced to a 32×32 grayscale grid, transformed with an
//! orthonormal 2-D DCT-II, and the 8×8 lowest-frequency block is thresholded
//! against its median. Pages that look alike after resampling differ in only
//! a few bits. Re-cropped or rotated pages are not expected to match.
//!
//! # Bit layout
//!
//! Coefficient `(u, v)` of the 8×8 block maps to bit `u * 8 + v`. Bit 0 is the
//! DC term, which is discarded, so it is always zero.

use std::f64::consts::PI;

use image::imageops::FilterType;
use image::DynamicImage;

use super::FingerprintError;

/// Side of the grayscale grid a page is resampled to.
pub const PHASH_GRID: usize = 32;

/// Side of the low-frequency coefficient block kept from the DCT.
pub const DCT_BLOCK: usize = 8;

/// Compute the 64-bit perceptual fingerprint of a decoded image.
///
/// # Errors
///
/// Returns [`FingerprintError::EmptyImage`] for images with no pixels.
pub fn phash_image(img: &DynamicImage) -> Result<u64, FingerprintError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(FingerprintError::EmptyImage);
    }

    let gray = image::imageops::resize(
        &img.to_luma8(),
        PHASH_GRID as u32,
        PHASH_GRID as u32,
        FilterType::Triangle,
    );

    let mut pixels = [[0f64; PHASH_GRID]; PHASH_GRID];
    for (x, y, px) in gray.enumerate_pixels() {
        pixels[y as usize][x as usize] = f64::from(px.0[0]);
    }

    let coefficients = low_frequency_dct(&pixels);
    Ok(threshold_against_median(&coefficients))
}

/// Decode `bytes` and compute its perceptual fingerprint.
///
/// # Errors
///
/// Returns [`FingerprintError::Decode`] if the bytes are not a supported image.
pub fn phash_bytes(bytes: &[u8]) -> Result<u64, FingerprintError> {
    let img = image::load_from_memory(bytes)?;
    phash_image(&img)
}

/// Orthonormal DCT-II basis restricted to the first `DCT_BLOCK` frequencies.
fn dct_basis() -> [[f64; PHASH_GRID]; DCT_BLOCK] {
    let n = PHASH_GRID as f64;
    let mut basis = [[0f64; PHASH_GRID]; DCT_BLOCK];
    for (k, row) in basis.iter_mut().enumerate() {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        for (i, cell) in row.iter_mut().enumerate() {
            *cell = scale * ((2.0 * i as f64 + 1.0) * k as f64 * PI / (2.0 * n)).cos();
        }
    }
    basis
}

/// Separable 2-D DCT keeping only the `DCT_BLOCK × DCT_BLOCK` low block,
/// returned row-major (`u * DCT_BLOCK + v`).
fn low_frequency_dct(pixels: &[[f64; PHASH_GRID]; PHASH_GRID]) -> [f64; DCT_BLOCK * DCT_BLOCK] {
    let basis = dct_basis();

    // Transform along x first: rows[y][v]
    let mut rows = [[0f64; DCT_BLOCK]; PHASH_GRID];
    for (y, row) in pixels.iter().enumerate() {
        for v in 0..DCT_BLOCK {
            rows[y][v] = row.iter().zip(basis[v].iter()).map(|(p, c)| p * c).sum();
        }
    }

    let mut out = [0f64; DCT_BLOCK * DCT_BLOCK];
    for u in 0..DCT_BLOCK {
        for v in 0..DCT_BLOCK {
            out[u * DCT_BLOCK + v] = (0..PHASH_GRID).map(|y| basis[u][y] * rows[y][v]).sum();
        }
    }
    out
}

fn threshold_against_median(coefficients: &[f64; DCT_BLOCK * DCT_BLOCK]) -> u64 {
    let mut ac: Vec<f64> = coefficients[1..].to_vec();
    ac.sort_by(f64::total_cmp);
    let median = ac[ac.len() / 2];

    coefficients
        .iter()
        .enumerate()
        .skip(1)
        .filter(|&(_, &c)| c > median)
        .fold(0u64, |bits, (i, _)| bits | (1u64 << i))
}
