//! Fingerprint primitives.
//!
//! This module provides pure functions that turn raw content into compact
//! fingerprints:
//! - Whole-file and canonical content hashes (SHA-256)
//! - 64-bit perceptual page fingerprints (DCT-based pHash)
//! - 64-bit text fingerprints (SimHash over word shingles)
//!
//! Approximate matching between 64-bit fingerprints is measured with
//! [`hamming_distance`].
//!
//! # Example
//!
//! ```
//! use neardupe::fingerprint::{hamming_distance, simhash_text};
//!
//! let a = simhash_text("the quick brown fox jumps over the lazy dog").unwrap();
//! let b = simhash_text("the quick brown fox jumps over the lazy dog").unwrap();
//! assert_eq!(hamming_distance(a, b), 0);
//! ```

pub mod hasher;
pub mod perceptual;
pub mod simhash;

use std::path::PathBuf;

pub use hasher::{canonical_image_hash, sha256_file, sha256_hex};
pub use perceptual::{phash_bytes, phash_image, DCT_BLOCK, PHASH_GRID};
pub use simhash::{normalize_text, shingles, simhash_text, simhash_text_with, DEFAULT_SHINGLE_SIZE};

/// Number of bits in every fingerprint produced by this module.
pub const FINGERPRINT_BITS: u32 = 64;

/// Count of differing bits between two 64-bit fingerprints.
///
/// Always in `0..=64`; `0` means the fingerprints are identical.
#[inline]
#[must_use]
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Errors that can occur while computing fingerprints.
#[derive(thiserror::Error, Debug)]
pub enum FingerprintError {
    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The bytes could not be decoded as an image.
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The decoded image has no pixels.
    #[error("Image has zero width or height")]
    EmptyImage,
}
