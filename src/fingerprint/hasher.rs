//! SHA-256 content hashing.
//!
//! # Overview
//! Whole-file hashes identify byte-identical files. The canonical image hash
//! hashes decoded pixels instead of container bytes, so two encodings of the
//! same bitmap (different metadata, chunk order or lossless compression level)
//! share one hash.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use super::FingerprintError;

/// Read buffer size for streaming file hashes.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 of a byte slice as lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Stream a file through SHA-256 and return the lowercase hex digest.
///
/// # Errors
///
/// Returns [`FingerprintError::Io`] if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> Result<String, FingerprintError> {
    let io_err = |source| FingerprintError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer).map_err(io_err)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Metadata-insensitive hash of an encoded image.
///
/// Decodes `bytes`, converts to RGBA8 and hashes the dimensions followed by the
/// raw pixel buffer.
///
/// # Errors
///
/// Returns [`FingerprintError::Decode`] if the bytes are not a supported image.
pub fn canonical_image_hash(bytes: &[u8]) -> Result<String, FingerprintError> {
    let img = image::load_from_memory(bytes)?;
    let rgba = img.to_rgba8();

    let mut hasher = Sha256::new();
    hasher.update(rgba.width().to_le_bytes());
    hasher.update(rgba.height().to_le_bytes());
    hasher.update(rgba.as_raw());
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    fn encode_png(img: &image::RgbImage, compression: image::codecs::png::CompressionType) -> Vec<u8> {
        let mut out = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new_with_quality(
            Cursor::new(&mut out),
            compression,
            image::codecs::png::FilterType::Adaptive,
        );
        img.write_with_encoder(encoder).unwrap();
        out
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_file_matches_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        let content = vec![7u8; READ_BUFFER_SIZE * 2 + 13];
        std::io::Write::write_all(&mut file, &content).unwrap();

        assert_eq!(sha256_file(file.path()).unwrap(), sha256_hex(&content));
    }

    #[test]
    fn test_sha256_file_missing() {
        let result = sha256_file(Path::new("/definitely/not/here.bin"));
        assert!(matches!(result, Err(FingerprintError::Io { .. })));
    }

    #[test]
    fn test_canonical_hash_ignores_encoding() {
        let img = image::RgbImage::from_fn(16, 16, |x, y| image::Rgb([x as u8 * 10, y as u8 * 10, 99]));
        let fast = encode_png(&img, image::codecs::png::CompressionType::Fast);
        let best = encode_png(&img, image::codecs::png::CompressionType::Best);

        assert_eq!(
            canonical_image_hash(&fast).unwrap(),
            canonical_image_hash(&best).unwrap()
        );
    }

    #[test]
    fn test_canonical_hash_rejects_garbage() {
        assert!(canonical_image_hash(b"not an image").is_err());
    }
}
