use std::fs::File;
use std::io;
use std::path::Path;

use gantry_common::error::{GantryError, Result};
use sha2::{Digest, Sha256};

/// Computes the SHA256 of a file as lowercase hex.
pub fn compute_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let bytes_copied = io::copy(&mut file, &mut hasher)?;
    let digest = hex::encode(hasher.finalize());
    tracing::debug!(
        "Computed SHA256 {} for {} ({} bytes)",
        digest,
        path.display(),
        bytes_copied
    );
    Ok(digest)
}

pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    tracing::debug!("Verifying checksum for: {}", path.display());
    let actual = compute_checksum(path)?;
    tracing::debug!("Expected SHA256:   {}", expected);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(GantryError::ChecksumMismatch(format!(
            "Checksum mismatch for {}: expected {}, got {}",
            path.display(),
            expected,
            actual
        )))
    }
}

/// Pulls the digest out of a `.sha256` side file. Checksum tools write the
/// digest as the first token, often followed by the file name.
pub fn extract_digest(side_file_text: &str) -> Option<String> {
    let token = side_file_text.split_whitespace().next()?;
    if token.len() == 64 && token.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(token.to_ascii_lowercase())
    } else {
        None
    }
}

/// Verifies that the detected content type of the file matches the expected
/// extension. Catches repositories that serve an error page with status 200
/// in place of an archive.
pub fn verify_content_type(path: &Path, expected_ext: &str) -> Result<()> {
    let kind_opt = infer::get_from_path(path)?;
    if let Some(kind) = kind_opt {
        let actual_ext = kind.extension();
        if actual_ext.eq_ignore_ascii_case(expected_ext) {
            tracing::debug!(
                "Content type verified: {} matches expected {}",
                actual_ext,
                expected_ext
            );
            Ok(())
        } else {
            Err(GantryError::ValidationError(format!(
                "Content type mismatch for {}: expected extension '{}', but detected '{}'",
                path.display(),
                expected_ext,
                actual_ext
            )))
        }
    } else {
        Err(GantryError::ValidationError(format!(
            "Could not determine content type for {}",
            path.display()
        )))
    }
}
