//! Shared test utilities for the asterix workspace.
//!
//! This crate provides common helpers for loading XML fixtures and building
//! wire-byte test vectors shared across multiple crates.

use std::fs;
use std::path::PathBuf;

/// Returns the path to the workspace-level testdata directory.
///
/// This resolves the path relative to the workspace root, not the individual crate.
pub fn testdata_dir() -> PathBuf {
    // CARGO_MANIFEST_DIR points to the crate using this library,
    // so we need to find the workspace root by looking for testdata/
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

    // Try common paths to find testdata
    let candidates = [
        manifest_dir.join("../testdata"),      // From test-utils itself
        manifest_dir.join("../../testdata"),   // From sub-crates
        manifest_dir.join("testdata"),         // From workspace root
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return candidate.canonicalize().unwrap_or_else(|_| candidate.clone());
        }
    }

    // Fallback - return the most likely path
    manifest_dir.join("../testdata")
}

/// Returns the path to a fixture file.
///
/// # Arguments
///
/// * `category` - "valid" or "invalid"
/// * `filename` - Name of the XML file (e.g., "cat048.xml")
pub fn fixture_path(category: &str, filename: &str) -> PathBuf {
    testdata_dir().join(category).join(filename)
}

/// Loads an XML fixture file from the testdata directory.
///
/// # Arguments
///
/// * `category` - "valid" or "invalid"
/// * `filename` - Name of the XML file (e.g., "cat048.xml")
///
/// # Panics
///
/// Panics if the file cannot be read.
pub fn load_fixture(category: &str, filename: &str) -> String {
    let path = fixture_path(category, filename);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

/// Parses a whitespace-separated hex string into bytes.
///
/// Accepts the notation used throughout the wire-format tests:
/// `"30 00 08  80  00 01 00 02"`.
///
/// # Panics
///
/// Panics on non-hex input, so malformed test vectors fail loudly.
pub fn hex_bytes(s: &str) -> Vec<u8> {
    s.split_whitespace()
        .map(|tok| {
            u8::from_str_radix(tok, 16)
                .unwrap_or_else(|e| panic!("bad hex token '{tok}' in test vector: {e}"))
        })
        .collect()
}

/// Renders bytes as a spaced uppercase hex string, the inverse of
/// [`hex_bytes`]. Useful in assertion messages.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let bytes = hex_bytes("30 00 08 80 00 01 00 02");
        assert_eq!(bytes, vec![0x30, 0x00, 0x08, 0x80, 0x00, 0x01, 0x00, 0x02]);
        assert_eq!(to_hex(&bytes), "30 00 08 80 00 01 00 02");
    }

    #[test]
    fn hex_accepts_irregular_spacing() {
        assert_eq!(hex_bytes("  a1\tB2  c3 "), vec![0xA1, 0xB2, 0xC3]);
    }

    #[test]
    #[should_panic(expected = "bad hex token")]
    fn hex_rejects_garbage() {
        hex_bytes("zz");
    }
}
