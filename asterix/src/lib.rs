//! Asterix - ASTERIX surveillance data decoding library.
//!
//! This crate re-exports the core primitives (`asterix-core`), the
//! specification model and XML loader (`asterix-spec`), and the record
//! decoder with its framing sublayers (`asterix-decode`) for convenient
//! single-import usage.
//!
//! ## Crate structure
//!
//! - [`bits`] - Bit/byte primitives (field extraction, FSPEC, checksums)
//! - [`spec`] - Specification model and XML loader
//! - [`decode`] - Record decoder and framing sublayers
//!
//! ## Usage
//!
//! ```no_run
//! use asterix::{DecodeOptions, Framing, decode_buffer, load_definitions};
//!
//! let definition = load_definitions(&["specs/cat048.xml"])?;
//! let buffer = std::fs::read("capture.ast")?;
//!
//! let options = DecodeOptions::default();
//! for result in decode_buffer(&definition, Framing::Raw, &buffer, 0, &options) {
//!     match result {
//!         Ok(record) => {
//!             if let Some(item) = record.item("010") {
//!                 println!("SAC/SIC: {:?}/{:?}", item.field("SAC"), item.field("SIC"));
//!             }
//!         }
//!         Err(error) => eprintln!("decode: {error}"),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Re-export of asterix-core as `bits`.
///
/// Contains the bit/byte primitives:
/// - [`extract_unsigned`](bits::extract_unsigned) / [`extract_signed`](bits::extract_signed) - ASTERIX bit-field extraction
/// - [`Fspec`](bits::Fspec) - Field Specification bitmap
/// - [`crc32`](bits::crc32) / [`crc16_x25`](bits::crc16_x25) - Integrity checksums
pub mod bits {
    pub use asterix_core::*;
}

/// Re-export of asterix-spec as `spec`.
///
/// Contains the specification model and loader:
/// - [`Definition`](spec::Definition) / [`Category`](spec::Category) - The loaded model
/// - [`FormatNode`](spec::FormatNode) - The polymorphic format tree
/// - [`load_definitions`](spec::load_definitions) - One-shot XML catalog load
pub mod spec {
    pub use asterix_spec::*;
}

/// Re-export of asterix-decode as `decode`.
///
/// Contains the decoder and framing sublayers:
/// - [`decode_buffer`](decode::decode_buffer) - Lazy record stream over a buffer
/// - [`Framing`](decode::Framing) - Raw / PCAP / ORADIS / FINAL / HDLC / GPS
/// - [`AsterixRecord`](decode::AsterixRecord) - The decoded record tree
pub mod decode {
    pub use asterix_decode::*;
}

// Commonly used types at the crate root for convenience.
pub use asterix_decode::{
    AsterixRecord, DecodeError, DecodeOptions, DecodedField, DecodedItem, FieldValue, Framing,
    decode_buffer,
};
pub use asterix_spec::{Category, Definition, SpecError, load_definitions};

/// Looks up the human description of a category, item, field, or
/// enumerated value. See [`spec::describe`].
pub use asterix_spec::describe::{DescribeError, describe};
