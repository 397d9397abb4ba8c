use thiserror::Error;

/// Decode-time errors.
///
/// These appear as elements of the record stream: one error element per
/// recovery point, never an aborted sequence (unless the caller enabled
/// strict mode). Every variant carries enough context to locate the fault —
/// category when known, byte offset within the caller's buffer, item id
/// when mid-record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A framing sublayer rejected its envelope.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// A length field declared more bytes than the buffer provides.
    #[error("offset {offset}: truncated block: declared {declared} bytes, {available} available")]
    Truncated {
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// Block header invariants violated.
    #[error("offset {offset}: malformed block: {reason}")]
    MalformedBlock { offset: usize, reason: &'static str },

    /// FSPEC longer than 8 bytes, truncated, or pointing outside the UAP.
    #[error("cat {category} offset {offset}: malformed FSPEC: {reason}")]
    MalformedFspec {
        category: u8,
        offset: usize,
        reason: String,
    },

    /// A format node could not decode its subtree.
    #[error("cat {category} item {item} offset {offset}: {reason}")]
    MalformedItem {
        category: u8,
        item: String,
        offset: usize,
        reason: String,
    },

    /// Repetitive payload length overflowed or exceeded the remaining
    /// bytes. Flagged distinctly from [`DecodeError::MalformedItem`] so the
    /// event is auditable.
    #[error("cat {category} item {item} offset {offset}: repetitive length overflow")]
    RepetitiveOverflow {
        category: u8,
        item: String,
        offset: usize,
    },

    /// No specification loaded for the block's category.
    #[error("offset {offset}: no specification for category {category}")]
    UnknownCategory { category: u8, offset: usize },
}

impl DecodeError {
    /// Category context, when the error occurred past the block header.
    pub fn category(&self) -> Option<u8> {
        match self {
            DecodeError::MalformedFspec { category, .. }
            | DecodeError::MalformedItem { category, .. }
            | DecodeError::RepetitiveOverflow { category, .. }
            | DecodeError::UnknownCategory { category, .. } => Some(*category),
            _ => None,
        }
    }
}

/// Errors raised by the framing sublayers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// The stream prelude was not recognized (PCAP magic, ORADIS magic).
    #[error("offset {offset}: unrecognized {layer} header")]
    BadHeader { layer: &'static str, offset: usize },

    /// A declared length ran past the end of the input.
    #[error("offset {offset}: {layer} frame truncated: declared {declared}, {available} available")]
    Truncated {
        layer: &'static str,
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// A frame exceeded the configured maximum size.
    #[error("offset {offset}: frame of {len} bytes exceeds limit {max}")]
    Oversize { offset: usize, len: usize, max: usize },

    /// FINAL checksum mismatch; the frame is dropped.
    #[error("offset {offset}: FINAL checksum mismatch (expected {expected:#06x}, got {actual:#06x})")]
    ChecksumMismatch {
        offset: usize,
        expected: u16,
        actual: u16,
    },

    /// HDLC CRC-16/X.25 mismatch; the frame is dropped.
    #[error("offset {offset}: HDLC FCS mismatch (expected {expected:#06x}, got {actual:#06x})")]
    CrcMismatch {
        offset: usize,
        expected: u16,
        actual: u16,
    },

    /// The PCAP link-layer type is not one the framer understands.
    #[error("unsupported PCAP link type {0}")]
    UnsupportedLinkType(u32),
}
