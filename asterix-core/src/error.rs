use thiserror::Error;

/// Errors produced by the bit-field extraction primitives.
///
/// These surface at specification load time (a bit range that cannot fit its
/// declared run) or, defensively, at decode time when a field is read from a
/// run shorter than the specification promised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// A bit endpoint lies outside the containing run.
    #[error("bit range {from}..{to} lies outside a {len}-byte field")]
    OutOfRange { from: u16, to: u16, len: usize },

    /// `from_bit` is below `to_bit`.
    #[error("bit range {from}..{to} is inverted")]
    Inverted { from: u16, to: u16 },

    /// The range spans more than 64 bits.
    #[error("bit range {from}..{to} is wider than 64 bits")]
    TooWide { from: u16, to: u16 },

    /// A byte-run request lies outside the containing slice.
    #[error("byte run {start}+{count} lies outside a {len}-byte field")]
    ByteRunOutOfRange {
        start: usize,
        count: usize,
        len: usize,
    },
}
