//! # asterix-decode
//!
//! The ASTERIX record decoder and framing sublayers.
//!
//! [`decode_buffer`] is the main entry point: given an immutable
//! [`Definition`](asterix_spec::Definition), a [`Framing`] layer, and a byte
//! buffer, it returns a lazy stream of decoded records and recoverable
//! errors. A single error element never terminates the stream — decoding
//! resumes at the next recovery point (record, block, or frame boundary) —
//! unless [`DecodeOptions::strict`] is set.
//!
//! ```no_run
//! use asterix_decode::{DecodeOptions, Framing, decode_buffer};
//!
//! # let definition = asterix_spec::load_definitions::<&str>(&[]).unwrap();
//! # let buffer: Vec<u8> = Vec::new();
//! let options = DecodeOptions::default();
//! for result in decode_buffer(&definition, Framing::Raw, &buffer, 0, &options) {
//!     match result {
//!         Ok(record) => println!("CAT{:03}: {} items", record.category, record.item_count()),
//!         Err(error) => eprintln!("{error}"),
//!     }
//! }
//! ```
//!
//! The decoder owns no shared state: the `Definition` is borrowed
//! immutably, each record owns its bytes and item tree, and memory per call
//! stays proportional to the input buffer.

pub mod decoder;
pub mod error;
pub mod framing;
pub mod record;

use std::collections::VecDeque;

use asterix_spec::Definition;
use byteorder::{BigEndian, ByteOrder};

pub use decoder::{BLOCK_HEADER_LEN, DecodeOptions, MAX_BLOCK_LEN};
pub use error::{DecodeError, FramingError};
pub use framing::{Frame, Framing};
pub use record::{AsterixRecord, DecodedField, DecodedItem, FieldValue};

/// Decodes every ASTERIX record reachable in `bytes` through the given
/// framing layer.
///
/// `timestamp_us` stamps records whose framing layer carries no timestamp
/// of its own (GPS and PCAP frames override it per frame).
pub fn decode_buffer<'a>(
    definition: &'a Definition,
    framing: Framing,
    bytes: &'a [u8],
    timestamp_us: u64,
    options: &'a DecodeOptions,
) -> RecordStream<'a> {
    RecordStream {
        definition,
        options,
        timestamp_us,
        frames: framing::frames(framing, bytes, options.max_frame_size as usize),
        queue: VecDeque::new(),
        halted: false,
    }
}

/// Lazy sequence of decoded records and recoverable errors.
pub struct RecordStream<'a> {
    definition: &'a Definition,
    options: &'a DecodeOptions,
    timestamp_us: u64,
    frames: framing::FrameIter<'a>,
    queue: VecDeque<Result<AsterixRecord, DecodeError>>,
    halted: bool,
}

impl Iterator for RecordStream<'_> {
    type Item = Result<AsterixRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.halted {
                return None;
            }
            if let Some(next) = self.queue.pop_front() {
                if next.is_err() && self.options.strict {
                    self.halted = true;
                }
                return Some(next);
            }

            match self.frames.next()? {
                Err(e) => self.queue.push_back(Err(e.into())),
                Ok(frame) => {
                    let ts = frame.timestamp_us.unwrap_or(self.timestamp_us);
                    let mut out = Vec::new();
                    decode_frame_blocks(
                        self.definition,
                        &frame.payload,
                        frame.offset,
                        ts,
                        self.options,
                        &mut out,
                    );
                    self.queue.extend(out);
                }
            }
        }
    }
}

/// Splits a frame payload into blocks and decodes each.
///
/// Block headers are validated before any use of their declared length.
/// After a corrupt header, one error is emitted and the scanner advances a
/// byte at a time until a plausible header lines up again, so a valid block
/// following a corrupt span is still recovered.
fn decode_frame_blocks(
    definition: &Definition,
    payload: &[u8],
    base_offset: usize,
    timestamp_us: u64,
    options: &DecodeOptions,
    out: &mut Vec<Result<AsterixRecord, DecodeError>>,
) {
    let max_block = (options.max_frame_size as usize).min(MAX_BLOCK_LEN);
    let mut pos = 0;
    let mut resyncing = false;

    while pos + BLOCK_HEADER_LEN <= payload.len() {
        let category = payload[pos];
        let declared = BigEndian::read_u16(&payload[pos + 1..]) as usize;
        let remaining = payload.len() - pos;

        // A length over the configured frame limit is not recoverable by
        // scanning; the raw layer halts there.
        if declared > max_block {
            out.push(Err(DecodeError::MalformedBlock {
                offset: base_offset + pos,
                reason: "declared length exceeds the frame size limit",
            }));
            return;
        }

        let plausible = category != 0 && declared >= BLOCK_HEADER_LEN && declared <= remaining;
        if !plausible {
            if !resyncing {
                let error = if category == 0 {
                    DecodeError::MalformedBlock {
                        offset: base_offset + pos,
                        reason: "category 0 is reserved",
                    }
                } else if declared < BLOCK_HEADER_LEN {
                    DecodeError::MalformedBlock {
                        offset: base_offset + pos,
                        reason: "declared length below header size",
                    }
                } else {
                    DecodeError::Truncated {
                        offset: base_offset + pos,
                        declared,
                        available: remaining,
                    }
                };
                out.push(Err(error));
                resyncing = true;
            }
            pos += 1;
            continue;
        }

        resyncing = false;
        decoder::decode_block(
            definition,
            &payload[pos..pos + declared],
            base_offset + pos,
            timestamp_us,
            options,
            out,
        );
        pos += declared;
    }

    if pos < payload.len() && !resyncing {
        out.push(Err(DecodeError::MalformedBlock {
            offset: base_offset + pos,
            reason: "trailing bytes shorter than a block header",
        }));
    }
}
