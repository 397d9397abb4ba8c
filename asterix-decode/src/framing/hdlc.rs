//! Byte-level HDLC framing.
//!
//! Frames are delimited by `0x7E`; `0x7D` escapes the next byte with
//! XOR 0x20; the last two unstuffed bytes are the CRC-16/X.25 FCS
//! (little-endian, per RFC 1662). Frames failing the FCS, shorter than the
//! minimum, or longer than the configured maximum are dropped and the
//! scanner resynchronizes on the next flag.

use std::borrow::Cow;

use log::{debug, warn};

use asterix_core::crc16_x25;

use crate::error::FramingError;
use crate::framing::Frame;

const FLAG: u8 = 0x7E;
const ESCAPE: u8 = 0x7D;

/// Smallest useful frame: two FCS bytes plus at least two payload bytes.
const MIN_FRAME: usize = 4;

pub struct HdlcFramer<'a> {
    bytes: &'a [u8],
    pos: usize,
    max_frame: usize,
}

impl<'a> HdlcFramer<'a> {
    pub fn new(bytes: &'a [u8], max_frame: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            max_frame,
        }
    }

    /// Collects and unstuffs one inter-flag span starting at `self.pos`
    /// (which must point just past an opening flag). Returns the unstuffed
    /// bytes, or `None` when the span was malformed or the input ended.
    fn take_span(&mut self, start: usize) -> Option<(Vec<u8>, bool)> {
        let mut out = Vec::new();
        let mut i = start;
        let mut oversize = false;

        while i < self.bytes.len() {
            match self.bytes[i] {
                FLAG => {
                    self.pos = i + 1;
                    return Some((out, oversize));
                }
                ESCAPE => {
                    let Some(&next) = self.bytes.get(i + 1) else {
                        break;
                    };
                    if next == FLAG {
                        // Escape immediately before a flag is malformed;
                        // drop the span and resync past the flag.
                        debug!("HDLC: dangling escape at offset {i}");
                        self.pos = i + 2;
                        return Some((Vec::new(), false));
                    }
                    out.push(next ^ 0x20);
                    i += 2;
                }
                b => {
                    out.push(b);
                    i += 1;
                }
            }
            // Bounded before any further accumulation.
            if out.len() > self.max_frame {
                oversize = true;
                out.clear();
                // Keep scanning for the closing flag without storing bytes.
                while i < self.bytes.len() && self.bytes[i] != FLAG {
                    i += 1;
                }
            }
        }

        self.pos = self.bytes.len();
        None
    }
}

impl<'a> Iterator for HdlcFramer<'a> {
    type Item = Result<Frame<'a>, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Hunt for an opening flag.
            while self.pos < self.bytes.len() && self.bytes[self.pos] != FLAG {
                self.pos += 1;
            }
            if self.pos >= self.bytes.len() {
                return None;
            }
            self.pos += 1;
            let start = self.pos;

            let Some((unstuffed, oversize)) = self.take_span(start) else {
                return None;
            };
            if oversize {
                return Some(Err(FramingError::Oversize {
                    offset: start,
                    len: self.max_frame + 1,
                    max: self.max_frame,
                }));
            }
            // Back-to-back flags and sub-minimum spans are idle fill.
            if unstuffed.len() < MIN_FRAME {
                continue;
            }

            let (payload, fcs) = unstuffed.split_at(unstuffed.len() - 2);
            let expected = u16::from_le_bytes([fcs[0], fcs[1]]);
            let actual = crc16_x25(payload);
            if actual != expected {
                warn!("HDLC frame at offset {start} dropped: FCS mismatch");
                return Some(Err(FramingError::CrcMismatch {
                    offset: start,
                    expected,
                    actual,
                }));
            }

            return Some(Ok(Frame {
                payload: Cow::Owned(payload.to_vec()),
                offset: start,
                timestamp_us: None,
            }));
        }
    }
}
