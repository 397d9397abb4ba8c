//! FINAL recording format.
//!
//! Each frame is `[len:u16be][payload: len bytes][checksum:u16be]` where the
//! checksum is the 16-bit sum of the payload bytes. A mismatching frame is
//! dropped (reported, never passed downstream); the length prefix keeps the
//! stream synchronized past it.

use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder};
use log::warn;

use crate::error::FramingError;
use crate::framing::Frame;

/// 16-bit sum of `payload` modulo 2^16.
pub fn checksum(payload: &[u8]) -> u16 {
    payload
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
}

pub struct FinalFramer<'a> {
    bytes: &'a [u8],
    pos: usize,
    max_frame: usize,
    halted: bool,
}

impl<'a> FinalFramer<'a> {
    pub fn new(bytes: &'a [u8], max_frame: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            max_frame,
            halted: false,
        }
    }
}

impl<'a> Iterator for FinalFramer<'a> {
    type Item = Result<Frame<'a>, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.halted || self.pos >= self.bytes.len() {
                return None;
            }
            let offset = self.pos;
            let remaining = &self.bytes[offset..];
            if remaining.len() < 2 {
                self.halted = true;
                return Some(Err(FramingError::Truncated {
                    layer: "FINAL",
                    offset,
                    declared: 2,
                    available: remaining.len(),
                }));
            }

            let len = BigEndian::read_u16(remaining) as usize;
            if len > self.max_frame {
                self.halted = true;
                return Some(Err(FramingError::Oversize {
                    offset,
                    len,
                    max: self.max_frame,
                }));
            }
            let total = 2 + len + 2;
            if remaining.len() < total {
                self.halted = true;
                return Some(Err(FramingError::Truncated {
                    layer: "FINAL",
                    offset,
                    declared: total,
                    available: remaining.len(),
                }));
            }

            let payload = &remaining[2..2 + len];
            let expected = BigEndian::read_u16(&remaining[2 + len..]);
            let actual = checksum(payload);
            self.pos += total;

            if actual != expected {
                warn!("FINAL frame at offset {offset} dropped: checksum mismatch");
                return Some(Err(FramingError::ChecksumMismatch {
                    offset,
                    expected,
                    actual,
                }));
            }

            if len == 0 {
                continue;
            }
            return Some(Ok(Frame {
                payload: Cow::Borrowed(payload),
                offset: offset + 2,
                timestamp_us: None,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn final_frame(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&checksum(payload).to_be_bytes());
        out
    }

    #[test]
    fn valid_frame_passes() {
        let data = final_frame(&[0x30, 0x00, 0x06, 0x80, 0x00, 0x01]);
        let mut framer = FinalFramer::new(&data, 65536);
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(&frame.payload[..], &[0x30, 0x00, 0x06, 0x80, 0x00, 0x01]);
        assert!(framer.next().is_none());
    }

    #[test]
    fn checksum_mismatch_drops_frame() {
        let mut data = final_frame(&[0x30, 0x00, 0x03]);
        let n = data.len();
        data[n - 1] ^= 0xFF;
        let good = final_frame(&[0x01, 0x00, 0x03]);
        data.extend_from_slice(&good);

        let mut framer = FinalFramer::new(&data, 65536);
        assert!(matches!(
            framer.next(),
            Some(Err(FramingError::ChecksumMismatch { .. }))
        ));
        // The stream resynchronizes on the next length prefix.
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(&frame.payload[..], &[0x01, 0x00, 0x03]);
    }

    #[test]
    fn truncated_frame_halts() {
        let data = [0x00, 0x10, 0xAA];
        let mut framer = FinalFramer::new(&data, 65536);
        assert!(matches!(
            framer.next(),
            Some(Err(FramingError::Truncated { .. }))
        ));
        assert!(framer.next().is_none());
    }

    #[test]
    fn corrupting_any_payload_byte_changes_checksum() {
        let payload = [0x30, 0x00, 0x06, 0x80, 0x12, 0x34];
        let base = checksum(&payload);
        for i in 0..payload.len() {
            let mut copy = payload;
            copy[i] = copy[i].wrapping_add(1);
            assert_ne!(checksum(&copy), base, "byte {i}");
        }
    }
}
