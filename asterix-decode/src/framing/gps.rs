//! GPS gateway encapsulation.
//!
//! Each outer packet is `[timestamp_us:u64be][len:u16be][payload: len]`.
//! The timestamp rides along to the decoder and stamps every record of the
//! packet's payload.

use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder};

use crate::error::FramingError;
use crate::framing::Frame;

const HEADER_LEN: usize = 10;

pub struct GpsFramer<'a> {
    bytes: &'a [u8],
    pos: usize,
    max_frame: usize,
    halted: bool,
}

impl<'a> GpsFramer<'a> {
    pub fn new(bytes: &'a [u8], max_frame: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            max_frame,
            halted: false,
        }
    }
}

impl<'a> Iterator for GpsFramer<'a> {
    type Item = Result<Frame<'a>, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted || self.pos >= self.bytes.len() {
            return None;
        }
        let offset = self.pos;
        let remaining = &self.bytes[offset..];
        if remaining.len() < HEADER_LEN {
            self.halted = true;
            return Some(Err(FramingError::Truncated {
                layer: "GPS",
                offset,
                declared: HEADER_LEN,
                available: remaining.len(),
            }));
        }

        let timestamp_us = BigEndian::read_u64(remaining);
        let declared = BigEndian::read_u16(&remaining[8..]) as usize;
        if declared > self.max_frame {
            self.halted = true;
            return Some(Err(FramingError::Oversize {
                offset,
                len: declared,
                max: self.max_frame,
            }));
        }
        if remaining.len() < HEADER_LEN + declared {
            self.halted = true;
            return Some(Err(FramingError::Truncated {
                layer: "GPS",
                offset,
                declared: HEADER_LEN + declared,
                available: remaining.len(),
            }));
        }

        self.pos += HEADER_LEN + declared;
        Some(Ok(Frame {
            payload: Cow::Borrowed(&remaining[HEADER_LEN..HEADER_LEN + declared]),
            offset: offset + HEADER_LEN,
            timestamp_us: Some(timestamp_us),
        }))
    }
}
