//! Framing sublayers.
//!
//! Each framer is a pull-style iterator over an input buffer, yielding
//! candidate ASTERIX byte spans with strict length discipline: every
//! declared length is validated before any copy or slice. Self-synchronizing
//! layers (HDLC flags, FINAL/GPS length prefixes) drop a corrupt frame and
//! continue; the rest halt at the first violation.

pub mod final_frame;
pub mod gps;
pub mod hdlc;
pub mod oradis;
pub mod pcap;

use std::borrow::Cow;

use crate::error::FramingError;

/// One candidate ASTERIX payload extracted from the framed stream.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    /// The ASTERIX bytes (one or more concatenated blocks). Owned when the
    /// framing layer had to transform the stream (HDLC unstuffing).
    pub payload: Cow<'a, [u8]>,

    /// Offset of the frame within the input buffer, for error context.
    pub offset: usize,

    /// Timestamp carried by the framing layer (GPS, PCAP), microseconds.
    pub timestamp_us: Option<u64>,
}

/// The framing sublayer wrapped around a buffer of ASTERIX data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// The buffer is a bare concatenation of ASTERIX blocks.
    Raw,
    /// libpcap capture: Ethernet / IPv4 / UDP envelope per packet.
    Pcap,
    /// ORADIS encapsulation over a raw stream.
    Oradis,
    /// FINAL recording format: length-prefixed frames with a 16-bit sum.
    Final,
    /// Byte-stuffed HDLC with CRC-16/X.25.
    Hdlc,
    /// GPS gateway format: timestamp header plus declared-length payload.
    Gps,
}

/// Dispatching iterator over the configured framing layer.
pub enum FrameIter<'a> {
    Raw(std::iter::Once<Result<Frame<'a>, FramingError>>),
    Pcap(pcap::PcapFramer<'a>),
    Oradis(oradis::OradisFramer<'a>),
    Final(final_frame::FinalFramer<'a>),
    Hdlc(hdlc::HdlcFramer<'a>),
    Gps(gps::GpsFramer<'a>),
}

/// Builds the frame iterator for `framing` over `bytes`.
pub fn frames(framing: Framing, bytes: &[u8], max_frame: usize) -> FrameIter<'_> {
    match framing {
        Framing::Raw => FrameIter::Raw(std::iter::once(Ok(Frame {
            payload: Cow::Borrowed(bytes),
            offset: 0,
            timestamp_us: None,
        }))),
        Framing::Pcap => FrameIter::Pcap(pcap::PcapFramer::new(bytes)),
        Framing::Oradis => FrameIter::Oradis(oradis::OradisFramer::new(bytes, max_frame)),
        Framing::Final => FrameIter::Final(final_frame::FinalFramer::new(bytes, max_frame)),
        Framing::Hdlc => FrameIter::Hdlc(hdlc::HdlcFramer::new(bytes, max_frame)),
        Framing::Gps => FrameIter::Gps(gps::GpsFramer::new(bytes, max_frame)),
    }
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = Result<Frame<'a>, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            FrameIter::Raw(inner) => inner.next(),
            FrameIter::Pcap(inner) => inner.next(),
            FrameIter::Oradis(inner) => inner.next(),
            FrameIter::Final(inner) => inner.next(),
            FrameIter::Hdlc(inner) => inner.next(),
            FrameIter::Gps(inner) => inner.next(),
        }
    }
}
