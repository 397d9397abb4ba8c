//! libpcap capture framing.
//!
//! Parses the v2.4 global header (either byte order), then walks packet
//! records, peeling Ethernet-II, IPv4 and UDP to reach the ASTERIX payload.
//! The IP total-length and UDP length fields are honored — not the captured
//! length — but every declared length is bounds-checked against the capture
//! before any slice is taken. Packets that are not IPv4/UDP are skipped.

use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::error::FramingError;
use crate::framing::Frame;

const GLOBAL_HEADER_LEN: usize = 24;
const PACKET_HEADER_LEN: usize = 16;
const ETHERNET_HEADER_LEN: usize = 14;
const ETHERTYPE_IPV4: u16 = 0x0800;
const IPPROTO_UDP: u8 = 17;

const LINKTYPE_ETHERNET: u32 = 1;
const LINKTYPE_RAW: u32 = 101;

#[derive(Clone, Copy)]
enum Endian {
    Big,
    Little,
}

impl Endian {
    fn u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Big => BigEndian::read_u16(buf),
            Endian::Little => LittleEndian::read_u16(buf),
        }
    }

    fn u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Big => BigEndian::read_u32(buf),
            Endian::Little => LittleEndian::read_u32(buf),
        }
    }
}

pub struct PcapFramer<'a> {
    bytes: &'a [u8],
    pos: usize,
    endian: Endian,
    link_type: u32,
    started: bool,
    halted: bool,
}

impl<'a> PcapFramer<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            endian: Endian::Big,
            link_type: LINKTYPE_ETHERNET,
            started: false,
            halted: false,
        }
    }

    fn parse_global_header(&mut self) -> Result<(), FramingError> {
        if self.bytes.len() < GLOBAL_HEADER_LEN {
            return Err(FramingError::Truncated {
                layer: "PCAP",
                offset: 0,
                declared: GLOBAL_HEADER_LEN,
                available: self.bytes.len(),
            });
        }
        self.endian = match self.bytes[..4] {
            [0xA1, 0xB2, 0xC3, 0xD4] => Endian::Big,
            [0xD4, 0xC3, 0xB2, 0xA1] => Endian::Little,
            _ => {
                return Err(FramingError::BadHeader {
                    layer: "PCAP",
                    offset: 0,
                });
            }
        };
        let major = self.endian.u16(&self.bytes[4..]);
        let minor = self.endian.u16(&self.bytes[6..]);
        if (major, minor) != (2, 4) {
            debug!("PCAP version {major}.{minor}, expected 2.4");
        }
        self.link_type = self.endian.u32(&self.bytes[20..]);
        if self.link_type != LINKTYPE_ETHERNET && self.link_type != LINKTYPE_RAW {
            return Err(FramingError::UnsupportedLinkType(self.link_type));
        }
        self.pos = GLOBAL_HEADER_LEN;
        Ok(())
    }

    /// Extracts the UDP payload span from one captured packet, or `None`
    /// for packets that are not IPv4/UDP or fail their own length checks.
    fn udp_payload(&self, packet: &'a [u8], offset: usize) -> Option<&'a [u8]> {
        let ip = match self.link_type {
            LINKTYPE_ETHERNET => {
                if packet.len() < ETHERNET_HEADER_LEN {
                    return None;
                }
                let ethertype = BigEndian::read_u16(&packet[12..]);
                if ethertype != ETHERTYPE_IPV4 {
                    debug!("offset {offset}: skipping non-IPv4 ethertype {ethertype:#06x}");
                    return None;
                }
                &packet[ETHERNET_HEADER_LEN..]
            }
            _ => packet,
        };

        if ip.len() < 20 {
            return None;
        }
        let version = ip[0] >> 4;
        let ihl = (ip[0] & 0x0F) as usize * 4;
        if version != 4 || ihl < 20 {
            debug!("offset {offset}: skipping non-IPv4 packet");
            return None;
        }
        let total_length = BigEndian::read_u16(&ip[2..]) as usize;
        if total_length < ihl || total_length > ip.len() {
            warn!("offset {offset}: IPv4 total length {total_length} fails capture bounds");
            return None;
        }
        if ip[9] != IPPROTO_UDP {
            debug!("offset {offset}: skipping IP protocol {}", ip[9]);
            return None;
        }

        // UDP header and payload live inside the IP total length.
        let udp = &ip[ihl..total_length];
        if udp.len() < 8 {
            return None;
        }
        let udp_length = BigEndian::read_u16(&udp[4..]) as usize;
        if udp_length < 8 || udp_length > udp.len() {
            warn!("offset {offset}: UDP length {udp_length} fails capture bounds");
            return None;
        }
        Some(&udp[8..udp_length])
    }
}

impl<'a> Iterator for PcapFramer<'a> {
    type Item = Result<Frame<'a>, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }
        if !self.started {
            self.started = true;
            if let Err(e) = self.parse_global_header() {
                self.halted = true;
                return Some(Err(e));
            }
        }

        loop {
            if self.pos >= self.bytes.len() {
                return None;
            }
            let offset = self.pos;
            let remaining = &self.bytes[offset..];
            if remaining.len() < PACKET_HEADER_LEN {
                self.halted = true;
                return Some(Err(FramingError::Truncated {
                    layer: "PCAP",
                    offset,
                    declared: PACKET_HEADER_LEN,
                    available: remaining.len(),
                }));
            }

            let ts_sec = self.endian.u32(remaining) as u64;
            let ts_usec = self.endian.u32(&remaining[4..]) as u64;
            let incl_len = self.endian.u32(&remaining[8..]) as usize;
            if remaining.len() < PACKET_HEADER_LEN + incl_len {
                self.halted = true;
                return Some(Err(FramingError::Truncated {
                    layer: "PCAP",
                    offset,
                    declared: PACKET_HEADER_LEN + incl_len,
                    available: remaining.len(),
                }));
            }

            let packet = &remaining[PACKET_HEADER_LEN..PACKET_HEADER_LEN + incl_len];
            self.pos += PACKET_HEADER_LEN + incl_len;

            if let Some(payload) = self.udp_payload(packet, offset) {
                let payload_offset =
                    offset + PACKET_HEADER_LEN + (payload.as_ptr() as usize - packet.as_ptr() as usize);
                return Some(Ok(Frame {
                    payload: Cow::Borrowed(payload),
                    offset: payload_offset,
                    timestamp_us: Some(ts_sec * 1_000_000 + ts_usec),
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a single-packet capture around `payload`:
    /// Ethernet-II + IPv4 + UDP, big-endian file headers.
    pub(crate) fn pcap_capture(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        // Global header.
        out.extend_from_slice(&[0xA1, 0xB2, 0xC3, 0xD4]);
        out.extend_from_slice(&2u16.to_be_bytes());
        out.extend_from_slice(&4u16.to_be_bytes());
        out.extend_from_slice(&[0; 8]); // thiszone, sigfigs
        out.extend_from_slice(&65535u32.to_be_bytes()); // snaplen
        out.extend_from_slice(&LINKTYPE_ETHERNET.to_be_bytes());

        let udp_len = 8 + payload.len();
        let ip_len = 20 + udp_len;
        let packet_len = ETHERNET_HEADER_LEN + ip_len;

        // Packet header: ts 100s + 250us.
        out.extend_from_slice(&100u32.to_be_bytes());
        out.extend_from_slice(&250u32.to_be_bytes());
        out.extend_from_slice(&(packet_len as u32).to_be_bytes());
        out.extend_from_slice(&(packet_len as u32).to_be_bytes());

        // Ethernet: MACs + ethertype.
        out.extend_from_slice(&[0u8; 12]);
        out.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

        // IPv4 header, checksum left zero (not validated).
        out.push(0x45);
        out.push(0);
        out.extend_from_slice(&(ip_len as u16).to_be_bytes());
        out.extend_from_slice(&[0; 5]);
        out.push(IPPROTO_UDP);
        out.extend_from_slice(&[0; 2]); // header checksum
        out.extend_from_slice(&[10, 0, 0, 1]);
        out.extend_from_slice(&[10, 0, 0, 2]);

        // UDP header.
        out.extend_from_slice(&8600u16.to_be_bytes());
        out.extend_from_slice(&8600u16.to_be_bytes());
        out.extend_from_slice(&(udp_len as u16).to_be_bytes());
        out.extend_from_slice(&[0; 2]); // checksum
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn extracts_udp_payload_and_timestamp() {
        let payload = [0x01, 0x00, 0x04, 0x00];
        let capture = pcap_capture(&payload);
        let mut framer = PcapFramer::new(&capture);
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(&frame.payload[..], &payload);
        assert_eq!(frame.timestamp_us, Some(100_000_250));
        assert!(framer.next().is_none());
    }

    #[test]
    fn little_endian_capture() {
        let mut capture = pcap_capture(&[0xAA]);
        // Rewrite the global and packet headers little-endian.
        capture[..4].copy_from_slice(&[0xD4, 0xC3, 0xB2, 0xA1]);
        capture[4..6].copy_from_slice(&2u16.to_le_bytes());
        capture[6..8].copy_from_slice(&4u16.to_le_bytes());
        capture[16..20].copy_from_slice(&65535u32.to_le_bytes());
        capture[20..24].copy_from_slice(&1u32.to_le_bytes());
        capture[24..28].copy_from_slice(&100u32.to_le_bytes());
        capture[28..32].copy_from_slice(&250u32.to_le_bytes());
        let packet_len = capture.len() - 40;
        capture[32..36].copy_from_slice(&(packet_len as u32).to_le_bytes());
        capture[36..40].copy_from_slice(&(packet_len as u32).to_le_bytes());

        let mut framer = PcapFramer::new(&capture);
        let frame = framer.next().unwrap().unwrap();
        assert_eq!(&frame.payload[..], &[0xAA]);
    }

    #[test]
    fn bad_magic_halts() {
        let capture = vec![0u8; 64];
        let mut framer = PcapFramer::new(&capture);
        assert!(matches!(
            framer.next(),
            Some(Err(FramingError::BadHeader { layer: "PCAP", .. }))
        ));
        assert!(framer.next().is_none());
    }

    #[test]
    fn non_ipv4_packet_is_skipped() {
        let mut capture = pcap_capture(&[0xAA]);
        // Flip the ethertype to ARP.
        let ethertype_at = 40 + 12;
        capture[ethertype_at..ethertype_at + 2].copy_from_slice(&0x0806u16.to_be_bytes());
        let mut framer = PcapFramer::new(&capture);
        assert!(framer.next().is_none());
    }

    #[test]
    fn udp_length_beyond_capture_is_dropped() {
        let mut capture = pcap_capture(&[0xAA, 0xBB]);
        // UDP length field at eth(14) + ip(20) + 4 into the packet data.
        let udp_len_at = 40 + 14 + 20 + 4;
        capture[udp_len_at..udp_len_at + 2].copy_from_slice(&100u16.to_be_bytes());
        let mut framer = PcapFramer::new(&capture);
        assert!(framer.next().is_none());
    }

    #[test]
    fn truncated_packet_record_halts() {
        let mut capture = pcap_capture(&[0xAA]);
        capture.truncate(capture.len() - 1);
        let results: Vec<_> = PcapFramer::new(&capture).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(FramingError::Truncated { layer: "PCAP", .. })
        ));
    }
}
