//! The record decoder: block header parse, FSPEC walk, UAP dispatch, and
//! per-variant format-node decoding.
//!
//! Decoding is a pure function over a borrowed byte span. The decoder never
//! reads past the span, and every Repetitive/Explicit length is validated
//! before any allocation or read. Partial failures surface the maximum
//! useful information: a faulty item yields a `format_ok = false` record
//! that keeps everything decoded before the fault, and block decoding
//! resumes at the next block boundary.

use log::{debug, warn};

use asterix_core::{Fspec, FspecError, extract_unsigned, field::sign_extend, strings};
use asterix_spec::{
    BitsEncoding, BitsField, Category, CompoundChild, Definition, FixedFormat, FormatNode,
    RepetitiveCount, UapEntry, VariableFormat,
};

use crate::error::DecodeError;
use crate::record::{AsterixRecord, DecodedField, DecodedItem, FieldValue};

/// Size of the `[cat][len:u16be]` block header.
pub const BLOCK_HEADER_LEN: usize = 3;

/// Largest block length the wire format allows.
pub const MAX_BLOCK_LEN: usize = 65536;

/// Decode configuration. Replaces the process-wide flags of older ASTERIX
/// tooling with an explicit value threaded through each call.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Halt the stream at the first error element instead of recovering at
    /// the next block boundary.
    pub strict: bool,

    /// Upper bound on any single framing-layer frame.
    pub max_frame_size: u32,

    /// When set, only records of this category are emitted. Other blocks
    /// are skipped without decoding their items.
    pub filter_category: Option<u8>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_frame_size: MAX_BLOCK_LEN as u32,
            filter_category: None,
        }
    }
}

/// Internal per-node failure, mapped to [`DecodeError`] with record context
/// by the caller.
#[derive(Debug)]
enum NodeError {
    Insufficient { needed: usize, available: usize },
    Malformed(String),
    Overflow,
}

struct NodeOutput {
    item: DecodedItem,
    consumed: usize,
    ok: bool,
}

/// Decodes one block span (header included) into `out`.
///
/// `base_offset` is the block's position within the caller's buffer, used
/// for error context only.
pub(crate) fn decode_block(
    definition: &Definition,
    block: &[u8],
    base_offset: usize,
    timestamp_us: u64,
    options: &DecodeOptions,
    out: &mut Vec<Result<AsterixRecord, DecodeError>>,
) {
    if block.len() < BLOCK_HEADER_LEN {
        out.push(Err(DecodeError::MalformedBlock {
            offset: base_offset,
            reason: "block shorter than its header",
        }));
        return;
    }
    let category = block[0];
    let declared = u16::from_be_bytes([block[1], block[2]]) as usize;
    if category == 0 {
        out.push(Err(DecodeError::MalformedBlock {
            offset: base_offset,
            reason: "category 0 is reserved",
        }));
        return;
    }
    if declared < BLOCK_HEADER_LEN {
        out.push(Err(DecodeError::MalformedBlock {
            offset: base_offset,
            reason: "declared length below header size",
        }));
        return;
    }
    // The framer guards this; re-checked so the decoder never trusts it.
    if declared > block.len() {
        out.push(Err(DecodeError::Truncated {
            offset: base_offset,
            declared,
            available: block.len(),
        }));
        return;
    }

    if let Some(filter) = options.filter_category
        && filter != category
    {
        return;
    }

    let Some(cat) = definition.category(category) else {
        out.push(Err(DecodeError::UnknownCategory {
            category,
            offset: base_offset,
        }));
        return;
    };

    let end = declared;
    let mut pos = BLOCK_HEADER_LEN;
    while pos < end {
        let outcome = decode_record(cat, &block[pos..end], base_offset + pos, timestamp_us);
        if let Some(record) = outcome.record {
            out.push(Ok(record));
        }
        if let Some(error) = outcome.error {
            // No mid-block resynchronization: the remaining payload bytes
            // stay unconsumed and the next block is attempted.
            out.push(Err(error));
            return;
        }
        debug_assert!(outcome.consumed > 0);
        if outcome.consumed == 0 {
            return;
        }
        pos += outcome.consumed;
    }
}

struct RecordOutcome {
    record: Option<AsterixRecord>,
    error: Option<DecodeError>,
    consumed: usize,
}

fn decode_record(
    cat: &Category,
    payload: &[u8],
    abs_offset: usize,
    timestamp_us: u64,
) -> RecordOutcome {
    let fspec = match Fspec::parse(payload) {
        Ok(f) => f,
        Err(e) => {
            let reason = match e {
                FspecError::TooLong => "FSPEC longer than 8 bytes".to_string(),
                FspecError::Truncated => "FSPEC runs past the block end".to_string(),
            };
            return RecordOutcome {
                record: None,
                error: Some(DecodeError::MalformedFspec {
                    category: cat.id,
                    offset: abs_offset,
                    reason,
                }),
                consumed: 0,
            };
        }
    };

    // An all-zero FSPEC carries no items; shipped streams use it to pad a
    // block out, so the remainder is consumed silently.
    if fspec.is_empty() {
        debug!(
            "cat {}: empty FSPEC at offset {abs_offset}, treating {} bytes as padding",
            cat.id,
            payload.len()
        );
        return RecordOutcome {
            record: None,
            error: None,
            consumed: payload.len(),
        };
    }

    let uap = select_uap(cat, &fspec, payload);

    let mut cursor = fspec.byte_len();
    let mut items: Vec<(String, DecodedItem)> = Vec::new();
    let mut format_ok = true;
    let mut error = None;

    for frn in fspec.frns() {
        let entry = uap.entry(frn);
        let id = match entry {
            Some(UapEntry::Item(id)) => id,
            Some(UapEntry::Spare) | None => {
                format_ok = false;
                error = Some(DecodeError::MalformedFspec {
                    category: cat.id,
                    offset: abs_offset,
                    reason: format!("FSPEC bit for FRN {frn} has no item in UAP '{}'", uap.name),
                });
                break;
            }
        };
        // Load-time validation guarantees the reference resolves.
        let Some(desc) = cat.item(id) else {
            format_ok = false;
            error = Some(DecodeError::MalformedFspec {
                category: cat.id,
                offset: abs_offset,
                reason: format!("UAP references undefined item {id}"),
            });
            break;
        };

        match decode_node(&desc.format, &payload[cursor..]) {
            Ok(output) => {
                format_ok &= output.ok;
                cursor += output.consumed;
                items.push((id.clone(), output.item));
            }
            Err(NodeError::Overflow) => {
                format_ok = false;
                warn!(
                    "cat {} item {id}: repetitive length overflow at offset {}",
                    cat.id,
                    abs_offset + cursor
                );
                error = Some(DecodeError::RepetitiveOverflow {
                    category: cat.id,
                    item: id.clone(),
                    offset: abs_offset + cursor,
                });
                break;
            }
            Err(NodeError::Insufficient { needed, available }) => {
                format_ok = false;
                error = Some(DecodeError::MalformedItem {
                    category: cat.id,
                    item: id.clone(),
                    offset: abs_offset + cursor,
                    reason: format!("needs {needed} bytes, {available} available"),
                });
                break;
            }
            Err(NodeError::Malformed(reason)) => {
                format_ok = false;
                error = Some(DecodeError::MalformedItem {
                    category: cat.id,
                    item: id.clone(),
                    offset: abs_offset + cursor,
                    reason,
                });
                break;
            }
        }
    }

    let mut record = AsterixRecord::new(cat.id, payload[..cursor].to_vec(), timestamp_us);
    record.format_ok = format_ok;
    for (id, item) in items {
        record.push_item(id, item);
    }

    RecordOutcome {
        record: Some(record),
        error,
        consumed: cursor,
    }
}

/// Picks the UAP for this record. Categories with a selector rule branch on
/// a field of the FRN 1 item, decoded here against the default profile.
fn select_uap<'c>(cat: &'c Category, fspec: &Fspec, payload: &[u8]) -> &'c asterix_spec::Uap {
    let default = cat.default_uap();
    let Some(selector) = &cat.uap_selector else {
        return default;
    };
    if !fspec.is_frn_set(1) {
        return default;
    }
    let Some(UapEntry::Item(id)) = default.entry(1) else {
        return default;
    };
    let Some(desc) = cat.item(id) else {
        return default;
    };
    let Ok(peek) = decode_node(&desc.format, &payload[fspec.byte_len()..]) else {
        return default;
    };
    let Some(field) = peek.item.field(&selector.field) else {
        return default;
    };
    match cat.uap_for(field.raw) {
        Some(uap) => uap,
        None => {
            debug!(
                "cat {}: selector {}={} matches no UAP, using '{}'",
                cat.id, selector.field, field.raw, default.name
            );
            default
        }
    }
}

fn decode_node(node: &FormatNode, bytes: &[u8]) -> Result<NodeOutput, NodeError> {
    match node {
        FormatNode::Fixed(fixed) => decode_fixed(fixed, bytes),
        FormatNode::Variable(var) => {
            let (parts, consumed) = decode_variable(var, bytes)?;
            Ok(NodeOutput {
                item: DecodedItem::Variable { parts },
                consumed,
                ok: true,
            })
        }
        FormatNode::Repetitive { count, inner } => decode_repetitive(*count, inner, bytes),
        FormatNode::Compound { primary, children } => decode_compound(primary, children, bytes),
        FormatNode::Explicit(inner) => decode_explicit(inner, bytes),
        FormatNode::Bds(bds) => decode_bds(bds, bytes),
    }
}

fn decode_fixed(fixed: &FixedFormat, bytes: &[u8]) -> Result<NodeOutput, NodeError> {
    if bytes.len() < fixed.length {
        return Err(NodeError::Insufficient {
            needed: fixed.length,
            available: bytes.len(),
        });
    }
    let fields = fixed_fields(fixed, &bytes[..fixed.length])?;
    Ok(NodeOutput {
        item: DecodedItem::Fixed { fields },
        consumed: fixed.length,
        ok: true,
    })
}

/// Extracts every declared (non-spare, non-FX) field of a Fixed run.
fn fixed_fields(fixed: &FixedFormat, run: &[u8]) -> Result<Vec<DecodedField>, NodeError> {
    let mut fields = Vec::with_capacity(fixed.bits.len());
    for bits in &fixed.bits {
        if bits.spare || bits.fx {
            continue;
        }
        let raw = extract_unsigned(run, bits.from_bit, bits.to_bit)
            .map_err(|e| NodeError::Malformed(e.to_string()))?;
        fields.push(present_field(bits, raw));
    }
    Ok(fields)
}

/// Applies scaling, character, and enumeration conversion to one extracted
/// bit pattern.
fn present_field(bits: &BitsField, raw: u64) -> DecodedField {
    let width = bits.width() as u32;
    let signed = matches!(bits.encoding, BitsEncoding::Signed);
    let numeric: i64 = if signed { sign_extend(raw, width) } else { raw as i64 };

    let value = match bits.encoding {
        BitsEncoding::Unsigned | BitsEncoding::Signed => match bits.scale {
            Some(scale) => {
                FieldValue::Float(numeric as f64 * scale + bits.offset.unwrap_or(0.0))
            }
            None => FieldValue::Integer(numeric),
        },
        BitsEncoding::Icao6Char => {
            FieldValue::String(strings::icao6_from_u64(raw, width as usize / 6))
        }
        BitsEncoding::Ascii => {
            FieldValue::String(strings::ascii_from_u64(raw, width as usize / 8))
        }
        BitsEncoding::Hex => FieldValue::String(format!("{raw:X}")),
        BitsEncoding::Octal => FieldValue::String(format!("{raw:o}")),
    };

    if let (Some(v), Some(min)) = (value.as_f64(), bits.min)
        && v < min
    {
        debug!("field {}: value {v} below declared minimum {min}", bits.short_name);
    }
    if let (Some(v), Some(max)) = (value.as_f64(), bits.max)
        && v > max
    {
        debug!("field {}: value {v} above declared maximum {max}", bits.short_name);
    }

    DecodedField {
        name: bits.short_name.clone(),
        raw,
        value,
        description: bits.value_description(raw).map(str::to_string),
    }
}

fn decode_variable(
    var: &VariableFormat,
    bytes: &[u8],
) -> Result<(Vec<DecodedItem>, usize), NodeError> {
    let mut parts = Vec::new();
    let mut used = 0;

    for (i, part) in var.parts.iter().enumerate() {
        let Some(&byte) = bytes.get(used) else {
            return Err(NodeError::Insufficient {
                needed: used + 1,
                available: bytes.len(),
            });
        };
        let output = decode_fixed(part, &bytes[used..used + 1])?;
        parts.push(output.item);
        used += 1;

        if byte & 0x01 == 0 {
            return Ok((parts, used));
        }
        if i + 1 == var.parts.len() {
            return Err(NodeError::Malformed(
                "FX set on the last declared variable part".into(),
            ));
        }
    }

    // Only reachable with an empty part list, which validation rejects.
    Err(NodeError::Malformed("variable format with no parts".into()))
}

fn decode_repetitive(
    count: RepetitiveCount,
    inner: &FormatNode,
    bytes: &[u8],
) -> Result<NodeOutput, NodeError> {
    let count_width = count.width();
    if bytes.len() < count_width {
        return Err(NodeError::Insufficient {
            needed: count_width,
            available: bytes.len(),
        });
    }
    let n = match count {
        RepetitiveCount::Byte1 => bytes[0] as u64,
        RepetitiveCount::Byte2 => u16::from_be_bytes([bytes[0], bytes[1]]) as u64,
    };

    // Both bounds are checked before any allocation or read; this ordering
    // is a hard requirement of the wire contract.
    let min_payload = n
        .checked_mul(inner.min_byte_width() as u64)
        .ok_or(NodeError::Overflow)?;
    if min_payload > u32::MAX as u64 || min_payload > (bytes.len() - count_width) as u64 {
        return Err(NodeError::Overflow);
    }

    let mut items = Vec::with_capacity(n as usize);
    let mut used = count_width;
    let mut ok = true;
    for _ in 0..n {
        let output = decode_node(inner, &bytes[used..])?;
        ok &= output.ok;
        used += output.consumed;
        items.push(output.item);
    }

    Ok(NodeOutput {
        item: DecodedItem::Repetitive { items },
        consumed: used,
        ok,
    })
}

fn decode_compound(
    primary: &VariableFormat,
    children: &[CompoundChild],
    bytes: &[u8],
) -> Result<NodeOutput, NodeError> {
    let (_, primary_len) = decode_variable(primary, bytes)?;
    let primary_bytes = &bytes[..primary_len];

    let mut subfields = Vec::new();
    let mut used = primary_len;
    let mut ok = true;

    for (part, &byte) in primary_bytes.iter().enumerate() {
        for pos in 0..7u16 {
            if byte & (0x80 >> pos) == 0 {
                continue;
            }
            let index = part * 7 + pos as usize;
            let Some(child) = children.get(index) else {
                return Err(NodeError::Malformed(format!(
                    "compound primary bit {} selects no declared subfield",
                    index + 1
                )));
            };
            let output = decode_node(&child.format, &bytes[used..])?;
            ok &= output.ok;
            used += output.consumed;
            subfields.push((child.name.clone(), output.item));
        }
    }

    Ok(NodeOutput {
        item: DecodedItem::Compound { subfields },
        consumed: used,
        ok,
    })
}

fn decode_explicit(inner: &FormatNode, bytes: &[u8]) -> Result<NodeOutput, NodeError> {
    let Some(&declared) = bytes.first() else {
        return Err(NodeError::Insufficient {
            needed: 1,
            available: 0,
        });
    };
    let declared = declared as usize;
    if declared < 3 {
        return Err(NodeError::Malformed(format!(
            "explicit length {declared} below the minimum of 3"
        )));
    }
    if declared > bytes.len() {
        return Err(NodeError::Malformed(format!(
            "explicit length {declared} exceeds the {} remaining bytes",
            bytes.len()
        )));
    }

    let inner_bytes = &bytes[1..declared];
    let output = decode_node(inner, inner_bytes)?;
    let trailing = inner_bytes[output.consumed..].to_vec();
    if !trailing.is_empty() {
        debug!("explicit item: {} trailing bytes retained", trailing.len());
    }

    Ok(NodeOutput {
        item: DecodedItem::Explicit {
            inner: Box::new(output.item),
            trailing,
        },
        consumed: declared,
        ok: output.ok,
    })
}

fn decode_bds(bds: &asterix_spec::BdsFormat, bytes: &[u8]) -> Result<NodeOutput, NodeError> {
    const LEN: usize = asterix_spec::BdsFormat::LENGTH;
    if bytes.len() < LEN {
        return Err(NodeError::Insufficient {
            needed: LEN,
            available: bytes.len(),
        });
    }
    let run = &bytes[..LEN];
    let register = bds.register.unwrap_or(run[LEN - 1]);

    match bds.registers.get(&register) {
        Some(content) => {
            let fields = fixed_fields(content, run)?;
            Ok(NodeOutput {
                item: DecodedItem::Bds { register, fields },
                consumed: LEN,
                ok: true,
            })
        }
        None => {
            debug!("unknown BDS register {register:#04x}, bytes preserved");
            Ok(NodeOutput {
                item: DecodedItem::Raw(run.to_vec()),
                consumed: LEN,
                ok: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asterix_spec::BdsFormat;
    use std::collections::BTreeMap;

    fn fixed(length: usize) -> FormatNode {
        FormatNode::Fixed(FixedFormat {
            length,
            bits: Vec::new(),
        })
    }

    #[test]
    fn repetitive_count_exceeding_remaining_is_overflow() {
        // Count 255 with a 10-byte inner but only 200 bytes following.
        let node = fixed(10);
        let mut bytes = vec![0xFF];
        bytes.extend_from_slice(&[0u8; 200]);
        assert!(matches!(
            decode_repetitive(RepetitiveCount::Byte1, &node, &bytes),
            Err(NodeError::Overflow)
        ));
    }

    #[test]
    fn repetitive_product_overflowing_u32_is_rejected() {
        let node = fixed(70_000);
        let bytes = [0xFF, 0xFF, 0x00];
        assert!(matches!(
            decode_repetitive(RepetitiveCount::Byte2, &node, &bytes),
            Err(NodeError::Overflow)
        ));
    }

    #[test]
    fn repetitive_zero_count_is_empty() {
        let node = fixed(4);
        let out = decode_repetitive(RepetitiveCount::Byte1, &node, &[0x00]).unwrap();
        assert_eq!(out.consumed, 1);
        let DecodedItem::Repetitive { items } = out.item else {
            panic!("expected Repetitive");
        };
        assert!(items.is_empty());
    }

    #[test]
    fn explicit_length_bounds() {
        let node = fixed(1);
        assert!(matches!(
            decode_explicit(&node, &[]),
            Err(NodeError::Insufficient { .. })
        ));
        assert!(matches!(
            decode_explicit(&node, &[0x02, 0xAA]),
            Err(NodeError::Malformed(_))
        ));
        assert!(matches!(
            decode_explicit(&node, &[0x09, 0xAA]),
            Err(NodeError::Malformed(_))
        ));
        let out = decode_explicit(&node, &[0x03, 0xAA, 0xBB]).unwrap();
        assert_eq!(out.consumed, 3);
        let DecodedItem::Explicit { trailing, .. } = out.item else {
            panic!("expected Explicit");
        };
        assert_eq!(trailing, vec![0xBB]);
    }

    #[test]
    fn bds_with_empty_register_map_preserves_bytes() {
        let bds = BdsFormat {
            register: None,
            registers: BTreeMap::new(),
        };
        let out = decode_bds(&bds, &[1, 2, 3, 4, 5, 6, 0x30]).unwrap();
        assert!(!out.ok);
        assert_eq!(out.consumed, 7);
        let DecodedItem::Raw(bytes) = out.item else {
            panic!("expected Raw");
        };
        assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, 0x30]);
    }
}
