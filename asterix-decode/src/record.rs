//! Decoded-record data model.
//!
//! The shapes mirror the format-node tree: a list of named leaves for a
//! Fixed run, a part list for Variable, an item list for Repetitive, a
//! keyed subfield list for Compound, a nested item plus retained trailing
//! bytes for Explicit. Records own their bytes and their item tree; the
//! caller takes ownership on return.

use serde::Serialize;

/// One decoded ASTERIX record.
#[derive(Debug, Clone, Serialize)]
pub struct AsterixRecord {
    /// Category number from the enclosing block.
    pub category: u8,

    /// The record's raw bytes (FSPEC included).
    pub raw: Vec<u8>,

    /// CRC32 (IEEE 802.3) over [`raw`](Self::raw). Exported for integrity
    /// reporting, never used to reject records.
    pub crc32: u32,

    /// Microseconds timestamp: from the framing layer when it carries one
    /// (GPS), otherwise the caller-supplied base.
    pub timestamp_us: u64,

    /// False when any item under this record failed to decode; whatever
    /// decoded before the fault is retained.
    pub format_ok: bool,

    /// Decoded items in UAP order, keyed by item id.
    items: Vec<(String, DecodedItem)>,
}

impl AsterixRecord {
    pub(crate) fn new(category: u8, raw: Vec<u8>, timestamp_us: u64) -> Self {
        let crc32 = asterix_core::crc32(&raw);
        Self {
            category,
            raw,
            crc32,
            timestamp_us,
            format_ok: true,
            items: Vec::new(),
        }
    }

    pub(crate) fn push_item(&mut self, id: String, item: DecodedItem) {
        self.items.push((id, item));
    }

    /// The decoded item with the given id (e.g. `"010"`).
    pub fn item(&self, id: &str) -> Option<&DecodedItem> {
        self.items
            .iter()
            .find_map(|(k, v)| (k == id).then_some(v))
    }

    pub fn has_item(&self, id: &str) -> bool {
        self.item(id).is_some()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Items in decode (UAP) order.
    pub fn items(&self) -> impl Iterator<Item = (&str, &DecodedItem)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Raw bytes rendered as an uppercase hex string.
    pub fn hex(&self) -> String {
        self.raw.iter().map(|b| format!("{b:02X}")).collect()
    }
}

/// One decoded data item, shaped like its format node.
#[derive(Debug, Clone, Serialize)]
pub enum DecodedItem {
    /// A Fixed run: the declared (non-spare, non-FX) bit fields.
    Fixed { fields: Vec<DecodedField> },

    /// A Variable chain: one Fixed entry per decoded part, in wire order.
    Variable { parts: Vec<DecodedItem> },

    /// A Repetitive item: `count` decoded copies of the inner node.
    Repetitive { items: Vec<DecodedItem> },

    /// A Compound item: present subfields in primary-bit order.
    Compound { subfields: Vec<(String, DecodedItem)> },

    /// An Explicit item: the inner decoding plus any declared-length bytes
    /// the inner node did not consume.
    Explicit {
        inner: Box<DecodedItem>,
        trailing: Vec<u8>,
    },

    /// A recognized BDS register block.
    Bds {
        register: u8,
        fields: Vec<DecodedField>,
    },

    /// Bytes preserved verbatim (unknown BDS register).
    Raw(Vec<u8>),
}

impl DecodedItem {
    /// Finds a leaf field by short name, searching Fixed fields, Variable
    /// parts, and BDS fields.
    pub fn field(&self, short_name: &str) -> Option<&DecodedField> {
        match self {
            DecodedItem::Fixed { fields } | DecodedItem::Bds { fields, .. } => {
                fields.iter().find(|f| f.name == short_name)
            }
            DecodedItem::Variable { parts } => {
                parts.iter().find_map(|p| p.field(short_name))
            }
            _ => None,
        }
    }

    /// Subfield of a Compound item.
    pub fn subfield(&self, name: &str) -> Option<&DecodedItem> {
        match self {
            DecodedItem::Compound { subfields } => subfields
                .iter()
                .find_map(|(k, v)| (k == name).then_some(v)),
            _ => None,
        }
    }
}

/// One decoded bit field: the raw extracted bits and the presented value.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedField {
    /// Field short name from the specification.
    pub name: String,

    /// Raw bit pattern as extracted, zero-extended to 64 bits.
    pub raw: u64,

    /// Presented value after scaling / character / enum conversion.
    pub value: FieldValue,

    /// Enumerated value description, when the specification declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A presented field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Integer value (signed container covers both encodings).
    Integer(i64),

    /// Scaled fixed-point value.
    Float(f64),

    /// Character data (callsigns, hex addresses, octal codes).
    String(String),

    /// Raw byte data.
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accessors() {
        let mut record = AsterixRecord::new(48, vec![0x80, 0x00, 0x01], 0);
        record.push_item(
            "010".into(),
            DecodedItem::Fixed {
                fields: vec![DecodedField {
                    name: "SAC".into(),
                    raw: 0,
                    value: FieldValue::Integer(0),
                    description: None,
                }],
            },
        );

        assert_eq!(record.item_count(), 1);
        assert!(record.has_item("010"));
        assert!(!record.has_item("020"));
        assert_eq!(record.item("010").unwrap().field("SAC").unwrap().raw, 0);
        assert_eq!(record.hex(), "800001");
        assert_eq!(record.crc32, asterix_core::crc32(&[0x80, 0x00, 0x01]));
    }

    #[test]
    fn field_value_accessors() {
        assert_eq!(FieldValue::Integer(42).as_i64(), Some(42));
        assert_eq!(FieldValue::Integer(42).as_f64(), Some(42.0));
        assert_eq!(FieldValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(FieldValue::Float(0.5).as_i64(), None);
        assert_eq!(FieldValue::String("AB".into()).as_str(), Some("AB"));
        assert_eq!(
            FieldValue::Bytes(vec![1, 2]).as_bytes(),
            Some(&[1u8, 2][..])
        );
    }

    #[test]
    fn variable_field_search_spans_parts() {
        let item = DecodedItem::Variable {
            parts: vec![
                DecodedItem::Fixed {
                    fields: vec![DecodedField {
                        name: "TYP".into(),
                        raw: 1,
                        value: FieldValue::Integer(1),
                        description: None,
                    }],
                },
                DecodedItem::Fixed {
                    fields: vec![DecodedField {
                        name: "TST".into(),
                        raw: 0,
                        value: FieldValue::Integer(0),
                        description: None,
                    }],
                },
            ],
        };
        assert_eq!(item.field("TST").unwrap().raw, 0);
        assert!(item.field("XXX").is_none());
    }
}
