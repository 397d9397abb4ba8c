//! Static description lookup for emitters.

use thiserror::Error;

use crate::model::{Definition, FixedFormat, FormatNode};

/// The requested coordinate has no description.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescribeError {
    #[error("no description for the requested coordinate")]
    NotFound,
}

/// Looks up the human description of a category, item, field, or
/// enumerated field value.
///
/// Granularity grows with each supplied argument: `describe(def, 48, None,
/// None, None)` names the category, adding `item` names the item, `field`
/// the bit field, and `value` the enumerated value description.
pub fn describe(
    definition: &Definition,
    category: u8,
    item: Option<&str>,
    field: Option<&str>,
    value: Option<u64>,
) -> Result<String, DescribeError> {
    let cat = definition.category(category).ok_or(DescribeError::NotFound)?;

    let Some(item_id) = item else {
        return Ok(format!("CAT{category:03} {} (edition {})", cat.name, cat.edition));
    };
    let item = cat.item(item_id).ok_or(DescribeError::NotFound)?;

    let Some(field_name) = field else {
        return Ok(item.name.clone());
    };
    let bits = find_field(&item.format, field_name).ok_or(DescribeError::NotFound)?;

    let Some(value) = value else {
        let mut out = if bits.name.is_empty() {
            bits.short_name.clone()
        } else {
            bits.name.clone()
        };
        if let Some(unit) = &bits.unit {
            out.push_str(&format!(" [{unit}]"));
        }
        return Ok(out);
    };

    bits.value_description(value)
        .map(str::to_string)
        .ok_or(DescribeError::NotFound)
}

fn find_field<'a>(node: &'a FormatNode, name: &str) -> Option<&'a crate::model::BitsField> {
    let in_fixed = |f: &'a FixedFormat| f.field(name);
    match node {
        FormatNode::Fixed(fixed) => in_fixed(fixed),
        FormatNode::Variable(var) => var.parts.iter().find_map(in_fixed),
        FormatNode::Repetitive { inner, .. } | FormatNode::Explicit(inner) => {
            find_field(inner, name)
        }
        FormatNode::Compound { primary, children } => primary
            .parts
            .iter()
            .find_map(in_fixed)
            .or_else(|| children.iter().find_map(|c| find_field(&c.format, name))),
        FormatNode::Bds(bds) => bds.registers.values().find_map(in_fixed),
    }
}
