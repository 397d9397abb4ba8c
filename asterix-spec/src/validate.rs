//! Structural validation of a loaded category.
//!
//! Everything here runs once, at load time, so that the decoder can trust
//! the model: a bit range that validated here can only fail at decode time
//! when the input run is shorter than the specification promised.

use asterix_core::field::check_range;

use crate::model::{Category, FixedFormat, FormatNode, UapEntry, VariableFormat};

/// Checks every load-time invariant of a category. Returns the first
/// violation as a message; the loader attaches file context.
pub fn validate_category(category: &Category) -> Result<(), String> {
    for item in category.items() {
        validate_node(&item.format, &format!("item {}", item.id))?;
    }
    validate_uaps(category)?;
    validate_selector(category)
}

fn validate_node(node: &FormatNode, path: &str) -> Result<(), String> {
    match node {
        FormatNode::Fixed(fixed) => validate_fixed(fixed, path),
        FormatNode::Variable(var) => validate_variable(var, path),
        FormatNode::Repetitive { inner, .. } => {
            if inner.min_byte_width() == 0 {
                return Err(format!("{path}: Repetitive inner format is zero-width"));
            }
            validate_node(inner, &format!("{path}/rep"))
        }
        FormatNode::Compound { primary, children } => {
            validate_variable(primary, &format!("{path}/primary"))?;
            let positions = primary.parts.len() * 7;
            if children.len() != positions {
                return Err(format!(
                    "{path}: Compound declares {} children but the primary has {positions} bit positions",
                    children.len()
                ));
            }
            for child in children {
                validate_node(&child.format, &format!("{path}/{}", child.name))?;
            }
            Ok(())
        }
        FormatNode::Explicit(inner) => validate_node(inner, &format!("{path}/explicit")),
        FormatNode::Bds(bds) => {
            for (register, content) in &bds.registers {
                if content.length != crate::model::BdsFormat::LENGTH {
                    return Err(format!(
                        "{path}: BDS register {register:#04x} is {} bytes, expected 7",
                        content.length
                    ));
                }
                validate_fixed(content, &format!("{path}/bds{register:02x}"))?;
            }
            Ok(())
        }
    }
}

fn validate_fixed(fixed: &FixedFormat, path: &str) -> Result<(), String> {
    if fixed.length == 0 {
        return Err(format!("{path}: Fixed length 0"));
    }
    for bits in &fixed.bits {
        check_range(fixed.length, bits.from_bit, bits.to_bit).map_err(|e| {
            format!(
                "{path}: field {}: {e}",
                if bits.short_name.is_empty() {
                    "(unnamed)"
                } else {
                    &bits.short_name
                }
            )
        })?;
        if bits.fx && (bits.from_bit != 1 || bits.to_bit != 1) {
            return Err(format!(
                "{path}: FX flag on bits {}..{} (FX is always bit 1)",
                bits.from_bit, bits.to_bit
            ));
        }
    }
    Ok(())
}

fn validate_variable(var: &VariableFormat, path: &str) -> Result<(), String> {
    if var.parts.is_empty() {
        return Err(format!("{path}: Variable with no parts"));
    }
    for (i, part) in var.parts.iter().enumerate() {
        if part.length != 1 {
            return Err(format!(
                "{path}: Variable part {} is {} bytes, parts must be 1 byte",
                i + 1,
                part.length
            ));
        }
        let has_fx = part.bits.iter().any(|b| b.fx && b.to_bit == 1);
        if !has_fx {
            return Err(format!(
                "{path}: Variable part {} has no FX bit in position 1",
                i + 1
            ));
        }
        validate_fixed(part, &format!("{path}/part{}", i + 1))?;
    }
    Ok(())
}

fn validate_uaps(category: &Category) -> Result<(), String> {
    if category.uaps.is_empty() {
        return Err("category declares no UAP".into());
    }
    if !category.uaps.iter().any(|u| u.selector_value.is_none()) {
        return Err("no default UAP (every UAP carries a selector value)".into());
    }
    for uap in &category.uaps {
        if uap.entries.is_empty() {
            return Err(format!("UAP '{}' is empty", uap.name));
        }
        for (i, entry) in uap.entries.iter().enumerate() {
            if let UapEntry::Item(id) = entry
                && category.item(id).is_none()
            {
                return Err(format!(
                    "UAP '{}' FRN {}: unresolved item id {id}",
                    uap.name,
                    i + 1
                ));
            }
        }
    }
    Ok(())
}

fn validate_selector(category: &Category) -> Result<(), String> {
    let Some(selector) = &category.uap_selector else {
        if category.uaps.iter().any(|u| u.selector_value.is_some()) {
            return Err("UAP carries a selector value but the category has no UAPSelector".into());
        }
        return Ok(());
    };

    let item = category
        .item(&selector.item)
        .ok_or_else(|| format!("UAPSelector item {} does not exist", selector.item))?;

    // The decoder peeks the FRN 1 item before choosing a UAP, so the
    // selector must live there in every profile.
    for uap in &category.uaps {
        match uap.entry(1) {
            Some(UapEntry::Item(id)) if *id == selector.item => {}
            _ => {
                return Err(format!(
                    "UAP '{}': FRN 1 must be the selector item {}",
                    uap.name, selector.item
                ));
            }
        }
    }

    let field_exists = match &item.format {
        FormatNode::Fixed(fixed) => fixed.field(&selector.field).is_some(),
        FormatNode::Variable(var) => var.parts.iter().any(|p| p.field(&selector.field).is_some()),
        _ => false,
    };
    if !field_exists {
        return Err(format!(
            "UAPSelector field {} not found in item {}",
            selector.field, selector.item
        ));
    }
    Ok(())
}
