//! Streaming XML loader for category specification files.
//!
//! Category files are small (tens of kilobytes) but numerous, so the loader
//! is event-driven: it feeds `quick-xml` events through an explicit stack of
//! in-construction nodes. The top of the stack is the node that the next
//! child element attaches to. No DOM is built.
//!
//! Loading is all-or-nothing: any syntax or structural error fails the
//! whole `load_definitions` call and no partially-loaded [`Definition`]
//! escapes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::warn;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use crate::model::{
    BdsFormat, BitsEncoding, BitsField, Category, CompoundChild, DataItemDescription, Definition,
    FixedFormat, FormatNode, RepetitiveCount, Rule, Uap, UapEntry, UapSelector, VariableFormat,
};
use crate::validate;

/// Load-time errors. Fatal: no [`Definition`] is produced.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Malformed XML.
    #[error("{file}: XML syntax error at byte {position}: {message}")]
    XmlSyntax {
        file: String,
        position: u64,
        message: String,
    },

    /// Structurally invalid specification.
    #[error("{file}: {message}")]
    Structure { file: String, message: String },

    /// The file could not be read.
    #[error("{file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

/// Loads an ordered list of category XML files into a [`Definition`].
///
/// A later file for the same category number replaces the earlier one (with
/// a warning), which lets a caller layer local overrides over a stock
/// catalog.
pub fn load_definitions<P: AsRef<Path>>(paths: &[P]) -> Result<Definition, SpecError> {
    let mut definition = Definition::new();
    for path in paths {
        let file = path.as_ref().display().to_string();
        let xml = fs::read_to_string(path.as_ref()).map_err(|source| SpecError::Io {
            file: file.clone(),
            source,
        })?;
        let category = parse_category(&xml, &file)?;
        let id = category.id;
        if definition.insert(category).is_some() {
            warn!("category {id}: replaced by later definition in {file}");
        }
    }
    Ok(definition)
}

/// Parses a single category file already read into memory. `file` is used
/// for error context only.
pub fn parse_category(xml: &str, file: &str) -> Result<Category, SpecError> {
    let mut reader = Reader::from_str(xml);
    let mut loader = Loader::new(file);

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Err(e) => return Err(loader.xml(position, e.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => loader.start(&e, position)?,
            Ok(Event::Empty(e)) => {
                loader.start(&e, position)?;
                loader.end(e.name().as_ref(), position)?;
            }
            Ok(Event::End(e)) => loader.end(e.name().as_ref(), position)?,
            Ok(Event::Text(t)) => match t.unescape() {
                Ok(s) => loader.text.push_str(&s),
                Err(e) => return Err(loader.xml(position, e.to_string())),
            },
            Ok(_) => {}
        }
    }

    let category = loader.finish()?;
    validate::validate_category(&category).map_err(|message| SpecError::Structure {
        file: file.to_string(),
        message,
    })?;
    Ok(category)
}

/// One in-construction node on the loader stack.
enum Frame {
    Category(Category),
    DataItem {
        id: String,
        rule: Rule,
        name: String,
        definition: String,
        format: Option<FormatNode>,
    },
    /// `DataItemFormat` wrapper around the root format node.
    Format(Option<FormatNode>),
    Fixed(FixedFormat),
    Variable(VariableFormat),
    Repetitive {
        count: RepetitiveCount,
        inner: Option<FormatNode>,
    },
    Compound {
        primary: Option<VariableFormat>,
        children: Vec<CompoundChild>,
    },
    Explicit(Option<FormatNode>),
    Bds(BdsFormat),
    BdsRegister {
        register: u8,
        content: Option<FixedFormat>,
    },
    Bits(BitsField),
    BitsValue(u64),
    Uap {
        uap: Uap,
        next_frn: usize,
    },
    UapItem(Option<usize>),
    /// Unknown element outside a format context; contents skipped.
    Ignored,
}

struct Loader {
    file: String,
    stack: Vec<Frame>,
    text: String,
    category: Option<Category>,
}

impl Loader {
    fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            stack: Vec::new(),
            text: String::new(),
            category: None,
        }
    }

    fn xml(&self, position: u64, message: String) -> SpecError {
        SpecError::XmlSyntax {
            file: self.file.clone(),
            position,
            message,
        }
    }

    fn err(&self, message: impl Into<String>) -> SpecError {
        SpecError::Structure {
            file: self.file.clone(),
            message: message.into(),
        }
    }

    fn attr(&self, e: &BytesStart, name: &str, pos: u64) -> Result<Option<String>, SpecError> {
        match e.try_get_attribute(name) {
            Ok(Some(a)) => a
                .unescape_value()
                .map(|v| Some(v.into_owned()))
                .map_err(|err| self.xml(pos, err.to_string())),
            Ok(None) => Ok(None),
            Err(err) => Err(self.xml(pos, err.to_string())),
        }
    }

    fn require_attr(&self, e: &BytesStart, name: &str, pos: u64) -> Result<String, SpecError> {
        self.attr(e, name, pos)?
            .ok_or_else(|| self.err(format!("missing mandatory attribute '{name}'")))
    }

    /// True when the current context only admits format-tree elements, so
    /// an unknown tag is an error rather than an ignorable extension.
    fn in_format_context(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(
                Frame::Format(_)
                    | Frame::Fixed(_)
                    | Frame::Variable(_)
                    | Frame::Repetitive { .. }
                    | Frame::Compound { .. }
                    | Frame::Explicit(_)
                    | Frame::Bds(_)
                    | Frame::BdsRegister { .. }
                    | Frame::Bits(_)
            )
        )
    }

    fn start(&mut self, e: &BytesStart, pos: u64) -> Result<(), SpecError> {
        self.text.clear();

        // Everything under an ignored element is ignored too.
        if matches!(self.stack.last(), Some(Frame::Ignored)) {
            self.stack.push(Frame::Ignored);
            return Ok(());
        }

        match e.name().as_ref() {
            b"Category" => {
                let id: u8 = self
                    .require_attr(e, "id", pos)?
                    .parse()
                    .map_err(|_| self.err("Category id is not a number in 1..=255"))?;
                if id == 0 {
                    return Err(self.err("Category id 0 is reserved"));
                }
                let name = self.attr(e, "name", pos)?.unwrap_or_default();
                let edition = self.attr(e, "ver", pos)?.unwrap_or_default();
                self.stack.push(Frame::Category(Category::new(id, name, edition)));
            }
            b"DataItem" => {
                let id = self.require_attr(e, "id", pos)?;
                let rule = match self.attr(e, "rule", pos)?.as_deref() {
                    None => Rule::Optional,
                    Some(r) if r.eq_ignore_ascii_case("mandatory") => Rule::Mandatory,
                    Some(r) if r.eq_ignore_ascii_case("optional") => Rule::Optional,
                    Some(r) if r.eq_ignore_ascii_case("conditional") => Rule::Conditional,
                    Some(r) => return Err(self.err(format!("unknown item rule '{r}'"))),
                };
                self.stack.push(Frame::DataItem {
                    id,
                    rule,
                    name: String::new(),
                    definition: String::new(),
                    format: None,
                });
            }
            b"DataItemName" | b"DataItemDefinition" => {}
            b"DataItemFormat" => self.stack.push(Frame::Format(None)),
            b"Fixed" => {
                let length: usize = self
                    .require_attr(e, "length", pos)?
                    .parse()
                    .map_err(|_| self.err("Fixed length is not a number"))?;
                self.stack.push(Frame::Fixed(FixedFormat {
                    length,
                    bits: Vec::new(),
                }));
            }
            b"Variable" => self.stack.push(Frame::Variable(VariableFormat { parts: Vec::new() })),
            b"Repetitive" => {
                let count = match self.attr(e, "count", pos)?.as_deref() {
                    Some("1") => RepetitiveCount::Byte1,
                    Some("2") => RepetitiveCount::Byte2,
                    Some(c) => {
                        return Err(self.err(format!("Repetitive count width '{c}' not supported")));
                    }
                    None => {
                        // Legacy files omit the attribute; the documented
                        // default is a 1-octet count.
                        warn!("{}: Repetitive without count attribute, assuming 1", self.file);
                        RepetitiveCount::Byte1
                    }
                };
                self.stack.push(Frame::Repetitive { count, inner: None });
            }
            b"Compound" => self.stack.push(Frame::Compound {
                primary: None,
                children: Vec::new(),
            }),
            b"Explicit" => self.stack.push(Frame::Explicit(None)),
            b"BDS" => {
                let register = self.parse_register(e, pos)?;
                self.stack.push(Frame::Bds(BdsFormat {
                    register,
                    registers: BTreeMap::new(),
                }));
            }
            b"BDSRegister" => {
                let register = self
                    .parse_register(e, pos)?
                    .ok_or_else(|| self.err("BDSRegister without reg attribute"))?;
                self.stack.push(Frame::BdsRegister {
                    register,
                    content: None,
                });
            }
            b"Bits" => {
                let (from_bit, to_bit) = match self.attr(e, "bit", pos)? {
                    Some(bit) => {
                        let b: u16 = bit
                            .parse()
                            .map_err(|_| self.err("Bits bit is not a number"))?;
                        (b, b)
                    }
                    None => {
                        let from: u16 = self
                            .require_attr(e, "from", pos)?
                            .parse()
                            .map_err(|_| self.err("Bits from is not a number"))?;
                        let to: u16 = self
                            .require_attr(e, "to", pos)?
                            .parse()
                            .map_err(|_| self.err("Bits to is not a number"))?;
                        (from, to)
                    }
                };
                let encoding = match self.attr(e, "encode", pos)?.as_deref() {
                    None => BitsEncoding::Unsigned,
                    Some(s) if s.eq_ignore_ascii_case("unsigned") => BitsEncoding::Unsigned,
                    Some(s) if s.eq_ignore_ascii_case("signed") => BitsEncoding::Signed,
                    Some(s) if s.eq_ignore_ascii_case("6bitchar") => BitsEncoding::Icao6Char,
                    Some(s) if s.eq_ignore_ascii_case("ascii") => BitsEncoding::Ascii,
                    Some(s) if s.eq_ignore_ascii_case("hex") => BitsEncoding::Hex,
                    Some(s) if s.eq_ignore_ascii_case("octal") => BitsEncoding::Octal,
                    Some(s) => return Err(self.err(format!("unknown Bits encoding '{s}'"))),
                };
                let fx = self.attr(e, "fx", pos)?.as_deref() == Some("1");
                self.stack.push(Frame::Bits(BitsField {
                    short_name: String::new(),
                    name: String::new(),
                    from_bit,
                    to_bit,
                    encoding,
                    scale: None,
                    offset: None,
                    unit: None,
                    min: None,
                    max: None,
                    values: BTreeMap::new(),
                    const_value: None,
                    fx,
                    spare: false,
                }));
            }
            b"BitsShortName" | b"BitsName" | b"BitsMin" | b"BitsMax" | b"BitsConst" => {}
            b"BitsUnit" => {
                let scale = self.parse_f64_attr(e, "scale", pos)?;
                let offset = self.parse_f64_attr(e, "offset", pos)?;
                let Some(Frame::Bits(bits)) = self.stack.last_mut() else {
                    return Err(self.err("BitsUnit outside Bits"));
                };
                bits.scale = scale;
                bits.offset = offset;
            }
            b"BitsValue" => {
                let val: u64 = self
                    .require_attr(e, "val", pos)?
                    .parse()
                    .map_err(|_| self.err("BitsValue val is not a number"))?;
                self.stack.push(Frame::BitsValue(val));
            }
            b"UAP" => {
                let name = self
                    .attr(e, "name", pos)?
                    .unwrap_or_else(|| "default".to_string());
                let selector_value = match self.attr(e, "value", pos)? {
                    Some(v) => Some(
                        v.parse()
                            .map_err(|_| self.err("UAP value is not a number"))?,
                    ),
                    None => None,
                };
                self.stack.push(Frame::Uap {
                    uap: Uap {
                        name,
                        selector_value,
                        entries: Vec::new(),
                    },
                    next_frn: 1,
                });
            }
            b"UAPSelector" => {
                let item = self.require_attr(e, "item", pos)?;
                let field = self.require_attr(e, "field", pos)?;
                let Some(Frame::Category(cat)) = self.stack.last_mut() else {
                    return Err(self.err("UAPSelector outside Category"));
                };
                if cat.uap_selector.is_some() {
                    return Err(self.err("duplicate UAPSelector"));
                }
                cat.uap_selector = Some(UapSelector { item, field });
            }
            b"UAPItem" => {
                let frn = self.require_attr(e, "frn", pos)?;
                let frn = if frn.eq_ignore_ascii_case("fx") {
                    None
                } else {
                    Some(
                        frn.parse()
                            .map_err(|_| self.err("UAPItem frn is not a number or FX"))?,
                    )
                };
                self.stack.push(Frame::UapItem(frn));
            }
            other => {
                let name = String::from_utf8_lossy(other).into_owned();
                if self.in_format_context() {
                    return Err(self.err(format!("unknown format element '{name}'")));
                }
                self.stack.push(Frame::Ignored);
            }
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8], _pos: u64) -> Result<(), SpecError> {
        // Inside an ignored subtree every Start pushed a frame, so every End
        // pops exactly one.
        if matches!(self.stack.last(), Some(Frame::Ignored)) {
            self.stack.pop();
            self.text.clear();
            return Ok(());
        }

        match name {
            b"Category" => match self.stack.pop() {
                Some(Frame::Category(cat)) => self.category = Some(cat),
                _ => return Err(self.err("mismatched Category end tag")),
            },
            b"DataItem" => {
                let Some(Frame::DataItem {
                    id,
                    rule,
                    name,
                    definition,
                    format,
                }) = self.stack.pop()
                else {
                    return Err(self.err("mismatched DataItem end tag"));
                };
                let format =
                    format.ok_or_else(|| self.err(format!("item {id}: missing DataItemFormat")))?;
                let Some(Frame::Category(cat)) = self.stack.last_mut() else {
                    return Err(self.err("DataItem outside Category"));
                };
                let dup = !cat.push_item(DataItemDescription {
                    id: id.clone(),
                    name,
                    definition,
                    rule,
                    format,
                });
                if dup {
                    return Err(self.err(format!("duplicate item id {id}")));
                }
            }
            b"DataItemName" => {
                let text = self.take_text();
                let Some(Frame::DataItem { name, .. }) = self.stack.last_mut() else {
                    return Err(self.err("DataItemName outside DataItem"));
                };
                *name = text;
            }
            b"DataItemDefinition" => {
                let text = self.take_text();
                let Some(Frame::DataItem { definition, .. }) = self.stack.last_mut() else {
                    return Err(self.err("DataItemDefinition outside DataItem"));
                };
                *definition = text;
            }
            b"DataItemFormat" => {
                let Some(Frame::Format(node)) = self.stack.pop() else {
                    return Err(self.err("mismatched DataItemFormat end tag"));
                };
                let node = node.ok_or_else(|| self.err("empty DataItemFormat"))?;
                let Some(Frame::DataItem { format, .. }) = self.stack.last_mut() else {
                    return Err(self.err("DataItemFormat outside DataItem"));
                };
                if format.is_some() {
                    return Err(self.err("multiple DataItemFormat roots"));
                }
                *format = Some(node);
            }
            b"Fixed" => {
                let Some(Frame::Fixed(fixed)) = self.stack.pop() else {
                    return Err(self.err("mismatched Fixed end tag"));
                };
                self.attach_format(FormatNode::Fixed(fixed))?;
            }
            b"Variable" => {
                let Some(Frame::Variable(var)) = self.stack.pop() else {
                    return Err(self.err("mismatched Variable end tag"));
                };
                self.attach_format(FormatNode::Variable(var))?;
            }
            b"Repetitive" => {
                let Some(Frame::Repetitive { count, inner }) = self.stack.pop() else {
                    return Err(self.err("mismatched Repetitive end tag"));
                };
                let inner = inner.ok_or_else(|| self.err("Repetitive without inner format"))?;
                self.attach_format(FormatNode::Repetitive {
                    count,
                    inner: Box::new(inner),
                })?;
            }
            b"Compound" => {
                let Some(Frame::Compound { primary, children }) = self.stack.pop() else {
                    return Err(self.err("mismatched Compound end tag"));
                };
                let primary =
                    primary.ok_or_else(|| self.err("Compound without primary subfield"))?;
                let children = name_compound_children(&primary, children);
                self.attach_format(FormatNode::Compound { primary, children })?;
            }
            b"Explicit" => {
                let Some(Frame::Explicit(inner)) = self.stack.pop() else {
                    return Err(self.err("mismatched Explicit end tag"));
                };
                let inner = inner.ok_or_else(|| self.err("Explicit without inner format"))?;
                self.attach_format(FormatNode::Explicit(Box::new(inner)))?;
            }
            b"BDS" => {
                let Some(Frame::Bds(bds)) = self.stack.pop() else {
                    return Err(self.err("mismatched BDS end tag"));
                };
                self.attach_format(FormatNode::Bds(bds))?;
            }
            b"BDSRegister" => {
                let Some(Frame::BdsRegister { register, content }) = self.stack.pop() else {
                    return Err(self.err("mismatched BDSRegister end tag"));
                };
                let content = content
                    .ok_or_else(|| self.err(format!("BDS register {register:#04x} is empty")))?;
                let Some(Frame::Bds(bds)) = self.stack.last_mut() else {
                    return Err(self.err("BDSRegister outside BDS"));
                };
                if bds.registers.insert(register, content).is_some() {
                    return Err(self.err(format!("duplicate BDS register {register:#04x}")));
                }
            }
            b"Bits" => {
                let Some(Frame::Bits(bits)) = self.stack.pop() else {
                    return Err(self.err("mismatched Bits end tag"));
                };
                match self.stack.last_mut() {
                    Some(Frame::Fixed(fixed)) => fixed.bits.push(bits),
                    _ => return Err(self.err("Bits outside Fixed")),
                }
            }
            b"BitsShortName" => {
                let text = self.take_text();
                let Some(Frame::Bits(bits)) = self.stack.last_mut() else {
                    return Err(self.err("BitsShortName outside Bits"));
                };
                bits.spare = text.eq_ignore_ascii_case("spare");
                bits.short_name = text;
            }
            b"BitsName" => {
                let text = self.take_text();
                let Some(Frame::Bits(bits)) = self.stack.last_mut() else {
                    return Err(self.err("BitsName outside Bits"));
                };
                bits.name = text;
            }
            b"BitsUnit" => {
                let text = self.take_text();
                let Some(Frame::Bits(bits)) = self.stack.last_mut() else {
                    return Err(self.err("BitsUnit outside Bits"));
                };
                if !text.is_empty() {
                    bits.unit = Some(text);
                }
            }
            b"BitsMin" => {
                let value = self.take_f64_text("BitsMin")?;
                let Some(Frame::Bits(bits)) = self.stack.last_mut() else {
                    return Err(self.err("BitsMin outside Bits"));
                };
                bits.min = Some(value);
            }
            b"BitsMax" => {
                let value = self.take_f64_text("BitsMax")?;
                let Some(Frame::Bits(bits)) = self.stack.last_mut() else {
                    return Err(self.err("BitsMax outside Bits"));
                };
                bits.max = Some(value);
            }
            b"BitsConst" => {
                let text = self.take_text();
                let value: u64 = text
                    .parse()
                    .map_err(|_| self.err("BitsConst is not a number"))?;
                let Some(Frame::Bits(bits)) = self.stack.last_mut() else {
                    return Err(self.err("BitsConst outside Bits"));
                };
                bits.const_value = Some(value);
            }
            b"BitsValue" => {
                let Some(Frame::BitsValue(val)) = self.stack.pop() else {
                    return Err(self.err("mismatched BitsValue end tag"));
                };
                let desc = self.take_text();
                let Some(Frame::Bits(bits)) = self.stack.last_mut() else {
                    return Err(self.err("BitsValue outside Bits"));
                };
                if bits.values.insert(val, desc).is_some() {
                    return Err(self.err(format!("duplicate BitsValue val {val}")));
                }
            }
            b"UAP" => {
                let Some(Frame::Uap { uap, .. }) = self.stack.pop() else {
                    return Err(self.err("mismatched UAP end tag"));
                };
                let Some(Frame::Category(cat)) = self.stack.last_mut() else {
                    return Err(self.err("UAP outside Category"));
                };
                cat.uaps.push(uap);
            }
            b"UAPItem" => {
                let Some(Frame::UapItem(frn)) = self.stack.pop() else {
                    return Err(self.err("mismatched UAPItem end tag"));
                };
                let text = self.take_text();
                let Some(Frame::Uap { uap, next_frn }) = self.stack.last_mut() else {
                    return Err(self.err("UAPItem outside UAP"));
                };
                match frn {
                    // FX slots mark the chain structure; they carry no FRN.
                    None => {}
                    Some(frn) => {
                        if frn != *next_frn {
                            let message = format!(
                                "UAP '{}': FRN {frn} out of order (expected {next_frn})",
                                uap.name
                            );
                            return Err(SpecError::Structure {
                                file: self.file.clone(),
                                message,
                            });
                        }
                        *next_frn += 1;
                        let entry = if text.is_empty() || text == "-" {
                            UapEntry::Spare
                        } else {
                            UapEntry::Item(text)
                        };
                        uap.entries.push(entry);
                    }
                }
            }
            b"UAPSelector" => {}
            _ => {
                // End of an ignored or text-bearing element already handled.
            }
        }
        Ok(())
    }

    fn attach_format(&mut self, node: FormatNode) -> Result<(), SpecError> {
        match self.stack.last_mut() {
            Some(Frame::Format(slot)) => {
                if slot.is_some() {
                    return Err(self.err("multiple format roots in DataItemFormat"));
                }
                *slot = Some(node);
            }
            Some(Frame::Variable(var)) => match node {
                FormatNode::Fixed(fixed) => var.parts.push(fixed),
                _ => return Err(self.err("Variable parts must be Fixed")),
            },
            Some(Frame::Repetitive { inner, .. }) => {
                if inner.is_some() {
                    return Err(self.err("Repetitive with more than one inner format"));
                }
                *inner = Some(node);
            }
            Some(Frame::Compound { primary, children }) => {
                if primary.is_none() {
                    match node {
                        FormatNode::Variable(var) => *primary = Some(var),
                        _ => return Err(self.err("Compound primary must be Variable")),
                    }
                } else {
                    children.push(CompoundChild {
                        name: String::new(),
                        format: node,
                    });
                }
            }
            Some(Frame::Explicit(inner)) => {
                if inner.is_some() {
                    return Err(self.err("Explicit with more than one inner format"));
                }
                *inner = Some(node);
            }
            Some(Frame::BdsRegister { content, register }) => {
                let FormatNode::Fixed(fixed) = node else {
                    return Err(self.err("BDS register content must be Fixed"));
                };
                if content.is_some() {
                    let message = format!("BDS register {register:#04x} defined twice");
                    return Err(SpecError::Structure {
                        file: self.file.clone(),
                        message,
                    });
                }
                *content = Some(fixed);
            }
            _ => return Err(self.err("format node in unexpected position")),
        }
        Ok(())
    }

    fn parse_register(&self, e: &BytesStart, pos: u64) -> Result<Option<u8>, SpecError> {
        let Some(raw) = self.attr(e, "reg", pos)? else {
            return Ok(None);
        };
        let parsed = match raw.strip_prefix("0x") {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => raw.parse(),
        };
        parsed
            .map(Some)
            .map_err(|_| self.err(format!("bad BDS register '{raw}'")))
    }

    fn parse_f64_attr(
        &self,
        e: &BytesStart,
        name: &str,
        pos: u64,
    ) -> Result<Option<f64>, SpecError> {
        match self.attr(e, name, pos)? {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| self.err(format!("attribute '{name}' is not a number"))),
        }
    }

    fn take_text(&mut self) -> String {
        let text = self.text.trim().to_string();
        self.text.clear();
        text
    }

    fn take_f64_text(&mut self, element: &str) -> Result<f64, SpecError> {
        let text = self.take_text();
        text.parse()
            .map_err(|_| self.err(format!("{element} is not a number")))
    }

    fn finish(self) -> Result<Category, SpecError> {
        if !self.stack.is_empty() {
            return Err(SpecError::Structure {
                file: self.file,
                message: "unterminated element".into(),
            });
        }
        self.category.ok_or(SpecError::Structure {
            file: self.file,
            message: "no Category element".into(),
        })
    }
}

/// Names Compound children from the primary bitmap: child `k` (1-origin,
/// MSB-first, FX positions excluded) takes the short name of the primary
/// field covering its bit position, falling back to `SFk`.
fn name_compound_children(
    primary: &VariableFormat,
    children: Vec<CompoundChild>,
) -> Vec<CompoundChild> {
    children
        .into_iter()
        .enumerate()
        .map(|(i, mut child)| {
            let k = i + 1;
            let part = (k - 1) / 7;
            let pos_in_part = ((k - 1) % 7) as u16 + 1;
            let bit = 9 - pos_in_part;
            let named = primary
                .parts
                .get(part)
                .and_then(|p| p.field_at(bit))
                .filter(|f| !f.fx && !f.spare && !f.short_name.is_empty())
                .map(|f| f.short_name.clone());
            child.name = named.unwrap_or_else(|| format!("SF{k}"));
            child
        })
        .collect()
}
