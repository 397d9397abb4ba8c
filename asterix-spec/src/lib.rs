//! # asterix-spec
//!
//! The ASTERIX category specification model and its XML loader.
//!
//! A [`Definition`] maps category numbers to [`Category`] values: the
//! polymorphic tree of format nodes that tells the decoder how bytes map to
//! fields. Definitions are built once with [`load_definitions`], validated
//! structurally during the load, and immutable afterwards; concurrent
//! decodes share them by reference.
//!
//! ## Loading
//!
//! ```no_run
//! use asterix_spec::load_definitions;
//!
//! let definition = load_definitions(&["specs/cat048.xml", "specs/cat062.xml"])?;
//! let cat048 = definition.category(48).unwrap();
//! assert!(cat048.item("010").is_some());
//! # Ok::<(), asterix_spec::SpecError>(())
//! ```
//!
//! The loader is event-driven (`quick-xml` `Reader`) with an explicit stack
//! of in-construction nodes, so category files stream through without an
//! intermediate DOM. Structural violations — inverted bit ranges, UAP gaps,
//! duplicate item ids, unknown format tags — fail the whole load: either
//! the complete catalog loads or nothing does.

pub mod describe;
pub mod loader;
pub mod model;
pub mod validate;

pub use describe::{DescribeError, describe};
pub use loader::{SpecError, load_definitions, parse_category};
pub use model::{
    BdsFormat, BitsEncoding, BitsField, Category, CompoundChild, DataItemDescription, Definition,
    FixedFormat, FormatNode, RepetitiveCount, Rule, Uap, UapEntry, UapSelector, VariableFormat,
};
