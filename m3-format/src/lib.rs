//! M3 format - schema-driven reader and writer for `.m3` / `.m3a` containers
//!
//! An M3 file is a flat list of typed sections. Section 0 is the header,
//! which references the model record; every other section is reached
//! through reference fields. The binary layout of each section is described
//! by an XML schema rather than hard-coded types.
//!
//! [`Registry::bundled`] is a reference subset of the M3 structures, enough
//! for files built with it. Models exported by other tools need a complete
//! schema loaded with [`Registry::from_path`].
//!
//! # Architecture
//!
//! - [`Registry`] - structure histories loaded from the schema, resolved
//!   into [`StructureDescription`]s per revision and [`Dialect`]
//! - [`Field`] - fixed-size codecs the descriptions are made of
//! - [`Record`] / [`Value`] - decoded data
//! - [`SectionList`] - the container: load, save, reference resolution and
//!   section factoring
//!
//! ```no_run
//! use std::sync::Arc;
//! use m3_format::{LoadOptions, Registry, SectionList};
//!
//! # fn main() -> m3_format::Result<()> {
//! let registry = Arc::new(Registry::bundled()?);
//! let mut list = SectionList::load(registry, "model.m3", LoadOptions::default())?;
//! let name = list.model()?.reference("modelName")?;
//! println!("{}", list.string(&name)?);
//! list.save("copy.m3")?;
//! # Ok(())
//! # }
//! ```

pub mod container;
pub mod error;
pub mod field;
pub mod schema;
pub mod structure;

pub use container::{
    FactorOptions, IndexEntry, LoadOptions, ReferenceSite, Section, SectionId, SectionList,
};
pub use error::{ContainerError, DecodeError, M3Error, Result, SchemaError, ValidationError};
pub use field::{BitMask, Field, FieldKind};
pub use schema::{Dialect, Registry, StructureHistory};
pub use structure::{Record, Reference, StructureDescription, Value};
