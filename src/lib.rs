//! Schema generation from statically described Rust types.
//!
//! Types describe themselves through [`Introspect`]; [`TypeInfoCache`]
//! resolves and memoizes their visible fields; [`tags`] parses the
//! validate-style constraint strings attached to those fields;
//! [`AnnotatorRegistry`] maps each constraint operator onto schema keywords;
//! and [`SchemaRefGenerator`] puts it together into a [`Schema`] tree plus a
//! [`ReferenceTable`] of promoted components.
pub mod annotate;
pub mod error;
pub mod generator;
pub mod introspect;
pub mod options;
pub mod path_de;
pub mod samples;
pub mod schema;
pub mod tags;
pub mod type_info;

pub use annotate::{Annotator, AnnotatorRegistry, DEFAULT_REGISTRY};
pub use error::{Error, Result};
pub use generator::{generate_schema, Diagnostic, Generated, SchemaRefGenerator};
pub use introspect::{Codec, Introspect, Shape, StructShape, TypeRef};
pub use options::{CycleMode, GeneratorOptions};
pub use schema::{Keywords, Kind, ReferenceTable, Schema, SchemaRef};
pub use tags::{FieldTag, TagError, TagType};
pub use type_info::{Field, TypeInfo, TypeInfoCache};
