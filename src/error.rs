//! Crate-wide error type.
//!
//! Everything here is fatal to the call that produced it: a failed
//! generation never hands back a partially built schema tree.
use std::path::PathBuf;

use thiserror::Error;

use crate::annotate::AnnotateError;
use crate::tags::TagError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// A field's constraint string does not follow the grammar.
    #[error("invalid constraint tag on `{type_name}.{field}`: {source}")]
    Tag {
        type_name: String,
        field: String,
        #[source]
        source: TagError,
    },

    /// A constraint parameter could not be turned into a schema keyword.
    #[error("cannot apply `{operator}` to `{type_name}.{field}`: {source}")]
    Annotate {
        type_name: String,
        field: String,
        operator: String,
        #[source]
        source: AnnotateError,
    },

    /// Self-referential type graph met in strict mode.
    #[error("cycle detected: {path}")]
    Cycle { type_name: String, path: String },

    /// Function and channel types have no schema form.
    #[error("type `{type_name}` has no schema representation")]
    Excluded { type_name: String },

    #[error("invalid generator options at {path}: {message}")]
    Config { path: String, message: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
