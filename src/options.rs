//! Generator options.
//!
//! ```json
//! { "cycles": "strict", "refPrefix": "#/definitions/", "promoteShared": false }
//! ```
//!
//! Every key is optional; unknown keys are rejected.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path_de;

pub const DEFAULT_REF_PREFIX: &str = "#/components/schemas/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleMode {
    /// Break cycles with a component reference.
    #[default]
    Tolerant,
    /// Fail with [`Error::Cycle`].
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct GeneratorOptions {
    pub cycles: CycleMode,
    /// Prepended to a component name to form a `$ref`.
    pub ref_prefix: String,
    /// Promote named types that are used more than once in one pass.
    pub promote_shared: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            cycles: CycleMode::Tolerant,
            ref_prefix: DEFAULT_REF_PREFIX.to_owned(),
            promote_shared: true,
        }
    }
}

impl GeneratorOptions {
    pub fn strict() -> Self {
        GeneratorOptions { cycles: CycleMode::Strict, ..Self::default() }
    }

    pub fn from_json_str(src: &str) -> Result<Self> {
        path_de::from_str_with_path(src)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        path_de::from_slice_with_path(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_the_default() {
        assert_eq!(GeneratorOptions::from_json_str("{}").unwrap(), GeneratorOptions::default());
    }

    #[test]
    fn keys_are_camel_case() {
        let opts = GeneratorOptions::from_json_str(
            r##"{ "cycles": "strict", "refPrefix": "#/definitions/", "promoteShared": false }"##,
        )
        .unwrap();
        assert_eq!(opts.cycles, CycleMode::Strict);
        assert_eq!(opts.ref_prefix, "#/definitions/");
        assert!(!opts.promote_shared);
    }

    #[test]
    fn errors_carry_the_json_path() {
        match GeneratorOptions::from_json_str(r#"{ "cycles": "sometimes" }"#) {
            Err(Error::Config { path, .. }) => assert_eq!(path, "cycles"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            GeneratorOptions::from_json_str(r#"{ "refprefix": "x" }"#),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = GeneratorOptions::from_path(Path::new("/nonexistent/options.json")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
