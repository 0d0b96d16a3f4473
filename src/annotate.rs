//! Constraint operator → schema keyword.
//!
//! Operator names follow go-playground/validator's baked-in set. Each entry is
//! either a node annotator (mutates the field's own schema), a parent annotator
//! (mutates the enclosing object; only `required`), a no-op, or explicitly
//! unsupported, in which case the schema is left unconstrained and a
//! diagnostic is raised by the generator.
use std::collections::HashMap;
use std::num::{ParseFloatError, ParseIntError};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::schema::{Keywords, Kind};
use crate::tags::FieldTag;
use crate::type_info::Field;

pub type SchemaAnnotatorFn = fn(&FieldTag, &mut Keywords) -> Result<(), AnnotateError>;
pub type ParentSchemaAnnotatorFn = fn(&Field, &mut Keywords);

#[derive(Debug, Clone, Copy)]
pub enum Annotator {
    Schema(SchemaAnnotatorFn),
    Parent(ParentSchemaAnnotatorFn),
    Noop,
    Unsupported,
}

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("missing parameter")]
    MissingParam,
    #[error("failed to parse `{param}` as an integer: {source}")]
    Integer {
        param: String,
        #[source]
        source: ParseIntError,
    },
    #[error("failed to parse `{param}` as a number: {source}")]
    Number {
        param: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("length bound `{param}` must not be negative")]
    NegativeLength { param: String },
}

pub static DEFAULT_REGISTRY: Lazy<AnnotatorRegistry> = Lazy::new(AnnotatorRegistry::new);

/// Read-only after construction; extend by registering before use.
#[derive(Debug, Clone)]
pub struct AnnotatorRegistry {
    annotators: HashMap<String, Annotator>,
}

impl Default for AnnotatorRegistry {
    fn default() -> Self { Self::new() }
}

impl AnnotatorRegistry {
    pub fn empty() -> Self {
        AnnotatorRegistry { annotators: HashMap::new() }
    }

    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("required", Annotator::Parent(required));

        let schema: [(&str, SchemaAnnotatorFn); 28] = [
            ("min", gte),
            ("gte", gte),
            ("gt", gt),
            ("max", lte),
            ("lte", lte),
            ("lt", lt),
            ("len", len),
            ("eq", eq),
            ("oneof", oneof),
            ("unique", unique),
            ("email", format_email),
            ("url", format_uri),
            ("uri", format_uri),
            ("http_url", format_uri),
            ("uuid", format_uuid),
            ("uuid3", format_uuid),
            ("uuid4", format_uuid),
            ("uuid5", format_uuid),
            ("uuid_rfc4122", format_uuid),
            ("uuid3_rfc4122", format_uuid),
            ("uuid4_rfc4122", format_uuid),
            ("uuid5_rfc4122", format_uuid),
            ("ipv4", format_ipv4),
            ("ipv6", format_ipv6),
            ("hostname", format_hostname),
            ("hostname_rfc1123", format_hostname),
            ("fqdn", format_hostname),
            ("base64", format_byte),
        ];
        for (operator, f) in schema {
            registry.register(operator, Annotator::Schema(f));
        }

        for operator in ["omitempty", "isdefault", "boolean", "structonly", "nostructlevel"] {
            registry.register(operator, Annotator::Noop);
        }

        for operator in UNSUPPORTED {
            registry.register(*operator, Annotator::Unsupported);
        }
        registry
    }

    pub fn register(&mut self, operator: impl Into<String>, annotator: Annotator) -> &mut Self {
        self.annotators.insert(operator.into(), annotator);
        self
    }

    pub fn get(&self, operator: &str) -> Option<Annotator> {
        self.annotators.get(operator).copied()
    }

    pub fn contains(&self, operator: &str) -> bool { self.annotators.contains_key(operator) }
    pub fn len(&self) -> usize { self.annotators.len() }
    pub fn is_empty(&self) -> bool { self.annotators.is_empty() }
}

/// Listed operators with no schema-level counterpart.
const UNSUPPORTED: &[&str] = &[
    "ne", "eq_ignore_case", "ne_ignore_case",
    "alpha", "alphanum", "alphaunicode", "alphanumunicode", "numeric", "number",
    "hexadecimal", "hexcolor", "rgb", "rgba", "hsl", "hsla", "e164",
    "urn_rfc2141", "file", "filepath", "base64url", "base64rawurl",
    "contains", "containsany", "containsrune", "excludes", "excludesall", "excludesrune",
    "startswith", "endswith", "startsnotwith", "endsnotwith",
    "isbn", "isbn10", "isbn13", "ulid",
    "md4", "md5", "sha256", "sha384", "sha512", "ripemd128", "ripemd160",
    "tiger128", "tiger160", "tiger192",
    "ascii", "printascii", "multibyte", "datauri", "latitude", "longitude", "ssn",
    "ip", "cidrv4", "cidrv6", "cidr",
    "tcp4_addr", "tcp6_addr", "tcp_addr", "udp4_addr", "udp6_addr", "udp_addr",
    "ip4_addr", "ip6_addr", "ip_addr", "unix_addr", "mac",
    "html", "html_encoded", "url_encoded", "dir", "dirpath", "json", "jwt",
    "hostname_port", "lowercase", "uppercase", "datetime", "timezone",
    "iso3166_1_alpha2", "iso3166_1_alpha3", "iso3166_1_alpha_numeric", "iso3166_2",
    "iso4217", "iso4217_numeric", "bcp47_language_tag",
    "postcode_iso3166_alpha2", "postcode_iso3166_alpha2_field",
    "bic", "semver", "dns_rfc1035_label", "credit_card", "cve", "luhn_checksum",
    "mongodb", "cron",
];

// ————————————————————————————————————————————————————————————————————————————
// PARENT
// ————————————————————————————————————————————————————————————————————————————

fn required(field: &Field, parent: &mut Keywords) {
    if !parent.required.iter().any(|name| *name == field.name) {
        parent.required.push(field.name.clone());
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BOUNDS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side { Lower, Upper }

fn integer_param(tag: &FieldTag) -> Result<i64, AnnotateError> {
    if !tag.has_param {
        return Err(AnnotateError::MissingParam);
    }
    tag.param.trim().parse::<i64>().map_err(|source| AnnotateError::Integer {
        param: tag.param.clone(),
        source,
    })
}

fn length_param(tag: &FieldTag) -> Result<u64, AnnotateError> {
    let n = integer_param(tag)?;
    u64::try_from(n).map_err(|_| AnnotateError::NegativeLength { param: tag.param.clone() })
}

/// Strings, arrays and maps bound their size; everything else its value.
fn bound(tag: &FieldTag, k: &mut Keywords, side: Side, exclusive: bool) -> Result<(), AnnotateError> {
    let slot = match (k.kind, side) {
        (Some(Kind::String), Side::Lower) => &mut k.min_length,
        (Some(Kind::String), Side::Upper) => &mut k.max_length,
        (Some(Kind::Array), Side::Lower) => &mut k.min_items,
        (Some(Kind::Array), Side::Upper) => &mut k.max_items,
        (Some(Kind::Object), Side::Lower) => &mut k.min_properties,
        (Some(Kind::Object), Side::Upper) => &mut k.max_properties,
        _ => {
            let n = integer_param(tag)? as f64;
            match side {
                Side::Lower => {
                    k.minimum = Some(n);
                    k.exclusive_minimum = exclusive;
                }
                Side::Upper => {
                    k.maximum = Some(n);
                    k.exclusive_maximum = exclusive;
                }
            }
            return Ok(());
        }
    };
    let n = length_param(tag)?;
    *slot = Some(match (side, exclusive) {
        (Side::Lower, true) => n.saturating_add(1),
        (Side::Upper, true) => n.saturating_sub(1),
        _ => n,
    });
    Ok(())
}

fn gte(tag: &FieldTag, k: &mut Keywords) -> Result<(), AnnotateError> { bound(tag, k, Side::Lower, false) }
fn gt(tag: &FieldTag, k: &mut Keywords) -> Result<(), AnnotateError> { bound(tag, k, Side::Lower, true) }
fn lte(tag: &FieldTag, k: &mut Keywords) -> Result<(), AnnotateError> { bound(tag, k, Side::Upper, false) }
fn lt(tag: &FieldTag, k: &mut Keywords) -> Result<(), AnnotateError> { bound(tag, k, Side::Upper, true) }

fn len(tag: &FieldTag, k: &mut Keywords) -> Result<(), AnnotateError> {
    bound(tag, k, Side::Lower, false)?;
    bound(tag, k, Side::Upper, false)
}

// ————————————————————————————————————————————————————————————————————————————
// VALUES
// ————————————————————————————————————————————————————————————————————————————

/// `'quoted words'` or bare words, as go-playground splits `oneof`.
static ONEOF_VALUES: Lazy<Regex> = Lazy::new(|| Regex::new(r"'[^']*'|\S+").expect("valid oneof regex"));

fn literal(k: &Keywords, raw: &str, tag: &FieldTag) -> Result<Value, AnnotateError> {
    match k.kind {
        Some(Kind::Integer) => {
            let n = raw.trim().parse::<i64>().map_err(|source| AnnotateError::Integer {
                param: tag.param.clone(),
                source,
            })?;
            Ok(Value::from(n))
        }
        Some(Kind::Number) => {
            let n = raw.trim().parse::<f64>().map_err(|source| AnnotateError::Number {
                param: tag.param.clone(),
                source,
            })?;
            Ok(Value::from(n))
        }
        _ => Ok(Value::from(raw.to_owned())),
    }
}

fn eq(tag: &FieldTag, k: &mut Keywords) -> Result<(), AnnotateError> {
    match k.kind {
        Some(Kind::Array) | Some(Kind::Object) => len(tag, k),
        _ => {
            if !tag.has_param {
                return Err(AnnotateError::MissingParam);
            }
            k.enum_values = vec![literal(k, &tag.param, tag)?];
            Ok(())
        }
    }
}

fn oneof(tag: &FieldTag, k: &mut Keywords) -> Result<(), AnnotateError> {
    if !tag.has_param {
        return Err(AnnotateError::MissingParam);
    }
    let values = ONEOF_VALUES.find_iter(&tag.param)
        .map(|m| literal(k, m.as_str().trim_matches('\''), tag))
        .collect::<Result<Vec<_>, _>>()?;
    k.enum_values = values;
    Ok(())
}

fn unique(_: &FieldTag, k: &mut Keywords) -> Result<(), AnnotateError> {
    if k.kind == Some(Kind::Array) {
        k.unique_items = true;
    }
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————
// FORMATS
// ————————————————————————————————————————————————————————————————————————————

macro_rules! format_annotators {
    ($($name:ident => $format:literal),* $(,)?) => {
        $(
            fn $name(_: &FieldTag, k: &mut Keywords) -> Result<(), AnnotateError> {
                k.format = Some($format.to_owned());
                Ok(())
            }
        )*
    };
}

format_annotators! {
    format_email => "email",
    format_uri => "uri",
    format_uuid => "uuid",
    format_ipv4 => "ipv4",
    format_ipv6 => "ipv6",
    format_hostname => "hostname",
    format_byte => "byte",
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    fn apply(tag: &str, kind: Kind) -> Result<Keywords, AnnotateError> {
        let tag = tags::parse(tag).unwrap();
        let mut k = Keywords { kind: Some(kind), ..Keywords::default() };
        match DEFAULT_REGISTRY.get(&tag.operator) {
            Some(Annotator::Schema(f)) => f(&tag, &mut k)?,
            other => panic!("not a node annotator: {other:?}"),
        }
        Ok(k)
    }

    #[test]
    fn inclusive_and_exclusive_numeric_bounds() {
        let k = apply("gte=18", Kind::Integer).unwrap();
        assert_eq!(k.minimum, Some(18.0));
        assert!(!k.exclusive_minimum);

        let k = apply("gt=18", Kind::Integer).unwrap();
        assert_eq!(k.minimum, Some(18.0));
        assert!(k.exclusive_minimum);

        let k = apply("max=10", Kind::Number).unwrap();
        assert_eq!(k.maximum, Some(10.0));
        assert!(!k.exclusive_maximum);

        let k = apply("lt=-3", Kind::Integer).unwrap();
        assert_eq!(k.maximum, Some(-3.0));
        assert!(k.exclusive_maximum);
    }

    #[test]
    fn min_is_gte_and_max_is_lte() {
        assert_eq!(apply("min=2", Kind::Integer).unwrap(), apply("gte=2", Kind::Integer).unwrap());
        assert_eq!(apply("max=2", Kind::Integer).unwrap(), apply("lte=2", Kind::Integer).unwrap());
    }

    #[test]
    fn sized_kinds_bound_their_size() {
        let k = apply("min=3", Kind::String).unwrap();
        assert_eq!(k.min_length, Some(3));
        assert_eq!(k.minimum, None);

        let k = apply("gt=3", Kind::Array).unwrap();
        assert_eq!(k.min_items, Some(4));

        let k = apply("lt=3", Kind::Object).unwrap();
        assert_eq!(k.max_properties, Some(2));

        let k = apply("len=36", Kind::String).unwrap();
        assert_eq!((k.min_length, k.max_length), (Some(36), Some(36)));
    }

    #[test]
    fn bad_parameters_fail() {
        assert!(matches!(apply("gte=abc", Kind::Integer), Err(AnnotateError::Integer { .. })));
        assert!(matches!(apply("gte", Kind::Integer), Err(AnnotateError::MissingParam)));
        assert!(matches!(apply("min=-1", Kind::String), Err(AnnotateError::NegativeLength { .. })));
    }

    #[test]
    fn oneof_builds_an_enum() {
        let k = apply("oneof=red 'dark blue' green", Kind::String).unwrap();
        assert_eq!(k.enum_values, vec![Value::from("red"), Value::from("dark blue"), Value::from("green")]);

        let k = apply("oneof=1 2 3", Kind::Integer).unwrap();
        assert_eq!(k.enum_values, vec![Value::from(1), Value::from(2), Value::from(3)]);

        assert!(apply("oneof=1 two", Kind::Integer).is_err());
    }

    #[test]
    fn eq_pins_a_value_or_a_size() {
        assert_eq!(apply("eq=admin", Kind::String).unwrap().enum_values, vec![Value::from("admin")]);
        let k = apply("eq=2", Kind::Array).unwrap();
        assert_eq!((k.min_items, k.max_items), (Some(2), Some(2)));
    }

    #[test]
    fn formats() {
        assert_eq!(apply("email", Kind::String).unwrap().format.as_deref(), Some("email"));
        assert_eq!(apply("uuid4", Kind::String).unwrap().format.as_deref(), Some("uuid"));
        assert_eq!(apply("url", Kind::String).unwrap().format.as_deref(), Some("uri"));
    }

    #[test]
    fn unique_only_marks_arrays() {
        assert!(apply("unique", Kind::Array).unwrap().unique_items);
        assert!(!apply("unique", Kind::Object).unwrap().unique_items);
    }

    #[test]
    fn registry_classifies_operators() {
        let r = AnnotatorRegistry::new();
        assert!(matches!(r.get("required"), Some(Annotator::Parent(_))));
        assert!(matches!(r.get("alpha"), Some(Annotator::Unsupported)));
        assert!(matches!(r.get("omitempty"), Some(Annotator::Noop)));
        assert!(r.get("no_such_operator").is_none());
        assert!(AnnotatorRegistry::empty().is_empty());
    }

    #[test]
    fn registry_can_be_extended() {
        fn even(_: &FieldTag, k: &mut Keywords) -> Result<(), AnnotateError> {
            k.format = Some("even".into());
            Ok(())
        }
        let mut r = AnnotatorRegistry::new();
        let before = r.len();
        r.register("even", Annotator::Schema(even)).register("alpha", Annotator::Noop);
        assert_eq!(r.len(), before + 1);
        assert!(matches!(r.get("alpha"), Some(Annotator::Noop)));
    }
}
