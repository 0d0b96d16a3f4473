//! Serialization-namespace tags (`json`, `bson`).
//!
//! Layout is `name,opt,opt`. An empty or `-` tag yields no info; an empty
//! name leaves the declared name alone.
use crate::introspect::Codec;

const EXCLUDED: &str = "-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonInfo {
    pub marshaler: bool,
    pub unmarshaler: bool,
    pub omit_empty: bool,
    /// `,string`: scalar carried as a JSON string.
    pub string: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BsonInfo {
    pub marshaler: bool,
    pub unmarshaler: bool,
    pub omit_empty: bool,
    pub inline: bool,
}

impl JsonInfo {
    pub(crate) fn resolve(tag: &str, codec: Codec) -> Option<(Option<String>, Self)> {
        let (name, options) = split(tag)?;
        let mut info = JsonInfo {
            marshaler: codec.json_marshaler,
            unmarshaler: codec.json_unmarshaler,
            ..JsonInfo::default()
        };
        for option in options {
            match option {
                "omitempty" => info.omit_empty = true,
                "string" => info.string = true,
                _ => {}
            }
        }
        Some((name, info))
    }
}

impl BsonInfo {
    pub(crate) fn resolve(tag: &str, codec: Codec) -> Option<(Option<String>, Self)> {
        let (name, options) = split(tag)?;
        let mut info = BsonInfo {
            marshaler: codec.bson_marshaler,
            unmarshaler: codec.bson_unmarshaler,
            ..BsonInfo::default()
        };
        for option in options {
            match option {
                "omitempty" => info.omit_empty = true,
                "inline" => info.inline = true,
                _ => {}
            }
        }
        Some((name, info))
    }
}

fn split(tag: &str) -> Option<(Option<String>, std::str::Split<'_, char>)> {
    if tag.is_empty() || tag == EXCLUDED {
        return None;
    }
    let mut parts = tag.split(',');
    let name = parts.next().filter(|n| !n.is_empty()).map(str::to_owned);
    Some((name, parts))
}

/// True when the field carries namespace tags and all of them are `-`.
pub(crate) fn is_excluded(tags: &[Option<&str>]) -> bool {
    let mut present = tags.iter().flatten().filter(|t| !t.is_empty()).peekable();
    present.peek().is_some() && present.all(|t| *t == EXCLUDED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_name_and_options() {
        let (name, info) = JsonInfo::resolve("age,omitempty,string", Codec::NONE).unwrap();
        assert_eq!(name.as_deref(), Some("age"));
        assert!(info.omit_empty && info.string);
        assert!(!info.marshaler);
    }

    #[test]
    fn options_without_name() {
        let (name, info) = BsonInfo::resolve(",inline", Codec::NONE).unwrap();
        assert_eq!(name, None);
        assert!(info.inline);
    }

    #[test]
    fn excluded_and_empty_tags_yield_nothing() {
        assert!(JsonInfo::resolve("-", Codec::NONE).is_none());
        assert!(BsonInfo::resolve("", Codec::NONE).is_none());
    }

    #[test]
    fn codec_flags_are_copied() {
        let codec = Codec { json_marshaler: true, bson_unmarshaler: true, ..Codec::NONE };
        let (_, json) = JsonInfo::resolve("x", codec).unwrap();
        let (_, bson) = BsonInfo::resolve("x", codec).unwrap();
        assert!(json.marshaler && !json.unmarshaler);
        assert!(bson.unmarshaler && !bson.marshaler);
    }

    #[test]
    fn exclusion_needs_every_present_tag() {
        assert!(is_excluded(&[Some("-"), None]));
        assert!(is_excluded(&[Some("-"), Some("-")]));
        assert!(!is_excluded(&[Some("-"), Some("name")]));
        assert!(!is_excluded(&[None, None]));
        assert!(!is_excluded(&[Some(""), None]));
    }
}
