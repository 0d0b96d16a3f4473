//! Constraint tag grammar.
//!
//! A tag such as `required,dive,keys,min=1,endkeys,gte=0|eq=-1` is scanned
//! once, left to right, into a singly linked chain of [`FieldTag`] nodes.
//!
//! - `,` separates operators, `|` separates alternatives of one operator.
//! - `=` introduces a parameter; inside it `0x2C` and `0x7C` stand for a
//!   literal `,` and `|`.
//! - `dive` moves the following operators onto a container's elements.
//! - `keys ... endkeys` must come right after `dive` and holds the operators
//!   for a map's keys; the block is parsed into [`FieldTag::keys`].
use serde_json::{json, Value};
use thiserror::Error;

const TAG_SEPARATOR: char = ',';
const OR_SEPARATOR: char = '|';
const PARAM_SEPARATOR: char = '=';
const UTF8_HEX_COMMA: &str = "0x2C";
const UTF8_PIPE: &str = "0x7C";

const DIVE: &str = "dive";
const KEYS: &str = "keys";
const END_KEYS: &str = "endkeys";
const OMIT_EMPTY: &str = "omitempty";
const IS_DEFAULT: &str = "isdefault";
const STRUCT_ONLY: &str = "structonly";
const NO_STRUCT_LEVEL: &str = "nostructlevel";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("empty operator in `{tag}`")]
    EmptyOperator { tag: String },
    #[error("'keys' must be immediately preceded by 'dive' in `{tag}`")]
    KeysWithoutDive { tag: String },
    #[error("'endkeys' encountered without a corresponding 'keys' in `{tag}`")]
    EndKeysWithoutKeys { tag: String },
    #[error("'keys' block is never closed by 'endkeys' in `{tag}`")]
    UnclosedKeys { tag: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagType {
    #[default]
    Default,
    OmitEmpty,
    IsDefault,
    NoStructLevel,
    StructOnly,
    Dive,
    Or,
    Keys,
    EndKeys,
}

impl TagType {
    pub fn as_str(self) -> &'static str {
        match self {
            TagType::Default => "default",
            TagType::OmitEmpty => "omitempty",
            TagType::IsDefault => "isdefault",
            TagType::NoStructLevel => "nostructlevel",
            TagType::StructOnly => "structonly",
            TagType::Dive => "dive",
            TagType::Or => "or",
            TagType::Keys => "keys",
            TagType::EndKeys => "endkeys",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTag {
    pub operator: String,
    pub param: String,
    /// Only set on a `keys` node: the operators of its block.
    pub keys: Option<Box<FieldTag>>,
    pub next: Option<Box<FieldTag>>,
    pub kind: TagType,
    pub has_param: bool,
    /// Last node produced by one comma-separated operator.
    pub is_block_end: bool,
}

impl FieldTag {
    fn marker(operator: &str, kind: TagType) -> Self {
        FieldTag {
            operator: operator.to_owned(),
            kind,
            is_block_end: true,
            ..FieldTag::default()
        }
    }

    pub fn is_or(&self) -> bool { self.kind == TagType::Or }

    pub fn iter(&self) -> Iter<'_> {
        Iter { next: Some(self) }
    }

    /// Flat JSON view of the chain (debugging / CLI).
    pub fn to_json(&self) -> Value {
        Value::Array(self.iter().map(|tag| {
            let mut o = json!({
                "operator": tag.operator,
                "type": tag.kind.as_str(),
            });
            if tag.has_param {
                o["param"] = Value::from(tag.param.clone());
            }
            if tag.is_block_end {
                o["blockEnd"] = Value::from(true);
            }
            if let Some(keys) = &tag.keys {
                o["keys"] = keys.to_json();
            }
            o
        }).collect())
    }
}

/// Walks a chain in declaration order.
pub struct Iter<'a> {
    next: Option<&'a FieldTag>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a FieldTag;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next.as_deref();
        Some(current)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PARSER
// ————————————————————————————————————————————————————————————————————————————

pub fn parse(tag: &str) -> Result<FieldTag, TagError> {
    let tokens = tag.split(TAG_SEPARATOR).collect::<Vec<_>>();
    let nodes = scan(&tokens, tag, false)?;
    // `split` always yields a token and an empty one is rejected, so the
    // chain is never empty here.
    link(nodes).map(|head| *head).ok_or_else(|| TagError::EmptyOperator { tag: tag.to_owned() })
}

fn link(nodes: Vec<FieldTag>) -> Option<Box<FieldTag>> {
    nodes.into_iter().rev().fold(None, |next, mut node| {
        node.next = next;
        Some(Box::new(node))
    })
}

fn scan(tokens: &[&str], tag: &str, in_keys: bool) -> Result<Vec<FieldTag>, TagError> {
    let mut nodes = Vec::<FieldTag>::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        match token {
            DIVE => nodes.push(FieldTag::marker(token, TagType::Dive)),

            KEYS => {
                if nodes.last().map(|n| n.kind) != Some(TagType::Dive) {
                    return Err(TagError::KeysWithoutDive { tag: tag.to_owned() });
                }
                let rest = &tokens[i + 1..];
                let Some(end) = rest.iter().position(|t| *t == END_KEYS) else {
                    return Err(TagError::UnclosedKeys { tag: tag.to_owned() });
                };
                let block = scan(&rest[..=end], tag, true)?;
                let mut node = FieldTag::marker(token, TagType::Keys);
                node.keys = link(block);
                nodes.push(node);
                // resume after the block's `endkeys`
                i += end + 2;
                continue;
            }

            END_KEYS => {
                if !in_keys || i != tokens.len() - 1 {
                    return Err(TagError::EndKeysWithoutKeys { tag: tag.to_owned() });
                }
                nodes.push(FieldTag::marker(token, TagType::EndKeys));
            }

            OMIT_EMPTY => nodes.push(FieldTag::marker(token, TagType::OmitEmpty)),
            STRUCT_ONLY => nodes.push(FieldTag::marker(token, TagType::StructOnly)),
            NO_STRUCT_LEVEL => nodes.push(FieldTag::marker(token, TagType::NoStructLevel)),

            _ => {
                let alternatives = token.split(OR_SEPARATOR).collect::<Vec<_>>();
                let grouped = alternatives.len() > 1;
                for alternative in alternatives {
                    let (operator, param) = match alternative.split_once(PARAM_SEPARATOR) {
                        Some((operator, param)) => (operator, Some(param)),
                        None => (alternative, None),
                    };
                    if operator.is_empty() {
                        return Err(TagError::EmptyOperator { tag: tag.to_owned() });
                    }
                    let kind = if grouped {
                        TagType::Or
                    } else if token == IS_DEFAULT {
                        TagType::IsDefault
                    } else {
                        TagType::Default
                    };
                    nodes.push(FieldTag {
                        operator: operator.to_owned(),
                        param: param.map(unescape).unwrap_or_default(),
                        has_param: param.is_some(),
                        kind,
                        ..FieldTag::default()
                    });
                }
                if let Some(last) = nodes.last_mut() {
                    last.is_block_end = true;
                }
            }
        }
        i += 1;
    }

    Ok(nodes)
}

fn unescape(param: &str) -> String {
    param.replace(UTF8_HEX_COMMA, ",").replace(UTF8_PIPE, "|")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(head: &FieldTag) -> Vec<(&str, TagType)> {
        head.iter().map(|t| (t.operator.as_str(), t.kind)).collect()
    }

    #[test]
    fn comma_separated_operators_keep_order() {
        let head = parse("required,gte=18,lte=130").unwrap();
        assert_eq!(
            ops(&head),
            vec![("required", TagType::Default), ("gte", TagType::Default), ("lte", TagType::Default)]
        );
        let gte = head.iter().nth(1).unwrap();
        assert!(gte.has_param);
        assert_eq!(gte.param, "18");
        assert!(gte.is_block_end);
        assert!(!head.has_param);
    }

    #[test]
    fn parameter_is_split_once() {
        let head = parse("eq=a=b").unwrap();
        assert_eq!(head.operator, "eq");
        assert_eq!(head.param, "a=b");
    }

    #[test]
    fn empty_parameter_is_still_a_parameter() {
        let head = parse("eq=").unwrap();
        assert!(head.has_param);
        assert_eq!(head.param, "");
    }

    #[test]
    fn escapes_decode_inside_parameters() {
        let head = parse("oneof=a0x2Cb 0x7C").unwrap();
        assert_eq!(head.param, "a,b |");
    }

    #[test]
    fn pipe_alternatives_form_an_or_group() {
        let head = parse("required,email|uuid,max=5").unwrap();
        let nodes = head.iter().collect::<Vec<_>>();
        assert_eq!(nodes.len(), 4);
        assert!(nodes[1].is_or() && !nodes[1].is_block_end);
        assert!(nodes[2].is_or() && nodes[2].is_block_end);
        assert_eq!(nodes[3].kind, TagType::Default);
    }

    #[test]
    fn markers_are_typed() {
        let head = parse("omitempty,structonly,nostructlevel,isdefault,dive").unwrap();
        let kinds = head.iter().map(|t| t.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![TagType::OmitEmpty, TagType::StructOnly, TagType::NoStructLevel, TagType::IsDefault, TagType::Dive]
        );
    }

    #[test]
    fn keys_block_is_parsed_into_its_own_chain() {
        let head = parse("gt=0,dive,keys,min=1,max=8,endkeys,required").unwrap();
        assert_eq!(
            ops(&head),
            vec![("gt", TagType::Default), ("dive", TagType::Dive), ("keys", TagType::Keys), ("required", TagType::Default)]
        );
        let keys = head.iter().nth(2).and_then(|t| t.keys.as_deref()).unwrap();
        assert_eq!(
            ops(keys),
            vec![("min", TagType::Default), ("max", TagType::Default), ("endkeys", TagType::EndKeys)]
        );
    }

    #[test]
    fn empty_keys_block_is_allowed() {
        let head = parse("dive,keys,endkeys").unwrap();
        let keys = head.iter().nth(1).and_then(|t| t.keys.as_deref()).unwrap();
        assert_eq!(ops(keys), vec![("endkeys", TagType::EndKeys)]);
    }

    #[test]
    fn keys_must_follow_dive() {
        assert!(matches!(parse("keys,min=1,endkeys"), Err(TagError::KeysWithoutDive { .. })));
        assert!(matches!(parse("required,keys,endkeys"), Err(TagError::KeysWithoutDive { .. })));
    }

    #[test]
    fn endkeys_without_keys_fails() {
        assert!(matches!(parse("dive,endkeys"), Err(TagError::EndKeysWithoutKeys { .. })));
        assert!(matches!(parse("required,endkeys"), Err(TagError::EndKeysWithoutKeys { .. })));
    }

    #[test]
    fn unclosed_keys_fails() {
        assert!(matches!(parse("dive,keys,min=1"), Err(TagError::UnclosedKeys { .. })));
    }

    #[test]
    fn empty_operators_fail() {
        for tag in ["", "required,", ",required", "a||b", "=5"] {
            assert!(matches!(parse(tag), Err(TagError::EmptyOperator { .. })), "{tag}");
        }
    }

    #[test]
    fn json_view_lists_every_node() {
        let head = parse("dive,keys,min=1,endkeys").unwrap();
        let v = head.to_json();
        assert_eq!(v[0]["type"], "dive");
        assert_eq!(v[1]["keys"][0]["param"], "1");
        assert_eq!(v.as_array().unwrap().len(), 2);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// One comma-free operator with an optional parameter.
    fn operator() -> impl Strategy<Value = (String, Option<String>)> {
        (
            "[a-z][a-z0-9_]{0,9}".prop_filter("block markers", |op| op != KEYS && op != END_KEYS),
            proptest::option::of("[a-z0-9 .:-]{0,8}"),
        )
    }

    fn render(ops: &[(String, Option<String>)]) -> String {
        ops.iter()
            .map(|(op, param)| match param {
                Some(p) => format!("{op}={p}"),
                None => op.clone(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    proptest! {
        /// One node per operator, in declaration order.
        #[test]
        fn chain_preserves_operators(ops in prop::collection::vec(operator(), 1..12)) {
            let head = parse(&render(&ops)).unwrap();
            let nodes = head.iter().collect::<Vec<_>>();
            prop_assert_eq!(nodes.len(), ops.len());
            for (node, (op, param)) in nodes.iter().zip(&ops) {
                prop_assert_eq!(&node.operator, op);
                prop_assert!(node.is_block_end);
                if node.kind == TagType::Default || node.kind == TagType::IsDefault {
                    prop_assert_eq!(node.has_param, param.is_some());
                    prop_assert_eq!(&node.param, param.as_deref().unwrap_or(""));
                }
            }
        }

        /// Escaped separators come back as literals and never split the chain.
        #[test]
        fn escaped_separators_stay_in_the_parameter(words in prop::collection::vec("[a-z]{1,5}", 1..5)) {
            let param = words.join(UTF8_HEX_COMMA);
            let head = parse(&format!("oneof={param}{UTF8_PIPE}x,required")).unwrap();
            prop_assert_eq!(head.iter().count(), 2);
            prop_assert_eq!(head.param.clone(), format!("{}|x", words.join(",")));
        }

        /// Any well-formed keys block round-trips into the `keys` sub-chain.
        #[test]
        fn keys_block_length(inner in prop::collection::vec(operator(), 0..6)) {
            let mut tag = String::from("dive,keys");
            if !inner.is_empty() {
                tag.push(',');
                tag.push_str(&render(&inner));
            }
            tag.push_str(",endkeys");
            let head = parse(&tag).unwrap();
            let keys = head.iter().nth(1).and_then(|t| t.keys.as_deref()).unwrap();
            prop_assert_eq!(keys.iter().count(), inner.len() + 1);
        }
    }
}
