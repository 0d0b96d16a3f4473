//! Generated schema tree.
//!
//! `Schema<R>` is generic over how children are referenced: the generator
//! builds `Schema<SlotId>` drafts in an arena and hands out `Schema<SchemaRef>`
//! once promotion decisions are final.
use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind { Boolean, Integer, Number, String, Array, Object }

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Object => "object",
        }
    }
}

/// The scalar part of a schema node; this is what annotators mutate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keywords {
    pub kind: Option<Kind>,
    pub format: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub enum_values: Vec<Value>,
    pub required: Vec<String>,
}

impl Keywords {
    pub fn is_empty(&self) -> bool { *self == Keywords::default() }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema<R = SchemaRef> {
    pub keywords: Keywords,
    pub properties: IndexMap<String, R>,
    pub items: Option<R>,
    pub additional_properties: Option<R>,
    pub property_names: Option<R>,
    pub one_of: Vec<R>,
    pub any_of: Vec<R>,
}

impl<R> Default for Schema<R> {
    fn default() -> Self {
        Schema {
            keywords: Keywords::default(),
            properties: IndexMap::new(),
            items: None,
            additional_properties: None,
            property_names: None,
            one_of: Vec::new(),
            any_of: Vec::new(),
        }
    }
}

impl<R> Schema<R> {
    pub fn new(kind: Kind) -> Self {
        let mut schema = Schema::default();
        schema.keywords.kind = Some(kind);
        schema
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.keywords.format = Some(format.to_owned());
        self
    }

    pub fn with_bounds(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.keywords.minimum = minimum;
        self.keywords.maximum = maximum;
        self
    }

    pub fn kind(&self) -> Option<Kind> { self.keywords.kind }

    /// Every child reference, in emission order.
    pub fn children(&self) -> impl Iterator<Item = &R> {
        self.properties.values()
            .chain(self.items.iter())
            .chain(self.additional_properties.iter())
            .chain(self.property_names.iter())
            .chain(self.one_of.iter())
            .chain(self.any_of.iter())
    }

    pub fn map_refs<U>(&self, mut f: impl FnMut(&R) -> U) -> Schema<U> {
        Schema {
            keywords: self.keywords.clone(),
            properties: self.properties.iter().map(|(k, r)| (k.clone(), f(r))).collect(),
            items: self.items.as_ref().map(&mut f),
            additional_properties: self.additional_properties.as_ref().map(&mut f),
            property_names: self.property_names.as_ref().map(&mut f),
            one_of: self.one_of.iter().map(&mut f).collect(),
            any_of: self.any_of.iter().map(&mut f).collect(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FINISHED TREE
// ————————————————————————————————————————————————————————————————————————————

/// A child position: either a named component reference or an inlined node.
/// Inlined nodes are shared, never deep-copied.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaRef {
    Ref(String),
    Value(Arc<Schema>),
}

impl SchemaRef {
    pub fn reference(&self) -> Option<&str> {
        match self {
            SchemaRef::Ref(r) => Some(r),
            SchemaRef::Value(_) => None,
        }
    }

    pub fn value(&self) -> Option<&Schema> {
        match self {
            SchemaRef::Ref(_) => None,
            SchemaRef::Value(v) => Some(v),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SchemaRef::Ref(r) => {
                let mut o = Map::new();
                o.insert("$ref".into(), Value::from(r.clone()));
                Value::Object(o)
            }
            SchemaRef::Value(v) => v.to_json(),
        }
    }
}

impl Schema {
    pub fn property(&self, name: &str) -> Option<&SchemaRef> {
        self.properties.get(name)
    }

    pub fn to_json(&self) -> Value {
        let k = &self.keywords;
        let mut o = Map::new();

        if let Some(kind) = k.kind {
            o.insert("type".into(), Value::from(kind.as_str()));
        }
        if let Some(format) = &k.format {
            o.insert("format".into(), Value::from(format.clone()));
        }
        if let Some(m) = k.minimum {
            o.insert("minimum".into(), number(m));
        }
        if k.exclusive_minimum {
            o.insert("exclusiveMinimum".into(), Value::from(true));
        }
        if let Some(m) = k.maximum {
            o.insert("maximum".into(), number(m));
        }
        if k.exclusive_maximum {
            o.insert("exclusiveMaximum".into(), Value::from(true));
        }
        for (key, bound) in [
            ("minLength", k.min_length),
            ("maxLength", k.max_length),
            ("minItems", k.min_items),
            ("maxItems", k.max_items),
            ("minProperties", k.min_properties),
            ("maxProperties", k.max_properties),
        ] {
            if let Some(n) = bound {
                o.insert(key.into(), Value::from(n));
            }
        }
        if k.unique_items {
            o.insert("uniqueItems".into(), Value::from(true));
        }
        if !k.enum_values.is_empty() {
            o.insert("enum".into(), Value::Array(k.enum_values.clone()));
        }
        if !self.properties.is_empty() {
            let props = self.properties.iter()
                .map(|(name, r)| (name.clone(), r.to_json()))
                .collect::<Map<_, _>>();
            o.insert("properties".into(), Value::Object(props));
        }
        if !k.required.is_empty() {
            o.insert(
                "required".into(),
                Value::Array(k.required.iter().cloned().map(Value::from).collect()),
            );
        }
        if let Some(items) = &self.items {
            o.insert("items".into(), items.to_json());
        }
        if let Some(additional) = &self.additional_properties {
            o.insert("additionalProperties".into(), additional.to_json());
        }
        if let Some(names) = &self.property_names {
            o.insert("propertyNames".into(), names.to_json());
        }
        if !self.one_of.is_empty() {
            o.insert("oneOf".into(), Value::Array(self.one_of.iter().map(SchemaRef::to_json).collect()));
        }
        if !self.any_of.is_empty() {
            o.insert("anyOf".into(), Value::Array(self.any_of.iter().map(SchemaRef::to_json).collect()));
        }

        Value::Object(o)
    }
}

/// Integral bounds print as JSON integers.
fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Value::from(f as i64)
    } else if f.fract() == 0.0 && f >= 0.0 {
        Value::from(f as u64)
    } else {
        Value::from(f)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// COMPONENTS
// ————————————————————————————————————————————————————————————————————————————

/// Schemas promoted to named, shareable components.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    schemas: BTreeMap<String, Arc<Schema>>,
}

impl ReferenceTable {
    pub fn new() -> Self { Self::default() }
    pub fn insert(&mut self, name: impl Into<String>, schema: Arc<Schema>) {
        self.schemas.insert(name.into(), schema);
    }
    pub fn get(&self, name: &str) -> Option<&Arc<Schema>> { self.schemas.get(name) }
    pub fn contains(&self, name: &str) -> bool { self.schemas.contains_key(name) }
    pub fn len(&self) -> usize { self.schemas.len() }
    pub fn is_empty(&self) -> bool { self.schemas.is_empty() }
    pub fn names(&self) -> impl Iterator<Item = &str> { self.schemas.keys().map(String::as_str) }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Schema>)> {
        self.schemas.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn extend(&mut self, other: &ReferenceTable) {
        for (name, schema) in other.iter() {
            self.schemas.insert(name.to_owned(), Arc::clone(schema));
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.schemas.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
    }
}
