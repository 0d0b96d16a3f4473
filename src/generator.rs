//! Type → schema tree, with cycle breaking and reference promotion.
//!
//! ```ignore
//! let cache = TypeInfoCache::new();
//! let mut generator = SchemaRefGenerator::new(&cache);
//! let out = generator.generate::<User>()?;
//! println!("{}", out.schema.to_json());
//! ```
//!
//! Every call runs one pass: the type graph is walked depth first with an
//! explicit ancestor chain, drafts are collected in an arena, and only once
//! all uses are counted are shared and cyclic schemas promoted to named
//! components. A failed call returns no tree at all.
mod constraints;
mod pass;
mod render;

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use serde_json::{json, Value};

use crate::annotate::{AnnotatorRegistry, DEFAULT_REGISTRY};
use crate::error::{Error, Result};
use crate::introspect::{Introspect, Shape, TypeRef};
use crate::options::GeneratorOptions;
use crate::schema::{ReferenceTable, SchemaRef};
use crate::type_info::TypeInfoCache;

use pass::Pass;
use render::ComponentNames;

/// A constraint that was left unapplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub type_name: String,
    pub field: String,
    pub operator: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: `{}`: {}", self.type_name, self.field, self.operator, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct Generated {
    pub schema: SchemaRef,
    /// Components promoted by this call.
    pub components: ReferenceTable,
    pub diagnostics: Vec<Diagnostic>,
}

impl Generated {
    pub fn to_json(&self) -> Value {
        json!({
            "schema": self.schema.to_json(),
            "components": self.components.to_json(),
            "diagnostics": self.diagnostics.iter().map(ToString::to_string).collect::<Vec<_>>(),
        })
    }
}

/// Generates schemas for any number of root types against one cache.
///
/// Named root types are remembered; asking for one again answers with the
/// same shared tree.
pub struct SchemaRefGenerator<'a> {
    cache: &'a TypeInfoCache,
    registry: &'a AnnotatorRegistry,
    options: GeneratorOptions,
    roots: HashMap<TypeId, Generated>,
    components: ReferenceTable,
    names: ComponentNames,
}

impl<'a> SchemaRefGenerator<'a> {
    pub fn new(cache: &'a TypeInfoCache) -> Self {
        SchemaRefGenerator {
            cache,
            registry: &DEFAULT_REGISTRY,
            options: GeneratorOptions::default(),
            roots: HashMap::new(),
            components: ReferenceTable::new(),
            names: ComponentNames::default(),
        }
    }

    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_registry(mut self, registry: &'a AnnotatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn options(&self) -> &GeneratorOptions { &self.options }

    /// Every component promoted so far, across calls.
    pub fn components(&self) -> &ReferenceTable { &self.components }

    pub fn generate<T: Introspect>(&mut self) -> Result<Generated> {
        self.generate_type(TypeRef::of::<T>())
    }

    pub fn generate_for<T: Introspect>(&mut self, _value: &T) -> Result<Generated> {
        self.generate::<T>()
    }

    pub fn generate_type(&mut self, ty: TypeRef) -> Result<Generated> {
        let (stripped, shape) = ty.strip_indirection();
        if matches!(shape, Shape::Func | Shape::Chan) {
            return Err(Error::Excluded { type_name: ty.name().into_owned() });
        }

        if let Some(root) = self.roots.get(&stripped.id()) {
            tracing::debug!(root = %stripped.name(), "root generated before; reusing");
            return Ok(root.clone());
        }

        let mut pass = Pass::new(self.cache, self.registry, &self.options);
        let Some(root) = pass.root(stripped)? else {
            return Err(Error::Excluded { type_name: ty.name().into_owned() });
        };
        let output = pass.finish(root, &mut self.names);
        self.components.extend(&output.components);

        let generated = Generated {
            schema: SchemaRef::Value(output.schema),
            components: output.components,
            diagnostics: output.diagnostics,
        };
        if matches!(shape, Shape::Struct(_) | Shape::Enum(_)) {
            self.roots.insert(stripped.id(), generated.clone());
        }
        Ok(generated)
    }
}

/// One-shot generation with the default registry.
pub fn generate_schema<T: Introspect>(cache: &TypeInfoCache, options: GeneratorOptions) -> Result<Generated> {
    SchemaRefGenerator::new(cache).with_options(options).generate::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::StructShape;
    use crate::schema::Kind;

    struct Tree;
    impl Introspect for Tree {
        fn shape() -> Shape {
            Shape::Struct(StructShape::new()
                .field::<String>("Label").json("label")
                .field::<Vec<Tree>>("Children").json("children"))
        }
    }

    struct Point;
    impl Introspect for Point {
        fn shape() -> Shape {
            Shape::Struct(StructShape::new().field::<i32>("X").json("x").field::<i32>("Y").json("y"))
        }
    }

    struct Segment;
    impl Introspect for Segment {
        fn shape() -> Shape {
            Shape::Struct(StructShape::new()
                .field::<Point>("From").json("from")
                .field::<Point>("To").json("to").validate("required"))
        }
    }

    #[test]
    fn cycle_through_a_sequence_links_items() {
        let cache = TypeInfoCache::new();
        let out = SchemaRefGenerator::new(&cache).generate::<Tree>().unwrap();
        let root = out.schema.value().unwrap();
        let children = root.property("children").and_then(SchemaRef::value).unwrap();
        assert_eq!(children.kind(), Some(Kind::Array));
        assert_eq!(
            children.items.as_ref().and_then(SchemaRef::reference),
            Some("#/components/schemas/Tree")
        );
        assert!(out.components.contains("Tree"));
    }

    #[test]
    fn shared_named_types_are_promoted() {
        let cache = TypeInfoCache::new();
        let out = SchemaRefGenerator::new(&cache).generate::<Segment>().unwrap();
        let root = out.schema.value().unwrap();
        assert_eq!(root.property("from").and_then(SchemaRef::reference), Some("#/components/schemas/Point"));
        assert_eq!(root.property("to").and_then(SchemaRef::reference), Some("#/components/schemas/Point"));
        assert_eq!(root.keywords.required, vec!["to".to_owned()]);
        assert_eq!(out.components.names().collect::<Vec<_>>(), vec!["Point"]);
    }

    #[test]
    fn sharing_can_be_turned_off() {
        let cache = TypeInfoCache::new();
        let options = GeneratorOptions { promote_shared: false, ..GeneratorOptions::default() };
        let out = generate_schema::<Segment>(&cache, options).unwrap();
        let root = out.schema.value().unwrap();
        assert!(root.property("from").and_then(SchemaRef::value).is_some());
        assert!(out.components.is_empty());
    }

    #[test]
    fn repeated_root_shares_the_first_tree() {
        let cache = TypeInfoCache::new();
        let mut generator = SchemaRefGenerator::new(&cache);
        let first = generator.generate::<Segment>().unwrap();
        let second = generator.generate_for(&Segment).unwrap();
        assert_eq!(first.schema.to_json(), second.schema.to_json());
        assert_eq!(first.components.to_json(), second.components.to_json());
        assert!(std::ptr::eq(first.schema.value().unwrap(), second.schema.value().unwrap()));
        assert!(!generator.components().contains("Segment"));
    }

    #[test]
    fn custom_prefix_is_used() {
        let cache = TypeInfoCache::new();
        let options = GeneratorOptions { ref_prefix: "#/definitions/".into(), ..GeneratorOptions::default() };
        let out = generate_schema::<Tree>(&cache, options).unwrap();
        let children = out.schema.value().unwrap().property("children").and_then(SchemaRef::value).unwrap();
        assert_eq!(children.items.as_ref().and_then(SchemaRef::reference), Some("#/definitions/Tree"));
    }

    #[test]
    fn function_roots_are_excluded() {
        let cache = TypeInfoCache::new();
        let err = SchemaRefGenerator::new(&cache).generate::<fn() -> u8>().unwrap_err();
        assert!(matches!(err, Error::Excluded { .. }));
    }

    #[test]
    fn diagnostics_display() {
        let d = Diagnostic {
            type_name: "User".into(),
            field: "name".into(),
            operator: "alpha".into(),
            message: "unsupported".into(),
        };
        assert_eq!(d.to_string(), "User.name: `alpha`: unsupported");
    }
}
