//! Applying a field's constraint chain to the schemas built for it.
//!
//! Operators before any `dive` target the property itself; each `dive` moves
//! one level down into `items` / `additionalProperties`; a `keys` block
//! targets the map's `propertyNames`. A memoized or shared slot is detached
//! before it is written to, so a constraint never leaks into other uses of
//! the same type.
use crate::annotate::Annotator;
use crate::error::{Error, Result};
use crate::schema::{Keywords, Kind, Schema};
use crate::tags::{FieldTag, TagType};
use crate::type_info::Field;

use super::Diagnostic;
use super::pass::{Body, Pass, Slot, SlotId};

#[derive(Debug, Clone, Copy)]
enum Anchor {
    Property,
    /// `propertyNames` of the container `depth` dives below the property.
    PropertyNames { depth: usize },
}

struct Site<'f> {
    owner: &'f str,
    field: &'f Field,
}

impl Pass<'_> {
    pub(crate) fn constrain(
        &mut self,
        owner: &str,
        field: &Field,
        chain: &FieldTag,
        parent: &mut Schema<SlotId>,
    ) -> Result<()> {
        let site = Site { owner, field };
        self.walk(&site, chain, Anchor::Property, parent)
    }

    fn walk(&mut self, site: &Site<'_>, chain: &FieldTag, anchor: Anchor, parent: &mut Schema<SlotId>) -> Result<()> {
        let mut depth = 0usize;
        let mut group = Vec::<&FieldTag>::new();

        for tag in chain.iter() {
            match tag.kind {
                TagType::Dive => depth += 1,
                TagType::Keys => match (anchor, &tag.keys) {
                    (Anchor::Property, Some(keys)) => {
                        let names = Anchor::PropertyNames { depth: depth.saturating_sub(1) };
                        self.walk(site, keys, names, parent)?;
                    }
                    _ => self.diagnose(site, &tag.operator, "nested 'keys' blocks have no schema form"),
                },
                TagType::EndKeys => {}
                TagType::Or => {
                    group.push(tag);
                    if tag.is_block_end {
                        self.alternatives(site, &group, anchor, depth, parent)?;
                        group.clear();
                    }
                }
                _ => self.apply(site, tag, anchor, depth, parent)?,
            }
        }
        Ok(())
    }

    fn apply(
        &mut self,
        site: &Site<'_>,
        tag: &FieldTag,
        anchor: Anchor,
        depth: usize,
        parent: &mut Schema<SlotId>,
    ) -> Result<()> {
        match self.registry.get(&tag.operator) {
            Some(Annotator::Noop) => {}
            Some(Annotator::Parent(annotate)) => match (anchor, depth) {
                (Anchor::Property, 0) => annotate(site.field, &mut parent.keywords),
                _ => self.diagnose(site, &tag.operator, "only applies to the enclosing object"),
            },
            Some(Annotator::Schema(annotate)) => {
                let Some(slot) = self.locate(site, anchor, depth, parent) else {
                    self.diagnose(site, &tag.operator, "no schema to constrain at this position");
                    return Ok(());
                };
                if let Some(keywords) = self.keywords_mut(slot) {
                    annotate(tag, keywords).map_err(|source| annotate_error(site, tag, source))?;
                }
            }
            Some(Annotator::Unsupported) => {
                self.diagnose(site, &tag.operator, "annotator not implemented for this operator; schema left unconstrained")
            }
            None => self.diagnose(site, &tag.operator, "unknown operator; schema left unconstrained"),
        }
        Ok(())
    }

    /// `a|b` becomes `anyOf` when every alternative maps to keywords.
    fn alternatives(
        &mut self,
        site: &Site<'_>,
        group: &[&FieldTag],
        anchor: Anchor,
        depth: usize,
        parent: &mut Schema<SlotId>,
    ) -> Result<()> {
        let operator = group.iter().map(|t| t.operator.as_str()).collect::<Vec<_>>().join("|");
        let annotators = group
            .iter()
            .map(|t| match self.registry.get(&t.operator) {
                Some(Annotator::Schema(annotate)) => Some(annotate),
                _ => None,
            })
            .collect::<Option<Vec<_>>>();
        let Some(annotators) = annotators else {
            self.diagnose(site, &operator, "alternation only maps to anyOf for keyword operators");
            return Ok(());
        };
        let Some(target) = self.locate(site, anchor, depth, parent) else {
            self.diagnose(site, &operator, "no schema to constrain at this position");
            return Ok(());
        };

        let kind = self.keywords_mut(target).and_then(|k| k.kind);
        let mut branches = Vec::with_capacity(group.len());
        for (tag, annotate) in group.iter().zip(annotators) {
            let mut keywords = Keywords { kind, ..Keywords::default() };
            annotate(tag, &mut keywords).map_err(|source| annotate_error(site, tag, source))?;
            keywords.kind = None;
            let (name, memo) = (self.slots[target].name.clone(), self.slots[target].memo);
            branches.push(self.push(Slot {
                name,
                memo,
                memoized: false,
                body: Body::Schema(Schema { keywords, ..Schema::default() }),
                uses: 1,
                cycle: false,
            }));
        }
        if let Body::Schema(schema) = &mut self.slots[target].body {
            schema.any_of.extend(branches);
        }
        Ok(())
    }

    // ————————————————————————————————————————————————————————————————————————
    // NAVIGATION
    // ————————————————————————————————————————————————————————————————————————

    /// Writable slot an operator lands on, detaching shared slots on the way.
    fn locate(&mut self, site: &Site<'_>, anchor: Anchor, depth: usize, parent: &mut Schema<SlotId>) -> Option<SlotId> {
        let name = &site.field.name;
        let current = *parent.properties.get(name)?;
        let property = self.writable(current)?;
        parent.properties.insert(name.clone(), property);

        match anchor {
            Anchor::Property => self.descend(property, depth),
            Anchor::PropertyNames { depth: container } => {
                let map = self.descend(property, container)?;
                let names = self.property_names(map)?;
                self.descend(names, depth)
            }
        }
    }

    fn descend(&mut self, mut slot: SlotId, depth: usize) -> Option<SlotId> {
        for _ in 0..depth {
            let Body::Schema(schema) = &self.slots[slot].body else { return None };
            let (child, is_items) = match (schema.items, schema.additional_properties) {
                (Some(items), _) => (items, true),
                (None, Some(values)) => (values, false),
                (None, None) => return None,
            };
            let child = self.writable(child)?;
            if let Body::Schema(schema) = &mut self.slots[slot].body {
                if is_items {
                    schema.items = Some(child);
                } else {
                    schema.additional_properties = Some(child);
                }
            }
            slot = child;
        }
        Some(slot)
    }

    fn property_names(&mut self, map: SlotId) -> Option<SlotId> {
        let Body::Schema(schema) = &self.slots[map].body else { return None };
        schema.additional_properties?;
        if let Some(names) = schema.property_names {
            return self.writable(names);
        }
        let name = self.slots[map].name.clone();
        let memo = self.slots[map].memo;
        let names = self.push(Slot {
            name,
            memo,
            memoized: false,
            body: Body::Schema(Schema::new(Kind::String)),
            uses: 1,
            cycle: false,
        });
        if let Body::Schema(schema) = &mut self.slots[map].body {
            schema.property_names = Some(names);
        }
        Some(names)
    }

    /// Copy-on-write: returns `slot` itself when this use owns it.
    fn writable(&mut self, slot: SlotId) -> Option<SlotId> {
        let s = &self.slots[slot];
        let Body::Schema(schema) = &s.body else { return None };
        if !s.memoized && s.uses <= 1 {
            return Some(slot);
        }

        let copy = Slot {
            name: s.name.clone(),
            memo: s.memo,
            memoized: false,
            body: Body::Schema(schema.clone()),
            uses: 1,
            cycle: false,
        };
        let children = schema.children().copied().collect::<Vec<_>>();
        for child in children {
            self.slots[child].uses += 1;
        }
        self.slots[slot].uses = self.slots[slot].uses.saturating_sub(1);
        Some(self.push(copy))
    }

    fn keywords_mut(&mut self, slot: SlotId) -> Option<&mut Keywords> {
        match &mut self.slots[slot].body {
            Body::Schema(schema) => Some(&mut schema.keywords),
            Body::Pending | Body::Link(_) => None,
        }
    }

    fn diagnose(&mut self, site: &Site<'_>, operator: &str, message: &str) {
        tracing::warn!(
            type_name = site.owner,
            field = %site.field.name,
            operator,
            "{message}"
        );
        self.diagnostics.push(Diagnostic {
            type_name: site.owner.to_owned(),
            field: site.field.name.clone(),
            operator: operator.to_owned(),
            message: message.to_owned(),
        });
    }
}

fn annotate_error(site: &Site<'_>, tag: &FieldTag, source: crate::annotate::AnnotateError) -> Error {
    Error::Annotate {
        type_name: site.owner.to_owned(),
        field: site.field.name.clone(),
        operator: tag.operator.clone(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::DEFAULT_REGISTRY;
    use crate::introspect::TypeRef;
    use crate::options::GeneratorOptions;
    use crate::type_info::TypeInfoCache;

    fn field(name: &str) -> Field {
        Field {
            name: name.into(),
            ty: TypeRef::of::<String>(),
            index: vec![0],
            json: None,
            bson: None,
            validator: None,
        }
    }

    fn leaf(pass: &mut Pass<'_>, kind: Kind, memoized: bool, uses: usize) -> SlotId {
        pass.push(Slot {
            name: kind.as_str().into(),
            memo: super::super::pass::Memo::RefShape,
            memoized,
            body: Body::Schema(Schema::new(kind)),
            uses,
            cycle: false,
        })
    }

    fn keywords<'p>(pass: &'p Pass<'_>, slot: SlotId) -> &'p Keywords {
        match &pass.slots[slot].body {
            Body::Schema(s) => &s.keywords,
            _ => panic!("not a schema"),
        }
    }

    #[test]
    fn shared_slots_are_detached_before_writing() {
        let cache = TypeInfoCache::new();
        let options = GeneratorOptions::default();
        let mut pass = Pass::new(&cache, &DEFAULT_REGISTRY, &options);
        let shared = leaf(&mut pass, Kind::Integer, false, 2);

        let mut parent = Schema::<SlotId>::default();
        parent.properties.insert("age".into(), shared);
        let f = field("age");
        pass.constrain("User", &f, &crate::tags::parse("required,gte=18").unwrap(), &mut parent).unwrap();

        let detached = parent.properties["age"];
        assert_ne!(detached, shared);
        assert_eq!(keywords(&pass, detached).minimum, Some(18.0));
        assert_eq!(keywords(&pass, shared).minimum, None);
        assert_eq!(pass.slots[shared].uses, 1);
        assert_eq!(parent.keywords.required, vec!["age".to_owned()]);
    }

    #[test]
    fn dive_and_keys_target_inner_schemas() {
        let cache = TypeInfoCache::new();
        let options = GeneratorOptions::default();
        let mut pass = Pass::new(&cache, &DEFAULT_REGISTRY, &options);
        let value = leaf(&mut pass, Kind::Integer, false, 1);
        let map = leaf(&mut pass, Kind::Object, false, 1);
        if let Body::Schema(s) = &mut pass.slots[map].body {
            s.additional_properties = Some(value);
        }

        let mut parent = Schema::<SlotId>::default();
        parent.properties.insert("scores".into(), map);
        let chain = crate::tags::parse("max=10,dive,keys,min=2,endkeys,gte=0").unwrap();
        pass.constrain("Board", &field("scores"), &chain, &mut parent).unwrap();

        assert_eq!(keywords(&pass, map).max_properties, Some(10));
        assert_eq!(keywords(&pass, value).minimum, Some(0.0));
        let Body::Schema(s) = &pass.slots[map].body else { panic!() };
        let names = s.property_names.unwrap();
        assert_eq!(keywords(&pass, names).min_length, Some(2));
        assert!(pass.diagnostics.is_empty());
    }

    #[test]
    fn unsupported_operators_are_reported_not_fatal() {
        let cache = TypeInfoCache::new();
        let options = GeneratorOptions::default();
        let mut pass = Pass::new(&cache, &DEFAULT_REGISTRY, &options);
        let s = leaf(&mut pass, Kind::String, false, 1);
        let mut parent = Schema::<SlotId>::default();
        parent.properties.insert("code".into(), s);
        let chain = crate::tags::parse("alpha,bogus,min=1").unwrap();
        pass.constrain("Item", &field("code"), &chain, &mut parent).unwrap();

        let ops = pass.diagnostics.iter().map(|d| d.operator.as_str()).collect::<Vec<_>>();
        assert_eq!(ops, vec!["alpha", "bogus"]);
        assert_eq!(keywords(&pass, s).min_length, Some(1));
    }

    #[test]
    fn or_groups_become_any_of() {
        let cache = TypeInfoCache::new();
        let options = GeneratorOptions::default();
        let mut pass = Pass::new(&cache, &DEFAULT_REGISTRY, &options);
        let s = leaf(&mut pass, Kind::String, false, 1);
        let mut parent = Schema::<SlotId>::default();
        parent.properties.insert("id".into(), s);
        let chain = crate::tags::parse("email|uuid").unwrap();
        pass.constrain("Item", &field("id"), &chain, &mut parent).unwrap();

        let Body::Schema(schema) = &pass.slots[s].body else { panic!() };
        let formats = schema.any_of.iter()
            .map(|b| keywords(&pass, *b).format.clone().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(formats, vec!["email", "uuid"]);
        assert!(schema.any_of.iter().all(|b| keywords(&pass, *b).kind.is_none()));

        let chain = crate::tags::parse("email|alpha").unwrap();
        pass.constrain("Item", &field("id"), &chain, &mut parent).unwrap();
        assert_eq!(pass.diagnostics.len(), 1);
        assert_eq!(pass.diagnostics[0].operator, "email|alpha");
    }

    #[test]
    fn bad_parameters_abort() {
        let cache = TypeInfoCache::new();
        let options = GeneratorOptions::default();
        let mut pass = Pass::new(&cache, &DEFAULT_REGISTRY, &options);
        let s = leaf(&mut pass, Kind::Integer, false, 1);
        let mut parent = Schema::<SlotId>::default();
        parent.properties.insert("age".into(), s);
        let chain = crate::tags::parse("gte=eighteen").unwrap();
        let err = pass.constrain("User", &field("age"), &chain, &mut parent).unwrap_err();
        assert!(matches!(err, Error::Annotate { ref operator, .. } if operator == "gte"));
    }
}
