//! One generation pass: recursive descent into an arena of draft schemas.
//!
//! Children are referenced by [`SlotId`]. A type met again on its own
//! ancestor chain becomes a [`Body::Link`] back to the ancestor's slot; named
//! types are memoized per pass and reused by id. Promotion happens later, in
//! `render`, once every use is counted.
use std::any::TypeId;
use std::collections::HashMap;

use crate::annotate::AnnotatorRegistry;
use crate::error::{Error, Result};
use crate::introspect::{FloatKind, IntKind, Shape, StructShape, TypeRef};
use crate::options::{CycleMode, GeneratorOptions};
use crate::schema::{Kind, Schema};
use crate::type_info::TypeInfoCache;

use super::Diagnostic;

pub(crate) type SlotId = usize;

/// What a slot is named after, and how it is memoized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Memo {
    Type(TypeId),
    /// The `{ "$ref": string }` alternative of reference wrappers.
    RefShape,
}

#[derive(Debug, Clone)]
pub(crate) enum Body {
    /// Not built yet; only ever seen on slots still on the ancestor chain.
    Pending,
    Schema(Schema<SlotId>),
    /// Cycle back-edge to an ancestor slot.
    Link(SlotId),
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) name: String,
    pub(crate) memo: Memo,
    pub(crate) memoized: bool,
    pub(crate) body: Body,
    pub(crate) uses: usize,
    pub(crate) cycle: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Ancestor {
    id: TypeId,
    slot: SlotId,
}

pub(crate) struct Pass<'a> {
    pub(crate) cache: &'a TypeInfoCache,
    pub(crate) registry: &'a AnnotatorRegistry,
    pub(crate) options: &'a GeneratorOptions,
    pub(crate) slots: Vec<Slot>,
    memo: HashMap<Memo, SlotId>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'a> Pass<'a> {
    pub(crate) fn new(
        cache: &'a TypeInfoCache,
        registry: &'a AnnotatorRegistry,
        options: &'a GeneratorOptions,
    ) -> Self {
        Pass {
            cache,
            registry,
            options,
            slots: Vec::new(),
            memo: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Builds the root; `None` only for function/channel types.
    pub(crate) fn root(&mut self, ty: TypeRef) -> Result<Option<SlotId>> {
        let mut parents = Vec::with_capacity(4);
        self.build(ty, &mut parents)
    }

    pub(crate) fn push(&mut self, slot: Slot) -> SlotId {
        self.slots.push(slot);
        self.slots.len() - 1
    }

    /// Builds `ty` as a child position and counts the use.
    pub(crate) fn child(&mut self, ty: TypeRef, parents: &mut Vec<Ancestor>) -> Result<Option<SlotId>> {
        let slot = self.build(ty, parents)?;
        if let Some(slot) = slot {
            self.slots[slot].uses += 1;
        }
        Ok(slot)
    }

    fn build(&mut self, ty: TypeRef, parents: &mut Vec<Ancestor>) -> Result<Option<SlotId>> {
        let (ty, shape) = ty.strip_indirection();
        if matches!(shape, Shape::Func | Shape::Chan) {
            return Ok(None);
        }

        if let Some(at) = parents.iter().position(|a| a.id == ty.id()) {
            return self.cycle(ty, at, parents).map(Some);
        }

        let memo = Memo::Type(ty.id());
        if let Some(&slot) = self.memo.get(&memo) {
            return Ok(Some(slot));
        }

        let named = matches!(shape, Shape::Struct(_) | Shape::Enum(_));
        let slot = self.push(Slot {
            name: ty.name().into_owned(),
            memo,
            memoized: named,
            body: Body::Pending,
            uses: 0,
            cycle: false,
        });

        parents.push(Ancestor { id: ty.id(), slot });
        let body = self.body(ty, shape, parents);
        parents.pop();

        self.slots[slot].body = Body::Schema(body?);
        if named {
            self.memo.insert(memo, slot);
        }
        Ok(Some(slot))
    }

    fn cycle(&mut self, ty: TypeRef, at: usize, parents: &[Ancestor]) -> Result<SlotId> {
        let target = parents[at].slot;
        if self.options.cycles == CycleMode::Strict {
            let mut path = parents[at..]
                .iter()
                .map(|a| self.slots[a.slot].name.as_str())
                .collect::<Vec<_>>();
            let name = ty.name();
            path.push(&name);
            return Err(Error::Cycle {
                type_name: name.to_string(),
                path: path.join(" -> "),
            });
        }

        tracing::debug!(type_name = %ty.name(), "breaking cycle with a component reference");
        let target_slot = &mut self.slots[target];
        target_slot.cycle = true;
        target_slot.uses += 1;
        let link = Slot {
            name: target_slot.name.clone(),
            memo: target_slot.memo,
            memoized: false,
            body: Body::Link(target),
            uses: 0,
            cycle: false,
        };
        Ok(self.push(link))
    }

    // ————————————————————————————————————————————————————————————————————————
    // BODIES
    // ————————————————————————————————————————————————————————————————————————

    fn body(&mut self, ty: TypeRef, shape: Shape, parents: &mut Vec<Ancestor>) -> Result<Schema<SlotId>> {
        let schema = match shape {
            Shape::Bool => Schema::new(Kind::Boolean),
            Shape::Int(kind) => integer(kind),
            Shape::Float(FloatKind::F32) => Schema::new(Kind::Number).with_format("float"),
            Shape::Float(FloatKind::F64) => Schema::new(Kind::Number).with_format("double"),
            Shape::Char => {
                let mut s = Schema::new(Kind::String);
                s.keywords.min_length = Some(1);
                s.keywords.max_length = Some(1);
                s
            }
            Shape::String => Schema::new(Kind::String),
            Shape::Enum(variants) => {
                let mut s = Schema::new(Kind::String);
                s.keywords.enum_values = variants.into_iter().map(|v| v.into_owned().into()).collect();
                s
            }
            Shape::DateTime => Schema::new(Kind::String).with_format("date-time"),
            Shape::Date => Schema::new(Kind::String).with_format("date"),
            Shape::RawJson => Schema::default(),

            // Vec<u8> and friends travel as base64
            Shape::Sequence { elem, len: None, unique: false } if elem.id() == TypeId::of::<u8>() => {
                Schema::new(Kind::String).with_format("byte")
            }
            Shape::Sequence { elem, len, unique } => {
                let mut s = Schema::new(Kind::Array);
                s.items = self.child(elem, parents)?;
                if let Some(n) = len {
                    s.keywords.min_items = Some(n as u64);
                    s.keywords.max_items = Some(n as u64);
                }
                s.keywords.unique_items = unique;
                s
            }
            Shape::Map { value, .. } => {
                let mut s = Schema::new(Kind::Object);
                s.additional_properties = self.child(value, parents)?;
                s
            }

            Shape::Struct(def) => match reference_wrapper(&ty.name(), &def) {
                Some(value) => self.reference_wrapper(value, parents)?,
                None => self.record(ty, parents)?,
            },

            // stripped or filtered before we get here
            Shape::Optional(_) | Shape::Pointer(_) | Shape::Func | Shape::Chan => Schema::default(),
        };
        Ok(schema)
    }

    /// `oneOf: [{ "$ref": string }, value]`
    fn reference_wrapper(&mut self, value: TypeRef, parents: &mut Vec<Ancestor>) -> Result<Schema<SlotId>> {
        let value = self.child(value, parents)?;
        let reference = self.ref_shape();
        let mut s = Schema::default();
        s.one_of.push(reference);
        s.one_of.extend(value);
        Ok(s)
    }

    fn ref_shape(&mut self) -> SlotId {
        let slot = match self.memo.get(&Memo::RefShape) {
            Some(&slot) => slot,
            None => {
                let mut target = Schema::new(Kind::String);
                target.keywords.min_length = Some(1);
                let target = self.push(Slot {
                    name: "string".into(),
                    memo: Memo::Type(TypeId::of::<String>()),
                    memoized: false,
                    body: Body::Schema(target),
                    uses: 1,
                    cycle: false,
                });
                let mut shape = Schema::new(Kind::Object);
                shape.properties.insert("$ref".into(), target);
                let slot = self.push(Slot {
                    name: "Ref".into(),
                    memo: Memo::RefShape,
                    memoized: true,
                    body: Body::Schema(shape),
                    uses: 0,
                    cycle: false,
                });
                self.memo.insert(Memo::RefShape, slot);
                slot
            }
        };
        self.slots[slot].uses += 1;
        slot
    }

    fn record(&mut self, ty: TypeRef, parents: &mut Vec<Ancestor>) -> Result<Schema<SlotId>> {
        let info = self.cache.get_type_info(ty)?;
        let mut schema = Schema::default();

        for field in &info.fields {
            let Some(slot) = self.child(field.ty, parents)? else {
                continue;
            };
            if field.json.is_some_and(|json| json.string) {
                self.stringify(slot);
            }
            schema.properties.insert(field.name.clone(), slot);
            if let Some(chain) = &field.validator {
                self.constrain(&info.name, field, chain, &mut schema)?;
            }
        }

        // object only if it has properties
        if !schema.properties.is_empty() {
            schema.keywords.kind = Some(Kind::Object);
        }
        Ok(schema)
    }

    /// json `,string`: scalars are carried as strings.
    fn stringify(&mut self, slot: SlotId) {
        let s = &mut self.slots[slot];
        if s.memoized || s.uses > 1 {
            return;
        }
        if let Body::Schema(schema) = &mut s.body {
            if matches!(schema.kind(), Some(Kind::Integer | Kind::Number | Kind::Boolean | Kind::String)) {
                *schema = Schema::new(Kind::String);
            }
        }
    }
}

/// Names ending in `Ref` with a `Ref` field and a `Value` field hold either
/// a link or the inlined value.
fn reference_wrapper(name: &str, def: &StructShape) -> Option<TypeRef> {
    let base = name.split('<').next().unwrap_or(name);
    if !base.ends_with("Ref") {
        return None;
    }
    def.field_named("Ref")?;
    def.field_named("Value").map(|f| f.ty)
}

/// Fixed-width integers get their exact range when JSON numbers hold it;
/// 32/64/128-bit signed widths get a format instead.
fn integer(kind: IntKind) -> Schema<SlotId> {
    let s = Schema::new(Kind::Integer);
    match kind {
        IntKind::I8 => s.with_bounds(Some(i8::MIN as f64), Some(i8::MAX as f64)),
        IntKind::I16 => s.with_bounds(Some(i16::MIN as f64), Some(i16::MAX as f64)),
        IntKind::I32 => s.with_format("int32"),
        IntKind::I64 => s.with_format("int64"),
        IntKind::I128 => s.with_format("int128"),
        IntKind::Isize => s,
        IntKind::U8 => s.with_bounds(Some(0.0), Some(u8::MAX as f64)),
        IntKind::U16 => s.with_bounds(Some(0.0), Some(u16::MAX as f64)),
        IntKind::U32 => s.with_bounds(Some(0.0), Some(u32::MAX as f64)),
        IntKind::U64 => s.with_bounds(Some(0.0), Some(u64::MAX as f64)),
        IntKind::U128 => s.with_bounds(Some(0.0), None).with_format("uint128"),
        IntKind::Usize => s.with_bounds(Some(0.0), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_wrappers_need_exact_field_names() {
        let wrapper = StructShape::new()
            .field::<Option<String>>("Ref").json("$ref,omitempty")
            .field::<Option<u32>>("Value").json("value,omitempty");
        let found = reference_wrapper("AccountRef", &wrapper).unwrap();
        assert_eq!(found.id(), TypeRef::of::<Option<u32>>().id());
        assert!(reference_wrapper("Account", &wrapper).is_none());

        let price = StructShape::new()
            .field::<String>("Currency").json("currency")
            .field::<f64>("Value").json("value");
        assert!(reference_wrapper("PriceRef", &price).is_none());

        let lowercase = StructShape::new()
            .field::<String>("ref").json("ref")
            .field::<f64>("value").json("value");
        assert!(reference_wrapper("PriceRef", &lowercase).is_none());
    }
}
