//! Per-type field metadata, resolved once and shared.
//!
//! A [`TypeInfo`] lists the visible fields of a record type sorted by their
//! serialized name. Embedded records are spliced into their parent at an
//! extended index path; unexported, excluded and function/channel fields are
//! dropped. Constraint tags are parsed here, so grammar errors surface the
//! first time a type is looked at.
pub mod field;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::introspect::{Introspect, Shape, StructShape, TypeRef, Visibility};
use crate::tags::{self, FieldTag};

pub use field::{BsonInfo, JsonInfo};

const INLINE_BSON: &str = ",inline";

#[derive(Debug, Clone)]
pub struct Field {
    /// Serialized name after namespace precedence.
    pub name: String,
    pub ty: TypeRef,
    /// Position from the owning type, one step per spliced embedding.
    pub index: Vec<usize>,
    pub json: Option<JsonInfo>,
    pub bson: Option<BsonInfo>,
    pub validator: Option<FieldTag>,
}

#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub ty: TypeRef,
    pub name: String,
    pub shape: Shape,
    pub fields: Vec<Field>,
}

impl TypeInfo {
    pub fn id(&self) -> TypeId { self.ty.id() }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn resolve(ty: TypeRef) -> Result<TypeInfo> {
        let shape = ty.shape();
        let name = ty.name().into_owned();
        let mut fields = Vec::new();
        if let Shape::Struct(def) = &shape {
            let mut splicing = vec![ty.id()];
            append_fields(&mut fields, &name, &[], def, &mut splicing)?;
            // stable: equal names keep declaration order
            fields.sort_by(|a, b| a.name.cmp(&b.name).then(a.index.len().cmp(&b.index.len())));
            fields.dedup_by(|later, kept| later.name == kept.name);
        }
        Ok(TypeInfo { ty, name, shape, fields })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CACHE
// ————————————————————————————————————————————————————————————————————————————

/// Read-mostly map from stripped type to its metadata.
///
/// Misses are computed outside the lock; when two threads race on the same
/// type the first insert wins and both observe the same `Arc`.
#[derive(Debug, Default)]
pub struct TypeInfoCache {
    cache: RwLock<HashMap<TypeId, Arc<TypeInfo>>>,
}

impl TypeInfoCache {
    pub fn new() -> Self { Self::default() }

    pub fn get<T: Introspect>(&self) -> Result<Arc<TypeInfo>> {
        self.get_type_info(TypeRef::of::<T>())
    }

    pub fn get_type_info(&self, ty: TypeRef) -> Result<Arc<TypeInfo>> {
        let (ty, _) = ty.strip_indirection();

        let hit = self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ty.id())
            .cloned();
        if let Some(info) = hit {
            return Ok(info);
        }

        let info = Arc::new(TypeInfo::resolve(ty)?);
        tracing::debug!(type_name = %info.name, fields = info.fields.len(), "resolved type info");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(ty.id()).or_insert(info)))
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

// ————————————————————————————————————————————————————————————————————————————
// FIELD RESOLUTION
// ————————————————————————————————————————————————————————————————————————————

fn append_fields(
    out: &mut Vec<Field>,
    owner: &str,
    parent_index: &[usize],
    def: &StructShape,
    splicing: &mut Vec<TypeId>,
) -> Result<()> {
    for (i, raw) in def.fields().iter().enumerate() {
        let (target, shape) = raw.ty.strip_indirection();
        if matches!(shape, Shape::Func | Shape::Chan) {
            continue;
        }

        let json_tag = raw.json.as_deref();
        let bson_tag = raw.bson.as_deref();
        if field::is_excluded(&[json_tag, bson_tag]) {
            continue;
        }

        let mut index = Vec::with_capacity(parent_index.len() + 1);
        index.extend_from_slice(parent_index);
        index.push(i);

        if raw.embedded && (json_tag.unwrap_or_default().is_empty() || bson_tag == Some(INLINE_BSON)) {
            if let Shape::Struct(inner) = &shape {
                if !splicing.contains(&target.id()) {
                    splicing.push(target.id());
                    let spliced = append_fields(out, owner, &index, inner, splicing);
                    splicing.pop();
                    spliced?;
                    continue;
                }
            }
        }

        if raw.visibility == Visibility::Private {
            continue;
        }

        let codec = target.codec();
        let mut name = raw.name.clone().into_owned();

        let bson = match bson_tag.and_then(|tag| BsonInfo::resolve(tag, codec)) {
            Some((renamed, info)) => {
                if let Some(renamed) = renamed {
                    name = renamed;
                }
                Some(info)
            }
            None => None,
        };
        let json = match json_tag.and_then(|tag| JsonInfo::resolve(tag, codec)) {
            Some((renamed, info)) => {
                if let Some(renamed) = renamed {
                    name = renamed;
                }
                Some(info)
            }
            None => None,
        };

        let validator = match raw.validate.as_deref().filter(|tag| !tag.is_empty()) {
            Some(tag) => Some(tags::parse(tag).map_err(|source| Error::Tag {
                type_name: owner.to_owned(),
                field: raw.name.clone().into_owned(),
                source,
            })?),
            None => None,
        };

        out.push(Field { name, ty: raw.ty, index, json, bson, validator });
    }
    Ok(())
}
