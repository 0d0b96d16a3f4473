//! Static type description.
//!
//! Rust has no runtime reflection, so every type that takes part in schema
//! generation describes itself through [`Introspect`]. Child types are held as
//! [`TypeRef`] handles whose shape is produced on demand, which lets a type
//! mention itself (through `Box`, `Vec`, ...) without recursing while it is
//! being described.
pub mod impls;

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

// ————————————————————————————————————————————————————————————————————————————
// TRAIT
// ————————————————————————————————————————————————————————————————————————————

pub trait Introspect: 'static {
    /// Custom (un)marshaler presence, per serialization namespace.
    const CODEC: Codec = Codec::NONE;

    fn shape() -> Shape;

    fn type_name() -> Cow<'static, str> {
        Cow::Owned(short_type_name(std::any::type_name::<Self>()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codec {
    pub json_marshaler: bool,
    pub json_unmarshaler: bool,
    pub bson_marshaler: bool,
    pub bson_unmarshaler: bool,
}

impl Codec {
    pub const NONE: Codec = Codec {
        json_marshaler: false,
        json_unmarshaler: false,
        bson_marshaler: false,
        bson_unmarshaler: false,
    };
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE HANDLES
// ————————————————————————————————————————————————————————————————————————————

/// Cheap, copyable handle to an [`Introspect`] type.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    name: fn() -> Cow<'static, str>,
    shape: fn() -> Shape,
    codec: Codec,
}

impl TypeRef {
    pub fn of<T: Introspect>() -> Self {
        TypeRef {
            id: TypeId::of::<T>(),
            name: T::type_name,
            shape: T::shape,
            codec: T::CODEC,
        }
    }
    pub fn id(&self) -> TypeId { self.id }
    pub fn name(&self) -> Cow<'static, str> { (self.name)() }
    pub fn shape(&self) -> Shape { (self.shape)() }
    pub fn codec(&self) -> Codec { self.codec }

    /// Follows `Optional`/`Pointer` wrappers down to the first concrete type.
    pub fn strip_indirection(self) -> (TypeRef, Shape) {
        let mut ty = self;
        loop {
            match ty.shape() {
                Shape::Optional(inner) | Shape::Pointer(inner) => ty = inner,
                shape => return (ty, shape),
            }
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state) }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.name()).finish()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SHAPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub enum Shape {
    Bool,
    Int(IntKind),
    Float(FloatKind),
    Char,
    String,
    /// Unit-only enum, serialized by variant name.
    Enum(Vec<Cow<'static, str>>),
    DateTime,
    Date,
    /// Opaque, already-encoded JSON.
    RawJson,
    Sequence {
        elem: TypeRef,
        len: Option<usize>, // fixed arity for arrays
        unique: bool,       // sets
    },
    Map { key: TypeRef, value: TypeRef },
    Struct(StructShape),
    Optional(TypeRef),
    Pointer(TypeRef),
    Func,
    Chan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind { I8, I16, I32, I64, I128, Isize, U8, U16, U32, U64, U128, Usize }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind { F32, F64 }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// One declared struct field, before any tag is interpreted.
#[derive(Debug, Clone)]
pub struct RawField {
    pub name: Cow<'static, str>,
    pub ty: TypeRef,
    pub visibility: Visibility,
    pub embedded: bool,
    pub json: Option<Cow<'static, str>>,
    pub bson: Option<Cow<'static, str>>,
    pub validate: Option<Cow<'static, str>>,
}

/// Declared fields of a record type, in declaration order.
///
/// ```ignore
/// Shape::Struct(StructShape::new()
///     .field::<String>("Name").json("name").validate("required")
///     .field::<u8>("Age").json("age").validate("required,gte=18")
///     .private::<String>("secret"))
/// ```
///
/// Tag setters apply to the most recently declared field.
#[derive(Debug, Clone, Default)]
pub struct StructShape {
    fields: Vec<RawField>,
}

impl StructShape {
    pub fn new() -> Self { Self::default() }

    pub fn field<T: Introspect>(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.push(name.into(), TypeRef::of::<T>(), Visibility::Public, false)
    }

    /// Declares an unexported field; it never shows up in a schema.
    pub fn private<T: Introspect>(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.push(name.into(), TypeRef::of::<T>(), Visibility::Private, false)
    }

    /// Declares an anonymous field whose own fields are promoted into this one.
    pub fn embed<T: Introspect>(self) -> Self {
        self.push(T::type_name(), TypeRef::of::<T>(), Visibility::Public, true)
    }

    pub fn json(self, tag: impl Into<Cow<'static, str>>) -> Self {
        self.tag_last(|f| f.json = Some(tag.into()))
    }

    pub fn bson(self, tag: impl Into<Cow<'static, str>>) -> Self {
        self.tag_last(|f| f.bson = Some(tag.into()))
    }

    pub fn validate(self, tag: impl Into<Cow<'static, str>>) -> Self {
        self.tag_last(|f| f.validate = Some(tag.into()))
    }

    pub fn fields(&self) -> &[RawField] { &self.fields }

    pub fn field_named(&self, name: &str) -> Option<&RawField> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn push(mut self, name: Cow<'static, str>, ty: TypeRef, visibility: Visibility, embedded: bool) -> Self {
        self.fields.push(RawField {
            name,
            ty,
            visibility,
            embedded,
            json: None,
            bson: None,
            validate: None,
        });
        self
    }

    fn tag_last(mut self, apply: impl FnOnce(&mut RawField)) -> Self {
        if let Some(last) = self.fields.last_mut() {
            apply(last);
        }
        self
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// `alloc::vec::Vec<app::model::User>` → `Vec<User>`
pub fn short_type_name(full: &str) -> String {
    fn last_segment(path: &str) -> &str {
        path.rsplit("::").next().unwrap_or(path)
    }

    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        match c {
            '<' | '>' | ',' | '[' | ']' | '(' | ')' | ';' | '&' | '*' | ' ' => {
                out.push_str(last_segment(&segment));
                segment.clear();
                out.push(c);
            }
            _ => segment.push(c),
        }
    }
    out.push_str(last_segment(&segment));
    out
}
