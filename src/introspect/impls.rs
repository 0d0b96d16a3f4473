//! `Introspect` for std, indexmap, serde_json and chrono types.
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, SyncSender};
use std::time::SystemTime;

use indexmap::{IndexMap, IndexSet};

use super::{FloatKind, IntKind, Introspect, Shape, TypeRef};

macro_rules! introspect_leaf {
    ($($ty:ty => $shape:expr, $name:literal;)*) => {
        $(
            impl Introspect for $ty {
                fn shape() -> Shape { $shape }
                fn type_name() -> Cow<'static, str> { Cow::Borrowed($name) }
            }
        )*
    };
}

introspect_leaf! {
    bool => Shape::Bool, "bool";
    i8 => Shape::Int(IntKind::I8), "i8";
    i16 => Shape::Int(IntKind::I16), "i16";
    i32 => Shape::Int(IntKind::I32), "i32";
    i64 => Shape::Int(IntKind::I64), "i64";
    i128 => Shape::Int(IntKind::I128), "i128";
    isize => Shape::Int(IntKind::Isize), "isize";
    u8 => Shape::Int(IntKind::U8), "u8";
    u16 => Shape::Int(IntKind::U16), "u16";
    u32 => Shape::Int(IntKind::U32), "u32";
    u64 => Shape::Int(IntKind::U64), "u64";
    u128 => Shape::Int(IntKind::U128), "u128";
    usize => Shape::Int(IntKind::Usize), "usize";
    f32 => Shape::Float(FloatKind::F32), "f32";
    f64 => Shape::Float(FloatKind::F64), "f64";
    char => Shape::Char, "char";
    String => Shape::String, "String";
    &'static str => Shape::String, "str";
    Cow<'static, str> => Shape::String, "String";
    serde_json::Value => Shape::RawJson, "RawJson";
    SystemTime => Shape::DateTime, "DateTime";
    chrono::NaiveDateTime => Shape::DateTime, "DateTime";
    chrono::NaiveDate => Shape::Date, "Date";
}

impl<Tz: chrono::TimeZone + 'static> Introspect for chrono::DateTime<Tz> {
    fn shape() -> Shape { Shape::DateTime }
    fn type_name() -> Cow<'static, str> { Cow::Borrowed("DateTime") }
}

// ------------------------------ Sequences -------------------------------- //

fn list<T: Introspect>() -> Shape {
    Shape::Sequence { elem: TypeRef::of::<T>(), len: None, unique: false }
}

fn set<T: Introspect>() -> Shape {
    Shape::Sequence { elem: TypeRef::of::<T>(), len: None, unique: true }
}

impl<T: Introspect> Introspect for Vec<T> {
    fn shape() -> Shape { list::<T>() }
}

impl<T: Introspect> Introspect for VecDeque<T> {
    fn shape() -> Shape { list::<T>() }
}

impl<T: Introspect, const N: usize> Introspect for [T; N] {
    fn shape() -> Shape {
        Shape::Sequence { elem: TypeRef::of::<T>(), len: Some(N), unique: false }
    }
}

impl<T: Introspect> Introspect for HashSet<T> {
    fn shape() -> Shape { set::<T>() }
}

impl<T: Introspect> Introspect for BTreeSet<T> {
    fn shape() -> Shape { set::<T>() }
}

impl<T: Introspect> Introspect for IndexSet<T> {
    fn shape() -> Shape { set::<T>() }
}

// --------------------------------- Maps ---------------------------------- //

impl<K: Introspect, V: Introspect> Introspect for HashMap<K, V> {
    fn shape() -> Shape { Shape::Map { key: TypeRef::of::<K>(), value: TypeRef::of::<V>() } }
}

impl<K: Introspect, V: Introspect> Introspect for BTreeMap<K, V> {
    fn shape() -> Shape { Shape::Map { key: TypeRef::of::<K>(), value: TypeRef::of::<V>() } }
}

impl<K: Introspect, V: Introspect> Introspect for IndexMap<K, V> {
    fn shape() -> Shape { Shape::Map { key: TypeRef::of::<K>(), value: TypeRef::of::<V>() } }
}

// ------------------------------ Indirection ------------------------------ //

impl<T: Introspect> Introspect for Option<T> {
    fn shape() -> Shape { Shape::Optional(TypeRef::of::<T>()) }
}

impl<T: Introspect> Introspect for Box<T> {
    fn shape() -> Shape { Shape::Pointer(TypeRef::of::<T>()) }
}

impl<T: Introspect> Introspect for Rc<T> {
    fn shape() -> Shape { Shape::Pointer(TypeRef::of::<T>()) }
}

impl<T: Introspect> Introspect for Arc<T> {
    fn shape() -> Shape { Shape::Pointer(TypeRef::of::<T>()) }
}

// ------------------------ No schema representation ----------------------- //

impl<T: 'static> Introspect for Sender<T> {
    fn shape() -> Shape { Shape::Chan }
}

impl<T: 'static> Introspect for SyncSender<T> {
    fn shape() -> Shape { Shape::Chan }
}

impl<T: 'static> Introspect for Receiver<T> {
    fn shape() -> Shape { Shape::Chan }
}

impl<R: 'static> Introspect for fn() -> R {
    fn shape() -> Shape { Shape::Func }
}

impl<A: 'static, R: 'static> Introspect for fn(A) -> R {
    fn shape() -> Shape { Shape::Func }
}

impl<A: 'static, B: 'static, R: 'static> Introspect for fn(A, B) -> R {
    fn shape() -> Shape { Shape::Func }
}
