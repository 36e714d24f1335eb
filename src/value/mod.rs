//! Dynamic runtime values flowing through resolved members.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::types::members::FieldDescription;
use crate::types::{TypeId, ValueKind};
use crate::universe::Universe;

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// Object-wrapped primitive; types as the boxed counterpart of the
    /// wrapped kind.
    Boxed(Box<Value>),
    Str(Arc<str>),
    Enum(EnumConstant),
    Array(ArrayRef),
    Object(ObjectRef),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EnumConstant {
    pub ty: TypeId,
    pub ordinal: u32,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn boxed(self) -> Value {
        match self {
            v @ (Value::Bool(_)
            | Value::Char(_)
            | Value::I8(_)
            | Value::I16(_)
            | Value::I32(_)
            | Value::I64(_)
            | Value::F32(_)
            | Value::F64(_)) => Value::Boxed(Box::new(v)),
            other => other,
        }
    }

    pub fn new_array(elem: TypeId, items: Vec<Value>) -> Value {
        Value::Array(ArrayRef::new(elem, items))
    }

    fn primitive_kind(&self) -> Option<ValueKind> {
        match self {
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::Char(_) => Some(ValueKind::Char),
            Value::I8(_) => Some(ValueKind::I8),
            Value::I16(_) => Some(ValueKind::I16),
            Value::I32(_) => Some(ValueKind::I32),
            Value::I64(_) => Some(ValueKind::I64),
            Value::F32(_) => Some(ValueKind::F32),
            Value::F64(_) => Some(ValueKind::F64),
            _ => None,
        }
    }

    /// Runtime type of this value, or None for null (an unconstrained
    /// argument as far as matching is concerned).
    pub fn type_of(&self, universe: &Universe) -> Option<TypeId> {
        match self {
            Value::Null => None,
            Value::Boxed(inner) => inner.primitive_kind().map(|k| universe.boxed(k)),
            Value::Str(_) => Some(universe.string_type()),
            Value::Enum(e) => Some(e.ty),
            Value::Array(a) => Some(universe.array_of(a.elem())),
            Value::Object(o) => Some(o.ty()),
            other => other.primitive_kind().map(|k| universe.primitive(k)),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Boxed(b) => b.as_bool(),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(v) => Some(*v),
            Value::Boxed(b) => b.as_char(),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self {
            Value::I8(v) => Some(*v),
            Value::Boxed(b) => b.as_i8(),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Value::I16(v) => Some(*v),
            Value::Boxed(b) => b.as_i16(),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            Value::Boxed(b) => b.as_i32(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::Boxed(b) => b.as_i64(),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            Value::Boxed(b) => b.as_f32(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            Value::Boxed(b) => b.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<EnumConstant> {
        match self {
            Value::Enum(e) => Some(*e),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::I8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::I16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (I8(a), I8(b)) => a == b,
            (I16(a), I16(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (F32(a), F32(b)) => a == b,
            (F64(a), F64(b)) => a == b,
            (Boxed(a), Boxed(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Enum(a), Enum(b)) => a == b,
            (Array(a), Array(b)) => {
                a.ptr_eq(b) || (a.elem() == b.elem() && a.to_vec() == b.to_vec())
            }
            (Object(a), Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use Value::*;
        match self {
            Null => write!(f, "null"),
            Bool(v) => write!(f, "{v}"),
            Char(v) => write!(f, "{v:?}"),
            I8(v) => write!(f, "{v}i8"),
            I16(v) => write!(f, "{v}i16"),
            I32(v) => write!(f, "{v}"),
            I64(v) => write!(f, "{v}i64"),
            F32(v) => write!(f, "{v}f32"),
            F64(v) => write!(f, "{v}f64"),
            Boxed(v) => write!(f, "boxed({v:?})"),
            Str(s) => write!(f, "{s:?}"),
            Enum(e) => write!(f, "enum({}, {})", e.ty, e.ordinal),
            Array(a) => write!(f, "array{:?}", a.to_vec()),
            Object(o) => write!(f, "object({})", o.ty()),
        }
    }
}

/// Reference-counted, interiorly mutable typed array.
#[derive(Clone)]
pub struct ArrayRef(Arc<ArrayInner>);

struct ArrayInner {
    elem: TypeId,
    items: RwLock<Vec<Value>>,
}

impl ArrayRef {
    pub fn new(elem: TypeId, items: Vec<Value>) -> Self {
        Self(Arc::new(ArrayInner {
            elem,
            items: RwLock::new(items),
        }))
    }

    pub fn elem(&self) -> TypeId {
        self.0.elem
    }

    pub fn len(&self) -> usize {
        self.0.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.read().get(index).cloned()
    }

    pub fn set(&self, index: usize, value: Value) -> bool {
        let mut items = self.0.items.write();
        match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.read().clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Reference-counted object instance. Slots are keyed by declaring type and
/// field index so shadowed names at different hierarchy levels stay distinct.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectInner>);

struct ObjectInner {
    ty: TypeId,
    slots: RwLock<FxHashMap<(TypeId, usize), Value>>,
}

impl ObjectRef {
    pub(crate) fn with_slots(ty: TypeId, slots: FxHashMap<(TypeId, usize), Value>) -> Self {
        Self(Arc::new(ObjectInner {
            ty,
            slots: RwLock::new(slots),
        }))
    }

    pub fn ty(&self) -> TypeId {
        self.0.ty
    }

    pub fn read_slot(&self, field: &FieldDescription) -> Option<Value> {
        self.0.slots.read().get(&(field.parent, field.index)).cloned()
    }

    /// Fails (returns false) when the object has no such slot, i.e. the
    /// field does not belong to this object's hierarchy.
    pub fn write_slot(&self, field: &FieldDescription, value: Value) -> bool {
        let mut slots = self.0.slots.write();
        match slots.get_mut(&(field.parent, field.index)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "object({})", self.0.ty)
    }
}
