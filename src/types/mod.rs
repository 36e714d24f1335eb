use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use crate::types::members::{ConstructorData, FieldData, MethodData};

pub mod members;

/// Opaque handle to a type in a [`Universe`](crate::universe::Universe).
///
/// Handles are only meaningful within the universe that issued them; the
/// universe is append-only, so a handle never dangles.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TypeId(pub(crate) u32);

impl Display for TypeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The value-like kinds and their boxed counterparts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ValueKind {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ValueKind {
    pub const ALL: [ValueKind; 8] = [
        ValueKind::Bool,
        ValueKind::Char,
        ValueKind::I8,
        ValueKind::I16,
        ValueKind::I32,
        ValueKind::I64,
        ValueKind::F32,
        ValueKind::F64,
    ];

    pub fn primitive_name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Char => "char",
            ValueKind::I8 => "int8",
            ValueKind::I16 => "int16",
            ValueKind::I32 => "int32",
            ValueKind::I64 => "int64",
            ValueKind::F32 => "float32",
            ValueKind::F64 => "float64",
        }
    }

    pub fn boxed_name(self) -> &'static str {
        match self {
            ValueKind::Bool => "Boolean",
            ValueKind::Char => "Char",
            ValueKind::I8 => "Int8",
            ValueKind::I16 => "Int16",
            ValueKind::I32 => "Int32",
            ValueKind::I64 => "Int64",
            ValueKind::F32 => "Float32",
            ValueKind::F64 => "Float64",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Clone, Debug)]
pub enum TypeKind {
    Class { is_abstract: bool },
    Interface,
    Enum,
    Primitive(ValueKind),
    Boxed(ValueKind),
    Array { component: TypeId },
    Void,
}

/// Descriptor data for one type. Immutable once the type is defined.
pub struct TypeData {
    pub id: TypeId,
    pub name: Arc<str>,
    pub kind: TypeKind,
    pub superclass: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub methods: Vec<Arc<MethodData>>,
    pub constructors: Vec<Arc<ConstructorData>>,
    pub fields: Vec<Arc<FieldData>>,
    pub enum_constants: Vec<Arc<str>>,
}

impl TypeData {
    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum)
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(_) | TypeKind::Void)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn component(&self) -> Option<TypeId> {
        match self.kind {
            TypeKind::Array { component } => Some(component),
            _ => None,
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Class { is_abstract: true })
    }

    /// Whether `new_instance` may allocate this type at all.
    pub fn is_instantiable(&self) -> bool {
        matches!(self.kind, TypeKind::Class { is_abstract: false })
    }
}

impl Debug for TypeData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.name)
    }
}

/// Member and type names must look like identifiers; anything else is a
/// malformed request, not a failed lookup.
pub(crate) fn is_valid_member_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
