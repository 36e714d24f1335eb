use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use enum_dispatch::enum_dispatch;

use crate::types::{TypeId, Visibility};
use crate::universe::Universe;
use crate::value::Value;

/// Runtime behavior of a method or constructor, supplied by the host at
/// registration time. Receives the universe, the receiver (None for static
/// invocations), and the already-packed argument list.
pub type NativeBody =
    Arc<dyn Fn(&Universe, Option<&Value>, &[Value]) -> Result<Value, String> + Send + Sync>;

pub struct MethodData {
    pub name: Arc<str>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub variadic: bool,
    pub params: Vec<TypeId>,
    pub return_type: TypeId,
    /// None marks an abstract declaration (or a bodiless interface method).
    pub body: Option<NativeBody>,
}

pub struct ConstructorData {
    pub visibility: Visibility,
    pub variadic: bool,
    pub params: Vec<TypeId>,
    pub body: Option<NativeBody>,
}

pub struct FieldData {
    pub name: Arc<str>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_final: bool,
    pub ty: TypeId,
    /// Starting value for freshly allocated slots; the type's zero value
    /// when absent.
    pub initial: Option<Value>,
}

/// Handle to a resolved method. Equality and hashing are pointer identity
/// over the shared descriptor data, so two handles are equal exactly when
/// they name the same declared member.
#[derive(Clone)]
pub struct MethodDescription {
    pub parent: TypeId,
    pub index: usize,
    pub data: Arc<MethodData>,
}

impl Debug for MethodDescription {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.data.is_static {
            write!(f, "static ")?;
        }
        write!(f, "{}::{}/{}", self.parent, self.data.name, self.data.params.len())
    }
}

impl PartialEq for MethodDescription {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for MethodDescription {}

impl Hash for MethodDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.data).hash(state);
    }
}

#[derive(Clone)]
pub struct ConstructorDescription {
    pub parent: TypeId,
    pub index: usize,
    pub data: Arc<ConstructorData>,
}

impl Debug for ConstructorDescription {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}::<init>/{}", self.parent, self.data.params.len())
    }
}

impl PartialEq for ConstructorDescription {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for ConstructorDescription {}

impl Hash for ConstructorDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.data).hash(state);
    }
}

#[derive(Clone)]
pub struct FieldDescription {
    pub parent: TypeId,
    pub index: usize,
    pub data: Arc<FieldData>,
}

impl Debug for FieldDescription {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.data.is_static {
            write!(f, "static ")?;
        }
        write!(f, "{}::{}", self.parent, self.data.name)
    }
}

impl PartialEq for FieldDescription {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for FieldDescription {}

impl Hash for FieldDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.data).hash(state);
    }
}

/// The pieces of an executable the matcher and invoker care about,
/// independent of whether it is a method or a constructor.
#[enum_dispatch]
pub trait ExecutableInfo {
    fn owner(&self) -> TypeId;
    fn param_types(&self) -> &[TypeId];
    fn is_variadic(&self) -> bool;
    fn is_static(&self) -> bool;
    fn visibility(&self) -> Visibility;
    fn body(&self) -> Option<&NativeBody>;
    /// Short diagnostic label; constructors have no member name of their own.
    fn label(&self) -> Arc<str>;
}

impl ExecutableInfo for MethodDescription {
    fn owner(&self) -> TypeId {
        self.parent
    }

    fn param_types(&self) -> &[TypeId] {
        &self.data.params
    }

    fn is_variadic(&self) -> bool {
        self.data.variadic
    }

    fn is_static(&self) -> bool {
        self.data.is_static
    }

    fn visibility(&self) -> Visibility {
        self.data.visibility
    }

    fn body(&self) -> Option<&NativeBody> {
        self.data.body.as_ref()
    }

    fn label(&self) -> Arc<str> {
        Arc::clone(&self.data.name)
    }
}

impl ExecutableInfo for ConstructorDescription {
    fn owner(&self) -> TypeId {
        self.parent
    }

    fn param_types(&self) -> &[TypeId] {
        &self.data.params
    }

    fn is_variadic(&self) -> bool {
        self.data.variadic
    }

    fn is_static(&self) -> bool {
        true
    }

    fn visibility(&self) -> Visibility {
        self.data.visibility
    }

    fn body(&self) -> Option<&NativeBody> {
        self.data.body.as_ref()
    }

    fn label(&self) -> Arc<str> {
        Arc::from("<init>")
    }
}

#[enum_dispatch(ExecutableInfo)]
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ExecutableDescription {
    Method(MethodDescription),
    Constructor(ConstructorDescription),
}
