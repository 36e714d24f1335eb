//! The host-owned type universe.
//!
//! Types are registered once (declare, then define) and never change
//! afterwards; the engine treats the universe as append-only for the life of
//! the process. Member behavior is supplied as native closures at
//! registration time, so no code generation is involved anywhere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{ReflectionError, Result};
use crate::types::members::{
    ConstructorData, FieldData, FieldDescription, MethodData, NativeBody,
};
use crate::types::{is_valid_member_name, TypeData, TypeId, TypeKind, ValueKind, Visibility};
use crate::value::{EnumConstant, Value};

enum TypeSlot {
    /// Name reserved, definition pending. Forward references from member
    /// signatures are allowed; supertypes are not.
    Declared(Arc<str>),
    Defined(Arc<TypeData>),
}

impl TypeSlot {
    fn name(&self) -> &Arc<str> {
        match self {
            TypeSlot::Declared(name) => name,
            TypeSlot::Defined(data) => &data.name,
        }
    }
}

struct CoreTypes {
    object: TypeId,
    string: TypeId,
    enum_base: TypeId,
    void: TypeId,
    primitives: [TypeId; 8],
    boxes: [TypeId; 8],
}

/// What the engine is asking permission for when a member is not freely
/// accessible. Requests are made immediately before every access and are
/// never cached.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessKind {
    Visibility,
    Finality,
}

#[derive(Clone, Copy, Debug)]
pub struct AccessRequest<'a> {
    pub owner: TypeId,
    pub member: &'a str,
    pub kind: AccessKind,
}

pub struct Universe {
    types: RwLock<Vec<TypeSlot>>,
    names: RwLock<FxHashMap<Arc<str>, TypeId>>,
    array_types: RwLock<FxHashMap<TypeId, TypeId>>,
    statics: RwLock<FxHashMap<(TypeId, usize), Value>>,
    value_to_boxed: FxHashMap<TypeId, TypeId>,
    boxed_to_value: FxHashMap<TypeId, TypeId>,
    core: CoreTypes,
    bypass_granted: AtomicBool,
}

impl Universe {
    pub fn new() -> Self {
        let mut types = Vec::new();
        let mut names = FxHashMap::default();

        let mut install = |name: &str, kind: TypeKind, superclass: Option<TypeId>| {
            let id = TypeId(types.len() as u32);
            let name: Arc<str> = Arc::from(name);
            types.push(TypeSlot::Defined(Arc::new(TypeData {
                id,
                name: Arc::clone(&name),
                kind,
                superclass,
                interfaces: Vec::new(),
                methods: Vec::new(),
                constructors: Vec::new(),
                fields: Vec::new(),
                enum_constants: Vec::new(),
            })));
            names.insert(name, id);
            id
        };

        let object = install("Object", TypeKind::Class { is_abstract: false }, None);
        let string = install("String", TypeKind::Class { is_abstract: false }, Some(object));
        let enum_base = install("Enum", TypeKind::Class { is_abstract: true }, Some(object));
        let void = install("void", TypeKind::Void, None);

        let mut primitives = [object; 8];
        let mut boxes = [object; 8];
        for (i, kind) in ValueKind::ALL.into_iter().enumerate() {
            primitives[i] = install(kind.primitive_name(), TypeKind::Primitive(kind), None);
            boxes[i] = install(kind.boxed_name(), TypeKind::Boxed(kind), Some(object));
        }

        let mut value_to_boxed = FxHashMap::default();
        let mut boxed_to_value = FxHashMap::default();
        for i in 0..ValueKind::ALL.len() {
            value_to_boxed.insert(primitives[i], boxes[i]);
            boxed_to_value.insert(boxes[i], primitives[i]);
        }

        Self {
            types: RwLock::new(types),
            names: RwLock::new(names),
            array_types: RwLock::new(FxHashMap::default()),
            statics: RwLock::new(FxHashMap::default()),
            value_to_boxed,
            boxed_to_value,
            core: CoreTypes {
                object,
                string,
                enum_base,
                void,
                primitives,
                boxes,
            },
            bypass_granted: AtomicBool::new(true),
        }
    }

    pub fn object_type(&self) -> TypeId {
        self.core.object
    }

    pub fn string_type(&self) -> TypeId {
        self.core.string
    }

    pub fn void_type(&self) -> TypeId {
        self.core.void
    }

    pub fn primitive(&self, kind: ValueKind) -> TypeId {
        self.core.primitives[kind_index(kind)]
    }

    pub fn boxed(&self, kind: ValueKind) -> TypeId {
        self.core.boxes[kind_index(kind)]
    }

    /// Value-kind → boxed-kind table lookup.
    pub fn boxed_counterpart(&self, ty: TypeId) -> Option<TypeId> {
        self.value_to_boxed.get(&ty).copied()
    }

    /// Boxed-kind → value-kind table lookup.
    pub fn value_counterpart(&self, ty: TypeId) -> Option<TypeId> {
        self.boxed_to_value.get(&ty).copied()
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.names.read().get(name).copied()
    }

    pub fn data(&self, id: TypeId) -> Option<Arc<TypeData>> {
        match self.types.read().get(id.0 as usize) {
            Some(TypeSlot::Defined(data)) => Some(Arc::clone(data)),
            _ => None,
        }
    }

    pub fn type_name(&self, id: TypeId) -> Arc<str> {
        match self.types.read().get(id.0 as usize) {
            Some(slot) => Arc::clone(slot.name()),
            None => Arc::from("<unknown>"),
        }
    }

    /// Reserve a name, returning a handle usable in member signatures before
    /// the type is defined.
    pub fn declare(&self, name: &str) -> Result<TypeId> {
        if !is_valid_member_name(name) {
            return Err(ReflectionError::IllegalArgument(format!(
                "invalid type name `{name}`"
            )));
        }
        let name: Arc<str> = Arc::from(name);
        let mut names = self.names.write();
        if names.contains_key(&name) {
            return Err(ReflectionError::IllegalArgument(format!(
                "type `{name}` is already declared"
            )));
        }
        let mut types = self.types.write();
        let id = TypeId(types.len() as u32);
        types.push(TypeSlot::Declared(Arc::clone(&name)));
        names.insert(name, id);
        Ok(id)
    }

    pub fn define_class(&self, id: TypeId, spec: ClassSpec) -> Result<()> {
        let superclass = spec.superclass.unwrap_or(self.core.object);
        let sup = self.data(superclass).ok_or_else(|| {
            ReflectionError::IllegalArgument(format!(
                "superclass {} of `{}` is not defined",
                superclass,
                self.type_name(id)
            ))
        })?;
        if !matches!(sup.kind, TypeKind::Class { .. }) {
            return Err(ReflectionError::IllegalArgument(format!(
                "`{}` cannot extend non-class `{}`",
                self.type_name(id),
                sup.name
            )));
        }
        for &iface in &spec.interfaces {
            match self.data(iface) {
                Some(data) if data.is_interface() => {}
                _ => {
                    return Err(ReflectionError::IllegalArgument(format!(
                        "`{}` implements {} which is not a defined interface",
                        self.type_name(id),
                        iface
                    )))
                }
            }
        }

        let fields = self.build_fields(id, spec.fields)?;
        let methods = self.build_methods(spec.methods)?;
        let constructors = self.build_constructors(spec.constructors)?;

        self.finish_definition(
            id,
            TypeKind::Class {
                is_abstract: spec.is_abstract,
            },
            Some(superclass),
            spec.interfaces,
            methods,
            constructors,
            fields,
            Vec::new(),
        )
    }

    pub fn define_interface(&self, id: TypeId, spec: InterfaceSpec) -> Result<()> {
        for &iface in &spec.extends {
            match self.data(iface) {
                Some(data) if data.is_interface() => {}
                _ => {
                    return Err(ReflectionError::IllegalArgument(format!(
                        "`{}` extends {} which is not a defined interface",
                        self.type_name(id),
                        iface
                    )))
                }
            }
        }
        let methods = self.build_methods(spec.methods)?;
        self.finish_definition(
            id,
            TypeKind::Interface,
            None,
            spec.extends,
            methods,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
    }

    /// Defines an enum type: its constants become static final fields of the
    /// enum's own type, and a static `value_of(String)` method resolves a
    /// constant by exact name.
    pub fn define_enum(&self, id: TypeId, constants: &[&str]) -> Result<()> {
        let mut seen = FxHashSet::default();
        for c in constants {
            if !is_valid_member_name(c) {
                return Err(ReflectionError::IllegalArgument(format!(
                    "invalid enum constant name `{c}`"
                )));
            }
            if !seen.insert(*c) {
                return Err(ReflectionError::IllegalArgument(format!(
                    "duplicate enum constant `{c}`"
                )));
            }
        }
        let constants: Vec<Arc<str>> = constants.iter().map(|c| Arc::from(*c)).collect();

        let fields: Vec<Arc<FieldData>> = constants
            .iter()
            .enumerate()
            .map(|(ordinal, name)| {
                Arc::new(FieldData {
                    name: Arc::clone(name),
                    visibility: Visibility::Public,
                    is_static: true,
                    is_final: true,
                    ty: id,
                    initial: Some(Value::Enum(EnumConstant {
                        ty: id,
                        ordinal: ordinal as u32,
                    })),
                })
            })
            .collect();

        let type_name = self.type_name(id);
        let lookup = constants.clone();
        let body: NativeBody = Arc::new(move |_, _, args: &[Value]| {
            let wanted = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| "value_of expects a constant name".to_string())?;
            match lookup.iter().position(|c| &**c == wanted) {
                Some(ordinal) => Ok(Value::Enum(EnumConstant {
                    ty: id,
                    ordinal: ordinal as u32,
                })),
                None => Err(format!("no enum constant {wanted} in {type_name}")),
            }
        });
        let value_of = Arc::new(MethodData {
            name: Arc::from("value_of"),
            visibility: Visibility::Public,
            is_static: true,
            variadic: false,
            params: vec![self.core.string],
            return_type: id,
            body: Some(body),
        });

        self.finish_definition(
            id,
            TypeKind::Enum,
            Some(self.core.enum_base),
            Vec::new(),
            vec![value_of],
            Vec::new(),
            fields,
            constants,
        )
    }

    /// Interned array type over `component`, created on first use.
    pub fn array_of(&self, component: TypeId) -> TypeId {
        if let Some(&id) = self.array_types.read().get(&component) {
            return id;
        }
        let mut arrays = self.array_types.write();
        if let Some(&id) = arrays.get(&component) {
            return id;
        }
        let name: Arc<str> = Arc::from(format!("{}[]", self.type_name(component)));
        let mut types = self.types.write();
        let id = TypeId(types.len() as u32);
        types.push(TypeSlot::Defined(Arc::new(TypeData {
            id,
            name: Arc::clone(&name),
            kind: TypeKind::Array { component },
            superclass: Some(self.core.object),
            interfaces: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            fields: Vec::new(),
            enum_constants: Vec::new(),
        })));
        drop(types);
        self.names.write().insert(name, id);
        arrays.insert(component, id);
        id
    }

    pub fn component_of(&self, id: TypeId) -> Option<TypeId> {
        self.data(id).and_then(|data| data.component())
    }

    /// Subtype test: identity, class ancestry, interface implementation
    /// (transitive), array covariance, and Object as the top of every
    /// non-primitive type. Primitives and void are only assignable to
    /// themselves; value↔boxed widening is the matcher's job, not this one's.
    pub fn is_assignable(&self, target: TypeId, source: TypeId) -> bool {
        if target == source {
            return true;
        }
        let (Some(t), Some(s)) = (self.data(target), self.data(source)) else {
            return false;
        };
        if t.is_primitive() || s.is_primitive() {
            return false;
        }
        if target == self.core.object {
            return true;
        }
        if let (Some(tc), Some(sc)) = (t.component(), s.component()) {
            return self.is_assignable(tc, sc);
        }

        let mut seen = FxHashSet::default();
        let mut queue = vec![source];
        seen.insert(source);
        while let Some(current) = queue.pop() {
            if current == target {
                return true;
            }
            if let Some(data) = self.data(current) {
                if let Some(sup) = data.superclass {
                    if seen.insert(sup) {
                        queue.push(sup);
                    }
                }
                for &iface in &data.interfaces {
                    if seen.insert(iface) {
                        queue.push(iface);
                    }
                }
            }
        }
        false
    }

    /// Zero value used for unset field slots.
    pub fn default_value(&self, ty: TypeId) -> Value {
        match self.data(ty).map(|d| d.kind.clone()) {
            Some(TypeKind::Primitive(kind)) => match kind {
                ValueKind::Bool => Value::Bool(false),
                ValueKind::Char => Value::Char('\0'),
                ValueKind::I8 => Value::I8(0),
                ValueKind::I16 => Value::I16(0),
                ValueKind::I32 => Value::I32(0),
                ValueKind::I64 => Value::I64(0),
                ValueKind::F32 => Value::F32(0.0),
                ValueKind::F64 => Value::F64(0.0),
            },
            _ => Value::Null,
        }
    }

    /// Directly-declared field handle, bypassing the engine's caches and
    /// policies. Intended for hosts wiring up constructor bodies.
    pub fn declared_field(&self, owner: TypeId, name: &str) -> Option<FieldDescription> {
        let data = self.data(owner)?;
        data.fields
            .iter()
            .enumerate()
            .find(|(_, f)| &*f.name == name)
            .map(|(index, f)| FieldDescription {
                parent: owner,
                index,
                data: Arc::clone(f),
            })
    }

    /// Environment policy for visibility/finality bypass. The engine
    /// requests this capability before every privileged access; it never
    /// assumes a grant.
    pub fn grant_bypass(&self, _request: AccessRequest<'_>) -> bool {
        self.bypass_granted.load(Ordering::Relaxed)
    }

    pub fn set_bypass_granted(&self, granted: bool) {
        self.bypass_granted.store(granted, Ordering::Relaxed);
    }

    pub(crate) fn static_get(&self, owner: TypeId, index: usize) -> Option<Value> {
        self.statics.read().get(&(owner, index)).cloned()
    }

    pub(crate) fn static_set(&self, owner: TypeId, index: usize, value: Value) -> bool {
        let mut statics = self.statics.write();
        match statics.get_mut(&(owner, index)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn build_fields(&self, owner: TypeId, specs: Vec<FieldSpec>) -> Result<Vec<Arc<FieldData>>> {
        let mut seen = FxHashSet::default();
        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            if !is_valid_member_name(&spec.name) {
                return Err(ReflectionError::IllegalArgument(format!(
                    "invalid field name `{}`",
                    spec.name
                )));
            }
            if !seen.insert(spec.name.clone()) {
                return Err(ReflectionError::IllegalArgument(format!(
                    "duplicate field `{}` on `{}`",
                    spec.name,
                    self.type_name(owner)
                )));
            }
            fields.push(Arc::new(FieldData {
                name: Arc::from(spec.name.as_str()),
                visibility: spec.visibility,
                is_static: spec.is_static,
                is_final: spec.is_final,
                ty: spec.ty,
                initial: spec.initial,
            }));
        }
        Ok(fields)
    }

    fn build_methods(&self, specs: Vec<MethodSpec>) -> Result<Vec<Arc<MethodData>>> {
        let mut methods = Vec::with_capacity(specs.len());
        for spec in specs {
            if !is_valid_member_name(&spec.name) {
                return Err(ReflectionError::IllegalArgument(format!(
                    "invalid method name `{}`",
                    spec.name
                )));
            }
            self.check_variadic(spec.variadic, &spec.params, &spec.name)?;
            methods.push(Arc::new(MethodData {
                name: Arc::from(spec.name.as_str()),
                visibility: spec.visibility,
                is_static: spec.is_static,
                variadic: spec.variadic,
                params: spec.params,
                return_type: spec.return_type,
                body: spec.body,
            }));
        }
        Ok(methods)
    }

    fn build_constructors(
        &self,
        specs: Vec<ConstructorSpec>,
    ) -> Result<Vec<Arc<ConstructorData>>> {
        let mut constructors = Vec::with_capacity(specs.len());
        for spec in specs {
            self.check_variadic(spec.variadic, &spec.params, "<init>")?;
            constructors.push(Arc::new(ConstructorData {
                visibility: spec.visibility,
                variadic: spec.variadic,
                params: spec.params,
                body: spec.body,
            }));
        }
        Ok(constructors)
    }

    fn check_variadic(&self, variadic: bool, params: &[TypeId], label: &str) -> Result<()> {
        if !variadic {
            return Ok(());
        }
        let tail_is_array = params
            .last()
            .is_some_and(|&last| self.component_of(last).is_some());
        if tail_is_array {
            Ok(())
        } else {
            Err(ReflectionError::IllegalArgument(format!(
                "variadic member `{label}` must take an array as its last parameter"
            )))
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_definition(
        &self,
        id: TypeId,
        kind: TypeKind,
        superclass: Option<TypeId>,
        interfaces: Vec<TypeId>,
        methods: Vec<Arc<MethodData>>,
        constructors: Vec<Arc<ConstructorData>>,
        fields: Vec<Arc<FieldData>>,
        enum_constants: Vec<Arc<str>>,
    ) -> Result<()> {
        let mut types = self.types.write();
        let slot = types.get_mut(id.0 as usize).ok_or_else(|| {
            ReflectionError::IllegalArgument(format!("type {id} was never declared"))
        })?;
        let name = match slot {
            TypeSlot::Declared(name) => Arc::clone(name),
            TypeSlot::Defined(data) => {
                return Err(ReflectionError::IllegalArgument(format!(
                    "type `{}` is already defined",
                    data.name
                )))
            }
        };

        let data = Arc::new(TypeData {
            id,
            name,
            kind,
            superclass,
            interfaces,
            methods,
            constructors,
            fields,
            enum_constants,
        });
        let mut statics = self.statics.write();
        for (index, field) in data.fields.iter().enumerate() {
            if field.is_static {
                let initial = field
                    .initial
                    .clone()
                    .unwrap_or_else(|| self.default_value(field.ty));
                statics.insert((id, index), initial);
            }
        }
        *slot = TypeSlot::Defined(data);
        Ok(())
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_index(kind: ValueKind) -> usize {
    match kind {
        ValueKind::Bool => 0,
        ValueKind::Char => 1,
        ValueKind::I8 => 2,
        ValueKind::I16 => 3,
        ValueKind::I32 => 4,
        ValueKind::I64 => 5,
        ValueKind::F32 => 6,
        ValueKind::F64 => 7,
    }
}

/// Builder for a class definition.
#[derive(Default)]
pub struct ClassSpec {
    superclass: Option<TypeId>,
    interfaces: Vec<TypeId>,
    is_abstract: bool,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
    constructors: Vec<ConstructorSpec>,
}

impl ClassSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extends(mut self, superclass: TypeId) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: TypeId) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn constructor(mut self, constructor: ConstructorSpec) -> Self {
        self.constructors.push(constructor);
        self
    }
}

#[derive(Default)]
pub struct InterfaceSpec {
    extends: Vec<TypeId>,
    methods: Vec<MethodSpec>,
}

impl InterfaceSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extends(mut self, interface: TypeId) -> Self {
        self.extends.push(interface);
        self
    }

    /// A method with a body is a default method; without one it is a bare
    /// interface declaration.
    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }
}

pub struct FieldSpec {
    name: String,
    ty: TypeId,
    visibility: Visibility,
    is_static: bool,
    is_final: bool,
    initial: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: &str, ty: TypeId) -> Self {
        Self {
            name: name.to_string(),
            ty,
            visibility: Visibility::Public,
            is_static: false,
            is_final: false,
            initial: None,
        }
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn private_(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn initial(mut self, value: Value) -> Self {
        self.initial = Some(value);
        self
    }
}

pub struct MethodSpec {
    name: String,
    return_type: TypeId,
    params: Vec<TypeId>,
    visibility: Visibility,
    is_static: bool,
    variadic: bool,
    body: Option<NativeBody>,
}

impl MethodSpec {
    pub fn new(name: &str, return_type: TypeId) -> Self {
        Self {
            name: name.to_string(),
            return_type,
            params: Vec::new(),
            visibility: Visibility::Public,
            is_static: false,
            variadic: false,
            body: None,
        }
    }

    pub fn params(mut self, params: impl IntoIterator<Item = TypeId>) -> Self {
        self.params = params.into_iter().collect();
        self
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn private_(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn body(
        mut self,
        body: impl Fn(&Universe, Option<&Value>, &[Value]) -> std::result::Result<Value, String>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.body = Some(Arc::new(body));
        self
    }
}

pub struct ConstructorSpec {
    params: Vec<TypeId>,
    visibility: Visibility,
    variadic: bool,
    body: Option<NativeBody>,
}

impl ConstructorSpec {
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            visibility: Visibility::Public,
            variadic: false,
            body: None,
        }
    }

    pub fn params(mut self, params: impl IntoIterator<Item = TypeId>) -> Self {
        self.params = params.into_iter().collect();
        self
    }

    pub fn private_(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn body(
        mut self,
        body: impl Fn(&Universe, Option<&Value>, &[Value]) -> std::result::Result<Value, String>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.body = Some(Arc::new(body));
        self
    }
}

impl Default for ConstructorSpec {
    fn default() -> Self {
        Self::new()
    }
}
