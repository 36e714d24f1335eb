//! The resolution engine: signature-based lookup, cached resolution, and
//! invocation/field access over a host type universe.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::MirrorConfig;
use crate::engine::cache::MemberCache;
use crate::engine::matcher::types_compatible;
use crate::engine::resolve::ResolveMode;
use crate::engine::signature::{ExecutableSignature, FieldSignature};
use crate::error::{ReflectionError, Result};
use crate::types::members::{
    ConstructorDescription, ExecutableDescription, FieldDescription, MethodDescription,
};
use crate::types::{is_valid_member_name, TypeId, Visibility};
use crate::universe::{AccessKind, AccessRequest, Universe};
use crate::value::{ObjectRef, Value};

pub mod cache;
pub(crate) mod matcher;
mod resolve;
pub mod signature;

/// Counters exposed so callers can observe cache effectiveness (and tests
/// can assert that a repeated resolution never re-walks the hierarchy).
#[derive(Debug, Default)]
pub struct ResolutionStats {
    pub executable_hits: AtomicU64,
    pub executable_misses: AtomicU64,
    pub executable_walks: AtomicU64,
    pub field_hits: AtomicU64,
    pub field_misses: AtomicU64,
    pub field_walks: AtomicU64,
}

/// The member-resolution engine.
///
/// Construction reads the settings once and installs the two bounded caches;
/// afterwards the engine is safe for concurrent read-heavy use. Type and
/// member descriptors are borrowed views into the shared universe, which
/// outlives every cache entry referencing them.
pub struct Mirror {
    pub(crate) universe: Arc<Universe>,
    pub(crate) config: MirrorConfig,
    pub(crate) executables: MemberCache<ExecutableSignature, Vec<ExecutableDescription>>,
    pub(crate) fields: MemberCache<FieldSignature, Vec<FieldDescription>>,
    pub(crate) stats: ResolutionStats,
}

impl Mirror {
    pub fn new(universe: Arc<Universe>, config: MirrorConfig) -> Self {
        let executables = MemberCache::new(config.cache_backend, config.executable_cache_size);
        let fields = MemberCache::new(config.cache_backend, config.field_cache_size);
        Self {
            universe,
            config,
            executables,
            fields,
            stats: ResolutionStats::default(),
        }
    }

    pub fn with_defaults(universe: Arc<Universe>) -> Self {
        Self::new(universe, MirrorConfig::default())
    }

    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn stats(&self) -> &ResolutionStats {
        &self.stats
    }

    // ---- lookups ----------------------------------------------------------

    /// Method declared on `owner` (no ancestor search) matching the given
    /// name and parameter types.
    pub fn get_method_by_name(
        &self,
        owner: TypeId,
        name: &str,
        param_types: &[TypeId],
    ) -> Result<MethodDescription> {
        self.check_member_name(name)?;
        let sig = ExecutableSignature::method(owner, name, typed_args(param_types));
        let set = self.resolve_executables_at(&sig, ResolveMode::ExactlyOne)?;
        self.expect_method(set)
    }

    /// Method declared on `owner` matching the declared return type and
    /// parameter types exactly one way.
    pub fn get_method_by_return_type(
        &self,
        owner: TypeId,
        return_type: TypeId,
        param_types: &[TypeId],
    ) -> Result<MethodDescription> {
        let sig = ExecutableSignature::by_return_type(owner, return_type, typed_args(param_types));
        let set = self.resolve_executables_at(&sig, ResolveMode::ExactlyOne)?;
        self.expect_method(set)
    }

    /// Every method declared on `owner` with the given return type whose
    /// parameters accept the given types, in declaration order.
    pub fn get_methods_by_return_type(
        &self,
        owner: TypeId,
        return_type: TypeId,
        param_types: &[TypeId],
    ) -> Result<Vec<MethodDescription>> {
        let sig = ExecutableSignature::by_return_type(owner, return_type, typed_args(param_types));
        let set = self.resolve_executables_at(&sig, ResolveMode::AllMatches)?;
        Ok(set
            .into_iter()
            .filter_map(|e| match e {
                ExecutableDescription::Method(m) => Some(m),
                ExecutableDescription::Constructor(_) => None,
            })
            .collect())
    }

    pub fn get_constructor(
        &self,
        owner: TypeId,
        param_types: &[TypeId],
    ) -> Result<ConstructorDescription> {
        let sig = ExecutableSignature::constructor(owner, typed_args(param_types));
        let set = self.resolve_executables_at(&sig, ResolveMode::ExactlyOne)?;
        self.expect_constructor(set)
    }

    // ---- invocation -------------------------------------------------------

    /// Invoke a method by name on an object, resolving from the object's
    /// runtime type and searching the ancestry on a miss.
    pub fn invoke_method(&self, receiver: &Value, name: &str, args: &[Value]) -> Result<Value> {
        let owner = receiver.type_of(&self.universe).ok_or_else(|| {
            ReflectionError::IllegalArgument("cannot invoke a method on null".to_string())
        })?;
        self.check_member_name(name)?;
        let sig = ExecutableSignature::method(owner, name, self.arg_type_list(args));
        let set = self.resolve_executables_walking(&sig)?;
        let method = self.expect_method(set)?;
        self.invoke_resolved(&method, Some(receiver), args)
    }

    /// Invoke a method by name, resolving against `owner`'s declared members
    /// only. Faster than [`invoke_method`](Self::invoke_method) when the
    /// declaring type is known, and it never consults the ancestry.
    pub fn invoke_method_as(
        &self,
        receiver: &Value,
        owner: TypeId,
        name: &str,
        args: &[Value],
    ) -> Result<Value> {
        self.check_member_name(name)?;
        let sig = ExecutableSignature::method(owner, name, self.arg_type_list(args));
        let set = self.resolve_executables_at(&sig, ResolveMode::ExactlyOne)?;
        let method = self.expect_method(set)?;
        self.invoke_resolved(&method, Some(receiver), args)
    }

    pub fn invoke_static_method(
        &self,
        owner: TypeId,
        name: &str,
        args: &[Value],
    ) -> Result<Value> {
        self.check_member_name(name)?;
        let sig = ExecutableSignature::method(owner, name, self.arg_type_list(args));
        let set = self.resolve_executables_at(&sig, ResolveMode::ExactlyOne)?;
        let method = self.expect_method(set)?;
        if !method.data.is_static {
            return Err(ReflectionError::MemberNotFound(format!(
                "`{}::{}` exists but is not static",
                self.universe.type_name(owner),
                name
            )));
        }
        self.invoke_resolved(&method, None, args)
    }

    /// Invoke an already-resolved method, packing variadic arguments and
    /// requesting any visibility bypass immediately before the call.
    pub fn invoke_resolved(
        &self,
        method: &MethodDescription,
        receiver: Option<&Value>,
        args: &[Value],
    ) -> Result<Value> {
        self.ensure_visible(method.parent, &method.data.name, method.data.visibility)?;
        if !method.data.is_static {
            let recv = receiver.filter(|r| !r.is_null()).ok_or_else(|| {
                ReflectionError::IllegalArgument(format!(
                    "instance method `{}` requires a receiver",
                    method.data.name
                ))
            })?;
            if let Some(ty) = recv.type_of(&self.universe) {
                if !self.universe.is_assignable(method.parent, ty) {
                    return Err(ReflectionError::IllegalArgument(format!(
                        "receiver of type `{}` is not a `{}`",
                        self.universe.type_name(ty),
                        self.universe.type_name(method.parent)
                    )));
                }
            }
        }

        let packed;
        let call_args: &[Value] = if method.data.variadic {
            packed = self.pack_variadic(&method.data.params, args)?;
            &packed
        } else {
            args
        };

        let body = method.data.body.as_ref().ok_or_else(|| {
            ReflectionError::InvocationFailure(format!(
                "`{}::{}` is abstract and has no body",
                self.universe.type_name(method.parent),
                method.data.name
            ))
        })?;
        let body_receiver = if method.data.is_static { None } else { receiver };
        body(&self.universe, body_receiver, call_args).map_err(|cause| {
            ReflectionError::InvocationFailure(format!(
                "`{}::{}` raised: {cause}",
                self.universe.type_name(method.parent),
                method.data.name
            ))
        })
    }

    /// Allocate and construct an instance, choosing a constructor by the
    /// supplied argument types.
    pub fn new_instance(&self, owner: TypeId, args: &[Value]) -> Result<Value> {
        let data = self.universe.data(owner).ok_or_else(|| {
            ReflectionError::IllegalArgument(format!("type {owner} is not defined"))
        })?;
        if !data.is_instantiable() {
            return Err(ReflectionError::InstantiationFailure(format!(
                "`{}` is not an instantiable class",
                data.name
            )));
        }
        let sig = ExecutableSignature::constructor(owner, self.arg_type_list(args));
        let set = self.resolve_executables_at(&sig, ResolveMode::ExactlyOne)?;
        let ctor = self.expect_constructor(set)?;
        self.ensure_visible(owner, "<init>", ctor.data.visibility)?;

        let object = Value::Object(self.allocate_instance(owner)?);
        let packed;
        let call_args: &[Value] = if ctor.data.variadic {
            packed = self.pack_variadic(&ctor.data.params, args)?;
            &packed
        } else {
            args
        };
        if let Some(body) = ctor.data.body.as_ref() {
            body(&self.universe, Some(&object), call_args).map_err(|cause| {
                ReflectionError::InvocationFailure(format!(
                    "constructor of `{}` raised: {cause}",
                    data.name
                ))
            })?;
        }
        Ok(object)
    }

    /// Resolve an enum constant by name via the type's static `value_of`.
    pub fn get_enum(&self, owner: TypeId, constant: &str) -> Result<Value> {
        let data = self.universe.data(owner).ok_or_else(|| {
            ReflectionError::IllegalArgument(format!("type {owner} is not defined"))
        })?;
        if !data.is_enum() {
            return Err(ReflectionError::IllegalArgument(format!(
                "`{}` is not an enum type",
                data.name
            )));
        }
        match self.invoke_static_method(owner, "value_of", &[Value::from(constant)]) {
            Err(ReflectionError::InvocationFailure(_)) => {
                Err(ReflectionError::MemberNotFound(format!(
                    "no enum constant `{constant}` in `{}`",
                    data.name
                )))
            }
            other => other,
        }
    }

    // ---- field lookups ----------------------------------------------------

    /// Field declared directly on `owner` with the given name.
    pub fn get_field_by_name(&self, owner: TypeId, name: &str) -> Result<FieldDescription> {
        self.check_member_name(name)?;
        let set =
            self.resolve_fields_at(&FieldSignature::by_name(owner, name), ResolveMode::ExactlyOne)?;
        self.expect_field(set)
    }

    /// Fields declared directly on `owner` whose type matches `field_type`
    /// (`exact` restricts to identity; otherwise assignability counts), in
    /// declaration order. Never searches ancestors.
    pub fn get_fields_by_type(
        &self,
        owner: TypeId,
        field_type: TypeId,
        exact: bool,
    ) -> Result<Vec<FieldDescription>> {
        let sig = FieldSignature::by_type(owner, field_type);
        let set = self.resolve_fields_at(&sig, ResolveMode::AllMatches)?;
        Ok(if exact {
            set.into_iter().filter(|f| f.data.ty == field_type).collect()
        } else {
            set
        })
    }

    /// Exactly one field of the given type on `owner`; several matches are
    /// an ambiguous lookup.
    pub fn get_field_by_type(
        &self,
        owner: TypeId,
        field_type: TypeId,
        exact: bool,
    ) -> Result<FieldDescription> {
        let sig = FieldSignature::by_type(owner, field_type);
        let matches = self.get_fields_by_type(owner, field_type, exact)?;
        let settled = self.settle_fields_single(&sig, matches)?;
        Ok(settled)
    }

    /// The `index`-th field (0-based, in declaration order) whose declared
    /// type is exactly `field_type`.
    pub fn get_field_by_type_index(
        &self,
        owner: TypeId,
        field_type: TypeId,
        index: usize,
    ) -> Result<FieldDescription> {
        let matches = self.get_fields_by_type(owner, field_type, true)?;
        matches.into_iter().nth(index).ok_or_else(|| {
            ReflectionError::MemberNotFound(format!(
                "`{}` declares no field of type `{}` at index {index}",
                self.universe.type_name(owner),
                self.universe.type_name(field_type)
            ))
        })
    }

    // ---- field access -----------------------------------------------------

    /// Read a field by name from an object, searching the ancestry of its
    /// runtime type.
    pub fn get_field_value(&self, receiver: &Value, name: &str) -> Result<Value> {
        let owner = receiver.type_of(&self.universe).ok_or_else(|| {
            ReflectionError::IllegalArgument("cannot read a field of null".to_string())
        })?;
        self.read_resolved(owner, name, Some(receiver))
    }

    /// Read a field by name with an explicit declaring type as the search
    /// root.
    pub fn get_field_value_in(
        &self,
        receiver: &Value,
        owner: TypeId,
        name: &str,
    ) -> Result<Value> {
        self.read_resolved(owner, name, Some(receiver))
    }

    pub fn get_static_field(&self, owner: TypeId, name: &str) -> Result<Value> {
        self.read_resolved(owner, name, None)
    }

    pub fn set_field_value(&self, receiver: &Value, name: &str, value: Value) -> Result<()> {
        let owner = receiver.type_of(&self.universe).ok_or_else(|| {
            ReflectionError::IllegalArgument("cannot write a field of null".to_string())
        })?;
        self.write_resolved(owner, name, Some(receiver), value)
    }

    pub fn set_field_value_in(
        &self,
        receiver: &Value,
        owner: TypeId,
        name: &str,
        value: Value,
    ) -> Result<()> {
        self.write_resolved(owner, name, Some(receiver), value)
    }

    pub fn set_static_field(&self, owner: TypeId, name: &str, value: Value) -> Result<()> {
        self.write_resolved(owner, name, None, value)
    }

    /// Read through an already-resolved field handle. The visibility bypass
    /// capability is requested anew on every call; only the lookup itself is
    /// ever cached.
    pub fn read_field(&self, field: &FieldDescription, receiver: Option<&Value>) -> Result<Value> {
        self.ensure_visible(field.parent, &field.data.name, field.data.visibility)?;
        if field.data.is_static {
            self.universe
                .static_get(field.parent, field.index)
                .ok_or_else(|| {
                    ReflectionError::IllegalArgument(format!(
                        "static slot for `{}` is missing",
                        field.data.name
                    ))
                })
        } else {
            let object = self.instance_receiver(field, receiver)?;
            object.read_slot(field).ok_or_else(|| {
                ReflectionError::IllegalArgument(format!(
                    "object of type `{}` has no field `{}`",
                    self.universe.type_name(object.ty()),
                    field.data.name
                ))
            })
        }
    }

    /// Write through an already-resolved field handle, enforcing the
    /// final-field policy and re-requesting capabilities before the write.
    pub fn write_field(
        &self,
        field: &FieldDescription,
        receiver: Option<&Value>,
        value: Value,
    ) -> Result<()> {
        if field.data.is_final {
            if !self.config.allow_final_field_writes {
                return Err(ReflectionError::AccessDenied(format!(
                    "field `{}` is final and final-field writes are disabled",
                    field.data.name
                )));
            }
            self.request_bypass(field.parent, &field.data.name, AccessKind::Finality)?;
        }
        self.ensure_visible(field.parent, &field.data.name, field.data.visibility)?;

        if let Some(value_ty) = value.type_of(&self.universe) {
            if !types_compatible(&self.universe, field.data.ty, value_ty) {
                return Err(ReflectionError::IllegalArgument(format!(
                    "a `{}` cannot be stored in field `{}` of type `{}`",
                    self.universe.type_name(value_ty),
                    field.data.name,
                    self.universe.type_name(field.data.ty)
                )));
            }
        }

        if field.data.is_static {
            if self.universe.static_set(field.parent, field.index, value) {
                Ok(())
            } else {
                Err(ReflectionError::IllegalArgument(format!(
                    "static slot for `{}` is missing",
                    field.data.name
                )))
            }
        } else {
            let object = self.instance_receiver(field, receiver)?;
            if object.write_slot(field, value) {
                Ok(())
            } else {
                Err(ReflectionError::IllegalArgument(format!(
                    "object of type `{}` has no field `{}`",
                    self.universe.type_name(object.ty()),
                    field.data.name
                )))
            }
        }
    }

    // ---- internals --------------------------------------------------------

    fn read_resolved(&self, owner: TypeId, name: &str, receiver: Option<&Value>) -> Result<Value> {
        self.check_member_name(name)?;
        let field = self.resolve_field_walking(&FieldSignature::by_name(owner, name))?;
        self.read_field(&field, receiver)
    }

    fn write_resolved(
        &self,
        owner: TypeId,
        name: &str,
        receiver: Option<&Value>,
        value: Value,
    ) -> Result<()> {
        self.check_member_name(name)?;
        let field = self.resolve_field_walking(&FieldSignature::by_name(owner, name))?;
        self.write_field(&field, receiver, value)
    }

    fn instance_receiver<'a>(
        &self,
        field: &FieldDescription,
        receiver: Option<&'a Value>,
    ) -> Result<&'a ObjectRef> {
        receiver.and_then(Value::as_object).ok_or_else(|| {
            ReflectionError::IllegalArgument(format!(
                "field `{}` is an instance field; an object receiver is required",
                field.data.name
            ))
        })
    }

    fn allocate_instance(&self, ty: TypeId) -> Result<ObjectRef> {
        let mut slots = FxHashMap::default();
        let mut current = Some(ty);
        while let Some(id) = current {
            let data = self.universe.data(id).ok_or_else(|| {
                ReflectionError::IllegalArgument(format!("type {id} is not defined"))
            })?;
            for (index, field) in data.fields.iter().enumerate() {
                if !field.is_static {
                    let initial = field
                        .initial
                        .clone()
                        .unwrap_or_else(|| self.universe.default_value(field.ty));
                    slots.insert((id, index), initial);
                }
            }
            current = data.superclass;
        }
        Ok(ObjectRef::with_slots(ty, slots))
    }

    /// Flat argument list → `(fixed..., packed trailing array)` whose element
    /// type is the declared component type. A lone tail argument that already
    /// is the declared array (or null) passes through untouched.
    fn pack_variadic(&self, params: &[TypeId], args: &[Value]) -> Result<Vec<Value>> {
        let Some((&tail, fixed_params)) = params.split_last() else {
            return Err(ReflectionError::IllegalArgument(
                "variadic member has no parameters".to_string(),
            ));
        };
        let component = self.universe.component_of(tail).ok_or_else(|| {
            ReflectionError::IllegalArgument(
                "variadic tail parameter is not an array type".to_string(),
            )
        })?;
        let fixed = fixed_params.len();

        if args.len() == params.len() {
            let tail_arg = &args[fixed];
            let passes_through = tail_arg.is_null()
                || tail_arg
                    .type_of(&self.universe)
                    .is_some_and(|t| self.universe.is_assignable(tail, t));
            if passes_through {
                return Ok(args.to_vec());
            }
        }

        let split = fixed.min(args.len());
        let trailing = args[split..].to_vec();
        let mut out = args[..split].to_vec();
        out.push(Value::new_array(component, trailing));
        Ok(out)
    }

    fn ensure_visible(&self, owner: TypeId, member: &str, visibility: Visibility) -> Result<()> {
        if visibility == Visibility::Public {
            return Ok(());
        }
        self.request_bypass(owner, member, AccessKind::Visibility)
    }

    fn request_bypass(&self, owner: TypeId, member: &str, kind: AccessKind) -> Result<()> {
        let granted = self.universe.grant_bypass(AccessRequest {
            owner,
            member,
            kind,
        });
        if granted {
            Ok(())
        } else {
            Err(ReflectionError::AccessDenied(format!(
                "the environment refused {kind:?} bypass for `{}::{member}`",
                self.universe.type_name(owner)
            )))
        }
    }

    fn check_member_name(&self, name: &str) -> Result<()> {
        if is_valid_member_name(name) {
            Ok(())
        } else {
            Err(ReflectionError::IllegalArgument(format!(
                "invalid member name `{name}`"
            )))
        }
    }

    fn arg_type_list(&self, args: &[Value]) -> Vec<Option<TypeId>> {
        args.iter().map(|v| v.type_of(&self.universe)).collect()
    }

    fn expect_method(&self, set: Vec<ExecutableDescription>) -> Result<MethodDescription> {
        match set.into_iter().next() {
            Some(ExecutableDescription::Method(m)) => Ok(m),
            _ => Err(ReflectionError::MemberNotFound(
                "resolution produced no usable method".to_string(),
            )),
        }
    }

    fn expect_constructor(
        &self,
        set: Vec<ExecutableDescription>,
    ) -> Result<ConstructorDescription> {
        match set.into_iter().next() {
            Some(ExecutableDescription::Constructor(c)) => Ok(c),
            _ => Err(ReflectionError::MemberNotFound(
                "resolution produced no usable constructor".to_string(),
            )),
        }
    }

    fn expect_field(&self, set: Vec<FieldDescription>) -> Result<FieldDescription> {
        set.into_iter().next().ok_or_else(|| {
            ReflectionError::MemberNotFound("resolution produced no usable field".to_string())
        })
    }

    fn settle_fields_single(
        &self,
        sig: &FieldSignature,
        matches: Vec<FieldDescription>,
    ) -> Result<FieldDescription> {
        if matches.len() > 1 && !self.config.allow_ambiguous_calls {
            let listing: Vec<String> = matches.iter().map(|f| self.describe_field(f)).collect();
            return Err(ReflectionError::AmbiguousCall(format!(
                "{} matches multiple fields: {}",
                self.describe_field_sig(sig),
                listing.join(", ")
            )));
        }
        matches
            .into_iter()
            .next()
            .ok_or_else(|| self.field_not_found(sig))
    }
}

fn typed_args(param_types: &[TypeId]) -> Vec<Option<TypeId>> {
    param_types.iter().copied().map(Some).collect()
}
