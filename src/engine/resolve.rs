//! Cache-fronted resolution: exact-owner search, the breadth-first hierarchy
//! walk, and the ambiguity policy.

use std::collections::VecDeque;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::engine::cache::ResolutionCache;
use crate::engine::matcher::{find_executables, find_fields};
use crate::engine::signature::{ExecutableSignature, FieldSignature};
use crate::engine::Mirror;
use crate::error::{ReflectionError, Result};
use crate::types::members::{ExecutableDescription, ExecutableInfo, FieldDescription};
use crate::types::{TypeData, TypeId};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ResolveMode {
    ExactlyOne,
    AllMatches,
}

impl Mirror {
    /// Resolution against the members declared directly on the signature's
    /// owner. Successful non-empty match sets are cached raw; the ambiguity
    /// policy is applied on every return path, so a set stored by an
    /// all-matches query still fails an exactly-one query that finds it
    /// ambiguous. Failures and empty sets are never cached.
    pub(crate) fn resolve_executables_at(
        &self,
        sig: &ExecutableSignature,
        mode: ResolveMode,
    ) -> Result<Vec<ExecutableDescription>> {
        if let Some(hit) = self.executables.fetch(sig) {
            // A walk stores its result under the originally requested owner,
            // so the entry may point at an ancestor's member. Such entries
            // satisfy walking lookups only, never a declared-only one.
            if hit.iter().all(|c| c.owner() == sig.owner) {
                self.stats.executable_hits.fetch_add(1, Relaxed);
                return self.settle_executables(sig, hit, false, mode);
            }
        }
        self.stats.executable_misses.fetch_add(1, Relaxed);

        let owner = self.owner_data(sig.owner)?;
        let found = find_executables(&self.universe, &owner, sig);
        let matched = found.matched.clone();
        let settled = self.settle_executables(sig, found.matched, found.spread_trap, mode)?;
        if !matched.is_empty() {
            self.executables.store(sig.clone(), matched);
        }
        Ok(settled)
    }

    /// Breadth-first search through the hierarchy for name-based lookups.
    /// A level that reports `MemberNotFound` enqueues its superclass and any
    /// interface declaring a same-named default method; the shallowest level
    /// with a match wins and is cached under the *originally requested*
    /// owner. Ambiguity stops the walk immediately.
    pub(crate) fn resolve_executables_walking(
        &self,
        sig: &ExecutableSignature,
    ) -> Result<Vec<ExecutableDescription>> {
        if let Some(hit) = self.executables.fetch(sig) {
            self.stats.executable_hits.fetch_add(1, Relaxed);
            return self.settle_executables(sig, hit, false, ResolveMode::ExactlyOne);
        }
        self.stats.executable_walks.fetch_add(1, Relaxed);
        debug!(
            owner = %self.universe.type_name(sig.owner),
            member = sig.name.as_deref().unwrap_or("<init>"),
            "resolution cache miss, walking hierarchy"
        );

        let mut queue = VecDeque::from([sig.owner]);
        let mut seen = FxHashSet::default();
        seen.insert(sig.owner);
        let mut last_not_found = None;

        while let Some(level) = queue.pop_front() {
            match self.resolve_executables_at(&sig.at_owner(level), ResolveMode::ExactlyOne) {
                Ok(set) => {
                    if level != sig.owner {
                        debug!(
                            found_on = %self.universe.type_name(level),
                            "member located on ancestor"
                        );
                        self.executables.store(sig.clone(), set.clone());
                    }
                    return Ok(set);
                }
                Err(err @ ReflectionError::MemberNotFound(_)) => {
                    last_not_found = Some(err);
                    if !self.config.search_ancestors {
                        continue;
                    }
                    if let Some(data) = self.universe.data(level) {
                        self.enqueue_ancestors(&data, sig, &mut queue, &mut seen);
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Err(last_not_found.unwrap_or_else(|| self.executable_not_found(sig)))
    }

    fn enqueue_ancestors(
        &self,
        data: &Arc<TypeData>,
        sig: &ExecutableSignature,
        queue: &mut VecDeque<TypeId>,
        seen: &mut FxHashSet<TypeId>,
    ) {
        if let Some(superclass) = data.superclass {
            if seen.insert(superclass) {
                queue.push_back(superclass);
            }
        }
        let Some(name) = sig.name.as_ref() else {
            return;
        };
        for &iface in &data.interfaces {
            let declares_default = self
                .universe
                .data(iface)
                .is_some_and(|d| d.methods.iter().any(|m| m.name == *name && m.body.is_some()));
            if declares_default && seen.insert(iface) {
                queue.push_back(iface);
            }
        }
    }

    fn settle_executables(
        &self,
        sig: &ExecutableSignature,
        matched: Vec<ExecutableDescription>,
        spread_trap: bool,
        mode: ResolveMode,
    ) -> Result<Vec<ExecutableDescription>> {
        if matched.is_empty() {
            return match mode {
                ResolveMode::AllMatches => Ok(matched),
                ResolveMode::ExactlyOne if spread_trap => Err(ReflectionError::AmbiguousCall(
                    format!(
                        "{} could be one array argument or a spread of its elements; pass the array explicitly",
                        self.describe_executable_sig(sig)
                    ),
                )),
                ResolveMode::ExactlyOne => Err(self.executable_not_found(sig)),
            };
        }
        if matched.len() == 1 || mode == ResolveMode::AllMatches {
            return Ok(matched);
        }

        let first_params = matched[0].param_types().to_vec();
        let identical_shapes = matched.iter().all(|c| c.param_types() == &first_params[..]);
        let variadic_count = matched.iter().filter(|c| c.is_variadic()).count();
        let lone_variadic_split =
            variadic_count == 1 || variadic_count == matched.len() - 1;
        if identical_shapes || lone_variadic_split || self.config.allow_ambiguous_calls {
            // First candidate in declaration order is the usable one.
            return Ok(matched);
        }

        let listing: Vec<String> = matched
            .iter()
            .map(|c| self.describe_executable(c))
            .collect();
        Err(ReflectionError::AmbiguousCall(format!(
            "{} matches multiple candidates: {}",
            self.describe_executable_sig(sig),
            listing.join(", ")
        )))
    }

    /// Exact-owner field resolution. The cached set for a by-type signature
    /// is the assignability superset, in declaration order.
    pub(crate) fn resolve_fields_at(
        &self,
        sig: &FieldSignature,
        mode: ResolveMode,
    ) -> Result<Vec<FieldDescription>> {
        if let Some(hit) = self.fields.fetch(sig) {
            // Same rule as for executables: an entry stored by a walk may
            // name an ancestor's field and only serves walking lookups.
            if hit.iter().all(|f| f.parent == sig.owner) {
                self.stats.field_hits.fetch_add(1, Relaxed);
                return self.settle_fields(sig, hit, mode);
            }
        }
        self.stats.field_misses.fetch_add(1, Relaxed);

        let owner = self.owner_data(sig.owner)?;
        let found = find_fields(&self.universe, &owner, sig);
        let settled = self.settle_fields(sig, found.clone(), mode)?;
        if !found.is_empty() {
            self.fields.store(sig.clone(), found);
        }
        Ok(settled)
    }

    /// Name-based field lookup through the superclass chain. Nearest
    /// declaration wins; the result is cached under the requested owner.
    pub(crate) fn resolve_field_walking(&self, sig: &FieldSignature) -> Result<FieldDescription> {
        if let Some(hit) = self.fields.fetch(sig) {
            self.stats.field_hits.fetch_add(1, Relaxed);
            let settled = self.settle_fields(sig, hit, ResolveMode::ExactlyOne)?;
            return settled
                .into_iter()
                .next()
                .ok_or_else(|| self.field_not_found(sig));
        }
        self.stats.field_walks.fetch_add(1, Relaxed);

        let mut level = Some(sig.owner);
        let mut last_not_found = None;
        while let Some(current) = level {
            match self.resolve_fields_at(&sig.at_owner(current), ResolveMode::ExactlyOne) {
                Ok(set) => {
                    if current != sig.owner {
                        self.fields.store(sig.clone(), set.clone());
                    }
                    return set
                        .into_iter()
                        .next()
                        .ok_or_else(|| self.field_not_found(sig));
                }
                Err(err @ ReflectionError::MemberNotFound(_)) => {
                    last_not_found = Some(err);
                    if !self.config.search_ancestors {
                        break;
                    }
                    level = self.universe.data(current).and_then(|d| d.superclass);
                }
                Err(other) => return Err(other),
            }
        }
        Err(last_not_found.unwrap_or_else(|| self.field_not_found(sig)))
    }

    fn settle_fields(
        &self,
        sig: &FieldSignature,
        matched: Vec<FieldDescription>,
        mode: ResolveMode,
    ) -> Result<Vec<FieldDescription>> {
        match (matched.len(), mode) {
            (0, ResolveMode::AllMatches) => Ok(matched),
            (0, ResolveMode::ExactlyOne) => Err(self.field_not_found(sig)),
            (1, _) | (_, ResolveMode::AllMatches) => Ok(matched),
            (_, ResolveMode::ExactlyOne) if self.config.allow_ambiguous_calls => Ok(matched),
            (_, ResolveMode::ExactlyOne) => {
                let listing: Vec<String> =
                    matched.iter().map(|f| self.describe_field(f)).collect();
                Err(ReflectionError::AmbiguousCall(format!(
                    "{} matches multiple fields: {}",
                    self.describe_field_sig(sig),
                    listing.join(", ")
                )))
            }
        }
    }

    fn owner_data(&self, owner: TypeId) -> Result<Arc<TypeData>> {
        self.universe.data(owner).ok_or_else(|| {
            ReflectionError::IllegalArgument(format!(
                "type {owner} is not defined in this universe"
            ))
        })
    }

    pub(crate) fn executable_not_found(&self, sig: &ExecutableSignature) -> ReflectionError {
        ReflectionError::MemberNotFound(format!(
            "no candidate for {}",
            self.describe_executable_sig(sig)
        ))
    }

    pub(crate) fn field_not_found(&self, sig: &FieldSignature) -> ReflectionError {
        ReflectionError::MemberNotFound(format!("no field matching {}", self.describe_field_sig(sig)))
    }

    pub(crate) fn describe_args(&self, args: &[Option<TypeId>]) -> String {
        let parts: Vec<String> = args
            .iter()
            .map(|a| match a {
                Some(ty) => self.universe.type_name(*ty).to_string(),
                None => "null".to_string(),
            })
            .collect();
        parts.join(", ")
    }

    pub(crate) fn describe_executable_sig(&self, sig: &ExecutableSignature) -> String {
        let owner = self.universe.type_name(sig.owner);
        let args = self.describe_args(&sig.arg_types);
        match (&sig.name, sig.return_type) {
            (Some(name), _) => format!("{owner}::{name}({args})"),
            (None, Some(ret)) => {
                format!("[{}] {owner}::?({args})", self.universe.type_name(ret))
            }
            (None, None) => format!("{owner}::<init>({args})"),
        }
    }

    pub(crate) fn describe_field_sig(&self, sig: &FieldSignature) -> String {
        let owner = self.universe.type_name(sig.owner);
        match (&sig.name, sig.field_type) {
            (Some(name), _) => format!("{owner}::{name}"),
            (None, Some(ty)) => format!("[{}] field of {owner}", self.universe.type_name(ty)),
            (None, None) => format!("any field of {owner}"),
        }
    }

    pub(crate) fn describe_executable(&self, exec: &ExecutableDescription) -> String {
        format!(
            "{}::{}({})",
            self.universe.type_name(exec.owner()),
            exec.label(),
            exec.param_types()
                .iter()
                .map(|t| self.universe.type_name(*t).to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    pub(crate) fn describe_field(&self, field: &FieldDescription) -> String {
        format!(
            "{}::{}",
            self.universe.type_name(field.parent),
            field.data.name
        )
    }
}
