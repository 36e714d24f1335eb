//! Candidate discovery and argument compatibility.
//!
//! Filters run over the members *declared directly* on one type; walking the
//! ancestry is the resolver's job, one level at a time.

use std::sync::Arc;

use rayon::prelude::*;

use crate::engine::signature::{ExecutableSignature, FieldSignature};
use crate::types::members::{
    ConstructorDescription, ExecutableDescription, ExecutableInfo, FieldDescription,
    MethodDescription,
};
use crate::types::{TypeData, TypeId};
use crate::universe::Universe;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ArgMatch {
    Matched,
    Rejected,
    /// A fixed single-array candidate saw several loose arguments that would
    /// all fit the array's component type: the caller's intent (one array vs
    /// a spread) cannot be guessed.
    SpreadAmbiguous,
}

pub(crate) struct ExecutableMatches {
    pub matched: Vec<ExecutableDescription>,
    pub spread_trap: bool,
}

/// Candidates declared on `owner` that survive the signature's filters and
/// the argument matcher. Matching runs in parallel but the surviving list
/// keeps declaration order, which later tie-breaking depends on.
pub(crate) fn find_executables(
    universe: &Universe,
    owner: &Arc<TypeData>,
    sig: &ExecutableSignature,
) -> ExecutableMatches {
    let candidates: Vec<ExecutableDescription> = if sig.is_constructor() {
        owner
            .constructors
            .iter()
            .enumerate()
            .map(|(index, data)| {
                ExecutableDescription::Constructor(ConstructorDescription {
                    parent: owner.id,
                    index,
                    data: Arc::clone(data),
                })
            })
            .collect()
    } else {
        owner
            .methods
            .iter()
            .enumerate()
            .filter(|(_, m)| sig.name.as_ref().is_none_or(|n| m.name == *n))
            .filter(|(_, m)| sig.return_type.is_none_or(|rt| m.return_type == rt))
            .map(|(index, data)| {
                ExecutableDescription::Method(MethodDescription {
                    parent: owner.id,
                    index,
                    data: Arc::clone(data),
                })
            })
            .collect()
    };

    let verdicts: Vec<ArgMatch> = candidates
        .par_iter()
        .map(|c| match_arguments(universe, c.param_types(), c.is_variadic(), &sig.arg_types))
        .collect();

    let spread_trap = verdicts.iter().any(|v| *v == ArgMatch::SpreadAmbiguous);
    let matched = candidates
        .into_iter()
        .zip(verdicts)
        .filter(|(_, v)| *v == ArgMatch::Matched)
        .map(|(c, _)| c)
        .collect();

    ExecutableMatches { matched, spread_trap }
}

/// Fields declared on `owner` matching the signature, in declaration order.
/// The type filter is an assignability superset; exact-type callers narrow
/// it afterwards.
pub(crate) fn find_fields(
    universe: &Universe,
    owner: &Arc<TypeData>,
    sig: &FieldSignature,
) -> Vec<FieldDescription> {
    owner
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| sig.name.as_ref().is_none_or(|n| f.name == *n))
        .filter(|(_, f)| sig.field_type.is_none_or(|ft| universe.is_assignable(ft, f.ty)))
        .map(|(index, data)| FieldDescription {
            parent: owner.id,
            index,
            data: Arc::clone(data),
        })
        .collect()
}

/// Whether one candidate's parameter list accepts the supplied argument
/// types: arity (with variadic tail collapsing), null wildcards, identity,
/// assignability, and one value↔boxed substitution in each direction.
pub(crate) fn match_arguments(
    universe: &Universe,
    params: &[TypeId],
    variadic: bool,
    args: &[Option<TypeId>],
) -> ArgMatch {
    let arity_ok = params.len() == args.len()
        || (variadic && !params.is_empty() && args.len() >= params.len() - 1);
    if !arity_ok {
        if !variadic && params.len() == 1 && args.len() > 1 {
            if let Some(component) = universe.component_of(params[0]) {
                let all_fit = args
                    .iter()
                    .all(|a| a.is_none_or(|t| types_compatible(universe, component, t)));
                if all_fit {
                    return ArgMatch::SpreadAmbiguous;
                }
            }
        }
        return ArgMatch::Rejected;
    }

    for (i, arg) in args.iter().enumerate() {
        let index = i.min(params.len() - 1);
        let mut param_ty = params[index];
        if variadic && index == params.len() - 1 {
            // A lone argument that already is the declared array passes
            // through; anything else is measured against the component type.
            let exact_single_array = args.len() == params.len()
                && arg.is_none_or(|t| universe.is_assignable(param_ty, t));
            if !exact_single_array {
                if let Some(component) = universe.component_of(param_ty) {
                    param_ty = component;
                }
            }
        }
        match arg {
            None => continue,
            Some(arg_ty) => {
                if !types_compatible(universe, param_ty, *arg_ty) {
                    return ArgMatch::Rejected;
                }
            }
        }
    }
    ArgMatch::Matched
}

pub(crate) fn types_compatible(universe: &Universe, target: TypeId, source: TypeId) -> bool {
    if target == source || universe.is_assignable(target, source) {
        return true;
    }
    if let Some(boxed) = universe.boxed_counterpart(source) {
        if universe.is_assignable(target, boxed) {
            return true;
        }
    }
    if let Some(value) = universe.value_counterpart(source) {
        if universe.is_assignable(target, value) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueKind;

    fn setup() -> (Universe, TypeId, TypeId, TypeId) {
        let u = Universe::new();
        let int32 = u.primitive(ValueKind::I32);
        let object = u.object_type();
        let string = u.string_type();
        (u, int32, object, string)
    }

    #[test]
    fn arity_mismatch_rejects() {
        let (u, int32, _, _) = setup();
        let verdict = match_arguments(&u, &[int32], false, &[Some(int32), Some(int32)]);
        assert_eq!(verdict, ArgMatch::Rejected);
    }

    #[test]
    fn null_argument_matches_any_parameter() {
        let (u, int32, _, string) = setup();
        let verdict = match_arguments(&u, &[string, int32], false, &[None, None]);
        assert_eq!(verdict, ArgMatch::Matched);
    }

    #[test]
    fn boxed_and_value_kinds_interchange() {
        let (u, int32, _, _) = setup();
        let boxed_i32 = u.boxed(ValueKind::I32);
        assert_eq!(match_arguments(&u, &[int32], false, &[Some(boxed_i32)]), ArgMatch::Matched);
        assert_eq!(match_arguments(&u, &[boxed_i32], false, &[Some(int32)]), ArgMatch::Matched);
        // unrelated kind stays rejected
        let boxed_f64 = u.boxed(ValueKind::F64);
        assert_eq!(match_arguments(&u, &[int32], false, &[Some(boxed_f64)]), ArgMatch::Rejected);
    }

    #[test]
    fn variadic_tail_collapses_to_component() {
        let (u, int32, object, string) = setup();
        let object_array = u.array_of(object);
        let params = [string, object_array];
        // three loose trailing args, one of them a primitive needing boxing
        let args = [Some(string), Some(string), Some(int32)];
        assert_eq!(match_arguments(&u, &params, true, &args), ArgMatch::Matched);
        // zero trailing args are legal for a variadic candidate
        assert_eq!(match_arguments(&u, &params, true, &[Some(string)]), ArgMatch::Matched);
        // but not for a fixed one
        assert_eq!(match_arguments(&u, &params, false, &[Some(string)]), ArgMatch::Rejected);
    }

    #[test]
    fn exact_array_passes_through_variadic_tail() {
        let (u, _, object, string) = setup();
        let object_array = u.array_of(object);
        let string_array = u.array_of(string);
        let params = [string, object_array];
        // covariant array in tail position is the exact-single-array case
        let args = [Some(string), Some(string_array)];
        assert_eq!(match_arguments(&u, &params, true, &args), ArgMatch::Matched);
    }

    #[test]
    fn spread_over_fixed_array_parameter_is_flagged() {
        let (u, _, object, string) = setup();
        let object_array = u.array_of(object);
        let args = [Some(string), Some(string), Some(string)];
        assert_eq!(
            match_arguments(&u, &[object_array], false, &args),
            ArgMatch::SpreadAmbiguous
        );
        // incompatible spread is an ordinary rejection
        let string_array = u.array_of(string);
        let boxed = u.boxed(ValueKind::I32);
        assert_eq!(
            match_arguments(&u, &[string_array], false, &[Some(boxed), Some(boxed)]),
            ArgMatch::Rejected
        );
    }
}
