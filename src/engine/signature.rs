//! Immutable, hashable keys identifying a lookup.

use std::sync::Arc;

use crate::types::TypeId;

/// Key for method and constructor lookups: owning type, at most one of
/// member name / expected return type, and the ordered argument types.
/// `None` argument entries stand for a null argument, which matches any
/// parameter type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ExecutableSignature {
    pub owner: TypeId,
    pub name: Option<Arc<str>>,
    pub return_type: Option<TypeId>,
    pub arg_types: Vec<Option<TypeId>>,
}

impl ExecutableSignature {
    pub fn method(owner: TypeId, name: &str, arg_types: Vec<Option<TypeId>>) -> Self {
        Self {
            owner,
            name: Some(Arc::from(name)),
            return_type: None,
            arg_types,
        }
    }

    pub fn by_return_type(owner: TypeId, return_type: TypeId, arg_types: Vec<Option<TypeId>>) -> Self {
        Self {
            owner,
            name: None,
            return_type: Some(return_type),
            arg_types,
        }
    }

    /// Neither name nor return type: a constructor lookup by parameter shape.
    pub fn constructor(owner: TypeId, arg_types: Vec<Option<TypeId>>) -> Self {
        Self {
            owner,
            name: None,
            return_type: None,
            arg_types,
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.name.is_none() && self.return_type.is_none()
    }

    /// The same lookup re-rooted at another owner; the hierarchy walker uses
    /// this to probe each level while caching under the original key.
    pub(crate) fn at_owner(&self, owner: TypeId) -> Self {
        Self {
            owner,
            name: self.name.clone(),
            return_type: self.return_type,
            arg_types: self.arg_types.clone(),
        }
    }
}

/// Key for field lookups: owning type plus exactly one of field name /
/// expected field type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldSignature {
    pub owner: TypeId,
    pub name: Option<Arc<str>>,
    pub field_type: Option<TypeId>,
}

impl FieldSignature {
    pub fn by_name(owner: TypeId, name: &str) -> Self {
        Self {
            owner,
            name: Some(Arc::from(name)),
            field_type: None,
        }
    }

    pub fn by_type(owner: TypeId, field_type: TypeId) -> Self {
        Self {
            owner,
            name: None,
            field_type: Some(field_type),
        }
    }

    pub(crate) fn at_owner(&self, owner: TypeId) -> Self {
        Self {
            owner,
            name: self.name.clone(),
            field_type: self.field_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn structural_equality_over_all_fields() {
        let a = ExecutableSignature::method(TypeId(3), "run", vec![Some(TypeId(1)), None]);
        let b = ExecutableSignature::method(TypeId(3), "run", vec![Some(TypeId(1)), None]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let different_owner = a.at_owner(TypeId(4));
        assert_ne!(a, different_owner);
    }

    #[test]
    fn null_argument_distinct_from_typed_argument() {
        let null_arg = ExecutableSignature::method(TypeId(0), "run", vec![None]);
        let typed = ExecutableSignature::method(TypeId(0), "run", vec![Some(TypeId(1))]);
        assert_ne!(null_arg, typed);
    }

    #[test]
    fn constructor_signature_has_no_filters() {
        let sig = ExecutableSignature::constructor(TypeId(2), vec![]);
        assert!(sig.is_constructor());
        let named = ExecutableSignature::method(TypeId(2), "init", vec![]);
        assert!(!named.is_constructor());
        assert_ne!(hash_of(&sig), hash_of(&named));
    }

    #[test]
    fn field_signatures_by_name_and_type_differ() {
        let by_name = FieldSignature::by_name(TypeId(5), "count");
        let by_type = FieldSignature::by_type(TypeId(5), TypeId(1));
        assert_ne!(by_name, by_type);
        assert_eq!(by_name, FieldSignature::by_name(TypeId(5), "count"));
    }
}
