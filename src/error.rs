use thiserror::Error;

/// Every failure the engine reports is exactly one of these kinds, carrying
/// enough context (owner type, member name, attempted argument types) to
/// diagnose without re-running the lookup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReflectionError {
    #[error("member not found: {0}")]
    MemberNotFound(String),
    #[error("ambiguous call: {0}")]
    AmbiguousCall(String),
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("invocation failed: {0}")]
    InvocationFailure(String),
    #[error("instantiation failed: {0}")]
    InstantiationFailure(String),
}

pub type Result<T> = std::result::Result<T, ReflectionError>;
