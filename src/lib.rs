//! Dynamic member resolution over a host-owned type universe.
//!
//! Hosts register types and their members (with native closure bodies) in a
//! [`Universe`], then hand it to a [`Mirror`] to look up, invoke, read, and
//! write members by symbolic description: name, owning type, return or field
//! type, and argument types. Resolution handles overloads, variadic tails,
//! value↔boxed widening, and breadth-first ancestry search, and caches every
//! successful lookup in a bounded LRU cache.

pub mod config;
pub mod engine;
pub mod error;
pub mod types;
pub mod universe;
pub mod value;

pub use config::{CacheBackend, MirrorConfig};
pub use engine::{Mirror, ResolutionStats};
pub use error::{ReflectionError, Result};
pub use universe::{ClassSpec, ConstructorSpec, FieldSpec, InterfaceSpec, MethodSpec, Universe};
pub use value::Value;
