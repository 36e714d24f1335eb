/// Which bounded-cache backend the engine installs at construction.
///
/// Both backends expose the same store/fetch-if-present contract and evict the
/// least recently used entry once capacity is exceeded; `Concurrent` trades a
/// little eviction precision for sharded, higher-throughput access.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CacheBackend {
    #[default]
    Vanilla,
    Concurrent,
}

/// Settings read once when a [`Mirror`](crate::Mirror) is constructed.
#[derive(Clone, Debug)]
pub struct MirrorConfig {
    pub executable_cache_size: usize,
    pub field_cache_size: usize,
    pub cache_backend: CacheBackend,
    /// Continue a failed name-based lookup through superclasses and
    /// default-bearing interfaces.
    pub search_ancestors: bool,
    /// Accept a multi-candidate resolution instead of failing; the first
    /// candidate in declaration order is used.
    pub allow_ambiguous_calls: bool,
    /// Permit writes to fields declared final (still subject to the
    /// universe's bypass capability).
    pub allow_final_field_writes: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            executable_cache_size: 10_000,
            field_cache_size: 2_000,
            cache_backend: CacheBackend::default(),
            search_ancestors: true,
            allow_ambiguous_calls: false,
            allow_final_field_writes: false,
        }
    }
}

impl MirrorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executable_cache_size(mut self, size: usize) -> Self {
        self.executable_cache_size = size;
        self
    }

    pub fn field_cache_size(mut self, size: usize) -> Self {
        self.field_cache_size = size;
        self
    }

    pub fn cache_backend(mut self, backend: CacheBackend) -> Self {
        self.cache_backend = backend;
        self
    }

    pub fn search_ancestors(mut self, enabled: bool) -> Self {
        self.search_ancestors = enabled;
        self
    }

    pub fn allow_ambiguous_calls(mut self, enabled: bool) -> Self {
        self.allow_ambiguous_calls = enabled;
        self
    }

    pub fn allow_final_field_writes(mut self, enabled: bool) -> Self {
        self.allow_final_field_writes = enabled;
        self
    }
}
