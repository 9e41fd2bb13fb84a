//! Decoder limits.

/// Default value nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Default cap on wire type table entries.
pub const DEFAULT_MAX_TABLE_ENTRIES: usize = 10_000;

/// Default cap on values decoded from one message.
pub const DEFAULT_MAX_VALUES: usize = 4_000_000;

/// Limits applied while decoding a message.
///
/// ```
/// use didlpack::DecoderConfig;
///
/// let config = DecoderConfig::default().max_depth(64).allow_trailing_bytes(true);
/// assert_eq!(config.depth_limit(), 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    max_depth: usize,
    allow_trailing_bytes: bool,
    max_table_entries: usize,
    max_values: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            allow_trailing_bytes: false,
            max_table_entries: DEFAULT_MAX_TABLE_ENTRIES,
            max_values: DEFAULT_MAX_VALUES,
        }
    }
}

impl DecoderConfig {
    /// Nesting depth past which decoding fails with `RecursionLimitExceeded`.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Accept bytes after the last argument value instead of failing.
    pub fn allow_trailing_bytes(mut self, allow: bool) -> Self {
        self.allow_trailing_bytes = allow;
        self
    }

    pub fn max_table_entries(mut self, entries: usize) -> Self {
        self.max_table_entries = entries;
        self
    }

    /// Number of values, nested ones and zero-sized ones included, a message
    /// may decode to before failing with `ValueLimitExceeded`. A blob counts once.
    pub fn max_values(mut self, values: usize) -> Self {
        self.max_values = values;
        self
    }

    pub fn depth_limit(&self) -> usize {
        self.max_depth
    }

    pub fn trailing_bytes_allowed(&self) -> bool {
        self.allow_trailing_bytes
    }

    pub fn table_entry_limit(&self) -> usize {
        self.max_table_entries
    }

    pub fn value_limit(&self) -> usize {
        self.max_values
    }
}
