//! Engine configuration.

use crate::transaction::Durability;

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct Config {
    /// Serialized size in bytes above which a record value is written to
    /// the value backend instead of being held inline.
    pub large_value_threshold: usize,

    /// Whether committing a transaction that wrote out-of-line values
    /// flushes the value backend.
    pub flush_on_commit: bool,

    /// Durability used by transactions that do not ask for one.
    pub default_durability: Durability,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            large_value_threshold: 64 * 1024, // 64 KiB
            flush_on_commit: true,
            default_durability: Durability::Default,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the out-of-line value threshold.
    #[must_use]
    pub const fn large_value_threshold(mut self, bytes: usize) -> Self {
        self.large_value_threshold = bytes;
        self
    }

    /// Sets whether commits flush the value backend.
    #[must_use]
    pub const fn flush_on_commit(mut self, value: bool) -> Self {
        self.flush_on_commit = value;
        self
    }

    /// Sets the default transaction durability.
    #[must_use]
    pub const fn default_durability(mut self, durability: Durability) -> Self {
        self.default_durability = durability;
        self
    }
}
