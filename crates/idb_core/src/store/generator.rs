//! Key generators.

/// Largest key a generator hands out: 2^53, the last integer an `f64`
/// represents exactly.
pub(crate) const MAX_GENERATED_KEY: u64 = 1 << 53;

/// Per-store counter for autoIncrement stores.
///
/// Starts at 1. Once the current number passes [`MAX_GENERATED_KEY`] the
/// generator is exhausted and every later generation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyGenerator {
    current: u64,
}

impl KeyGenerator {
    pub(crate) fn new() -> Self {
        Self { current: 1 }
    }

    /// The number the next generation would return.
    pub(crate) fn current(&self) -> u64 {
        self.current
    }

    /// Returns the next key, or `None` if the generator is exhausted.
    pub(crate) fn generate(&mut self) -> Option<f64> {
        if self.current > MAX_GENERATED_KEY {
            return None;
        }
        let key = self.current;
        self.current += 1;
        #[allow(clippy::cast_precision_loss)]
        let key = key as f64;
        Some(key)
    }

    /// Moves the generator past an explicitly supplied numeric key.
    ///
    /// Keys are clamped to 2^53 and floored first. Keys below the current
    /// number, including all negative ones, leave the generator alone; a
    /// key of 2^53 or above exhausts it.
    pub(crate) fn set_if_larger(&mut self, key: f64) {
        #[allow(clippy::cast_precision_loss)]
        let value = key.min(MAX_GENERATED_KEY as f64).floor();
        #[allow(clippy::cast_precision_loss)]
        let current = self.current as f64;
        if value >= current {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let value = value as u64;
            self.current = value + 1;
        }
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}
