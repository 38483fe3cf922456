//! Engine configuration.
//!
//! Hosts configure a load by providing an `EngineConfig`:
//! - RNG seed for the session generator
//! - Include search path and limits for the preprocessor
//! - Initial diagnostics verbosity (raised further by `#noisy`)
//! - Repetition threshold for the `repetition` goal

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for loading and running a game program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seed for the session RNG.
    pub seed: u64,

    /// Extra directories searched by `#include` after the including file's
    /// own directory.
    pub include_dirs: Vec<PathBuf>,

    /// Maximum `#include` nesting.
    pub max_include_depth: usize,

    /// Maximum macro expansions per load. Guards against self-recursive
    /// macros.
    pub max_macro_expansions: usize,

    /// Initial diagnostics level (0 = quiet).
    pub noisy: u8,

    /// Number of occurrences of a position that count as repetition.
    pub repetition_count: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            include_dirs: Vec::new(),
            max_include_depth: 16,
            max_macro_expansions: 100_000,
            noisy: 0,
            repetition_count: 3,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Add an include directory.
    #[must_use]
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Set the initial diagnostics level.
    #[must_use]
    pub fn with_noisy(mut self, level: u8) -> Self {
        self.noisy = level;
        self
    }

    /// Set the repetition threshold.
    #[must_use]
    pub fn with_repetition_count(mut self, count: u32) -> Self {
        assert!(count > 0, "Repetition count must be positive");
        self.repetition_count = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.repetition_count, 3);
        assert_eq!(config.noisy, 0);
        assert!(config.include_dirs.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_seed(9)
            .with_include_dir("games")
            .with_noisy(2)
            .with_repetition_count(2);

        assert_eq!(config.seed, 9);
        assert_eq!(config.include_dirs, vec![PathBuf::from("games")]);
        assert_eq!(config.noisy, 2);
        assert_eq!(config.repetition_count, 2);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = EngineConfig::new().with_seed(5);
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    #[should_panic(expected = "Repetition count must be positive")]
    fn test_zero_repetition() {
        let _ = EngineConfig::new().with_repetition_count(0);
    }
}
