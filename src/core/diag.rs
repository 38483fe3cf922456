//! Diagnostics verbosity threaded through compilation and execution.
//!
//! Verbosity belongs to a call, not to the process: the loader creates a
//! `Diagnostics` from `EngineConfig::noisy`, `#noisy n` raises it for the
//! rest of that compilation, and the evaluator receives a copy. Output goes
//! through `tracing`; the level only decides whether an event is emitted.

/// Load summaries.
pub const LEVEL_SUMMARY: u8 = 1;
/// Per-definition and per-move detail.
pub const LEVEL_DETAIL: u8 = 2;
/// Instruction traces.
pub const LEVEL_TRACE: u8 = 3;

/// Verbosity context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    level: u8,
}

impl Diagnostics {
    /// Create a context at the given level.
    #[must_use]
    pub const fn new(level: u8) -> Self {
        Self { level }
    }

    /// A context that emits nothing.
    #[must_use]
    pub const fn quiet() -> Self {
        Self { level: 0 }
    }

    /// Current level.
    #[must_use]
    pub const fn level(self) -> u8 {
        self.level
    }

    /// Replace the level (used by `#noisy`).
    pub fn set_level(&mut self, level: u8) {
        self.level = level;
    }

    /// Whether events at `level` should be emitted.
    #[must_use]
    pub const fn enabled(self, level: u8) -> bool {
        self.level >= level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        let mut diag = Diagnostics::quiet();
        assert!(!diag.enabled(LEVEL_SUMMARY));

        diag.set_level(2);
        assert!(diag.enabled(LEVEL_SUMMARY));
        assert!(diag.enabled(LEVEL_DETAIL));
        assert!(!diag.enabled(LEVEL_TRACE));
    }
}
