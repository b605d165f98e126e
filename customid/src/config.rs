//! Engine configuration.

use nutype::nutype;
use serde::{Deserialize, Serialize};

/// How many times a FINAL assembly is attempted before an auto-generated ID
/// that keeps colliding is reported as a conflict.
///
/// Validated to 1..=10. The default of 1 reports the first collision.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10),
    default = 1,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Default,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct GenerationAttempts(u32);

/// How many fresh candidates are tried when looking for a free suggestion.
///
/// Validated to 1..=10.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10),
    default = 3,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Default,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct SuggestionAttempts(u32);

/// Where the next `SEQUENCE` value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStrategy {
    /// A per-inventory counter in the store, floored by the highest number
    /// found in existing custom IDs. Numbers are never handed out twice.
    #[default]
    PersistedCounter,
    /// Highest number found in existing custom IDs, plus one. Numbers freed by
    /// deletes are reused and concurrent callers may see the same value.
    ScanExisting,
}

/// Tunables of a [`CustomIdEngine`](crate::engine::CustomIdEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Source of sequence numbers.
    pub sequence_strategy: SequenceStrategy,
    /// Attempts for auto-generated IDs.
    pub generation_attempts: GenerationAttempts,
    /// Attempts when generating a suggestion after a conflict.
    pub suggestion_attempts: SuggestionAttempts,
}

impl EngineConfig {
    /// Sets the sequence strategy.
    #[must_use]
    pub const fn with_sequence_strategy(mut self, strategy: SequenceStrategy) -> Self {
        self.sequence_strategy = strategy;
        self
    }

    /// Sets the number of generation attempts.
    #[must_use]
    pub const fn with_generation_attempts(mut self, attempts: GenerationAttempts) -> Self {
        self.generation_attempts = attempts;
        self
    }

    /// Sets the number of suggestion attempts.
    #[must_use]
    pub const fn with_suggestion_attempts(mut self, attempts: SuggestionAttempts) -> Self {
        self.suggestion_attempts = attempts;
        self
    }
}
