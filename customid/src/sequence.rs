//! Sequence resolution.
//!
//! The number embedded in a custom ID is the last run of ASCII digits in it:
//! `A-001` carries 1, `2025-INV-0042` carries 42. Scanning every custom ID of
//! an inventory yields the highest number in use; the persisted counter is
//! floored by that value so that imported or hand-written IDs are never
//! overtaken.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::config::SequenceStrategy;
use crate::errors::StoreResult;
use crate::store::InventoryStore;
use crate::types::InventoryId;

/// Sequence value shown by previews that have no inventory to read from.
pub const PREVIEW_PLACEHOLDER: u64 = 123;

/// Largest number a custom ID can carry into the sequence.
///
/// Counters are stored as signed 64-bit integers and the next value is this
/// plus one, so anything larger is treated as an ordinary string of digits.
pub const MAX_CARRIED_NUMBER: u64 = i64::MAX.unsigned_abs() - 1;

// ASCII only: `\d` would also match other Unicode decimal digits.
static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[0-9]+").expect("digit-run pattern is valid"));

/// The number carried by a custom ID: its last run of digits.
///
/// `None` when the ID has no digits or the run exceeds
/// [`MAX_CARRIED_NUMBER`]. A barcode-sized run typed by hand must not push
/// the counter to a value it can never move past.
pub fn trailing_number(custom_id: &str) -> Option<u64> {
    DIGIT_RUN
        .find_iter(custom_id)
        .last()
        .and_then(|run| run.as_str().parse::<u64>().ok())
        .filter(|number| *number <= MAX_CARRIED_NUMBER)
}

/// Highest number carried by any of `custom_ids`, 0 when none carries one.
pub fn highest_number<I, S>(custom_ids: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    custom_ids
        .into_iter()
        .filter_map(|id| trailing_number(id.as_ref()))
        .max()
        .unwrap_or(0)
}

/// Computes sequence numbers for one inventory at a time.
#[derive(Debug)]
pub struct SequenceResolver<'a, S: ?Sized> {
    store: &'a S,
    strategy: SequenceStrategy,
}

impl<'a, S> SequenceResolver<'a, S>
where
    S: InventoryStore + ?Sized,
{
    /// Creates a resolver over `store`.
    pub const fn new(store: &'a S, strategy: SequenceStrategy) -> Self {
        Self { store, strategy }
    }

    /// Reserves the next sequence number of `inventory_id`.
    ///
    /// Under [`SequenceStrategy::PersistedCounter`] the number is never
    /// returned again, even after the items carrying it are deleted.
    #[instrument(name = "sequence.next", skip(self), fields(strategy = ?self.strategy))]
    pub async fn next(&self, inventory_id: &InventoryId) -> StoreResult<u64> {
        let floor = self.scan(inventory_id).await?;
        let next = match self.strategy {
            SequenceStrategy::PersistedCounter => {
                self.store.advance_sequence(inventory_id, floor).await?
            }
            SequenceStrategy::ScanExisting => floor.saturating_add(1),
        };
        debug!(floor, next, "[sequence.resolved] reserved sequence value");
        Ok(next)
    }

    /// The number [`next`](Self::next) would return now, without reserving
    /// it. Concurrent callers may see the same value.
    #[instrument(name = "sequence.peek", skip(self), fields(strategy = ?self.strategy))]
    pub async fn peek(&self, inventory_id: &InventoryId) -> StoreResult<u64> {
        let floor = self.scan(inventory_id).await?;
        let last = match self.strategy {
            SequenceStrategy::PersistedCounter => {
                floor.max(self.store.peek_sequence(inventory_id).await?)
            }
            SequenceStrategy::ScanExisting => floor,
        };
        Ok(last.saturating_add(1))
    }

    async fn scan(&self, inventory_id: &InventoryId) -> StoreResult<u64> {
        let custom_ids = self.store.custom_ids(inventory_id).await?;
        Ok(highest_number(custom_ids.iter().map(|id| id.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_number_takes_the_last_digit_run() {
        assert_eq!(trailing_number("A-001"), Some(1));
        assert_eq!(trailing_number("2025-INV-0042"), Some(42));
        assert_eq!(trailing_number("12AB34CD"), Some(34));
        assert_eq!(trailing_number("INV-"), None);
        assert_eq!(trailing_number(""), None);
    }

    #[test]
    fn trailing_number_ignores_non_ascii_digits() {
        assert_eq!(trailing_number("A-\u{0661}\u{0662}"), None);
        assert_eq!(trailing_number("7-\u{0661}"), Some(7));
    }

    #[test]
    fn overflowing_runs_are_ignored() {
        assert_eq!(trailing_number("A-99999999999999999999999"), None);
        assert_eq!(
            highest_number(["A-5", "A-99999999999999999999999"]),
            5
        );
    }

    #[test]
    fn numbers_above_the_counter_range_are_ignored() {
        assert_eq!(
            trailing_number("BARCODE-9223372036854775806"),
            Some(MAX_CARRIED_NUMBER)
        );
        assert_eq!(trailing_number("BARCODE-9223372036854775807"), None);
        assert_eq!(trailing_number("BARCODE-18446744073709551614"), None);
        assert_eq!(
            highest_number(["A-3", "BARCODE-18446744073709551614"]),
            3
        );
    }

    #[test]
    fn highest_number_of_scanned_ids() {
        assert_eq!(highest_number(["A-001", "A-007", "A-003"]), 7);
        assert_eq!(highest_number(Vec::<String>::new()), 0);
        assert_eq!(highest_number(["no digits", "still none"]), 0);
    }
}
