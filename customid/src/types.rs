//! Core identifier and version types.
//!
//! All types use smart constructors so that a value, once built, is valid
//! everywhere it travels. Parse at the boundary, never re-check inside.

use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the inventory (collection) that owns items and a custom ID
/// template.
///
/// `InventoryId` values are trimmed, non-empty and at most 255 characters.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct InventoryId(String);

/// The business-facing identifier of an inventory item.
///
/// Custom IDs are stored exactly as generated or supplied. The only rule is
/// that they are non-empty; whitespace is significant because fixed-text
/// elements may legitimately contain it.
#[nutype(
    validate(not_empty),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct CustomId(String);

/// Storage identifier of an inventory item (UUIDv7, time ordered).
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsRef,
    Deref,
    Display,
    Serialize,
    Deserialize
))]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generates a fresh, time-ordered item identifier.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Optimistic-lock version of a saved custom ID configuration.
///
/// The first save produces version 1; every replace increments it.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Into,
    Serialize,
    Deserialize
))]
pub struct ConfigVersion(u64);

impl ConfigVersion {
    /// The version assigned by the first save.
    pub fn initial() -> Self {
        Self::new(1)
    }

    /// Returns the version following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self::new(self.into_inner().saturating_add(1))
    }
}

/// Optimistic-lock version of an inventory item.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Into,
    Serialize,
    Deserialize
))]
pub struct ItemVersion(u64);

impl ItemVersion {
    /// The version of a freshly inserted item.
    pub fn initial() -> Self {
        Self::new(1)
    }

    /// Returns the version following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self::new(self.into_inner().saturating_add(1))
    }
}

/// A UTC instant recorded by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a new timestamp from a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Creates a timestamp representing the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Converts the timestamp into the underlying `DateTime`.
    pub const fn into_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.into_datetime()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn inventory_id_accepts_valid_strings(s in "[a-zA-Z0-9_-]{1,255}") {
            let id = InventoryId::try_new(s.clone()).unwrap();
            prop_assert_eq!(id.as_ref(), &s);
        }

        #[test]
        fn inventory_id_trims_whitespace(s in " {0,10}[a-zA-Z0-9_-]{1,240} {0,10}") {
            let id = InventoryId::try_new(s.clone()).unwrap();
            prop_assert_eq!(id.as_ref(), s.trim());
        }

        #[test]
        fn inventory_id_rejects_blank_strings(s in " {0,50}") {
            prop_assert!(InventoryId::try_new(s).is_err());
        }

        #[test]
        fn inventory_id_rejects_strings_over_255_chars(s in "[a-zA-Z0-9]{256,400}") {
            prop_assert!(InventoryId::try_new(s).is_err());
        }

        #[test]
        fn custom_id_preserves_surrounding_whitespace(s in " {1,3}[A-Z0-9-]{1,20} {1,3}") {
            let id = CustomId::try_new(s.clone()).unwrap();
            prop_assert_eq!(id.as_ref(), &s);
        }

        #[test]
        fn config_version_next_increments_by_one(v in 1u64..u64::MAX) {
            let next = ConfigVersion::new(v).next().into_inner();
            prop_assert_eq!(next, v + 1);
        }
    }

    #[test]
    fn custom_id_rejects_empty_string() {
        assert!(CustomId::try_new(String::new()).is_err());
    }

    #[test]
    fn generated_item_ids_are_unique_v7() {
        let first = ItemId::generate();
        let second = ItemId::generate();
        assert_ne!(first, second);
        assert_eq!(first.get_version_num(), 7);
    }

    #[test]
    fn versions_start_at_one() {
        assert_eq!(ConfigVersion::initial().into_inner(), 1);
        assert_eq!(ItemVersion::initial().into_inner(), 1);
    }
}
