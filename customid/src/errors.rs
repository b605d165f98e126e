//! Error types for custom ID generation.
//!
//! Errors are split by who has to act on them:
//!
//! - **`ValidationError`**: the caller sent something unusable; fix the input.
//! - **`ConflictError`**: the input was fine but collides with stored state;
//!   the caller decides whether to take the suggestion, retry or abort.
//! - **`StoreError`**: the persistence layer failed.
//!
//! [`CustomIdError`] is the union returned by the engine.
//!
//! Formatting never fails: malformed format specs degrade to plain output
//! and have no error type.

use thiserror::Error;

use crate::types::{ConfigVersion, CustomId, InventoryId, ItemId, ItemVersion};

/// Rejections raised while validating caller input.
///
/// Element positions are reported 1-based, the way a user counts them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The element list was empty.
    #[error("at least one element is required")]
    NoElements,

    /// More elements than a template may hold.
    #[error("maximum {max} elements allowed, got {count}")]
    TooManyElements {
        /// Number of elements received
        count: usize,
        /// The configured maximum
        max: usize,
    },

    /// An element without an `elementType`.
    #[error("element {} must have a type", .index + 1)]
    MissingElementType {
        /// Zero-based index of the element
        index: usize,
    },

    /// An `elementType` outside the known set.
    #[error("element {} has unrecognized type `{element_type}`", .index + 1)]
    UnknownElementType {
        /// Zero-based index of the element
        index: usize,
        /// The type name received
        element_type: String,
    },

    /// A fixed-text element with no literal.
    #[error("element {} of type FIXED_TEXT must have a value", .index + 1)]
    MissingFixedTextValue {
        /// Zero-based index of the element
        index: usize,
    },

    /// Two elements claim the same position.
    #[error("element {} repeats order {order}", .index + 1)]
    DuplicateOrder {
        /// Zero-based index of the second element with this order
        index: usize,
        /// The repeated order value
        order: u32,
    },

    /// A supplied inventory identifier was blank or too long.
    #[error("invalid inventory id: {0}")]
    InvalidInventoryId(String),

    /// A supplied or generated custom ID was empty.
    #[error("custom ID must not be empty")]
    EmptyCustomId,
}

impl ValidationError {
    /// Zero-based index of the offending element, when the error is about one.
    pub const fn element_index(&self) -> Option<usize> {
        match self {
            Self::MissingElementType { index }
            | Self::UnknownElementType { index, .. }
            | Self::MissingFixedTextValue { index }
            | Self::DuplicateOrder { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Collisions with stored state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    /// The custom ID is already used by another item of the inventory.
    ///
    /// `suggestion` is a freshly generated ID that was free when checked; it
    /// is `None` when the inventory has no template or no free candidate
    /// turned up.
    #[error("custom ID `{custom_id}` already exists in inventory `{inventory_id}`")]
    DuplicateCustomId {
        /// Inventory the collision happened in
        inventory_id: InventoryId,
        /// The colliding ID
        custom_id: CustomId,
        /// A free alternative, if one could be generated
        suggestion: Option<CustomId>,
    },

    /// The template was replaced since the caller read it.
    #[error(
        "custom ID configuration of inventory `{inventory_id}` was modified: expected version {expected:?}, current is {current:?}"
    )]
    StaleConfig {
        /// Inventory whose template changed
        inventory_id: InventoryId,
        /// Version the caller expected (`None` = expected no template)
        expected: Option<ConfigVersion>,
        /// Version actually stored (`None` = no template)
        current: Option<ConfigVersion>,
    },

    /// The item was modified since the caller read it.
    #[error("item `{item_id}` was modified: expected version {expected}, current is {current}")]
    StaleItem {
        /// Item that changed
        item_id: ItemId,
        /// Version the caller expected
        expected: ItemVersion,
        /// Version actually stored
        current: ItemVersion,
    },
}

/// Failures reported by an [`InventoryStore`](crate::store::InventoryStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The item does not exist.
    #[error("item `{0}` not found")]
    ItemNotFound(ItemId),

    /// The storage-level `(inventory, custom_id)` constraint rejected a write.
    #[error("custom ID `{custom_id}` already exists in inventory `{inventory_id}`")]
    DuplicateCustomId {
        /// Inventory of the rejected write
        inventory_id: InventoryId,
        /// The duplicate ID
        custom_id: CustomId,
    },

    /// A template replace found a different version than expected.
    #[error(
        "configuration version conflict for inventory `{inventory_id}`: expected {expected:?}, current is {current:?}"
    )]
    ConfigVersionConflict {
        /// Inventory of the rejected write
        inventory_id: InventoryId,
        /// Version the writer expected
        expected: Option<ConfigVersion>,
        /// Version found in storage
        current: Option<ConfigVersion>,
    },

    /// An item update found a different version than expected.
    #[error("item version conflict for `{item_id}`: expected {expected}, current is {current}")]
    ItemVersionConflict {
        /// Item of the rejected write
        item_id: ItemId,
        /// Version the writer expected
        expected: ItemVersion,
        /// Version found in storage
        current: ItemVersion,
    },

    /// The backend could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The backend rejected or failed an operation.
    #[error("database operation `{operation}` failed: {detail}")]
    Database {
        /// Name of the failed operation
        operation: &'static str,
        /// Backend error message
        detail: String,
    },

    /// Stored data could not be turned back into domain values.
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Everything the engine can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustomIdError {
    /// Caller input was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Input collided with stored state.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for engine operations.
pub type CustomIdResult<T> = Result<T, CustomIdError>;
