//! `customid` - Custom ID generation for multi-tenant inventories
//!
//! Every inventory may carry a template: an ordered list of elements (fixed
//! text, random numbers, GUID, date/time, sequence) from which the
//! business-facing identifier of each new item is assembled. This crate
//! validates and stores templates, renders them in preview and final mode,
//! resolves per-inventory sequence numbers and keeps custom IDs unique
//! within their inventory.
//!
//! Storage is abstracted behind [`InventoryStore`]; see `customid-memory` and
//! `customid-postgres` for adapters.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod assembler;
pub mod config;
pub mod config_store;
pub mod element;
pub mod engine;
pub mod errors;
pub mod format;
pub mod generate;
pub mod guard;
pub mod sequence;
pub mod store;
pub mod types;
pub mod validation;

pub use assembler::{Assembler, AssemblyMode};
pub use config::{EngineConfig, GenerationAttempts, SequenceStrategy, SuggestionAttempts};
pub use element::{
    CustomIdConfig, CustomIdElement, Element, ElementDraft, ElementType, MAX_ELEMENTS,
};
pub use engine::CustomIdEngine;
pub use errors::{
    ConflictError, CustomIdError, CustomIdResult, StoreError, StoreResult, ValidationError,
};
pub use generate::{Clock, FixedClock, SystemClock};
pub use store::{ExpectedVersion, InventoryItem, InventoryStore, NewItem};
pub use types::{ConfigVersion, CustomId, InventoryId, ItemId, ItemVersion, Timestamp};
