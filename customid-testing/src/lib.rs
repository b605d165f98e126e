//! Test utilities for `customid` store adapters
//!
//! The [`contract`] module holds the behavioral contract every
//! `InventoryStore` implementation must satisfy, together with the
//! [`inventory_store_contract_tests!`] macro that expands it into a test
//! module for a concrete adapter.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod contract;
