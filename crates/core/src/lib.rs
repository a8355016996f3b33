//! Tradewind Core - Shared domain types.
//!
//! This crate provides the types used across all Tradewind components:
//! - `api` - The REST backend (auth, catalog, orders, payments)
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Order pricing and the order status
//! state machine live here so they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, slugs, addresses, money and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
