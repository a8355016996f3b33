//! Core types for Tradewind.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod email;
pub mod id;
pub mod money;
pub mod slug;
pub mod status;

pub use address::{Address, AddressError};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{
    AmountError, FLAT_SHIPPING_FEE, FREE_SHIPPING_THRESHOLD, OrderTotals, TAX_RATE, line_total,
    to_minor_units,
};
pub use slug::{Slug, SlugError};
pub use status::*;
