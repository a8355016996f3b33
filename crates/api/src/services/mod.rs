//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login, JWT issue/verify, profile management
//! - `catalog` - Products and categories with role-scoped visibility
//! - `orders` - Order placement, status workflow and cancellation
//! - `payments` - Payment intents, confirmation and webhook handling
//!
//! Services borrow the pool from [`AppState`](crate::state::AppState) and are
//! built per request.

pub mod auth;
pub mod catalog;
pub mod orders;
pub mod payments;
