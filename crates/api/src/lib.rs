//! Tradewind API library.
//!
//! The HTTP backend as a library: the binary in `main.rs` only loads
//! configuration, sets up telemetry and serves [`routes::router`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;
