// ABOUTME: Library root for slotswap - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod edge;
pub mod error;
pub mod health;
pub mod hooks;
pub mod output;
pub mod routes;
pub mod runtime;
pub mod slots;
pub mod switch;
pub mod types;
