//! HTTP surface for the Omnicast publishing engine
//!
//! Library target so the router can be exercised in integration tests; the
//! binary entry point lives in `main.rs`.

pub mod auth;
pub mod routes;
pub mod state;
