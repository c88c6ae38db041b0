//! HTTP surface of the promo code giveaway.
//!
//! The binary in `main.rs` wires configuration, storage and the identity
//! provider together and serves [`api::create_router`].

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
