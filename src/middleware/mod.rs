pub mod auth;

pub use auth::{authenticate, enforce_gate, gated};
