//! Shared HTTP handlers.

pub mod health;
