//! Shared domain and wire types for the maintenance tracker.

pub mod api;
pub mod models;
