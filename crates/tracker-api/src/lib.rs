//! Request-tracking core: sessions, the request lifecycle and role management,
//! plus the axum surface that exposes them.

pub mod auth;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod requests;
pub mod roles;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;
