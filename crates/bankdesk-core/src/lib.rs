//! Core library for the bankdesk console.
//!
//! The interesting part is the session lifecycle: [`auth::SessionManager`]
//! owns the persisted credential pair and [`api::Gateway`] routes every
//! resource call through a single point that attaches the bearer token,
//! refreshes it once on a 401 and tears the session down when the refresh
//! token is no longer accepted.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiError, ApiRequest, BankClient, Gateway, Navigator};
pub use auth::{Session, SessionManager, SessionStatus, TokenStore, User};
pub use config::Config;
