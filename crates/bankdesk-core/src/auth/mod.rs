//! Authentication module for managing the credential lifecycle.
//!
//! This module provides:
//! - `SessionManager`: hydration, login, logout and coalesced token refresh
//! - `TokenStore`: durable key/value storage for the credential pair,
//!   backed by memory, a session file, or the OS keychain
//!
//! The manager is the only writer of persisted credentials.

pub mod error;
pub mod session;
pub mod store;

pub use error::{AuthError, RefreshError};
pub use session::{CredentialPair, Hydration, Session, SessionManager, SessionStatus, User};
pub use store::{FileStore, KeyringStore, MemoryStore, StoreError, TokenStore};
