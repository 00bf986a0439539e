//! REST API access for the banking service.
//!
//! This module provides the `Gateway` every authenticated call goes
//! through, the `BankClient` built on top of it for accounts,
//! transactions and businesses, and the `Transport` seam that carries
//! requests to the network.
//!
//! The API uses JWT bearer tokens obtained from `POST /token/`; the
//! tokens are treated as opaque strings.

pub mod client;
pub mod error;
pub mod gateway;
pub mod transport;

pub use client::BankClient;
pub use error::ApiError;
pub use gateway::{ApiRequest, Gateway, Navigator, NoopNavigator};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
