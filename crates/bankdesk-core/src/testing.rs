//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Semaphore;

use crate::api::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::auth::store::{MemoryStore, StoreError, TokenStore};

pub const API_URL: &str = "http://bank.test/api";

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

pub fn reply(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
    let status = StatusCode::from_u16(status).expect("valid status code");
    Ok(HttpResponse::new(status, body))
}

impl HttpRequest {
    /// URL path below the test API root.
    pub fn path(&self) -> &str {
        self.url.strip_prefix(API_URL).unwrap_or(&self.url)
    }
}

/// Answers every request with a closure and records what was sent.
pub struct MockTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Hold every response until the test adds a permit to `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path() == path)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(ref gate) = self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        (self.handler)(&request)
    }
}

/// Memory store that counts `clear` calls.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    clears: AtomicUsize,
}

impl CountingStore {
    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl TokenStore for CountingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }

    fn replace_access_token(&self, refresh_token: &str, access_token: &str) -> Result<bool, StoreError> {
        self.inner.replace_access_token(refresh_token, access_token)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }
}
