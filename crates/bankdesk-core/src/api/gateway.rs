//! The authenticated request gateway.
//!
//! Every resource call goes through [`Gateway::request`]. It attaches the
//! stored bearer token, and when the server answers 401 it asks the
//! session manager for a fresh access token and replays the request once.
//! If the refresh token is rejected too, the session is torn down and the
//! user is sent back to the sign-in page.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::transport::{HttpRequest, HttpResponse, Transport};
use super::ApiError;
use crate::auth::SessionManager;
use crate::config::join_url;

/// A 401 is retried at most this many times, after a successful refresh.
const MAX_AUTH_RETRIES: u32 = 1;

/// Receives the redirect to the sign-in entry point when a session ends.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator for contexts with nowhere to redirect to.
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, path: &str) {
        debug!(path = path, "Sign-in redirect ignored");
    }
}

/// An API call as issued by the caller. Never modified by retries.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path, None)
    }

    pub fn post(path: impl Into<String>, body: Option<Value>) -> Self {
        Self::new(Method::POST, path, body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path, Some(body))
    }
}

/// Clone is cheap - everything inside is shared.
#[derive(Clone)]
pub struct Gateway {
    session: Arc<SessionManager>,
    transport: Arc<dyn Transport>,
    navigator: Arc<dyn Navigator>,
    sign_in_path: String,
}

impl Gateway {
    pub fn new(
        session: Arc<SessionManager>,
        transport: Arc<dyn Transport>,
        navigator: Arc<dyn Navigator>,
        sign_in_path: &str,
    ) -> Self {
        Self {
            session,
            transport,
            navigator,
            sign_in_path: sign_in_path.to_string(),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Issue `method path` with an optional JSON body and decode the reply.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        self.send(&ApiRequest::new(method, path, body)).await
    }

    pub async fn send(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let mut bearer = self.session.access_token();
        let mut attempt = 0;

        loop {
            let response = self.dispatch(request, bearer.as_deref(), attempt).await?;
            if response.status != StatusCode::UNAUTHORIZED {
                return Self::decode(request, response);
            }
            if attempt >= MAX_AUTH_RETRIES {
                warn!(method = %request.method, path = %request.path, "Still unauthorized after token refresh");
                return Err(ApiError::Unauthorized);
            }
            attempt += 1;

            debug!(method = %request.method, path = %request.path, "Access token rejected, refreshing");
            match self.session.refresh().await {
                Ok(token) => bearer = Some(token),
                Err(e) => {
                    warn!(error = %e, "Token refresh failed, ending session");
                    self.end_session();
                    return Err(ApiError::SessionExpired);
                }
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
        attempt: u32,
    ) -> Result<HttpResponse, ApiError> {
        let mut http = HttpRequest::new(
            request.method.clone(),
            join_url(self.session.api_url(), &request.path),
        );
        if let Some(token) = bearer {
            http = http.bearer(token);
        }
        if let Some(ref body) = request.body {
            http = http.json(body.clone());
        }

        debug!(method = %request.method, path = %request.path, attempt = attempt, "API request");
        self.transport.send(http).await.map_err(|e| {
            warn!(method = %request.method, path = %request.path, error = %e, "API request failed");
            ApiError::from(e)
        })
    }

    fn decode(request: &ApiRequest, response: HttpResponse) -> Result<Value, ApiError> {
        if !response.is_success() {
            warn!(
                method = %request.method,
                path = %request.path,
                status = response.status.as_u16(),
                "API error response"
            );
            return Err(ApiError::from_status(response.status, &response.body));
        }
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| {
            ApiError::InvalidResponse(format!("{} {}: {}", request.method, request.path, e))
        })
    }

    fn end_session(&self) {
        if !self.session.expire() {
            debug!("Session already ended by another request");
            return;
        }
        info!(path = %self.sign_in_path, "Redirecting to sign-in");
        self.navigator.navigate(&self.sign_in_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
    use crate::auth::{MemoryStore, SessionStatus};
    use crate::testing::{reply, CountingStore, MockTransport, API_URL};
    use crate::api::transport::TransportError;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNavigator {
        visits: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, path: &str) {
            self.visits.lock().unwrap().push(path.to_string());
        }
    }

    impl RecordingNavigator {
        fn visits(&self) -> Vec<String> {
            self.visits.lock().unwrap().clone()
        }
    }

    struct Harness {
        gateway: Gateway,
        transport: Arc<MockTransport>,
        navigator: Arc<RecordingNavigator>,
    }

    fn harness(transport: MockTransport, store: Arc<dyn TokenStore>) -> Harness {
        let transport = Arc::new(transport);
        let navigator = Arc::new(RecordingNavigator::default());
        let session = Arc::new(SessionManager::new(transport.clone(), store, API_URL));
        let gateway = Gateway::new(session, transport.clone(), navigator.clone(), "/login");
        Harness {
            gateway,
            transport,
            navigator,
        }
    }

    /// Backend where only `a2` is a live access token and only `r1` can be refreshed.
    fn bank_backend() -> MockTransport {
        MockTransport::new(|req| {
            let body = req.body.clone().unwrap_or_default();
            match req.path() {
                "/token/" if body["password"] == "correct" => {
                    reply(200, r#"{"access":"a1","refresh":"r1"}"#)
                }
                "/token/" => reply(401, "{}"),
                "/token/refresh/" if body["refresh"] == "r1" => reply(200, r#"{"access":"a2"}"#),
                "/token/refresh/" => reply(401, r#"{"detail":"Token is invalid or expired"}"#),
                _ if req.authorization() != Some("Bearer a2") => reply(401, r#"{"detail":"expired"}"#),
                "/accounts/" => reply(200, r#"[{"id":"1","name":"Main"}]"#),
                "/accounts/9/" => reply(404, r#"{"detail":"Not found."}"#),
                "/accounts/1/enable_roundup/" => reply(204, ""),
                "/boom/" => reply(500, "oops"),
                _ => reply(404, ""),
            }
        })
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_retried_once() {
        let store = Arc::new(MemoryStore::new());
        let h = harness(bank_backend(), store.clone());
        h.gateway.session().login("alice", "correct").await.unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a1"));

        let accounts = h.gateway.request(Method::GET, "/accounts/", None).await.unwrap();

        assert_eq!(accounts, json!([{"id": "1", "name": "Main"}]));
        let calls = h.transport.requests_to("/accounts/");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].authorization(), Some("Bearer a1"));
        assert_eq!(calls[1].authorization(), Some("Bearer a2"));
        assert_eq!(h.transport.requests_to("/token/refresh/").len(), 1);
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a2"));
        assert!(h.navigator.visits().is_empty());
        assert!(h.gateway.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_retry_preserves_method_and_body() {
        let transport = MockTransport::new(|req| match req.authorization() {
            Some("Bearer a2") => reply(201, r#"{"ok":true}"#),
            _ if req.path() == "/token/refresh/" => reply(200, r#"{"access":"a2"}"#),
            _ => reply(401, ""),
        });
        let store = Arc::new(MemoryStore::new());
        store.set(ACCESS_TOKEN_KEY, "a1").unwrap();
        store.set(REFRESH_TOKEN_KEY, "r1").unwrap();
        let h = harness(transport, store);

        let body = json!({"transaction_type": "payment", "amount": "12.50", "from_account": "1"});
        h.gateway
            .request(Method::POST, "/transactions/", Some(body.clone()))
            .await
            .unwrap();

        let calls = h.transport.requests_to("/transactions/");
        assert_eq!(calls.len(), 2);
        for call in &calls {
            assert_eq!(call.method, Method::POST);
            assert_eq!(call.body.as_ref(), Some(&body));
        }
    }

    #[tokio::test]
    async fn test_second_401_is_not_retried_again() {
        // Refresh succeeds but the new token is rejected as well
        let transport = MockTransport::new(|req| match req.path() {
            "/token/refresh/" => reply(200, r#"{"access":"a2"}"#),
            _ => reply(401, ""),
        });
        let store = Arc::new(MemoryStore::new());
        store.set(ACCESS_TOKEN_KEY, "a1").unwrap();
        store.set(REFRESH_TOKEN_KEY, "r1").unwrap();
        let h = harness(transport, store.clone());

        let err = h.gateway.request(Method::GET, "/accounts/", None).await.unwrap_err();

        assert_eq!(err, ApiError::Unauthorized);
        assert_eq!(h.transport.requests_to("/accounts/").len(), 2);
        assert_eq!(h.transport.requests_to("/token/refresh/").len(), 1);
        // The pair is still valid as far as the client knows
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
        assert!(h.navigator.visits().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_logs_out_once_and_redirects() {
        let store = Arc::new(CountingStore::default());
        let h = harness(bank_backend(), store.clone());
        h.gateway.session().login("alice", "correct").await.unwrap();
        // Revoke the refresh token server-side
        store.set(REFRESH_TOKEN_KEY, "revoked").unwrap();

        let err = h.gateway.request(Method::GET, "/accounts/", None).await.unwrap_err();

        assert_eq!(err, ApiError::SessionExpired);
        assert!(err.requires_sign_in());
        assert_eq!(store.clears(), 1);
        assert!(store.inner.is_empty());
        assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);
        assert_eq!(h.transport.requests_to("/accounts/").len(), 1);

        let session = h.gateway.session().session();
        assert_eq!(session.status, SessionStatus::RefreshFailed);
        assert_eq!(session.user, None);
    }

    #[tokio::test]
    async fn test_401_without_any_credentials_expires_session() {
        let h = harness(bank_backend(), Arc::new(MemoryStore::new()));

        let err = h.gateway.request(Method::GET, "/accounts/", None).await.unwrap_err();

        assert_eq!(err, ApiError::SessionExpired);
        let calls = h.transport.requests_to("/accounts/");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].authorization(), None);
        // No refresh token, so nothing was sent to the refresh endpoint
        assert!(h.transport.requests_to("/token/refresh/").is_empty());
        assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_other_failures_are_not_retried() {
        let store = Arc::new(MemoryStore::new());
        store.set(ACCESS_TOKEN_KEY, "a2").unwrap();
        store.set(REFRESH_TOKEN_KEY, "r1").unwrap();
        let h = harness(bank_backend(), store);

        let err = h.gateway.request(Method::GET, "/accounts/9/", None).await.unwrap_err();
        assert_eq!(err, ApiError::NotFound(r#"{"detail":"Not found."}"#.to_string()));

        let err = h.gateway.request(Method::GET, "/boom/", None).await.unwrap_err();
        assert_eq!(err, ApiError::ServerError("oops".to_string()));

        assert_eq!(h.transport.requests_to("/accounts/9/").len(), 1);
        assert_eq!(h.transport.requests_to("/boom/").len(), 1);
        assert!(h.transport.requests_to("/token/refresh/").is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_is_classified() {
        let transport = MockTransport::new(|_| Err(TransportError::Unreachable("connection refused".into())));
        let h = harness(transport, Arc::new(MemoryStore::new()));

        let err = h.gateway.request(Method::GET, "/accounts/", None).await.unwrap_err();
        assert_eq!(err, ApiError::NetworkUnreachable("connection refused".to_string()));
        assert_eq!(h.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        let store = Arc::new(MemoryStore::new());
        store.set(ACCESS_TOKEN_KEY, "a2").unwrap();
        let h = harness(bank_backend(), store);

        let value = h
            .gateway
            .request(Method::POST, "/accounts/1/enable_roundup/", None)
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_invalid_response() {
        let transport = MockTransport::new(|_| reply(200, "<html>"));
        let h = harness(transport, Arc::new(MemoryStore::new()));

        let err = h.gateway.request(Method::GET, "/accounts/", None).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_parallel_401s_with_failed_refresh_redirect_once() {
        let store = Arc::new(CountingStore::default());
        store.set(ACCESS_TOKEN_KEY, "a1").unwrap();
        store.set(REFRESH_TOKEN_KEY, "revoked").unwrap();
        let h = harness(bank_backend(), store.clone());

        let (a, b) = tokio::join!(
            h.gateway.request(Method::GET, "/accounts/", None),
            h.gateway.request(Method::GET, "/accounts/", None),
        );

        assert_eq!(a, Err(ApiError::SessionExpired));
        assert_eq!(b, Err(ApiError::SessionExpired));
        assert_eq!(h.transport.requests_to("/token/refresh/").len(), 1);
        assert_eq!(store.clears(), 1);
        assert_eq!(h.navigator.visits(), vec!["/login".to_string()]);
        assert_eq!(h.gateway.session().session().status, SessionStatus::RefreshFailed);
    }

    #[tokio::test]
    async fn test_unreadable_body_is_invalid_response() {
        let transport = MockTransport::new(|_| Err(TransportError::Body("connection reset".into())));
        let h = harness(transport, Arc::new(MemoryStore::new()));

        let err = h.gateway.request(Method::GET, "/accounts/", None).await.unwrap_err();
        assert_eq!(err, ApiError::InvalidResponse("connection reset".to_string()));
    }

    #[tokio::test]
    async fn test_parallel_401s_share_one_refresh() {
        let store = Arc::new(MemoryStore::new());
        store.set(ACCESS_TOKEN_KEY, "a1").unwrap();
        store.set(REFRESH_TOKEN_KEY, "r1").unwrap();
        let h = harness(bank_backend(), store);

        let (a, b) = tokio::join!(
            h.gateway.request(Method::GET, "/accounts/", None),
            h.gateway.request(Method::GET, "/accounts/", None),
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(h.transport.requests_to("/token/refresh/").len(), 1);
    }
}
