use thiserror::Error;

/// Why a login attempt failed.
///
/// The `Display` text is what the sign-in form shows inline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid username or password. Please try again.")]
    InvalidCredentials,

    #[error("Server error. The authentication service is currently unavailable. Please try again later.")]
    ServiceUnavailable,

    #[error("Cannot connect to the server. Please check your internet connection and try again.")]
    NetworkUnreachable,

    #[error("Login failed. Please try again later. ({0})")]
    Unexpected(String),

    #[error("Failed to persist credentials: {0}")]
    Storage(String),
}

impl AuthError {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            400 | 401 => AuthError::InvalidCredentials,
            500..=599 => AuthError::ServiceUnavailable,
            _ => AuthError::Unexpected(format!("status {}", status)),
        }
    }
}

/// Why a token refresh failed.
///
/// Cloneable because one refresh outcome is shared by every caller that
/// was waiting on the same in-flight refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token found")]
    NoRefreshToken,

    #[error("Refresh token rejected (status {status})")]
    RefreshRejected { status: u16 },

    #[error("Network error during token refresh: {0}")]
    NetworkUnreachable(String),

    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("Failed to persist refreshed token: {0}")]
    Storage(String),
}
