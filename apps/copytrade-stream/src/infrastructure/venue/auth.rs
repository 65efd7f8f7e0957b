//! Venue WebSocket Authentication
//!
//! Private channels must authenticate before any subscription is accepted.
//!
//! # Authentication Flow
//!
//! 1. Connect to the private endpoint
//! 2. Send `{"op":"auth","args":[api_key, expires, signature]}` where
//!    `signature = hex(HMAC_SHA256(secret, "GET/realtime" + expires))`
//! 3. Receive `{"success":true,"op":"auth",...}` or a rejection
//!
//! `expires` is a Unix timestamp in milliseconds shortly in the future. The
//! venue rejects requests whose expiry has already passed.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::messages::{OpRequest, OpResponse};
use crate::domain::channel::ChannelType;

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Constants
// =============================================================================

/// Prefix of the string signed for WebSocket authentication.
const SIGNATURE_PAYLOAD_PREFIX: &str = "GET/realtime";

/// Default lifetime of an auth request's `expires` value.
pub const DEFAULT_AUTH_EXPIRES: Duration = Duration::from_secs(1);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Credentials are missing or incomplete.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The venue rejected the auth request.
    #[error("authentication rejected: {0}")]
    Rejected(String),

    /// No verdict arrived within the auth timeout.
    #[error("authentication timeout: no response from venue")]
    Timeout,

    /// Computing the signature failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

// =============================================================================
// Authentication State
// =============================================================================

/// Current state of authentication on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Auth request not sent yet.
    #[default]
    Idle,

    /// Auth request sent, awaiting the verdict.
    Authenticating,

    /// Venue accepted the credentials.
    Authenticated,

    /// Venue rejected the credentials.
    Failed,
}

impl AuthState {
    /// Check if currently authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Venue API credentials.
///
/// The `Debug` implementation redacts the secret for safe logging.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthorized` if either key or secret is empty.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();

        if api_key.is_empty() {
            return Err(AuthError::Unauthorized(
                "API key cannot be empty".to_string(),
            ));
        }
        if api_secret.is_empty() {
            return Err(AuthError::Unauthorized(
                "API secret cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            api_secret,
        })
    }

    /// Resolve optional key and secret for a channel.
    ///
    /// Empty strings count as absent. Returns `Ok(None)` when neither is
    /// supplied and the channel does not authenticate.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthorized` when only one half is supplied, or
    /// when the channel requires authentication and none is supplied.
    pub fn resolve(
        api_key: Option<String>,
        api_secret: Option<String>,
        channel: ChannelType,
    ) -> Result<Option<Self>, AuthError> {
        let api_key = api_key.filter(|k| !k.is_empty());
        let api_secret = api_secret.filter(|s| !s.is_empty());

        match (api_key, api_secret) {
            (Some(key), Some(secret)) => Self::new(key, secret).map(Some),
            (None, None) if channel.requires_auth() => Err(AuthError::Unauthorized(format!(
                "API key and secret are required for the {channel} channel"
            ))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(AuthError::Unauthorized(
                "API secret is missing".to_string(),
            )),
            (None, Some(_)) => Err(AuthError::Unauthorized("API key is missing".to_string())),
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Sign an auth request expiring at `expires` (Unix ms).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the HMAC cannot be keyed.
    pub fn sign(&self, expires: i64) -> Result<String, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        mac.update(SIGNATURE_PAYLOAD_PREFIX.as_bytes());
        mac.update(expires.to_string().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build a signed auth request expiring at `expires` (Unix ms).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if signing fails.
    pub fn auth_request(&self, expires: i64) -> Result<OpRequest, AuthError> {
        Ok(OpRequest::auth(&self.api_key, expires, self.sign(expires)?))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Authentication Handler
// =============================================================================

/// Tracks authentication for a single connection.
///
/// A fresh handler is created per connection attempt, so each connection
/// authenticates at most once.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use copytrade_stream::infrastructure::venue::auth::{AuthHandler, Credentials};
/// use copytrade_stream::infrastructure::venue::messages::OpResponse;
///
/// let creds = Credentials::new("key", "secret").unwrap();
/// let mut auth = AuthHandler::new(creds, Duration::from_secs(1));
///
/// let request = auth.create_auth_request().unwrap();
/// assert_eq!(request.args.len(), 3);
///
/// let verdict = OpResponse { op: "auth".into(), success: Some(true), ..Default::default() };
/// assert!(auth.on_response(&verdict).unwrap());
/// assert!(auth.is_authenticated());
/// ```
#[derive(Debug)]
pub struct AuthHandler {
    credentials: Credentials,
    expires_after: Duration,
    state: AuthState,
}

impl AuthHandler {
    /// Create a handler whose requests expire `expires_after` from now.
    #[must_use]
    pub const fn new(credentials: Credentials, expires_after: Duration) -> Self {
        Self {
            credentials,
            expires_after,
            state: AuthState::Idle,
        }
    }

    /// Get the current authentication state.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// Check if currently authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Create a signed auth request expiring relative to the current time.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if signing fails.
    pub fn create_auth_request(&mut self) -> Result<OpRequest, AuthError> {
        let lifetime = i64::try_from(self.expires_after.as_millis()).unwrap_or(i64::MAX);
        let expires = chrono::Utc::now().timestamp_millis().saturating_add(lifetime);
        let request = self.credentials.auth_request(expires)?;
        self.state = AuthState::Authenticating;
        Ok(request)
    }

    /// Process an auth verdict.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if this verdict completed authentication
    /// - `Ok(false)` if the connection was already authenticated
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` with the venue's message when the
    /// verdict is negative.
    pub fn on_response(&mut self, response: &OpResponse) -> Result<bool, AuthError> {
        if response.success == Some(true) {
            if self.state.is_authenticated() {
                return Ok(false);
            }
            self.state = AuthState::Authenticated;
            return Ok(true);
        }

        self.state = AuthState::Failed;
        let reason = if response.ret_msg.is_empty() {
            "no reason given".to_string()
        } else {
            response.ret_msg.clone()
        };
        Err(AuthError::Rejected(reason))
    }
}
