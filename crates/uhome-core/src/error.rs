// ── Core error types ──
//
// Errors surfaced by the reconciliation core. Transport details stay in
// `uhome-api`; the `From<uhome_api::Error>` impl folds them into the
// taxonomy consumers act on (re-authorize, retry, or report).

use thiserror::Error;

use crate::coordinator::CoordinatorState;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    /// Token invalid or refresh rejected. The user has to re-authorize.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Vendor / transport ───────────────────────────────────────────
    #[error("API error: {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    // ── Caller errors ────────────────────────────────────────────────
    #[error("Device {device_id} does not support {capability}")]
    UnsupportedFeature {
        device_id: String,
        capability: String,
    },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Setup failed: {message}")]
    SetupFailed { message: String, retryable: bool },

    #[error("Coordinator not ready (state: {state})")]
    NotReady { state: CoordinatorState },

    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// `true` if the user has to re-authorize before anything will work.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }

    /// `true` if retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::NotReady { .. } => true,
            Self::Api { status, .. } => status.is_some_and(|s| s >= 500 || s == 429),
            Self::SetupFailed { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<uhome_api::Error> for CoreError {
    fn from(err: uhome_api::Error) -> Self {
        if err.is_auth_expired() {
            return CoreError::AuthenticationFailed {
                message: err.to_string(),
            };
        }

        match err {
            uhome_api::Error::Api { status, body } => CoreError::Api {
                status: Some(status),
                message: format!("HTTP {status}: {body}"),
            },
            uhome_api::Error::Vendor { code, message } => CoreError::Api {
                status: None,
                message: format!("{code}: {message}"),
            },
            uhome_api::Error::Transport(ref e) => match e.status() {
                Some(status) => CoreError::Api {
                    status: Some(status.as_u16()),
                    message: e.to_string(),
                },
                None => CoreError::Network {
                    message: e.to_string(),
                },
            },
            uhome_api::Error::RefreshFailed {
                message,
                network: true,
                ..
            } => CoreError::Network { message },
            uhome_api::Error::RefreshFailed {
                message, status, ..
            } => CoreError::Api { status, message },
            uhome_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            uhome_api::Error::Tls(message) => CoreError::Config {
                message: format!("TLS error: {message}"),
            },
            uhome_api::Error::Deserialization { message, body: _ } => CoreError::Validation {
                message: format!("unexpected response shape: {message}"),
            },
            uhome_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            uhome_api::Error::MissingRefreshToken => CoreError::AuthenticationFailed {
                message: "no refresh token available".into(),
            },
        }
    }
}
