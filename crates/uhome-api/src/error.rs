use thiserror::Error;

/// Top-level error type for the `uhome-api` crate.
///
/// Covers every failure mode of the vendor cloud: OAuth2 token handling,
/// transport, HTTP status rejections, and in-band vendor errors.
/// `uhome-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token endpoint rejected the grant (revoked refresh token, bad client, ...).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The cached token expired and there is no refresh token to renew it.
    #[error("No refresh token available -- re-authorization required")]
    MissingRefreshToken,

    /// A concurrent refresh attempt this caller waited on failed.
    #[error("Token refresh failed: {message}")]
    RefreshFailed {
        message: String,
        network: bool,
        status: Option<u16>,
    },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (timeout, connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or HTTP client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Vendor API ──────────────────────────────────────────────────
    /// Non-success HTTP status from the action endpoint.
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Success status, but the response payload carried an `error` object.
    #[error("Vendor rejected request ({code}): {message}")]
    Vendor { code: String, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the credentials are no longer
    /// usable and the user has to re-authorize.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Authentication { .. } | Self::MissingRefreshToken => true,
            Self::Api { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }

    /// Returns `true` if the request never produced an HTTP response.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Transport(e) => e.status().is_none(),
            Self::RefreshFailed { network, .. } => *network,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::RefreshFailed {
                network, status, ..
            } => *network || status.is_some_and(|s| s >= 500 || s == 429),
            _ => false,
        }
    }

    /// HTTP status code, when the vendor answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::RefreshFailed { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_and_forbidden_require_reauth() {
        for status in [401, 403] {
            let err = Error::Api {
                status,
                body: String::new(),
            };
            assert!(err.is_auth_expired());
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let server = Error::Api {
            status: 503,
            body: "unavailable".into(),
        };
        let client = Error::Api {
            status: 422,
            body: "bad".into(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!client.is_auth_expired());
    }

    #[test]
    fn shared_refresh_failure_keeps_retry_class() {
        let err = Error::RefreshFailed {
            message: "API error (HTTP 503): busy".into(),
            network: false,
            status: Some(503),
        };
        assert!(err.is_transient());
        assert!(!err.is_network());
        assert!(!err.is_auth_expired());
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn vendor_rejection_is_not_auth() {
        let err = Error::Vendor {
            code: "INVALID_DEVICE".into(),
            message: "no such device".into(),
        };
        assert!(!err.is_auth_expired());
        assert!(!err.is_network());
        assert_eq!(err.status(), None);
    }
}
