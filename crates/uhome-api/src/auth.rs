// OAuth2 token lifecycle
//
// `OAuthClient` talks to the vendor token endpoint (authorization-code
// exchange and refresh). `TokenProvider` caches the current token and
// hands out bearer tokens on demand, refreshing single-flight when the
// cached token is inside the expiry margin.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

pub const OAUTH2_AUTHORIZE_URL: &str = "https://oauth.u-tec.com/authorize";
pub const OAUTH2_TOKEN_URL: &str = "https://oauth.u-tec.com/token";
pub const DEFAULT_SCOPE: &str = "openapi";

/// Tokens are treated as expired this long before the server says so.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

// ── Token ────────────────────────────────────────────────────────────

/// An OAuth2 bearer token pair.
///
/// `expires_at` already has [`EXPIRY_MARGIN`] subtracted, so a token is
/// usable exactly while `now < expires_at`. Tokens are never mutated;
/// a refresh produces a new `Token` that replaces the old one wholesale.
#[derive(Debug, Clone)]
pub struct Token {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    expires_at: DateTime<Utc>,
}

impl Token {
    /// Build a token from a relative lifetime as reported by the server.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in: Duration,
    ) -> Self {
        let secs = i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX);
        Self::from_expires_in(access_token.into(), refresh_token, secs, Utc::now())
    }

    /// Rebuild a token from a persisted, already margin-adjusted expiry.
    pub fn restore(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: refresh_token.map(SecretString::from),
            expires_at,
        }
    }

    /// A token that only carries a refresh token. The first
    /// [`TokenProvider::get_valid_token`] call refreshes it.
    pub fn refresh_only(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(String::new()),
            refresh_token: Some(SecretString::from(refresh_token.into())),
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn from_expires_in(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let margin = i64::try_from(EXPIRY_MARGIN.as_secs()).unwrap_or(0);
        let usable = expires_in_secs.saturating_sub(margin).max(0);
        let expires_at = TimeDelta::try_seconds(usable)
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            access_token: SecretString::from(access_token),
            refresh_token: refresh_token.map(SecretString::from),
            expires_at,
        }
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.expose_secret().is_empty() && now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// Raw token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    /// Convert into a [`Token`]. A refresh response without a new refresh
    /// token keeps the previous one.
    fn into_token(self, previous_refresh: Option<&SecretString>) -> Token {
        let refresh = self
            .refresh_token
            .or_else(|| previous_refresh.map(|r| r.expose_secret().to_owned()));
        Token::from_expires_in(
            self.access_token,
            refresh,
            self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            Utc::now(),
        )
    }
}

// ── OAuthConfig ──────────────────────────────────────────────────────

/// Client registration and endpoints for the vendor OAuth2 server.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub authorize_url: Url,
    pub token_url: Url,
    pub scope: String,
}

impl OAuthConfig {
    /// Config pointing at the production vendor endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: SecretString) -> Result<Self, Error> {
        Ok(Self {
            client_id: client_id.into(),
            client_secret,
            authorize_url: Url::parse(OAUTH2_AUTHORIZE_URL)?,
            token_url: Url::parse(OAUTH2_TOKEN_URL)?,
            scope: DEFAULT_SCOPE.into(),
        })
    }

    pub fn with_token_url(mut self, token_url: Url) -> Self {
        self.token_url = token_url;
        self
    }

    pub fn with_authorize_url(mut self, authorize_url: Url) -> Self {
        self.authorize_url = authorize_url;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

// ── OAuthClient ──────────────────────────────────────────────────────

/// HTTP client for the OAuth2 token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, config })
    }

    /// Create an OAuth client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, config: OAuthConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// The URL the user visits to grant access.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> Url {
        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.config.scope)
            .append_pair("state", state);
        url
    }

    /// Exchange an authorization code for the first token pair.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Token, Error> {
        debug!("exchanging authorization code");
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;
        Ok(response.into_token(None))
    }

    /// Use a refresh token to obtain a new token pair.
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<Token, Error> {
        debug!("refreshing access token");
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .await?;
        Ok(response.into_token(Some(refresh_token)))
    }

    async fn token_request(&self, grant: &[(&str, &str)]) -> Result<TokenResponse, Error> {
        let mut form: Vec<(&str, &str)> = grant.to_vec();
        form.push(("client_id", &self.config.client_id));
        form.push(("client_secret", self.config.client_secret.expose_secret()));

        let resp = self
            .http
            .post(self.config.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if matches!(status.as_u16(), 400 | 401) {
            return Err(Error::Authentication {
                message: format!("token endpoint rejected grant (HTTP {status}): {body}"),
            });
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

// ── TokenProvider ────────────────────────────────────────────────────

/// Supplies valid bearer tokens, refreshing single-flight.
///
/// Concurrent callers that find the cached token stale queue on a refresh
/// gate; the first one refreshes, the rest observe its outcome when they
/// get the gate and return without touching the network. A failed attempt
/// is shared as [`Error::RefreshFailed`]; only callers arriving after it
/// finished start a new one. Once the
/// server rejects the refresh token every call fails fast with
/// [`Error::Authentication`] until [`replace`](Self::replace) installs a
/// freshly authorized token.
pub struct TokenProvider {
    oauth: OAuthClient,
    current: ArcSwap<Token>,
    refresh_gate: tokio::sync::Mutex<()>,
    /// Completed refresh attempts, successful or not.
    attempts: AtomicU64,
    last_failure: Mutex<Option<RefreshFailure>>,
    rejected: Mutex<Option<String>>,
    updates: watch::Sender<Arc<Token>>,
}

/// Outcome of a failed refresh, replayed to the callers that waited on it.
#[derive(Debug, Clone)]
struct RefreshFailure {
    message: String,
    network: bool,
    status: Option<u16>,
}

impl RefreshFailure {
    fn from_error(err: &Error) -> Self {
        Self {
            message: err.to_string(),
            network: err.is_network(),
            status: err.status(),
        }
    }

    fn into_error(self) -> Error {
        Error::RefreshFailed {
            message: self.message,
            network: self.network,
            status: self.status,
        }
    }
}

impl TokenProvider {
    pub fn new(oauth: OAuthClient, token: Token) -> Self {
        let token = Arc::new(token);
        let (updates, _) = watch::channel(Arc::clone(&token));
        Self {
            oauth,
            current: ArcSwap::new(token),
            refresh_gate: tokio::sync::Mutex::new(()),
            attempts: AtomicU64::new(0),
            last_failure: Mutex::new(None),
            rejected: Mutex::new(None),
            updates,
        }
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    /// The cached token, valid or not.
    pub fn current(&self) -> Arc<Token> {
        self.current.load_full()
    }

    /// Subscribe to token replacements (for persisting rotated tokens).
    pub fn subscribe(&self) -> watch::Receiver<Arc<Token>> {
        self.updates.subscribe()
    }

    /// Install a token obtained through a new authorization.
    pub fn replace(&self, token: Token) {
        let token = Arc::new(token);
        self.current.store(Arc::clone(&token));
        *self.rejected.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.updates.send_replace(token);
        info!("access token replaced");
    }

    /// Return a token valid for at least [`EXPIRY_MARGIN`], refreshing first
    /// if needed.
    pub async fn get_valid_token(&self) -> Result<Arc<Token>, Error> {
        self.check_rejected()?;
        let token = self.current.load_full();
        if token.is_valid() {
            return Ok(token);
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let _gate = self.refresh_gate.lock().await;

        // Another caller may have refreshed (or been rejected) while we waited.
        self.check_rejected()?;
        let token = self.current.load_full();
        if token.is_valid() {
            return Ok(token);
        }
        if self.attempts.load(Ordering::Acquire) != seen {
            let failure = self
                .last_failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(failure) = failure {
                debug!("sharing failed refresh with waiting caller");
                return Err(failure.into_error());
            }
        }

        let Some(refresh_token) = token.refresh_token() else {
            warn!("access token expired and no refresh token is available");
            return Err(Error::MissingRefreshToken);
        };

        let result = self.oauth.refresh(refresh_token).await;
        *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) =
            result.as_ref().err().map(RefreshFailure::from_error);
        self.attempts.fetch_add(1, Ordering::Release);

        match result {
            Ok(fresh) => {
                let fresh = Arc::new(fresh);
                self.current.store(Arc::clone(&fresh));
                self.updates.send_replace(Arc::clone(&fresh));
                debug!(expires_at = %fresh.expires_at(), "access token refreshed");
                Ok(fresh)
            }
            Err(e) => {
                if e.is_auth_expired() {
                    warn!(error = %e, "refresh token rejected; re-authorization required");
                    *self.rejected.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    fn check_rejected(&self) -> Result<(), Error> {
        match &*self.rejected.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(message) => Err(Error::Authentication {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("client_id", &self.oauth.config.client_id)
            .field("expires_at", &self.current.load().expires_at())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_margin_is_subtracted() {
        let now = Utc::now();
        let token = Token::from_expires_in("a".into(), None, 3600, now);
        assert_eq!(token.expires_at(), now + TimeDelta::seconds(3570));
        assert!(token.is_valid_at(now));
        assert!(!token.is_valid_at(now + TimeDelta::seconds(3570)));
    }

    #[test]
    fn lifetime_shorter_than_margin_is_immediately_stale() {
        let now = Utc::now();
        let token = Token::from_expires_in("a".into(), None, 10, now);
        assert!(!token.is_valid_at(now));
    }

    #[test]
    fn refresh_only_token_is_never_valid() {
        let token = Token::refresh_only("r");
        assert!(!token.is_valid());
        assert!(token.refresh_token().is_some());
    }

    #[test]
    fn refresh_response_without_refresh_token_keeps_previous() {
        let previous = SecretString::from("old-refresh".to_string());
        let response = TokenResponse {
            access_token: "new-access".into(),
            refresh_token: None,
            expires_in: Some(600),
        };
        let token = response.into_token(Some(&previous));
        assert_eq!(
            token.refresh_token().map(|r| r.expose_secret().to_owned()),
            Some("old-refresh".to_string())
        );
    }
}
