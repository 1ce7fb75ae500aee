//! Shared configuration for the Uhome CLI and host adapters.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! OAuth token persistence, and translation to the runtime configs of
//! `uhome_api` and `uhome_core`.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use uhome_api::{
    API_URL, DEFAULT_SCOPE, OAUTH2_AUTHORIZE_URL, OAUTH2_TOKEN_URL, OAuthConfig, TlsMode, Token,
    TransportConfig,
};
use uhome_core::{CoordinatorConfig, DeviceId};

const KEYRING_SERVICE: &str = "uhome";

/// Env var holding a refresh token; takes precedence over the keyring.
pub const REFRESH_TOKEN_ENV: &str = "UHOME_REFRESH_TOKEN";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("stored token is unreadable: {0}")]
    StoredToken(#[from] serde_json::Error),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Resolve a profile by name, falling back to `default_profile`.
    pub fn profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

/// A named Uhome account profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// OAuth client id from the U-tec developer console.
    pub client_id: String,

    /// OAuth client secret (plaintext; prefer keyring or env var).
    pub client_secret: Option<String>,

    /// Environment variable name containing the client secret.
    pub client_secret_env: Option<String>,

    /// OAuth scope. Defaults to `openapi`.
    pub scope: Option<String>,

    /// Redirect URI registered for the OAuth app.
    pub redirect_uri: Option<String>,

    /// Override the action endpoint.
    pub api_url: Option<String>,

    pub authorize_url: Option<String>,

    pub token_url: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,

    /// Override poll interval (seconds, 0 disables background polling).
    pub poll_interval: Option<u64>,

    /// First refresh timeout (seconds).
    pub first_refresh_timeout: Option<u64>,

    /// Concurrent per-device queries.
    pub query_concurrency: Option<usize>,

    #[serde(default = "default_true")]
    pub push_enabled: bool,

    /// Device ids allowed to update from push. Empty means all.
    #[serde(default)]
    pub push_devices: Vec<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "uhome", "uhome").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("uhome");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from an explicit file, merged over defaults and under `UHOME_`
/// env vars (`UHOME_DEFAULTS__TIMEOUT=10`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UHOME_").split("__").ignore(&["refresh_token"]));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str, key: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{key}"))
}

/// Resolve the OAuth client secret: env var, then keyring, then plaintext.
pub fn resolve_client_secret(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    if let Some(env_name) = &profile.client_secret_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Ok(secret) = keyring_entry(profile_name, "client-secret").and_then(|e| e.get_password())
    {
        return Ok(SecretString::from(secret));
    }

    if let Some(secret) = &profile.client_secret {
        return Ok(SecretString::from(secret.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Token persistence ───────────────────────────────────────────────

/// Keyring representation of a [`Token`].
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

impl From<&Token> for StoredToken {
    fn from(token: &Token) -> Self {
        Self {
            access_token: token.access_token().expose_secret().to_owned(),
            refresh_token: token.refresh_token().map(|r| r.expose_secret().to_owned()),
            expires_at: token.expires_at(),
        }
    }
}

impl From<StoredToken> for Token {
    fn from(stored: StoredToken) -> Self {
        Token::restore(stored.access_token, stored.refresh_token, stored.expires_at)
    }
}

fn encode_token(token: &Token) -> Result<String, ConfigError> {
    Ok(serde_json::to_string(&StoredToken::from(token))?)
}

fn decode_token(raw: &str) -> Result<Token, ConfigError> {
    Ok(serde_json::from_str::<StoredToken>(raw)?.into())
}

/// Load the persisted token for a profile.
///
/// `UHOME_REFRESH_TOKEN` wins over the keyring and yields a refresh-only
/// token. `Ok(None)` means the user still has to authorize.
pub fn load_token(profile_name: &str) -> Result<Option<Token>, ConfigError> {
    if let Ok(refresh) = std::env::var(REFRESH_TOKEN_ENV) {
        if !refresh.is_empty() {
            return Ok(Some(Token::refresh_only(refresh)));
        }
    }

    match keyring_entry(profile_name, "token").and_then(|e| e.get_password()) {
        Ok(raw) => decode_token(&raw).map(Some),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => {
            warn!(profile = profile_name, error = %e, "keyring unavailable; no stored token");
            Ok(None)
        }
    }
}

/// Persist a token (typically after a refresh rotated it).
pub fn store_token(profile_name: &str, token: &Token) -> Result<(), ConfigError> {
    keyring_entry(profile_name, "token")?.set_password(&encode_token(token)?)?;
    debug!(profile = profile_name, "token persisted");
    Ok(())
}

// ── Translation to runtime configs ──────────────────────────────────

fn parse_url(field: &str, raw: Option<&str>, default: &str) -> Result<Url, ConfigError> {
    let raw = raw.unwrap_or(default);
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Action endpoint for a profile.
pub fn api_endpoint(profile: &Profile) -> Result<Url, ConfigError> {
    parse_url("api_url", profile.api_url.as_deref(), API_URL)
}

/// Build an `OAuthConfig`, resolving the client secret.
pub fn profile_to_oauth_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<OAuthConfig, ConfigError> {
    let secret = resolve_client_secret(profile, profile_name)?;
    let config =
        OAuthConfig::new(profile.client_id.clone(), secret).map_err(|e| ConfigError::Validation {
            field: "client_id".into(),
            reason: e.to_string(),
        })?;

    Ok(config
        .with_authorize_url(parse_url(
            "authorize_url",
            profile.authorize_url.as_deref(),
            OAUTH2_AUTHORIZE_URL,
        )?)
        .with_token_url(parse_url(
            "token_url",
            profile.token_url.as_deref(),
            OAUTH2_TOKEN_URL,
        )?)
        .with_scope(profile.scope.as_deref().unwrap_or(DEFAULT_SCOPE)))
}

pub fn profile_to_transport(profile: &Profile, defaults: &Defaults) -> TransportConfig {
    let tls = profile
        .ca_cert
        .clone()
        .map_or(TlsMode::System, TlsMode::CustomCa);
    TransportConfig {
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    }
}

pub fn profile_to_coordinator_config(profile: &Profile, defaults: &Defaults) -> CoordinatorConfig {
    let base = CoordinatorConfig::default();
    CoordinatorConfig {
        poll_interval: Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval)),
        first_refresh_timeout: profile
            .first_refresh_timeout
            .map_or(base.first_refresh_timeout, Duration::from_secs),
        push_enabled: profile.push_enabled,
        push_devices: profile
            .push_devices
            .iter()
            .map(|id| DeviceId::new(id.as_str()))
            .collect::<BTreeSet<_>>(),
        query_concurrency: profile.query_concurrency.unwrap_or(base.query_concurrency),
    }
}
