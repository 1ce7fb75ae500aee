//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use uhome_config::ConfigError;
use uhome_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Uhome cloud: {message}")]
    #[diagnostic(
        code(uhome::connection_failed),
        help("Check your network connection, or raise the timeout with --timeout.")
    )]
    ConnectionFailed { message: String },

    #[error("Setup failed: {message}")]
    #[diagnostic(code(uhome::setup_failed))]
    SetupFailed { message: String, retryable: bool },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(uhome::auth_failed),
        help(
            "The stored token was rejected. Re-authorize with:\n  \
             uhome auth url --profile {profile}\n  \
             uhome auth exchange <code> --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("Profile '{profile}' has not been authorized yet")]
    #[diagnostic(
        code(uhome::not_authorized),
        help(
            "Run: uhome auth url --profile {profile}\n\
             Or set UHOME_REFRESH_TOKEN to an existing refresh token."
        )
    )]
    NotAuthorized { profile: String },

    #[error("No client secret configured for profile '{profile}'")]
    #[diagnostic(
        code(uhome::no_credentials),
        help(
            "Set client_secret_env in the profile, store it in the system keyring,\n\
             or add client_secret to the config file."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(uhome::not_found),
        help("Run: uhome {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Device '{device}' does not support {capability}")]
    #[diagnostic(
        code(uhome::unsupported),
        help("Run: uhome devices get {device} to see its capabilities")
    )]
    Unsupported { device: String, capability: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(uhome::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(uhome::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(uhome::profile_not_found),
        help("Available profiles: {available}\nConfig file: {path}")
    )]
    ProfileNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error(transparent)]
    #[diagnostic(code(uhome::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(uhome::timeout),
        help("Increase timeout with --timeout or try again later.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(uhome::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::SetupFailed { retryable, .. } => {
                if *retryable {
                    exit_code::CONNECTION
                } else {
                    exit_code::GENERAL
                }
            }
            Self::AuthFailed { .. } | Self::NotAuthorized { .. } | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile to auth failures.
    pub fn with_profile(self, profile: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: profile.to_owned(),
                message,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "default".into(),
                message,
            },
            CoreError::Network { message } => CliError::ConnectionFailed { message },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::DeviceNotFound { device_id } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: device_id,
                list_command: "devices list".into(),
            },
            CoreError::UnsupportedFeature {
                device_id,
                capability,
            } => CliError::Unsupported {
                device: device_id,
                capability,
            },
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::SetupFailed { message, retryable } => {
                CliError::SetupFailed { message, retryable }
            }
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            other @ (CoreError::Api { .. } | CoreError::NotReady { .. }) => CliError::ApiError {
                message: other.to_string(),
            },
        }
    }
}

impl From<uhome_api::Error> for CliError {
    fn from(err: uhome_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_exit_with_auth_code() {
        let err = CliError::from(CoreError::AuthenticationFailed {
            message: "revoked".into(),
        })
        .with_profile("home");
        assert_eq!(err.exit_code(), exit_code::AUTH);
        assert!(matches!(err, CliError::AuthFailed { ref profile, .. } if profile == "home"));
    }

    #[test]
    fn unsupported_feature_maps_to_its_own_code() {
        let err = CliError::from(CoreError::UnsupportedFeature {
            device_id: "a".into(),
            capability: "st.switch".into(),
        });
        assert_eq!(err.exit_code(), exit_code::UNSUPPORTED);
    }

    #[test]
    fn retryable_setup_failure_is_a_connection_problem() {
        let err = CliError::from(CoreError::SetupFailed {
            message: "discovery failed".into(),
            retryable: true,
        });
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }
}
