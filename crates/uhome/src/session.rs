//! Profile loading and client/coordinator construction for commands.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use uhome_api::{OAuthClient, Token, TokenProvider, TransportConfig, UhomeClient};
use uhome_config::{Defaults, Profile};
use uhome_core::{Coordinator, CoordinatorConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Profile context ─────────────────────────────────────────────────

/// The selected profile plus the global defaults it falls back on.
pub struct ProfileContext {
    pub name: String,
    pub profile: Profile,
    pub defaults: Defaults,
}

impl ProfileContext {
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let path = global
            .config
            .clone()
            .unwrap_or_else(uhome_config::config_path);
        let cfg = uhome_config::load_config_from(&path)?;

        let (name, profile) = match cfg.profile(global.profile.as_deref()) {
            Ok((name, profile)) => (name.to_owned(), profile.clone()),
            Err(_) => {
                let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
                available.sort_unstable();
                let name = global
                    .profile
                    .clone()
                    .or_else(|| cfg.default_profile.clone())
                    .unwrap_or_else(|| "default".into());
                return Err(CliError::ProfileNotFound {
                    name,
                    available: if available.is_empty() {
                        "(none)".into()
                    } else {
                        available.join(", ")
                    },
                    path: path.display().to_string(),
                });
            }
        };

        Ok(Self {
            name,
            profile,
            defaults: cfg.defaults,
        })
    }

    pub fn transport(&self, global: &GlobalOpts) -> TransportConfig {
        let mut transport = uhome_config::profile_to_transport(&self.profile, &self.defaults);
        if let Some(secs) = global.timeout {
            transport.timeout = Duration::from_secs(secs);
        }
        transport
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        uhome_config::profile_to_coordinator_config(&self.profile, &self.defaults)
    }

    pub fn oauth_client(&self, global: &GlobalOpts) -> Result<OAuthClient, CliError> {
        let config = uhome_config::profile_to_oauth_config(&self.profile, &self.name)?;
        Ok(OAuthClient::new(config, &self.transport(global))?)
    }

    pub fn redirect_uri(&self, flag: Option<String>) -> Result<String, CliError> {
        flag.or_else(|| self.profile.redirect_uri.clone())
            .ok_or_else(|| CliError::Validation {
                field: "redirect_uri".into(),
                reason: "pass --redirect-uri or set redirect_uri in the profile".into(),
            })
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// An authorized client and its coordinator. Rotated tokens are written
/// back to the keyring via [`Session::persist_rotated_token`].
pub struct Session {
    pub profile_name: String,
    pub coordinator: Coordinator,
    token_updates: watch::Receiver<Arc<Token>>,
}

impl Session {
    /// Build the client stack without contacting the vendor.
    /// `poll_interval` overrides the profile's interval.
    pub fn open(global: &GlobalOpts, poll_interval: Option<Duration>) -> Result<Self, CliError> {
        let ctx = ProfileContext::load(global)?;
        let oauth = ctx.oauth_client(global)?;
        let token = uhome_config::load_token(&ctx.name)?.ok_or_else(|| CliError::NotAuthorized {
            profile: ctx.name.clone(),
        })?;

        let tokens = Arc::new(TokenProvider::new(oauth, token));
        let token_updates = tokens.subscribe();

        let endpoint = uhome_config::api_endpoint(&ctx.profile)?;
        let client = UhomeClient::new(endpoint, tokens, &ctx.transport(global))?;

        let mut config = ctx.coordinator_config();
        if let Some(interval) = poll_interval {
            config.poll_interval = interval;
        }

        debug!(profile = %ctx.name, "session opened");
        Ok(Self {
            profile_name: ctx.name,
            coordinator: Coordinator::new(client, config),
            token_updates,
        })
    }

    /// Open and run the bounded first refresh.
    pub async fn connect(
        global: &GlobalOpts,
        poll_interval: Option<Duration>,
    ) -> Result<Self, CliError> {
        let mut session = Self::open(global, poll_interval)?;
        session.first_refresh().await?;
        Ok(session)
    }

    pub async fn first_refresh(&mut self) -> Result<(), CliError> {
        let result = self.coordinator.first_refresh_with_timeout().await;
        self.persist_rotated_token();
        result.map_err(|e| self.map_err(CliError::from(e)))
    }

    /// Attach the profile name to auth failures.
    pub fn map_err(&self, err: CliError) -> CliError {
        err.with_profile(&self.profile_name)
    }

    /// Write the current token to the keyring if a refresh rotated it.
    pub fn persist_rotated_token(&mut self) {
        if self.token_updates.has_changed().unwrap_or(false) {
            self.store_current_token();
        }
    }

    /// Wait for the next token rotation and persist it. Returns `false`
    /// once the provider is gone.
    pub async fn persist_next_rotation(&mut self) -> bool {
        if self.token_updates.changed().await.is_err() {
            return false;
        }
        self.store_current_token();
        true
    }

    fn store_current_token(&mut self) {
        let token = Arc::clone(&self.token_updates.borrow_and_update());
        match uhome_config::store_token(&self.profile_name, &token) {
            Ok(()) => debug!(profile = %self.profile_name, "refreshed token persisted"),
            Err(e) => {
                warn!(profile = %self.profile_name, error = %e, "failed to persist refreshed token");
            }
        }
    }
}
