// uhome-api: Async Rust client for the U-tec Uhome cloud (OAuth2 + action envelope)

pub mod auth;
pub mod client;
mod devices;
pub mod envelope;
pub mod error;
pub mod models;
pub mod transport;
mod user;

pub use auth::{
    DEFAULT_SCOPE, EXPIRY_MARGIN, OAUTH2_AUTHORIZE_URL, OAUTH2_TOKEN_URL, OAuthClient,
    OAuthConfig, Token, TokenProvider,
};
pub use client::{API_URL, UhomeClient};
pub use envelope::{Namespace, Operation};
pub use error::Error;
pub use models::{
    CapabilityState, DeviceCommand, DeviceInfo, DeviceStatus, DiscoveredDevice, UserInfo,
};
pub use transport::{TlsMode, TransportConfig};
