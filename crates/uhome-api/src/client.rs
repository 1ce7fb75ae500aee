// Action endpoint HTTP client
//
// Wraps `reqwest::Client` with bearer authentication and envelope
// construction. Endpoint groups (devices, user) are implemented as
// inherent methods in separate files.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::auth::TokenProvider;
use crate::envelope::{Namespace, Operation, RequestEnvelope};
use crate::error::Error;
use crate::transport::TransportConfig;

pub const API_URL: &str = "https://api.u-tec.com/action";

/// Client for the vendor's single action endpoint.
///
/// Cheaply cloneable; clones share the HTTP connection pool and the
/// token provider.
#[derive(Debug, Clone)]
pub struct UhomeClient {
    http: reqwest::Client,
    endpoint: Url,
    tokens: Arc<TokenProvider>,
}

impl UhomeClient {
    pub fn new(
        endpoint: Url,
        tokens: Arc<TokenProvider>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            endpoint,
            tokens,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoint: Url, tokens: Arc<TokenProvider>) -> Self {
        Self {
            http,
            endpoint,
            tokens,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn tokens(&self) -> &Arc<TokenProvider> {
        &self.tokens
    }

    /// Send one envelope and return the response `payload`.
    ///
    /// 200/201/202 yield the parsed payload (the whole body when it has no
    /// `payload` key), 204 yields `Value::Null`. Any other status becomes
    /// [`Error::Api`]; a response that never arrives stays
    /// [`Error::Transport`].
    pub async fn request(
        &self,
        namespace: Namespace,
        name: Operation,
        payload: Value,
    ) -> Result<Value, Error> {
        let token = self.tokens.get_valid_token().await?;
        let envelope = RequestEnvelope::new(namespace, name, payload);
        debug!(%namespace, %name, message_id = %envelope.header.message_id, "POST action");

        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(token.access_token().expose_secret())
            .json(&envelope)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status().as_u16();
        match status {
            204 => Ok(Value::Null),
            200..=202 => {
                let body = resp.text().await.map_err(Error::Transport)?;
                trace!(%body, "action response");
                parse_payload(&body)
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::Api { status, body })
            }
        }
    }
}

/// Extract `payload` from a success body, surfacing in-band vendor errors.
fn parse_payload(body: &str) -> Result<Value, Error> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    let mut value: Value = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    })?;

    let payload = match value.get_mut("payload") {
        Some(payload) => payload.take(),
        None => value,
    };

    if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
        return Err(Error::Vendor {
            code: error
                .get("code")
                .map(value_to_string)
                .unwrap_or_else(|| "unknown".into()),
            message: error
                .get("message")
                .map(value_to_string)
                .unwrap_or_default(),
        });
    }

    Ok(payload)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
