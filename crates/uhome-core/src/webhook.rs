// ── Webhook routing ──
//
// Maps webhook ids to coordinators and turns an inbound HTTP request into
// a push update plus a status code. The HTTP server itself belongs to the
// host; this module only decides what to answer.

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::coordinator::{Coordinator, PushReport};

pub const WEBHOOK_ID_PREFIX: &str = "u_tec_push_";

/// Generate a fresh webhook id (`u_tec_push_` + random suffix).
pub fn generate_webhook_id() -> String {
    format!("{WEBHOOK_ID_PREFIX}{}", Uuid::new_v4().simple())
}

/// Outcome of [`WebhookRouter::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookResponse {
    Accepted(PushReport),
    BadRequest(String),
    UnknownEntry,
    MethodNotAllowed,
}

impl WebhookResponse {
    /// HTTP status to answer with.
    pub fn status(&self) -> u16 {
        match self {
            Self::Accepted(_) => 200,
            Self::BadRequest(_) => 400,
            Self::UnknownEntry => 404,
            Self::MethodNotAllowed => 405,
        }
    }
}

/// Webhook id to coordinator routing table.
#[derive(Default)]
pub struct WebhookRouter {
    routes: DashMap<String, Coordinator>,
}

impl WebhookRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, webhook_id: impl Into<String>, coordinator: Coordinator) {
        self.routes.insert(webhook_id.into(), coordinator);
    }

    /// Returns `true` if the id was registered.
    pub fn unregister(&self, webhook_id: &str) -> bool {
        self.routes.remove(webhook_id).is_some()
    }

    pub fn contains(&self, webhook_id: &str) -> bool {
        self.routes.contains_key(webhook_id)
    }

    /// Handle one inbound request.
    pub fn handle(&self, webhook_id: &str, method: &str, body: &[u8]) -> WebhookResponse {
        if !method.eq_ignore_ascii_case("POST") {
            debug!(webhook_id, method, "webhook called with wrong method");
            return WebhookResponse::MethodNotAllowed;
        }

        let Some(coordinator) = self.routes.get(webhook_id).map(|c| c.clone()) else {
            debug!(webhook_id, "push for unknown webhook id");
            return WebhookResponse::UnknownEntry;
        };

        let data: Value = match serde_json::from_slice(body) {
            Ok(data) => data,
            Err(e) => {
                warn!(webhook_id, error = %e, "push body is not JSON");
                return WebhookResponse::BadRequest(format!("invalid JSON: {e}"));
            }
        };

        let report = coordinator.update_push_data(&data);
        if report.accepted {
            WebhookResponse::Accepted(report)
        } else {
            WebhookResponse::BadRequest("push envelope rejected".into())
        }
    }
}

impl std::fmt::Debug for WebhookRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookRouter")
            .field("routes", &self.routes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_prefixed_and_unique() {
        let a = generate_webhook_id();
        let b = generate_webhook_id();
        assert!(a.starts_with(WEBHOOK_ID_PREFIX));
        assert_ne!(a, b);
    }

    #[test]
    fn status_codes() {
        assert_eq!(WebhookResponse::Accepted(PushReport::default()).status(), 200);
        assert_eq!(WebhookResponse::BadRequest(String::new()).status(), 400);
        assert_eq!(WebhookResponse::UnknownEntry.status(), 404);
        assert_eq!(WebhookResponse::MethodNotAllowed.status(), 405);
    }
}
