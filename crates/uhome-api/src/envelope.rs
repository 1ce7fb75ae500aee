// Request envelope for the vendor action endpoint
//
// Every call is a POST of `{ header: {...}, payload: ... }` where the
// header names the namespace and operation.

use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

pub const PAYLOAD_VERSION: &str = "1";

/// Top-level API namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, IntoStaticStr)]
pub enum Namespace {
    #[serde(rename = "Uhome.Device")]
    #[strum(serialize = "Uhome.Device")]
    Device,
    #[serde(rename = "Uhome.User")]
    #[strum(serialize = "Uhome.User")]
    User,
    #[serde(rename = "Uhome.Configure")]
    #[strum(serialize = "Uhome.Configure")]
    Configure,
}

/// Operation within a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, IntoStaticStr)]
pub enum Operation {
    Discovery,
    Query,
    Command,
    Get,
    Set,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub namespace: Namespace,
    pub name: Operation,
    pub message_id: Uuid,
    pub payload_version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub header: Header,
    pub payload: Value,
}

impl RequestEnvelope {
    /// Build an envelope with a fresh message id.
    pub fn new(namespace: Namespace, name: Operation, payload: Value) -> Self {
        Self {
            header: Header {
                namespace,
                name,
                message_id: Uuid::new_v4(),
                payload_version: PAYLOAD_VERSION,
            },
            payload,
        }
    }
}
