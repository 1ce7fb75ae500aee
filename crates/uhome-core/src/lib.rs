//! Device state reconciliation core between `uhome-api` and host adapters.
//!
//! - **[`Coordinator`]**: owns the device registry and drives it:
//!   [`first_refresh()`](Coordinator::first_refresh) discovers devices and
//!   fetches their state, [`poll()`](Coordinator::poll) reconciles on an
//!   interval (spawned by [`start()`](Coordinator::start)), and
//!   [`update_push_data()`](Coordinator::update_push_data) merges webhook
//!   pushes. Tracks per-device and coordinator-level availability.
//!
//! - **[`DeviceRegistry`]**: concurrent device map built on `DashMap` and
//!   per-device `tokio::sync::watch` channels. Capabilities are derived once
//!   from the handle type and never change.
//!
//! - **[`CommandDispatcher`]**: checks a [`Command`] against the device's
//!   capabilities, sends it, then re-queries the device.
//!
//! - **[`WebhookRouter`]**: maps webhook ids to coordinators and answers
//!   inbound pushes with the right status code.
//!
//! - **Streams** ([`DeviceStream`], [`DevicesStream`]): typed change feeds
//!   for adapters.

pub mod command;
pub mod config;
mod convert;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod push;
pub mod store;
pub mod stream;
pub mod webhook;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandDispatcher, TurnOn};
pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, CoordinatorState, DegradedReason, PollOutcome, PushReport};
pub use error::CoreError;
pub use model::{
    Attribute, Capability, Device, DeviceId, DeviceKind, HandleTypeProfile, StateAttributes,
};
pub use push::PushEnvelope;
pub use store::{DeviceRegistry, UpsertOutcome};
pub use stream::{DeviceStream, DevicesStream, EntityStream};
pub use webhook::{WEBHOOK_ID_PREFIX, WebhookResponse, WebhookRouter, generate_webhook_id};
