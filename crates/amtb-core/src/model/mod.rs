//! Read-only projections of Alertmanager and Prometheus data.
//!
//! Field names serialize the way the upstream JSON APIs spell them, so templates
//! see the same shapes an operator knows from the Alertmanager UI/API.

pub mod alerts;
pub mod targets;
pub mod webhook;

use std::collections::BTreeMap;

/// Label or annotation set.
pub type LabelSet = BTreeMap<String, String>;

pub use alerts::{Alert, AlertmanagerStatus, Matcher, PostableSilence, Silence};
pub use targets::{BuildInfo, RuntimeInfo, Target};
pub use webhook::{WebhookAlert, WebhookPayload};
