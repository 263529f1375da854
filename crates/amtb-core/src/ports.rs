use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    model::{Alert, AlertmanagerStatus, BuildInfo, PostableSilence, RuntimeInfo, Silence, Target},
    Result,
};

/// Hexagonal port for the alert-management service (Alertmanager API v2).
///
/// Every call is bounded by the adapter's per-call timeout; failures surface as
/// `Error::Upstream`.
#[async_trait]
pub trait AlertingPort: Send + Sync {
    /// Active alerts matching every `label=value` expression in `filter`.
    async fn alerts(&self, filter: &[String]) -> Result<Vec<Alert>>;

    async fn status(&self) -> Result<AlertmanagerStatus>;

    async fn silences(&self) -> Result<Vec<Silence>>;

    /// Create a silence and return its id.
    async fn post_silence(&self, silence: &PostableSilence) -> Result<String>;
}

/// Hexagonal port for the metrics-monitoring service (Prometheus HTTP API).
#[async_trait]
pub trait MonitoringPort: Send + Sync {
    /// Distinct values of `label` observed in `[start, end]`.
    async fn label_values(
        &self,
        label: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    /// Active scrape targets.
    async fn targets(&self) -> Result<Vec<Target>>;

    async fn build_info(&self) -> Result<BuildInfo>;

    async fn runtime_info(&self) -> Result<RuntimeInfo>;
}

/// `label=value` filter expression understood by [`AlertingPort::alerts`].
pub fn label_filter(label: &str, value: &str) -> String {
    format!("{label}={value}")
}
