//! Prometheus adapter (HTTP API v1).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize};

use amtb_core::{
    errors::Error,
    model::{BuildInfo, RuntimeInfo, Target},
    ports::MonitoringPort,
    Result,
};

const SERVICE: &str = "prometheus";

#[derive(Clone, Debug)]
pub struct PrometheusClient {
    base_url: String,
    http: reqwest::Client,
}

/// Envelope shared by every v1 endpoint.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetsData {
    #[serde(default)]
    active_targets: Vec<Target>,
}

#[derive(Deserialize)]
struct BuildInfoData {
    version: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeInfoData {
    start_time: DateTime<Utc>,
}

impl PrometheusClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::upstream(SERVICE, format!("http client build error: {e}")))?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get<T: DeserializeOwned>(&self, what: &str, path: &str, query: &[(&str, String)]) -> Result<T> {
        let resp = self
            .http
            .get(format!("{}/api/v1{path}", self.base_url))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("{what}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("{what}: {e}")))?;

        // Prometheus reports API errors in the envelope, with a non-2xx status.
        let parsed: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            Error::upstream(
                SERVICE,
                format!(
                    "{what}: {status}: unexpected response ({e}): {}",
                    body.trim().chars().take(200).collect::<String>()
                ),
            )
        })?;

        if parsed.status != "success" {
            return Err(Error::upstream(
                SERVICE,
                format!(
                    "{what}: {}: {}",
                    parsed.error_type.unwrap_or_else(|| status.to_string()),
                    parsed.error.unwrap_or_default()
                ),
            ));
        }
        parsed
            .data
            .ok_or_else(|| Error::upstream(SERVICE, format!("{what}: response without data")))
    }
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl MonitoringPort for PrometheusClient {
    async fn label_values(
        &self,
        label: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        self.get(
            "getting label values",
            &format!("/label/{label}/values"),
            &[("start", rfc3339(start)), ("end", rfc3339(end))],
        )
        .await
    }

    async fn targets(&self) -> Result<Vec<Target>> {
        let data: TargetsData = self
            .get("getting targets", "/targets", &[("state", "active".to_string())])
            .await?;
        Ok(data.active_targets)
    }

    async fn build_info(&self) -> Result<BuildInfo> {
        let data: BuildInfoData = self.get("getting build info", "/status/buildinfo", &[]).await?;
        Ok(BuildInfo {
            version: data.version,
        })
    }

    async fn runtime_info(&self) -> Result<RuntimeInfo> {
        let data: RuntimeInfoData = self
            .get("getting runtime info", "/status/runtimeinfo", &[])
            .await?;
        Ok(RuntimeInfo {
            start_time: data.start_time,
        })
    }
}
