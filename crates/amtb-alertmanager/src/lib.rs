//! Alertmanager adapter (API v2).
//!
//! Implements [`AlertingPort`] over plain JSON/HTTP; every request is bounded by
//! the client-wide timeout.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize};

use amtb_core::{
    errors::Error,
    model::{Alert, AlertmanagerStatus, PostableSilence, Silence},
    ports::AlertingPort,
    Result,
};

const SERVICE: &str = "alertmanager";
const API_PREFIX: &str = "/api/v2";

#[derive(Clone, Debug)]
pub struct AlertmanagerClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    version_info: VersionInfo,
    uptime: DateTime<Utc>,
}

#[derive(Deserialize)]
struct VersionInfo {
    version: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostSilenceResponse {
    #[serde(rename = "silenceID")]
    silence_id: String,
}

impl AlertmanagerClient {
    /// `base_url` may or may not already end in `/api/v2`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::upstream(SERVICE, format!("http client build error: {e}")))?;
        Ok(Self {
            base_url: api_base(base_url),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read_json<T: DeserializeOwned>(what: &str, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::upstream(
                SERVICE,
                format!(
                    "{what} failed: {status} {}",
                    body.trim().chars().take(200).collect::<String>()
                ),
            ));
        }
        resp.json()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("{what}: invalid response: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, what: &str, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let resp = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("{what}: {e}")))?;
        Self::read_json(what, resp).await
    }
}

fn api_base(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.ends_with(API_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{API_PREFIX}")
    }
}

#[async_trait]
impl AlertingPort for AlertmanagerClient {
    async fn alerts(&self, filter: &[String]) -> Result<Vec<Alert>> {
        let mut query: Vec<(&str, &str)> = vec![("active", "true")];
        query.extend(filter.iter().map(|f| ("filter", f.as_str())));
        self.get("getting alerts", "/alerts", &query).await
    }

    async fn status(&self) -> Result<AlertmanagerStatus> {
        let status: StatusResponse = self.get("getting status", "/status", &[]).await?;
        Ok(AlertmanagerStatus {
            version: status.version_info.version,
            started_at: status.uptime,
        })
    }

    async fn silences(&self) -> Result<Vec<Silence>> {
        self.get("getting silences", "/silences", &[]).await
    }

    async fn post_silence(&self, silence: &PostableSilence) -> Result<String> {
        tracing::debug!(matchers = silence.matchers.len(), "posting silence");
        let resp = self
            .http
            .post(self.url("/silences"))
            .json(silence)
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("posting silence: {e}")))?;
        let created: PostSilenceResponse = Self::read_json("posting silence", resp).await?;
        Ok(created.silence_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amtb_core::model::Matcher;
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn client(server: &MockServer) -> AlertmanagerClient {
        AlertmanagerClient::new(&server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn appends_api_prefix_once() {
        assert_eq!(api_base("http://am:9093"), "http://am:9093/api/v2");
        assert_eq!(api_base("http://am:9093/"), "http://am:9093/api/v2");
        assert_eq!(api_base("http://am:9093/api/v2/"), "http://am:9093/api/v2");
    }

    #[tokio::test]
    async fn alerts_pass_label_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/alerts"))
            .and(query_param("filter", "job=api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "labels": {"alertname": "HighLatency", "job": "api"},
                "annotations": {},
                "startsAt": "2024-05-01T10:00:00Z",
                "status": {"state": "active", "silencedBy": [], "inhibitedBy": []}
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let alerts = client(&server)
            .alerts(&["job=api".to_string()])
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].labels["alertname"], "HighLatency");
    }

    #[tokio::test]
    async fn status_maps_version_and_uptime() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cluster": {"status": "ready"},
                "versionInfo": {"version": "0.27.0", "revision": "abc"},
                "config": {"original": ""},
                "uptime": "2024-05-01T00:00:00.000Z"
            })))
            .mount(&server)
            .await;

        let status = client(&server).status().await.unwrap();
        assert_eq!(status.version, "0.27.0");
        assert_eq!(status.started_at.to_rfc3339(), "2024-05-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn post_silence_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/silences"))
            .and(body_partial_json(json!({
                "createdBy": "amtb version 0.1.0",
                "matchers": [{"name": "instance", "value": "h1", "isRegex": false, "isEqual": true}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"silenceID": "s-123"})))
            .mount(&server)
            .await;

        let now = Utc::now();
        let id = client(&server)
            .post_silence(&PostableSilence {
                matchers: vec![Matcher::equal("instance", "h1")],
                starts_at: now,
                ends_at: now + chrono::Duration::hours(1),
                created_by: "amtb version 0.1.0".to_string(),
                comment: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(id, "s-123");
    }

    #[tokio::test]
    async fn http_errors_are_upstream_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/silences"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server).silences().await.unwrap_err();
        assert!(matches!(err, Error::Upstream { service: "alertmanager", .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/status"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let c = AlertmanagerClient::new(&server.uri(), Duration::from_millis(50)).unwrap();
        assert!(matches!(c.status().await, Err(Error::Upstream { .. })));
    }
}
