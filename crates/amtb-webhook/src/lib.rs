//! Inbound Alertmanager webhook listener (axum).
//!
//! Single route: `POST /alerts?chatid=<i64>` with an alert-group JSON body.
//! Anything else is logged and dropped.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Query, Request, State},
    http::{StatusCode, Uri},
    routing::post,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use amtb_core::{domain::ChatId, errors::Error, ingress::WebhookIngress, Result};

/// Upper bound on accepted webhook bodies.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

pub fn router(ingress: Arc<WebhookIngress>) -> Router {
    Router::new()
        .route("/alerts", post(handle_alerts).fallback(wrong_method))
        .fallback(wrong_path)
        .with_state(ingress)
}

/// Serve until `cancel` fires, then stop accepting and drain in-flight
/// requests.
pub async fn serve(
    listener: TcpListener,
    ingress: Arc<WebhookIngress>,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "webhook listener started");

    axum::serve(
        listener,
        router(ingress).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await?;

    tracing::info!("webhook listener stopped");
    Ok(())
}

fn peer(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn chat_id(uri: &Uri) -> std::result::Result<ChatId, String> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri)
        .map_err(|e| format!("bad query: {e}"))?;
    let raw = params
        .get("chatid")
        .ok_or_else(|| "missing chatid".to_string())?;
    raw.trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|e| format!("wrong chatid {raw:?}: {e}"))
}

async fn handle_alerts(
    State(ingress): State<Arc<WebhookIngress>>,
    req: Request,
) -> (StatusCode, &'static str) {
    let from = peer(&req);
    tracing::info!(peer = %from, "new webhook request");

    let chat_id = match chat_id(req.uri()) {
        Ok(id) => id,
        Err(reason) => {
            tracing::warn!(peer = %from, "{reason}");
            return (StatusCode::BAD_REQUEST, "bad chatid");
        }
    };

    let body = match to_bytes(req.into_body(), MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(peer = %from, error = %e, "error reading webhook body");
            return (StatusCode::BAD_REQUEST, "bad body");
        }
    };
    tracing::debug!(peer = %from, body = %String::from_utf8_lossy(&body), "webhook payload");

    match ingress.ingest(&body, chat_id).await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(Error::Json(e)) => {
            tracing::warn!(peer = %from, error = %e, "error unmarshalling webhook payload");
            (StatusCode::BAD_REQUEST, "bad payload")
        }
        Err(e) => {
            tracing::error!(chat_id = chat_id.0, error = %e, "error forwarding webhook");
            (StatusCode::INTERNAL_SERVER_ERROR, "delivery failed")
        }
    }
}

async fn wrong_method(req: Request<Body>) -> StatusCode {
    tracing::warn!(peer = %peer(&req), method = %req.method(), "wrong http method");
    StatusCode::METHOD_NOT_ALLOWED
}

async fn wrong_path(req: Request<Body>) -> StatusCode {
    tracing::warn!(peer = %peer(&req), path = %req.uri().path(), "wrong path");
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use async_trait::async_trait;
    use axum::http::Method;
    use tower::ServiceExt;

    use super::*;
    use amtb_core::{
        config::Config,
        domain::{MessageId, MessageRef},
        messaging::{
            dispatcher::MessageDispatcher,
            port::MessagingPort,
            types::{InlineKeyboard, ParseMode},
        },
        session::SessionStore,
    };

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(i64, String, bool)>>,
    }

    #[async_trait]
    impl MessagingPort for Recorder {
        async fn send_message(
            &self,
            chat_id: ChatId,
            text: &str,
            _parse_mode: ParseMode,
            keyboard: Option<&InlineKeyboard>,
        ) -> Result<MessageRef> {
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.0, text.to_string(), keyboard.is_some()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn edit_message_text(
            &self,
            _msg: MessageRef,
            _text: &str,
            _parse_mode: ParseMode,
            _keyboard: Option<&InlineKeyboard>,
        ) -> Result<()> {
            Ok(())
        }

        async fn delete_message(&self, _msg: MessageRef) -> Result<()> {
            Ok(())
        }

        async fn edit_reply_markup(&self, _msg: MessageRef, _kb: &InlineKeyboard) -> Result<()> {
            Ok(())
        }

        async fn answer_callback_query(&self, _id: &str, _text: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    fn app() -> (Router, Arc<Recorder>) {
        let cfg = Arc::new(Config::default());
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Arc::new(MessageDispatcher::from_config(recorder.clone(), &cfg));
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let ingress = Arc::new(WebhookIngress::new(cfg, sessions, dispatcher));
        (router(ingress), recorder)
    }

    fn firing_body() -> String {
        serde_json::json!({
            "status": "firing",
            "alerts": [{"status": "firing", "labels": {"alertname": "HostDown", "instance": "h1"}}],
            "groupLabels": {"alertname": "HostDown", "instance": "h1"}
        })
        .to_string()
    }

    fn request(method: Method, uri: &str, body: String) -> Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn forwards_alert_group_to_chat() {
        let (app, recorder) = app();
        let resp = app
            .oneshot(request(Method::POST, "/alerts?chatid=-1001", firing_body()))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let sent = recorder.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, -1001);
        assert!(sent[0].1.contains("HostDown"));
        assert!(sent[0].2, "firing group should carry a silence button");
    }

    #[tokio::test]
    async fn rejects_missing_or_bad_chatid() {
        for uri in ["/alerts", "/alerts?chatid=abc"] {
            let (app, recorder) = app();
            let resp = app
                .oneshot(request(Method::POST, uri, firing_body()))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert!(recorder.sent.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn rejects_malformed_body() {
        let (app, recorder) = app();
        let resp = app
            .oneshot(request(Method::POST, "/alerts?chatid=1", "{".to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn drops_wrong_method_and_path() {
        let (app, recorder) = app();
        let resp = app
            .clone()
            .oneshot(request(Method::GET, "/alerts?chatid=1", String::new()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

        let resp = app
            .oneshot(request(Method::POST, "/other?chatid=1", firing_body()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(recorder.sent.lock().unwrap().is_empty());
    }
}
