//! Webhook Ingress: alert-group webhooks -> chat messages.

use std::sync::Arc;

use crate::{
    config::Config,
    domain::ChatId,
    messaging::{
        dispatcher::{MessageDispatcher, Outgoing},
        types::{InlineButton, InlineKeyboard},
    },
    model::WebhookPayload,
    session::{CallbackIntent, SessionStore, ALERTNAME, INSTANCE},
    templating::{Renderable, TemplateRenderer},
    Result,
};

pub const SILENCE_LABEL: &str = "Silence";

pub struct WebhookIngress {
    cfg: Arc<Config>,
    sessions: Arc<SessionStore>,
    dispatcher: Arc<MessageDispatcher>,
    renderer: TemplateRenderer,
}

impl WebhookIngress {
    pub fn new(
        cfg: Arc<Config>,
        sessions: Arc<SessionStore>,
        dispatcher: Arc<MessageDispatcher>,
    ) -> Self {
        let renderer = TemplateRenderer::from_config(&cfg);
        Self {
            cfg,
            sessions,
            dispatcher,
            renderer,
        }
    }

    /// Deliver one webhook body to `chat_id`.
    ///
    /// A body that is not an alert group is rejected with `Error::Json` before
    /// anything is sent.
    pub async fn ingest(&self, raw: &[u8], chat_id: ChatId) -> Result<()> {
        let payload: WebhookPayload = serde_json::from_slice(raw)?;

        let mut outgoing = match self.cfg.webhook_alerts_template_path.as_deref() {
            Some(path) => {
                let text = self.renderer.render(Renderable::AlertGroup(&payload), path)?;
                Outgoing::send(chat_id, text).html()
            }
            None => Outgoing::send(chat_id, String::from_utf8_lossy(raw).into_owned()),
        };

        // A silence is matched back by instance + alertname, which are only
        // known when the group is keyed by exactly those labels.
        if payload.is_firing() {
            if let (Some(instance), Some(alertname)) =
                (payload.group_label(INSTANCE), payload.group_label(ALERTNAME))
            {
                let token = self.sessions.put(CallbackIntent::silence(instance, alertname));
                outgoing =
                    outgoing.with_keyboard(InlineKeyboard::single(InlineButton::new(SILENCE_LABEL, token)));
            }
        }

        tracing::info!(
            chat_id = chat_id.0,
            status = %payload.status,
            alerts = payload.alerts.len(),
            "forwarding webhook alert group"
        );
        self.dispatcher.dispatch(outgoing).await.map(|_| ())
    }
}
