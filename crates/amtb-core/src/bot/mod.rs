//! Update Router: classifies inbound updates and runs the matching command or
//! callback handler.
//!
//! Updates are expected one at a time (the transport adapter serialises them);
//! the only shared state is the [`SessionStore`].

mod callbacks;
mod commands;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    config::Config,
    domain::ChatId,
    errors::Error,
    menu::MenuBuilder,
    messaging::{
        dispatcher::{MessageDispatcher, Outgoing},
        types::{CallbackQuery, IncomingUpdate},
    },
    ports::{AlertingPort, MonitoringPort},
    security::authorize,
    session::SessionStore,
    templating::TemplateRenderer,
};

pub use commands::HELP;

pub struct App {
    cfg: Arc<Config>,
    alerting: Arc<dyn AlertingPort>,
    monitoring: Arc<dyn MonitoringPort>,
    sessions: Arc<SessionStore>,
    menus: MenuBuilder,
    dispatcher: Arc<MessageDispatcher>,
    renderer: TemplateRenderer,
    started_at: DateTime<Utc>,
}

impl App {
    pub fn new(
        cfg: Arc<Config>,
        alerting: Arc<dyn AlertingPort>,
        monitoring: Arc<dyn MonitoringPort>,
        sessions: Arc<SessionStore>,
        dispatcher: Arc<MessageDispatcher>,
    ) -> Self {
        let menus = MenuBuilder::new(&cfg, alerting.clone(), monitoring.clone(), sessions.clone());
        let renderer = TemplateRenderer::from_config(&cfg);
        Self {
            cfg,
            alerting,
            monitoring,
            sessions,
            menus,
            dispatcher,
            renderer,
            started_at: Utc::now(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Process one inbound update. Failures are logged and, when meaningful
    /// to the user, reported back to the chat; they never escape.
    pub async fn handle_update(&self, update: IncomingUpdate) {
        match update {
            IncomingUpdate::Message(msg) => {
                let chat_id = msg.chat_id;
                if let Err(e) = commands::handle_message(self, &msg).await {
                    let context = if msg.edited {
                        "error processing edited message"
                    } else {
                        "error processing message"
                    };
                    self.report(chat_id, context, e).await;
                }
            }
            IncomingUpdate::Callback(q) => self.handle_callback(q).await,
        }
    }

    async fn handle_callback(&self, q: CallbackQuery) {
        if let Err(e) = authorize(Some(&q.user), &self.cfg.users) {
            tracing::warn!(user = %q.user, user_id = q.user.id.0, error = %e, "rejecting callback");
            self.answer(&q.callback_id, Some("Unauthorized")).await;
            return;
        }

        let intent = match self.sessions.take(&q.data) {
            Ok(intent) => intent,
            Err(e) => {
                tracing::debug!(error = %e, user = %q.user, "dropping stale callback");
                self.answer(&q.callback_id, None).await;
                return;
            }
        };
        tracing::info!(user = %q.user, intent = %intent, "new callback query");
        self.answer(&q.callback_id, None).await;

        let Some(msg) = q.message else {
            tracing::warn!(intent = %intent, "callback without an attached message");
            return;
        };
        if let Err(e) = callbacks::handle_callback(self, &q.user, msg, intent).await {
            self.report(msg.chat_id, "error processing callback query", e).await;
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.dispatcher.answer_callback(callback_id, text).await {
            tracing::warn!(error = %e, "failed to answer callback query");
        }
    }

    async fn send(&self, outgoing: Outgoing) -> crate::Result<()> {
        self.dispatcher.dispatch(outgoing).await.map(|_| ())
    }

    async fn report(&self, chat_id: ChatId, context: &str, err: Error) {
        tracing::error!(chat_id = chat_id.0, error = %err, "{context}");
        if !err.is_user_visible() {
            return;
        }
        let text = format!("❌ Error: {err}");
        if let Err(e) = self.send(Outgoing::send(chat_id, text)).await {
            tracing::error!(chat_id = chat_id.0, error = %e, "failed to report error to chat");
        }
    }
}
