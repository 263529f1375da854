//! Menu Builder: inline keyboards for browsing jobs and targets.
//!
//! Every selectable button is backed by a fresh [`SessionStore`] entry; the
//! button itself only carries the token.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use crate::{
    config::Config,
    messaging::types::{InlineButton, InlineKeyboard},
    ports::{label_filter, AlertingPort, MonitoringPort},
    session::{CallbackIntent, SessionStore},
    Result,
};

pub const CLOSE_MENU_LABEL: &str = "Close menu";
pub const GO_BACK_LABEL: &str = "Go back";

/// Jobs are taken from series seen within this window.
const JOBS_WINDOW_SECS: i64 = 60;

pub struct MenuBuilder {
    alerting: Arc<dyn AlertingPort>,
    monitoring: Arc<dyn MonitoringPort>,
    sessions: Arc<SessionStore>,
    per_row: usize,
    prefix_ok: String,
    prefix_fail: String,
}

impl MenuBuilder {
    pub fn new(
        cfg: &Config,
        alerting: Arc<dyn AlertingPort>,
        monitoring: Arc<dyn MonitoringPort>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            alerting,
            monitoring,
            sessions,
            per_row: cfg.keyboard_rows.max(1),
            prefix_ok: cfg.button_prefix_ok.clone(),
            prefix_fail: cfg.button_prefix_fail.clone(),
        }
    }

    /// One button per recently seen job, then a "Close menu" row.
    pub async fn jobs_menu(&self) -> Result<InlineKeyboard> {
        let end = Utc::now();
        let start = end - ChronoDuration::seconds(JOBS_WINDOW_SECS);
        let jobs = self.monitoring.label_values("job", start, end).await?;

        let mut buttons = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let firing = match self.alerting.alerts(&[label_filter("job", job)]).await {
                Ok(alerts) => !alerts.is_empty(),
                Err(e) => {
                    tracing::warn!(job = %job, error = %e, "skipping job: alert lookup failed");
                    continue;
                }
            };
            buttons.push(self.button(job, firing, CallbackIntent::job(job)));
        }

        let mut kb = InlineKeyboard::grid(buttons, self.per_row);
        kb.push_row(vec![self.nav_button(CLOSE_MENU_LABEL, CallbackIntent::close())]);
        Ok(kb)
    }

    /// One button per target of `job`, ordered by instance.
    pub async fn targets_menu(&self, job: &str) -> Result<InlineKeyboard> {
        let mut targets = self.monitoring.targets().await?;
        targets.sort_by(|a, b| a.instance().cmp(&b.instance()));

        let mut buttons = Vec::new();
        for target in &targets {
            let (Some(target_job), Some(instance)) = (target.job(), target.instance()) else {
                tracing::warn!(labels = ?target.labels, "skipping target without job/instance labels");
                continue;
            };
            if target_job != job {
                continue;
            }

            let firing = match self
                .alerting
                .alerts(&[label_filter("instance", instance)])
                .await
            {
                Ok(alerts) => !alerts.is_empty(),
                Err(e) => {
                    tracing::warn!(instance, error = %e, "skipping target: alert lookup failed");
                    continue;
                }
            };
            buttons.push(self.button(instance, firing, CallbackIntent::target(job, instance)));
        }

        Ok(InlineKeyboard::grid(buttons, self.per_row))
    }

    /// Navigation button (close, go back) bound to `intent`.
    pub fn nav_button(&self, label: &str, intent: CallbackIntent) -> InlineButton {
        InlineButton::new(label, self.sessions.put(intent))
    }

    fn button(&self, name: &str, firing: bool, intent: CallbackIntent) -> InlineButton {
        let prefix = if firing {
            &self.prefix_fail
        } else {
            &self.prefix_ok
        };
        InlineButton::new(format!("{prefix}{name}"), self.sessions.put(intent))
    }
}
