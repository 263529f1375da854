//! In-memory port implementations shared by the unit tests of this crate.

use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{ChatId, MessageId, MessageRef, User, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, ParseMode},
    },
    model::{
        Alert, AlertmanagerStatus, BuildInfo, PostableSilence, RuntimeInfo, Silence, Target,
    },
    ports::{AlertingPort, MonitoringPort},
    Result,
};

pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn user(id: i64, username: &str) -> User {
    User {
        id: UserId(id),
        username: Some(username.to_string()),
        full_name: format!("{username} Full"),
    }
}

pub fn alert(labels: &[(&str, &str)]) -> Alert {
    let mut a = Alert::default();
    for (k, v) in labels {
        a.labels.insert(k.to_string(), v.to_string());
    }
    a.status.state = "active".to_string();
    a.starts_at = Some(ts("2024-05-01T10:00:00Z"));
    a
}

pub fn target(job: &str, instance: &str) -> Target {
    let mut t = Target::default();
    t.labels.insert("job".to_string(), job.to_string());
    t.labels.insert("instance".to_string(), instance.to_string());
    t.health = "up".to_string();
    t
}

#[derive(Clone, Debug, PartialEq)]
pub enum SentCall {
    Send {
        chat_id: ChatId,
        text: String,
        parse_mode: ParseMode,
        keyboard: Option<InlineKeyboard>,
    },
    Edit {
        msg: MessageRef,
        text: String,
        parse_mode: ParseMode,
        keyboard: Option<InlineKeyboard>,
    },
    Delete(MessageRef),
    EditMarkup {
        msg: MessageRef,
        keyboard: InlineKeyboard,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
    },
}

/// Records successful calls; scripted errors are returned (and not recorded)
/// before calls start succeeding.
#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    attempts: Mutex<u32>,
    scripted: Mutex<VecDeque<Error>>,
    calls: Mutex<Vec<SentCall>>,
}

impl FakeMessenger {
    pub fn rate_limit_next(&self, times: usize, retry_after: Duration) {
        let mut q = self.scripted.lock().unwrap();
        for _ in 0..times {
            q.push_back(Error::RateLimited { retry_after });
        }
    }

    pub fn fail_next_with_delivery_error(&self) {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Error::Delivery("bad request".to_string()));
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<SentCall> {
        self.calls.lock().unwrap().clone()
    }

    /// `(text, keyboard)` of every sent message, in order.
    pub fn sent(&self) -> Vec<(String, Option<InlineKeyboard>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SentCall::Send { text, keyboard, .. } => Some((text, keyboard)),
                _ => None,
            })
            .collect()
    }

    fn begin(&self, call: SentCall) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        if let Some(err) = self.scripted.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(1000 + *guard),
        }
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageRef> {
        self.begin(SentCall::Send {
            chat_id,
            text: text.to_string(),
            parse_mode,
            keyboard: keyboard.cloned(),
        })?;
        Ok(self.alloc(chat_id))
    }

    async fn edit_message_text(
        &self,
        msg: MessageRef,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        self.begin(SentCall::Edit {
            msg,
            text: text.to_string(),
            parse_mode,
            keyboard: keyboard.cloned(),
        })
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.begin(SentCall::Delete(msg))
    }

    async fn edit_reply_markup(&self, msg: MessageRef, keyboard: &InlineKeyboard) -> Result<()> {
        self.begin(SentCall::EditMarkup {
            msg,
            keyboard: keyboard.clone(),
        })
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.begin(SentCall::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        })
    }
}

/// Alerts are matched against `label=value` filters like the real API does.
pub struct FakeAlerting {
    pub alerts: Vec<Alert>,
    pub silences: Vec<Silence>,
    pub failing_filters: HashSet<String>,
    pub fail_all: bool,
    pub queries: Mutex<Vec<Vec<String>>>,
    pub posted: Mutex<Vec<PostableSilence>>,
}

impl Default for FakeAlerting {
    fn default() -> Self {
        Self {
            alerts: Vec::new(),
            silences: Vec::new(),
            failing_filters: HashSet::new(),
            fail_all: false,
            queries: Mutex::new(Vec::new()),
            posted: Mutex::new(Vec::new()),
        }
    }
}

impl FakeAlerting {
    pub fn with_alerts(alerts: Vec<Alert>) -> Self {
        Self {
            alerts,
            ..Self::default()
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    fn check(&self) -> Result<()> {
        if self.fail_all {
            return Err(Error::upstream("alertmanager", "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertingPort for FakeAlerting {
    async fn alerts(&self, filter: &[String]) -> Result<Vec<Alert>> {
        self.queries.lock().unwrap().push(filter.to_vec());
        self.check()?;
        if filter.iter().any(|f| self.failing_filters.contains(f)) {
            return Err(Error::upstream("alertmanager", "500 Internal Server Error"));
        }
        Ok(self
            .alerts
            .iter()
            .filter(|a| {
                filter.iter().all(|f| match f.split_once('=') {
                    Some((k, v)) => a.labels.get(k).map(String::as_str) == Some(v),
                    None => false,
                })
            })
            .cloned()
            .collect())
    }

    async fn status(&self) -> Result<AlertmanagerStatus> {
        self.queries.lock().unwrap().push(vec!["status".to_string()]);
        self.check()?;
        Ok(AlertmanagerStatus {
            version: "0.27.0".to_string(),
            started_at: ts("2024-05-01T00:00:00Z"),
        })
    }

    async fn silences(&self) -> Result<Vec<Silence>> {
        self.queries.lock().unwrap().push(vec!["silences".to_string()]);
        self.check()?;
        Ok(self.silences.clone())
    }

    async fn post_silence(&self, silence: &PostableSilence) -> Result<String> {
        self.check()?;
        let mut posted = self.posted.lock().unwrap();
        posted.push(silence.clone());
        Ok(format!("silence-{}", posted.len()))
    }
}

#[derive(Default)]
pub struct FakeMonitoring {
    pub jobs: Vec<String>,
    pub targets: Vec<Target>,
    pub fail_jobs: bool,
    pub fail_targets: bool,
}

impl FakeMonitoring {
    pub fn with_jobs(jobs: &[&str]) -> Self {
        Self {
            jobs: jobs.iter().map(|j| j.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_targets(targets: Vec<Target>) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MonitoringPort for FakeMonitoring {
    async fn label_values(
        &self,
        _label: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        if self.fail_jobs {
            return Err(Error::upstream("prometheus", "timeout"));
        }
        Ok(self.jobs.clone())
    }

    async fn targets(&self) -> Result<Vec<Target>> {
        if self.fail_targets {
            return Err(Error::upstream("prometheus", "timeout"));
        }
        Ok(self.targets.clone())
    }

    async fn build_info(&self) -> Result<BuildInfo> {
        Ok(BuildInfo {
            version: "2.51.0".to_string(),
        })
    }

    async fn runtime_info(&self) -> Result<RuntimeInfo> {
        Ok(RuntimeInfo {
            start_time: ts("2024-05-01T00:00:00Z"),
        })
    }
}
