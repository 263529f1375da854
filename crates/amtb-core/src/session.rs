//! Session Store: opaque callback tokens -> callback intents.
//!
//! Telegram limits `callback_data` to 64 bytes, so buttons carry a short token
//! and the real payload lives here until the button is pressed (single use) or
//! the entry expires.

use std::{
    collections::BTreeMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{mapref::entry::Entry as MapEntry, DashMap};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{errors::Error, Result};

pub const JOB_NAME: &str = "job_name";
pub const TARGET_NAME: &str = "target_name";
pub const INSTANCE: &str = "instance";
pub const ALERTNAME: &str = "alertname";
pub const LEAVE_LAST_MESSAGE: &str = "leave_last_message";

/// Menu action bound to a button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackKind {
    /// Open the targets menu of `job_name`.
    Job,
    /// Show alerts of `target_name` (a member of `job_name`).
    Target,
    /// Back to the jobs menu.
    Jobs,
    /// Back to the targets menu of `job_name`.
    Targets,
    /// Delete the menu message.
    Close,
    /// Silence `instance` + `alertname`.
    Silence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackIntent {
    pub kind: CallbackKind,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl CallbackIntent {
    pub fn new(kind: CallbackKind) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn job(job_name: &str) -> Self {
        Self::new(CallbackKind::Job).with_param(JOB_NAME, job_name)
    }

    pub fn target(job_name: &str, target_name: &str) -> Self {
        Self::new(CallbackKind::Target)
            .with_param(JOB_NAME, job_name)
            .with_param(TARGET_NAME, target_name)
    }

    pub fn jobs() -> Self {
        Self::new(CallbackKind::Jobs)
    }

    pub fn targets(job_name: &str) -> Self {
        Self::new(CallbackKind::Targets).with_param(JOB_NAME, job_name)
    }

    pub fn close() -> Self {
        Self::new(CallbackKind::Close)
    }

    pub fn silence(instance: &str, alertname: &str) -> Self {
        Self::new(CallbackKind::Silence)
            .with_param(INSTANCE, instance)
            .with_param(ALERTNAME, alertname)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Required parameter; a missing one means the intent was built wrongly.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.param(key).ok_or_else(|| {
            Error::InvalidArguments(format!("callback {:?} is missing {key}", self.kind))
        })
    }

    pub fn flag(&self, key: &str) -> bool {
        self.param(key) == Some("yes")
    }
}

impl fmt::Display for CallbackIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self.kind),
        }
    }
}

#[derive(Debug)]
struct Entry {
    intent: CallbackIntent,
    expires_at: Instant,
}

/// Process-wide expiring map of callback tokens.
///
/// `take` removes atomically, so concurrent presses of one button resolve to
/// exactly one success.
#[derive(Debug)]
pub struct SessionStore {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `intent` under a fresh token and return the token.
    pub fn put(&self, intent: CallbackIntent) -> String {
        self.put_at(intent, Instant::now())
    }

    pub fn put_at(&self, intent: CallbackIntent, now: Instant) -> String {
        let expires_at = now + self.ttl;
        loop {
            match self.entries.entry(new_token()) {
                MapEntry::Vacant(slot) => {
                    let token = slot.key().clone();
                    slot.insert(Entry { intent, expires_at });
                    return token;
                }
                MapEntry::Occupied(_) => continue,
            }
        }
    }

    /// Look up and remove `token`.
    pub fn take(&self, token: &str) -> Result<CallbackIntent> {
        self.take_at(token, Instant::now())
    }

    pub fn take_at(&self, token: &str, now: Instant) -> Result<CallbackIntent> {
        match self.entries.remove(token) {
            Some((_, entry)) if entry.expires_at > now => Ok(entry.intent),
            _ => Err(Error::SessionNotFound(token.to_string())),
        }
    }

    /// Drop expired entries; returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run `sweep` every `every` until `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = store.len(), "expired callback sessions swept");
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }
}

/// Time-ordered, random-suffixed id (UUIDv7), 32 hex chars.
fn new_token() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}
