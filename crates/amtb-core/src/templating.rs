//! Template Renderer: alert/silence data -> chat message text.
//!
//! Templates are Jinja-style (minijinja) and are re-read from disk on every
//! render so edits take effect without a restart. The root context exposes:
//!
//! - `data`: the rendered value (alert list, silence list or webhook alert group)
//! - `kind`: `"alerts"`, `"silences"` or `"alert_group"`
//!
//! and the helpers `to_upper`, `to_lower`, `kind_of` and `format_date`
//! (available both as functions and as filters).

use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use minijinja::{value::ValueKind, Environment, ErrorKind, UndefinedBehavior, Value};
use serde::{Serialize, Serializer};

use crate::{
    config::Config,
    errors::Error,
    formatting::format_timestamp,
    model::{Alert, Silence, WebhookPayload},
    Result,
};

/// Data shapes a template can be invoked with.
#[derive(Clone, Copy, Debug)]
pub enum Renderable<'a> {
    Alerts(&'a [Alert]),
    Silences(&'a [Silence]),
    AlertGroup(&'a WebhookPayload),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderKind {
    Alerts,
    Silences,
    AlertGroup,
}

impl RenderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderKind::Alerts => "alerts",
            RenderKind::Silences => "silences",
            RenderKind::AlertGroup => "alert_group",
        }
    }
}

impl Renderable<'_> {
    pub fn kind(&self) -> RenderKind {
        match self {
            Renderable::Alerts(_) => RenderKind::Alerts,
            Renderable::Silences(_) => RenderKind::Silences,
            Renderable::AlertGroup(_) => RenderKind::AlertGroup,
        }
    }
}

impl Serialize for Renderable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Renderable::Alerts(alerts) => alerts.serialize(serializer),
            Renderable::Silences(silences) => silences.serialize(serializer),
            Renderable::AlertGroup(group) => group.serialize(serializer),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TemplateRenderer {
    time_zone: Tz,
    time_format: String,
}

impl TemplateRenderer {
    pub fn new(time_zone: Tz, time_format: impl Into<String>) -> Self {
        Self {
            time_zone,
            time_format: time_format.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.time_zone, cfg.time_format.clone())
    }

    /// Load `path` and render `value` through it.
    pub fn render(&self, value: Renderable<'_>, path: &Path) -> Result<String> {
        let source = fs::read_to_string(path).map_err(|e| Error::TemplateLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("template");

        let env = self.environment();
        let tmpl = env
            .template_from_named_str(name, &source)
            .map_err(|e| Error::TemplateLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        tmpl.render(minijinja::context! {
            data => Value::from_serializable(&value),
            kind => value.kind().as_str(),
        })
        .map_err(|e| Error::TemplateExec(format!("{}: {e}", path.display())))
    }

    fn environment<'s>(&self) -> Environment<'s> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.add_function("to_upper", to_upper);
        env.add_function("to_lower", to_lower);
        env.add_function("kind_of", kind_of);
        env.add_filter("to_upper", to_upper);
        env.add_filter("to_lower", to_lower);
        env.add_filter("kind_of", kind_of);

        let (tz, fmt) = (self.time_zone, self.time_format.clone());
        env.add_function("format_date", move |v: Value| format_date(&v, tz, &fmt));
        let (tz, fmt) = (self.time_zone, self.time_format.clone());
        env.add_filter("format_date", move |v: Value| format_date(&v, tz, &fmt));

        env
    }
}

fn to_upper(s: String) -> String {
    s.to_uppercase()
}

fn to_lower(s: String) -> String {
    s.to_lowercase()
}

/// Coarse category of a template value, used to branch between a collection
/// of alerts and a single alert group.
fn kind_of(v: Value) -> &'static str {
    match v.kind() {
        ValueKind::Seq => "slice",
        ValueKind::Map => "map",
        ValueKind::String => "string",
        ValueKind::Number => "number",
        ValueKind::Bool => "bool",
        ValueKind::None => "none",
        ValueKind::Undefined => "undefined",
        _ => "other",
    }
}

/// Accepts RFC 3339 strings (how timestamps serialize) or unix seconds.
/// Missing timestamps render as an empty string.
fn format_date(v: &Value, tz: Tz, fmt: &str) -> std::result::Result<String, minijinja::Error> {
    let ts: DateTime<Utc> = match v.kind() {
        ValueKind::None | ValueKind::Undefined => return Ok(String::new()),
        ValueKind::String => {
            let raw = v.as_str().unwrap_or_default();
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    minijinja::Error::new(
                        ErrorKind::InvalidOperation,
                        format!("format_date: cannot parse {raw:?}: {e}"),
                    )
                })?
        }
        ValueKind::Number => {
            let secs = i64::try_from(v.clone()).map_err(|e| {
                minijinja::Error::new(ErrorKind::InvalidOperation, format!("format_date: {e}"))
            })?;
            DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("format_date: timestamp out of range: {secs}"),
                )
            })?
        }
        _ => {
            return Err(minijinja::Error::new(
                ErrorKind::InvalidOperation,
                format!("format_date: unsupported value {v}"),
            ))
        }
    };

    Ok(format_timestamp(ts, tz, fmt))
}
