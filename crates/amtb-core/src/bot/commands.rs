use chrono::Utc;
use serde::Serialize;

use crate::{
    domain::ChatId,
    errors::Error,
    formatting::{escape_html, format_uptime},
    messaging::{
        dispatcher::Outgoing,
        types::{Command, TextMessage},
    },
    model::Silence,
    security::authorize,
    templating::Renderable,
    Result, VERSION,
};

use super::App;

pub const HELP: &str = "Available commands:
/status - show alertmanager & bot status
/alerts - show active alerts
/targets - show alerts per target
/silences - show active silences";

const REJECTED: &str = "I can't talk to you, sorry.";

/// How a list command should present its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Output {
    /// Through the configured template, JSON when none is configured.
    Default,
    Json,
}

/// At most one argument, and only `json`.
fn parse_output(args: &str) -> Result<Output> {
    let mut words = args.split_whitespace();
    match (words.next(), words.next()) {
        (None, _) => Ok(Output::Default),
        (Some(_), Some(_)) => Err(Error::InvalidArguments("Too many arguments.".to_string())),
        (Some("json"), None) => Ok(Output::Json),
        (Some(_), None) => Err(Error::InvalidArguments("Unknown argument.".to_string())),
    }
}

pub(super) async fn handle_message(app: &App, msg: &TextMessage) -> Result<()> {
    let from = msg
        .user
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    tracing::info!(user = %from, edited = msg.edited, text = %msg.text, "new message");

    if let Err(e) = authorize(msg.user.as_ref(), &app.cfg.users) {
        tracing::warn!(user = %from, error = %e, "rejecting message");
        return app.send(Outgoing::send(msg.chat_id, REJECTED)).await;
    }

    let Some(cmd) = Command::parse(&msg.text) else {
        let text = format!("Message doesn't look like a command.\n{HELP}");
        return app.send(Outgoing::send(msg.chat_id, text)).await;
    };

    let result = match cmd.name.as_str() {
        "help" | "start" => help(app, msg.chat_id).await,
        "alerts" => alerts(app, msg.chat_id, &cmd.args).await,
        "targets" => targets(app, msg.chat_id).await,
        "status" => status(app, msg.chat_id).await,
        "silences" => silences(app, msg.chat_id, &cmd.args).await,
        _ => {
            let text = format!("Unknown command.\n{HELP}");
            app.send(Outgoing::send(msg.chat_id, text)).await
        }
    };

    match result {
        Err(Error::InvalidArguments(reason)) => {
            app.send(Outgoing::send(msg.chat_id, reason)).await
        }
        other => other,
    }
}

async fn help(app: &App, chat_id: ChatId) -> Result<()> {
    let text = format!("Telegram Bot for Alertmanager\nVersion <b>{VERSION}</b>\n{HELP}");
    app.send(Outgoing::send(chat_id, text).html()).await
}

async fn alerts(app: &App, chat_id: ChatId, args: &str) -> Result<()> {
    let output = parse_output(args)?;

    let alerts = app.alerting.alerts(&[]).await?;
    if alerts.is_empty() {
        return app.send(Outgoing::send(chat_id, "No active alerts found.")).await;
    }

    let template = app.cfg.gettable_alerts_template_path.as_deref();
    let outgoing = match (output, template) {
        (Output::Default, Some(path)) => {
            let text = app.renderer.render(Renderable::Alerts(&alerts), path)?;
            Outgoing::send(chat_id, text).html()
        }
        _ => Outgoing::send(chat_id, to_pretty_json(&alerts)?),
    };
    app.send(outgoing).await
}

async fn silences(app: &App, chat_id: ChatId, args: &str) -> Result<()> {
    let output = parse_output(args)?;

    let active: Vec<Silence> = app
        .alerting
        .silences()
        .await?
        .into_iter()
        .filter(Silence::is_active)
        .collect();
    if active.is_empty() {
        return app.send(Outgoing::send(chat_id, "No active silences found.")).await;
    }

    let template = app.cfg.silences_template_path.as_deref();
    let outgoing = match (output, template) {
        (Output::Default, Some(path)) => {
            let text = app.renderer.render(Renderable::Silences(&active), path)?;
            Outgoing::send(chat_id, text).html()
        }
        _ => Outgoing::send(chat_id, to_pretty_json(&active)?),
    };
    app.send(outgoing).await
}

async fn targets(app: &App, chat_id: ChatId) -> Result<()> {
    let kb = app.menus.jobs_menu().await?;
    app.send(Outgoing::send(chat_id, "Select job:").with_keyboard(kb))
        .await
}

async fn status(app: &App, chat_id: ChatId) -> Result<()> {
    let am = app.alerting.status().await?;
    let build = app.monitoring.build_info().await?;
    let runtime = app.monitoring.runtime_info().await?;
    let now = Utc::now();

    let text = format!(
        "Alertmanager\nVersion: <b>{}</b>\nUptime: <b>{}</b>\n\n\
         Prometheus\nVersion: <b>{}</b>\nUptime: <b>{}</b>\n\n\
         Bot\nVersion: <b>{}</b>\nUptime: <b>{}</b>",
        escape_html(&am.version),
        format_uptime(am.started_at, now),
        escape_html(&build.version),
        format_uptime(runtime.start_time, now),
        VERSION,
        format_uptime(app.started_at, now),
    );
    app.send(Outgoing::send(chat_id, text).html()).await
}

pub(super) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
