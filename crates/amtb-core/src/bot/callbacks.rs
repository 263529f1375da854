use chrono::{Duration as ChronoDuration, Utc};

use crate::{
    domain::{MessageRef, User},
    errors::Error,
    formatting::{escape_html, format_timestamp},
    menu::GO_BACK_LABEL,
    messaging::{dispatcher::Outgoing, types::InlineKeyboard},
    model::{Matcher, PostableSilence},
    ports::label_filter,
    session::{
        CallbackIntent, CallbackKind, ALERTNAME, INSTANCE, JOB_NAME, LEAVE_LAST_MESSAGE,
        TARGET_NAME,
    },
    templating::Renderable,
    Result, PROGRAM_NAME, VERSION,
};

use super::{commands::to_pretty_json, App};

const SELECT_JOB: &str = "Select job:";
const SELECT_TARGET: &str = "Select target:";

pub(super) async fn handle_callback(
    app: &App,
    user: &User,
    msg: MessageRef,
    intent: CallbackIntent,
) -> Result<()> {
    match intent.kind {
        CallbackKind::Job => {
            let job = intent.require(JOB_NAME)?;
            let kb = targets_with_back(app, job).await?;
            if intent.flag(LEAVE_LAST_MESSAGE) {
                // Keep the alert list visible, drop only its "Go back" button.
                app.send(Outgoing::strip_markup(msg)).await?;
                app.send(Outgoing::send(msg.chat_id, SELECT_TARGET).with_keyboard(kb))
                    .await
            } else {
                app.send(Outgoing::edit(msg, SELECT_TARGET).with_keyboard(kb))
                    .await
            }
        }
        CallbackKind::Target => {
            let job = intent.require(JOB_NAME)?;
            let instance = intent.require(TARGET_NAME)?;
            target_alerts(app, msg, job, instance).await
        }
        CallbackKind::Jobs => {
            let kb = app.menus.jobs_menu().await?;
            app.send(Outgoing::edit(msg, SELECT_JOB).with_keyboard(kb))
                .await
        }
        CallbackKind::Targets => {
            let job = intent.require(JOB_NAME)?;
            let kb = targets_with_back(app, job).await?;
            app.send(Outgoing::edit(msg, SELECT_TARGET).with_keyboard(kb))
                .await
        }
        CallbackKind::Close => app.send(Outgoing::delete(msg)).await,
        CallbackKind::Silence => {
            let instance = intent.require(INSTANCE)?;
            let alertname = intent.require(ALERTNAME)?;
            create_silence(app, user, msg, instance, alertname).await
        }
    }
}

async fn targets_with_back(app: &App, job: &str) -> Result<InlineKeyboard> {
    let mut kb = app.menus.targets_menu(job).await?;
    kb.push_row(vec![app.menus.nav_button(GO_BACK_LABEL, CallbackIntent::jobs())]);
    Ok(kb)
}

async fn target_alerts(app: &App, msg: MessageRef, job: &str, instance: &str) -> Result<()> {
    let alerts = app
        .alerting
        .alerts(&[label_filter("instance", instance)])
        .await?;

    let back = CallbackIntent::job(job).with_param(LEAVE_LAST_MESSAGE, "yes");
    let kb = InlineKeyboard::single(app.menus.nav_button(GO_BACK_LABEL, back));

    let outgoing = if alerts.is_empty() {
        Outgoing::edit(msg, format!("No active alerts for {}", escape_html(instance))).html()
    } else {
        match app.cfg.gettable_alerts_template_path.as_deref() {
            Some(path) => {
                Outgoing::edit(msg, app.renderer.render(Renderable::Alerts(&alerts), path)?).html()
            }
            None => Outgoing::edit(msg, to_pretty_json(&alerts)?),
        }
    };
    app.send(outgoing.with_keyboard(kb)).await
}

async fn create_silence(
    app: &App,
    user: &User,
    msg: MessageRef,
    instance: &str,
    alertname: &str,
) -> Result<()> {
    let duration = ChronoDuration::from_std(app.cfg.silence_duration)
        .map_err(|e| Error::Config(format!("silence duration out of range: {e}")))?;
    let starts_at = Utc::now();
    let silence = PostableSilence {
        matchers: vec![
            Matcher::equal(INSTANCE, instance),
            Matcher::equal(ALERTNAME, alertname),
        ],
        starts_at,
        ends_at: starts_at + duration,
        created_by: format!("{PROGRAM_NAME} version {VERSION}"),
        comment: format!("Silenced from Telegram by {user}"),
    };

    let id = app.alerting.post_silence(&silence).await?;
    tracing::info!(silence_id = %id, instance, alertname, user = %user, "created silence");

    app.send(Outgoing::strip_markup(msg)).await?;

    let (tz, fmt) = (app.cfg.time_zone, app.cfg.time_format.as_str());
    let text = format!(
        "Created new silence:\nID: <b>{}</b>\nStartsAt: <b>{}</b>\nEndsAt: <b>{}</b>\n\
         Matchers: [{{instance=\"{}\"}},{{alertname=\"{}\"}}]",
        escape_html(&id),
        format_timestamp(silence.starts_at, tz, fmt),
        format_timestamp(silence.ends_at, tz, fmt),
        escape_html(instance),
        escape_html(alertname),
    );
    app.send(Outgoing::send(msg.chat_id, text).html()).await
}
