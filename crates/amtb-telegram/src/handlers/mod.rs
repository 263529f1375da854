//! Telegram update handlers.
//!
//! Each handler converts the teloxide update into the transport-agnostic
//! `IncomingUpdate` and hands it to the core router. Errors are handled inside
//! the router, so handlers always succeed.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use amtb_core::{
    bot::App,
    domain::{ChatId, MessageId, MessageRef, User, UserId},
    messaging::types::{self, IncomingUpdate, TextMessage},
};

pub async fn handle_message(msg: Message, app: Arc<App>) -> ResponseResult<()> {
    if let Some(update) = text_update(&msg, false) {
        app.handle_update(update).await;
    }
    Ok(())
}

pub async fn handle_edited_message(msg: Message, app: Arc<App>) -> ResponseResult<()> {
    if let Some(update) = text_update(&msg, true) {
        app.handle_update(update).await;
    }
    Ok(())
}

pub async fn handle_callback(q: CallbackQuery, app: Arc<App>) -> ResponseResult<()> {
    app.handle_update(IncomingUpdate::Callback(callback_update(q)))
        .await;
    Ok(())
}

fn to_user(u: &teloxide::types::User) -> User {
    User {
        id: UserId(u.id.0 as i64),
        username: u.username.clone(),
        full_name: u.full_name(),
    }
}

fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
    }
}

/// Non-text messages (stickers, photos, service messages) are ignored.
fn text_update(msg: &Message, edited: bool) -> Option<IncomingUpdate> {
    let Some(text) = msg.text() else {
        tracing::debug!(chat_id = msg.chat.id.0, "ignoring non-text message");
        return None;
    };
    let r = message_ref(msg);
    Some(IncomingUpdate::Message(TextMessage {
        chat_id: r.chat_id,
        message_id: r.message_id,
        user: msg.from().map(to_user),
        text: text.to_string(),
        edited,
    }))
}

fn callback_update(q: CallbackQuery) -> types::CallbackQuery {
    types::CallbackQuery {
        callback_id: q.id.clone(),
        user: to_user(&q.from),
        data: q.data.clone().unwrap_or_default(),
        message: q.message.as_ref().map(message_ref),
    }
}
