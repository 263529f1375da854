//! Telegram adapter (teloxide).
//!
//! This crate implements the `amtb-core` MessagingPort over the Telegram Bot API
//! and feeds inbound updates into the core router.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode as TgParseMode},
    ApiError, RequestError,
};

pub mod handlers;
pub mod router;

use amtb_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, ParseMode},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn tg_markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data.clone()))
                    .collect()
            })
            .collect();
        InlineKeyboardMarkup::new(rows)
    }

    /// Flood control becomes `RateLimited` so the dispatcher can retry it;
    /// everything else is a delivery failure.
    fn map_err(e: RequestError) -> Error {
        match e {
            RequestError::RetryAfter(d) => Error::RateLimited { retry_after: d },
            other => Error::Delivery(format!("telegram error: {other}")),
        }
    }

    /// Editing to identical content is not a failure.
    fn ignore_not_modified(r: std::result::Result<(), RequestError>) -> Result<()> {
        match r {
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            other => other.map_err(Self::map_err),
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageRef> {
        let mut req = self.bot.send_message(Self::tg_chat(chat_id), text.to_string());
        if parse_mode == ParseMode::Html {
            req = req.parse_mode(TgParseMode::Html);
        }
        if let Some(kb) = keyboard {
            req = req.reply_markup(Self::tg_markup(kb));
        }
        let msg = req.await.map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_message_text(
        &self,
        msg: MessageRef,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        let mut req = self.bot.edit_message_text(
            Self::tg_chat(msg.chat_id),
            Self::tg_msg_id(msg.message_id),
            text.to_string(),
        );
        if parse_mode == ParseMode::Html {
            req = req.parse_mode(TgParseMode::Html);
        }
        if let Some(kb) = keyboard {
            req = req.reply_markup(Self::tg_markup(kb));
        }
        Self::ignore_not_modified(req.await.map(|_| ()))
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.bot
            .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn edit_reply_markup(&self, msg: MessageRef, keyboard: &InlineKeyboard) -> Result<()> {
        let req = self
            .bot
            .edit_message_reply_markup(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
            .reply_markup(Self::tg_markup(keyboard));
        Self::ignore_not_modified(req.await.map(|_| ()))
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let mut req = self.bot.answer_callback_query(callback_id.to_string());
        if let Some(t) = text {
            req = req.text(t.to_string());
        }
        req.await.map_err(Self::map_err)?;
        Ok(())
    }
}
