use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{InlineKeyboard, ParseMode},
    Result,
};

/// Chat transport port.
///
/// Implementations perform exactly one API call per method and report
/// flood control as `Error::RateLimited`; retrying is the dispatcher's job.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageRef>;

    async fn edit_message_text(
        &self,
        msg: MessageRef,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    /// Replace the inline keyboard; an empty keyboard removes it.
    async fn edit_reply_markup(&self, msg: MessageRef, keyboard: &InlineKeyboard) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
