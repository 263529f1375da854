//! Message Dispatcher: the single outbound path to the chat transport.
//!
//! An [`Outgoing`] request is first planned into transport operations (chunked
//! to the message length ceiling, edits that no longer fit turned into
//! delete + send), then each operation is executed under the per-call timeout
//! and the flood-control retry policy.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};

use crate::{
    config::Config,
    domain::{ChatId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, ParseMode},
    },
    Result,
};

/// What a caller wants to happen in the chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outgoing {
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
    Delete {
        msg: MessageRef,
    },
    EditMarkup {
        msg: MessageRef,
        keyboard: InlineKeyboard,
    },
}

impl Outgoing {
    pub fn send(chat_id: ChatId, text: impl Into<String>) -> Self {
        Outgoing::Send {
            chat_id,
            text: text.into(),
            parse_mode: ParseMode::Plain,
            keyboard: None,
        }
    }

    pub fn edit(msg: MessageRef, text: impl Into<String>) -> Self {
        Outgoing::Edit {
            msg,
            text: text.into(),
            parse_mode: ParseMode::Plain,
            keyboard: None,
        }
    }

    pub fn delete(msg: MessageRef) -> Self {
        Outgoing::Delete { msg }
    }

    /// Remove the inline keyboard of `msg`.
    pub fn strip_markup(msg: MessageRef) -> Self {
        Outgoing::EditMarkup {
            msg,
            keyboard: InlineKeyboard::empty(),
        }
    }

    pub fn html(mut self) -> Self {
        if let Outgoing::Send { parse_mode, .. } | Outgoing::Edit { parse_mode, .. } = &mut self {
            *parse_mode = ParseMode::Html;
        }
        self
    }

    pub fn with_keyboard(mut self, kb: InlineKeyboard) -> Self {
        if let Outgoing::Send { keyboard, .. } | Outgoing::Edit { keyboard, .. } = &mut self {
            *keyboard = Some(kb);
        }
        self
    }
}

/// One transport call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportOp {
    Send {
        chat_id: ChatId,
        text: String,
        parse_mode: ParseMode,
        keyboard: Option<InlineKeyboard>,
    },
    EditText {
        msg: MessageRef,
        text: String,
        parse_mode: ParseMode,
        keyboard: Option<InlineKeyboard>,
    },
    Delete {
        msg: MessageRef,
    },
    EditMarkup {
        msg: MessageRef,
        keyboard: InlineKeyboard,
    },
}

/// Ordered transport calls that realise one [`Outgoing`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessagePlan {
    pub ops: Vec<TransportOp>,
}

impl MessagePlan {
    /// Only the last chunk carries the keyboard. An edit that needs more than
    /// one chunk becomes a delete followed by one send per chunk.
    pub fn build(outgoing: Outgoing, max_len: usize) -> Self {
        let ops = match outgoing {
            Outgoing::Send {
                chat_id,
                text,
                parse_mode,
                keyboard,
            } => sends(chat_id, split_into_chunks(&text, max_len), parse_mode, keyboard),
            Outgoing::Edit {
                msg,
                text,
                parse_mode,
                keyboard,
            } => {
                let mut chunks = split_into_chunks(&text, max_len);
                if chunks.len() > 1 {
                    let mut ops = vec![TransportOp::Delete { msg }];
                    ops.extend(sends(msg.chat_id, chunks, parse_mode, keyboard));
                    ops
                } else {
                    vec![TransportOp::EditText {
                        msg,
                        text: chunks.pop().unwrap_or_default(),
                        parse_mode,
                        keyboard,
                    }]
                }
            }
            Outgoing::Delete { msg } => vec![TransportOp::Delete { msg }],
            Outgoing::EditMarkup { msg, keyboard } => {
                vec![TransportOp::EditMarkup { msg, keyboard }]
            }
        };
        Self { ops }
    }
}

fn sends(
    chat_id: ChatId,
    chunks: Vec<String>,
    parse_mode: ParseMode,
    keyboard: Option<InlineKeyboard>,
) -> Vec<TransportOp> {
    let last = chunks.len().saturating_sub(1);
    let mut keyboard = keyboard;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, text)| TransportOp::Send {
            chat_id,
            text,
            parse_mode,
            keyboard: if i == last { keyboard.take() } else { None },
        })
        .collect()
}

/// Split `text` into chunks of at most `max_len` characters, breaking only
/// between lines. When no line is longer than `max_len`, joining the chunks
/// with `\n` gives back the input.
///
/// A single line longer than `max_len` cannot be kept whole; it is cut at
/// character boundaries into pieces that are emitted as separate chunks, so
/// rejoining with `\n` no longer reproduces that line.
pub fn split_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut chunk = String::new();
    let mut chunk_len = 0usize;
    let mut started = false;

    for line in text.split('\n') {
        let line_len = line.chars().count();

        if line_len > max_len {
            if started {
                chunks.push(std::mem::take(&mut chunk));
            }
            let chars: Vec<char> = line.chars().collect();
            let mut pieces = chars.chunks(max_len).map(|c| c.iter().collect::<String>());
            let mut current = pieces.next().unwrap_or_default();
            for piece in pieces {
                chunks.push(std::mem::replace(&mut current, piece));
            }
            chunk_len = current.chars().count();
            chunk = current;
            started = true;
            continue;
        }

        if !started {
            chunk.push_str(line);
            chunk_len = line_len;
            started = true;
        } else if chunk_len + 1 + line_len > max_len {
            chunks.push(std::mem::replace(&mut chunk, line.to_string()));
            chunk_len = line_len;
        } else {
            chunk.push('\n');
            chunk.push_str(line);
            chunk_len += 1 + line_len;
        }
    }

    chunks.push(chunk);
    chunks
}

pub struct MessageDispatcher {
    port: Arc<dyn MessagingPort>,
    max_len: usize,
    max_attempts: u32,
    call_timeout: Duration,
}

impl MessageDispatcher {
    pub fn new(
        port: Arc<dyn MessagingPort>,
        max_len: usize,
        max_attempts: u32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            port,
            max_len: max_len.max(1),
            max_attempts: max_attempts.max(1),
            call_timeout,
        }
    }

    pub fn from_config(port: Arc<dyn MessagingPort>, cfg: &Config) -> Self {
        Self::new(
            port,
            cfg.message_limit,
            cfg.send_message_retry_count,
            cfg.api_timeout,
        )
    }

    /// Deliver `outgoing`; returns the messages created by send operations.
    ///
    /// Message ids of the original message are not stable across an edit that
    /// turned into delete + resend.
    pub async fn dispatch(&self, outgoing: Outgoing) -> Result<Vec<MessageRef>> {
        let plan = MessagePlan::build(outgoing, self.max_len);
        let mut sent = Vec::new();
        for op in &plan.ops {
            if let Some(msg) = self.execute(op).await? {
                sent.push(msg);
            }
        }
        Ok(sent)
    }

    /// Stop the client-side spinner of a callback button.
    pub async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry("answer callback", || {
            self.port.answer_callback_query(callback_id, text)
        })
        .await
    }

    async fn execute(&self, op: &TransportOp) -> Result<Option<MessageRef>> {
        match op {
            TransportOp::Send {
                chat_id,
                text,
                parse_mode,
                keyboard,
            } => {
                let msg = self
                    .with_retry("send message", || {
                        self.port
                            .send_message(*chat_id, text, *parse_mode, keyboard.as_ref())
                    })
                    .await?;
                Ok(Some(msg))
            }
            TransportOp::EditText {
                msg,
                text,
                parse_mode,
                keyboard,
            } => {
                self.with_retry("edit message", || {
                    self.port
                        .edit_message_text(*msg, text, *parse_mode, keyboard.as_ref())
                })
                .await?;
                Ok(None)
            }
            TransportOp::Delete { msg } => {
                self.with_retry("delete message", || self.port.delete_message(*msg))
                    .await?;
                Ok(None)
            }
            TransportOp::EditMarkup { msg, keyboard } => {
                self.with_retry("edit reply markup", || {
                    self.port.edit_reply_markup(*msg, keyboard)
                })
                .await?;
                Ok(None)
            }
        }
    }

    /// Flood control is retried after the server-provided delay, up to
    /// `max_attempts` calls in total; any other error is returned at once.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = timeout(self.call_timeout, op())
                .await
                .map_err(|_| Error::Delivery(format!("{what}: timed out after {:?}", self.call_timeout)))
                .and_then(|r| r);

            match result {
                Ok(v) => return Ok(v),
                Err(Error::RateLimited { retry_after }) if attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        retry_after_secs = retry_after.as_secs(),
                        "{what}: flood control, retrying"
                    );
                    sleep(retry_after).await;
                }
                Err(Error::RateLimited { retry_after }) => {
                    return Err(Error::Delivery(format!(
                        "{what}: still rate limited after {attempt} attempts (retry after {retry_after:?})"
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }
}
