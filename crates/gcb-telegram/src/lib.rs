//! Telegram adapter (teloxide).
//!
//! Implements the `gcb-core` messaging port and update source over the Telegram Bot API,
//! plus the webhook endpoint and process wiring for both delivery models.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ParseMode, UpdateKind},
};

use tokio::time::sleep;

pub mod router;
pub mod updates;
pub mod webhook;

use gcb_core::{
    domain::{ChatId, InboundMessage, InboundUpdate, MessageId, MessageRef, UpdateId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, MessagingCapabilities},
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

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::warn!(retry_after = ?d, "telegram rate limit hit; retrying once");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_chat_actions: true,
        }
    }

    async fn send_text(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let tg_action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
        };
        self.with_retry(|| self.bot.send_chat_action(Self::tg_chat(chat_id), tg_action))
            .await?;
        Ok(())
    }
}

/// Map a Telegram update to the transport-neutral form. Only plain messages carry a
/// payload; everything else (edits, callbacks, member changes) keeps just its id.
pub fn inbound_update(update: &Update) -> InboundUpdate {
    let message = match &update.kind {
        UpdateKind::Message(msg) => Some(InboundMessage {
            message_id: MessageId(msg.id.0),
            chat_id: ChatId(msg.chat.id.0),
            text: msg.text().map(str::to_string),
            date: msg.date,
        }),
        _ => None,
    };
    InboundUpdate {
        id: UpdateId(i64::from(update.id)),
        message,
    }
}
