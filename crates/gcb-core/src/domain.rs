use chrono::{DateTime, Utc};

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// Transport-assigned update id. Monotonic per bot, so it doubles as the polling cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UpdateId(pub i64);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// One chat message, read-only once received.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    /// Absent for stickers, photos without caption, service messages, ...
    pub text: Option<String>,
    pub date: DateTime<Utc>,
}

/// One transport update. Updates that are not messages (edits, callbacks, ...) still have
/// an id the polling cursor must move past.
#[derive(Clone, Debug)]
pub struct InboundUpdate {
    pub id: UpdateId,
    pub message: Option<InboundMessage>,
}
