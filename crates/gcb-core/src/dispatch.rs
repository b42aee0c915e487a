//! Dispatch router: one inbound message in, zero or more replies out.

use std::sync::Arc;

use crate::{
    domain::{ChatId, InboundMessage},
    matcher::{scan, IdentifierKind},
    messaging::{port::MessagingPort, types::ChatAction},
    resolver::{ResolutionResult, Resolver},
    templates::{TemplateFields, TemplateName, TemplateRenderer},
};

/// Fixed-reply commands. Anything else starting with `/` is treated as plain text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
}

impl BotCommand {
    /// Parse the leading command token. In groups Telegram sends `/cmd@botname args`; a
    /// command addressed to another bot is not ours, so it yields `None`.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let (name, addressee) = match first.strip_prefix('/')?.split_once('@') {
            Some((name, to)) => (name, Some(to)),
            None => (first.strip_prefix('/')?, None),
        };
        if let Some(to) = addressee {
            if !bot_username.is_some_and(|me| me.eq_ignore_ascii_case(to)) {
                return None;
            }
        }
        match name.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            _ => None,
        }
    }

    pub fn template(self) -> TemplateName {
        match self {
            BotCommand::Start => TemplateName::Start,
            BotCommand::Help => TemplateName::Help,
        }
    }
}

pub struct Dispatcher {
    messenger: Arc<dyn MessagingPort>,
    resolver: Resolver,
    renderer: Arc<dyn TemplateRenderer>,
    /// Own username without `@`; `/cmd@other_bot` falls through to scanning.
    bot_username: Option<String>,
}

impl Dispatcher {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        resolver: Resolver,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            messenger,
            resolver,
            renderer,
            bot_username: None,
        }
    }

    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    /// Run one dispatch cycle. Every failure is logged or turned into a reply; nothing
    /// escapes to the intake loop.
    pub async fn handle(&self, msg: &InboundMessage) {
        let Some(text) = msg.text.as_deref() else {
            tracing::debug!(message_id = msg.message_id.0, "ignoring message without text");
            return;
        };

        if let Some(cmd) = BotCommand::parse(text, self.bot_username.as_deref()) {
            tracing::info!(message_id = msg.message_id.0, command = ?cmd, "command received");
            self.typing(msg.chat_id).await;
            let reply = self.renderer.render(cmd.template(), &TemplateFields::new());
            self.reply(msg, &reply).await;
            return;
        }

        let matches = scan(text);
        if matches.is_empty() {
            return;
        }
        tracing::info!(
            message_id = msg.message_id.0,
            chat_id = msg.chat_id.0,
            count = matches.len(),
            "identifiers detected"
        );

        for m in matches {
            self.typing(msg.chat_id).await;
            let code = Resolver::normalize(m.raw);
            let result = self.resolver.resolve(m.kind, m.raw).await;
            log_outcome(msg, m.kind, &code, &result);
            let reply = result.into_reply(m.kind, &code);
            self.reply(msg, &reply).await;
        }
    }

    /// Best-effort typing indicator.
    async fn typing(&self, chat_id: ChatId) {
        if !self.messenger.capabilities().supports_chat_actions {
            return;
        }
        if let Err(e) = self
            .messenger
            .send_chat_action(chat_id, ChatAction::Typing)
            .await
        {
            tracing::debug!(chat_id = chat_id.0, error = %e, "typing indicator failed");
        }
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) {
        if let Err(e) = self.messenger.send_text(msg.chat_id, text).await {
            tracing::error!(
                message_id = msg.message_id.0,
                chat_id = msg.chat_id.0,
                error = %e,
                "failed to send reply"
            );
        }
    }
}

fn log_outcome(msg: &InboundMessage, kind: IdentifierKind, code: &str, result: &ResolutionResult) {
    match result {
        ResolutionResult::Success(_) => {
            tracing::info!(message_id = msg.message_id.0, kind = %kind, code, "resolved");
        }
        ResolutionResult::Failure { kind: failure, detail } => {
            tracing::warn!(
                message_id = msg.message_id.0,
                kind = %kind,
                code,
                failure = ?failure,
                detail = %detail,
                "identifier not resolved"
            );
        }
    }
}
