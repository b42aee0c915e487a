//! Test doubles shared by the unit tests in this crate.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, InboundMessage, InboundUpdate, MessageId, MessageRef, UpdateId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, MessagingCapabilities},
    },
    provider::{CacheRecord, DataProvider, ProviderError, Rating, TrackableRecord},
    templates::{TemplateName, TemplateSource, TemplateStore},
    Result,
};

#[derive(Default)]
pub struct FakeMessenger {
    next_id: AtomicUsize,
    sent: Mutex<Vec<(ChatId, String)>>,
    actions: Mutex<Vec<ChatId>>,
    fail_actions: bool,
    fail_sends_containing: Option<String>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_chat_actions(mut self) -> Self {
        self.fail_actions = true;
        self
    }

    pub fn failing_sends_containing(mut self, needle: &str) -> Self {
        self.fail_sends_containing = Some(needle.to_string());
        self
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, t)| t).collect()
    }

    pub fn action_count(&self) -> usize {
        self.actions.lock().unwrap().len()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_chat_actions: true,
        }
    }

    async fn send_text(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        if let Some(needle) = &self.fail_sends_containing {
            if html.contains(needle.as_str()) {
                return Err(Error::External("send rejected".to_string()));
            }
        }
        self.sent.lock().unwrap().push((chat_id, html.to_string()));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i32 + 1;
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(id),
        })
    }

    async fn send_chat_action(&self, chat_id: ChatId, _action: ChatAction) -> Result<()> {
        self.actions.lock().unwrap().push(chat_id);
        if self.fail_actions {
            return Err(Error::External("chat action rejected".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProvider {
    caches: HashMap<String, std::result::Result<CacheRecord, ProviderError>>,
    trackables: HashMap<String, std::result::Result<TrackableRecord, ProviderError>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, record: CacheRecord) -> Self {
        self.caches.insert(record.code.clone(), Ok(record));
        self
    }

    pub fn with_cache_error(mut self, code: &str, err: ProviderError) -> Self {
        self.caches.insert(code.to_string(), Err(err));
        self
    }

    pub fn with_trackable(mut self, record: TrackableRecord) -> Self {
        self.trackables.insert(record.id.clone(), Ok(record));
        self
    }

    pub fn with_trackable_error(mut self, code: &str, err: ProviderError) -> Self {
        self.trackables.insert(code.to_string(), Err(err));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl DataProvider for FakeProvider {
    async fn resolve_cache(&self, code: &str) -> std::result::Result<CacheRecord, ProviderError> {
        self.calls.lock().unwrap().push(format!("cache:{code}"));
        self.pause().await;
        self.caches
            .get(code)
            .cloned()
            .unwrap_or(Err(ProviderError::NotFound))
    }

    async fn resolve_trackable(
        &self,
        code: &str,
    ) -> std::result::Result<TrackableRecord, ProviderError> {
        self.calls.lock().unwrap().push(format!("trackable:{code}"));
        self.pause().await;
        self.trackables
            .get(code)
            .cloned()
            .unwrap_or(Err(ProviderError::NotFound))
    }
}

pub fn cache(code: &str, name: &str, difficulty: f32, terrain: f32) -> CacheRecord {
    CacheRecord {
        cache_type: "Traditional".to_string(),
        code: code.to_string(),
        name: name.to_string(),
        size: "small".to_string(),
        favorites: 7,
        difficulty: Rating::new(difficulty).unwrap(),
        terrain: Rating::new(terrain).unwrap(),
        location: None,
    }
}

pub fn trackable(id: &str, name: &str) -> TrackableRecord {
    TrackableRecord {
        trackable_type: "Travel Bug".to_string(),
        id: id.to_string(),
        name: name.to_string(),
        owner: "ferris".to_string(),
        location: "In the hands of ferris".to_string(),
    }
}

/// One-line templates that make assertions easy to read.
pub fn inline_templates() -> TemplateStore {
    let inline = |s: &str| TemplateSource::Inline(s.to_string());
    TemplateStore::default()
        .with_source(
            TemplateName::CacheQuick,
            inline("$type $code $name $size fav=$favorites D=$diff T=$terrain"),
        )
        .with_source(
            TemplateName::Trackable,
            inline("$type $code $name owner=$owner at=$location"),
        )
        .with_source(TemplateName::Start, inline("start-reply"))
        .with_source(TemplateName::Help, inline("help-reply"))
}

pub fn text_message(chat: i64, id: i32, text: &str) -> InboundMessage {
    InboundMessage {
        message_id: MessageId(id),
        chat_id: ChatId(chat),
        text: Some(text.to_string()),
        date: chrono::Utc::now(),
    }
}

pub fn text_update(update_id: i64, chat: i64, text: &str) -> InboundUpdate {
    InboundUpdate {
        id: UpdateId(update_id),
        message: Some(text_message(chat, update_id as i32, text)),
    }
}
