use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{ChatAction, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* outbound calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls to the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = now.max(self.next);
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that spaces out outbound calls.
///
/// A message with several codes produces a burst of replies to one chat; this keeps the
/// burst under Telegram's per-chat limits instead of relying on 429 retries.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<ChatId, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: ChatId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        let now = Instant::now();
        // A limiter nobody else holds whose next slot is already free carries no state.
        map.retain(|_, lim| {
            Arc::strong_count(lim) > 1 || lim.try_lock().map_or(true, |l| l.next > now)
        });
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: ChatId) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_text(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.throttle_chat(chat_id).await;
        self.inner.send_text(chat_id, html).await
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        // Chat actions are cosmetic; only the global limiter applies so they never delay
        // the reply that follows.
        let wait = { self.global.lock().await.reserve() };
        if !wait.is_zero() {
            sleep(wait).await;
        }
        self.inner.send_chat_action(chat_id, action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMessenger;

    #[tokio::test(start_paused = true)]
    async fn spaces_out_replies_to_the_same_chat() {
        let inner = Arc::new(FakeMessenger::new());
        let throttled = ThrottledMessenger::new(inner.clone(), ThrottleConfig::default());
        let chat = ChatId(7);

        let start = Instant::now();
        throttled.send_text(chat, "one").await.unwrap();
        throttled.send_text(chat, "two").await.unwrap();
        throttled.send_text(chat, "three").await.unwrap();

        assert_eq!(inner.texts(), vec!["one", "two", "three"]);
        assert!(start.elapsed() >= Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn different_chats_only_share_the_global_limit() {
        let inner = Arc::new(FakeMessenger::new());
        let throttled = ThrottledMessenger::new(inner.clone(), ThrottleConfig::default());

        let start = Instant::now();
        throttled.send_text(ChatId(1), "a").await.unwrap();
        throttled.send_text(ChatId(2), "b").await.unwrap();

        assert!(start.elapsed() < Duration::from_millis(1000));
        assert_eq!(inner.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_chat_limiters_are_dropped() {
        let inner = Arc::new(FakeMessenger::new());
        let throttled = ThrottledMessenger::new(inner.clone(), ThrottleConfig::default());

        throttled.send_text(ChatId(1), "a").await.unwrap();
        throttled.send_text(ChatId(2), "b").await.unwrap();
        assert_eq!(throttled.per_chat.lock().await.len(), 2);

        sleep(Duration::from_secs(2)).await;
        throttled.send_text(ChatId(3), "c").await.unwrap();
        assert_eq!(throttled.per_chat.lock().await.len(), 1);

        // A chat still inside its spacing window keeps its limiter.
        throttled.send_text(ChatId(4), "d").await.unwrap();
        assert_eq!(throttled.per_chat.lock().await.len(), 2);
    }
}
