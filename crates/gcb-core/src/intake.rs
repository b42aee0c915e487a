//! Intake loops: feed transport updates to the dispatcher.
//!
//! Two delivery models share the same dispatcher:
//! - polling: pull batches after a cursor, handle them in order, advance the cursor;
//! - push (webhook): one update per call, serialized per chat.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::{
    dispatch::Dispatcher,
    domain::{ChatId, InboundUpdate, UpdateId},
    Result,
};

/// Inbound side of a pull-based transport.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Id of the newest update the transport considers already seen, used to seed the cursor
    /// at startup. `None` means "start from whatever is pending".
    async fn latest_seen(&self) -> Result<Option<UpdateId>>;

    /// Updates newer than `after`, in any order. Must not acknowledge anything newer than
    /// `after` on the transport side.
    async fn poll_updates(&self, after: Option<UpdateId>) -> Result<Vec<InboundUpdate>>;
}

/// Last fully handled update. Only ever moves forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    last: Option<UpdateId>,
}

impl Cursor {
    pub fn new(initial: Option<UpdateId>) -> Self {
        Self { last: initial }
    }

    pub fn get(&self) -> Option<UpdateId> {
        self.last
    }

    /// Whether `id` has not been handled yet.
    pub fn is_pending(&self, id: UpdateId) -> bool {
        self.last.map_or(true, |last| id > last)
    }

    /// Move the cursor to `id`; ignored when that would rewind it.
    pub fn advance(&mut self, id: UpdateId) {
        if self.is_pending(id) {
            self.last = Some(id);
        }
    }
}

/// Pull-based intake. Handles updates strictly one at a time.
pub struct PollingIntake {
    source: Arc<dyn UpdateSource>,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    cursor: Cursor,
}

impl PollingIntake {
    /// Seed the cursor from the transport. Failing here is fatal for the caller.
    pub async fn start(
        source: Arc<dyn UpdateSource>,
        dispatcher: Arc<Dispatcher>,
        interval: Duration,
    ) -> Result<Self> {
        let seed = source.latest_seen().await?;
        tracing::info!(cursor = ?seed.map(|u| u.0), "polling cursor initialized");
        Ok(Self {
            source,
            dispatcher,
            interval,
            cursor: Cursor::new(seed),
        })
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Fetch one batch and handle it. Returns how many updates were handled.
    ///
    /// On a fetch error the cursor is left where it was.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let batch = self.source.poll_updates(self.cursor.get()).await?;
        Ok(self.handle_batch(batch).await)
    }

    /// Poll until `cancel` fires. Cancellation is only observed between dispatches.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(interval = ?self.interval, "polling intake started");
        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.source.poll_updates(self.cursor.get()) => r,
            };

            match polled {
                Ok(batch) => {
                    let n = self.handle_batch(batch).await;
                    if n > 0 {
                        tracing::debug!(handled = n, cursor = ?self.cursor.get().map(|u| u.0), "batch handled");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, cursor = ?self.cursor.get().map(|u| u.0), "update fetch failed; retrying next tick");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::info!(cursor = ?self.cursor.get().map(|u| u.0), "polling intake stopped");
    }

    async fn handle_batch(&mut self, mut batch: Vec<InboundUpdate>) -> usize {
        batch.sort_by_key(|u| u.id);
        let mut handled = 0usize;
        for update in batch {
            if !self.cursor.is_pending(update.id) {
                tracing::debug!(update_id = update.id.0, "skipping already handled update");
                continue;
            }
            if let Some(msg) = &update.message {
                self.dispatcher.handle(msg).await;
            }
            self.cursor.advance(update.id);
            handled += 1;
        }
        handled
    }
}

/// Per-chat mutual exclusion for concurrent push deliveries.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: ChatId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // An entry only the map references is neither held nor awaited.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Push-based intake (webhook). Each call handles one update end to end before returning.
///
/// There is no cursor: a re-delivered update is dispatched again.
pub struct PushIntake {
    dispatcher: Arc<Dispatcher>,
    chat_locks: ChatLocks,
}

impl PushIntake {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            chat_locks: ChatLocks::default(),
        }
    }

    pub async fn accept(&self, update: InboundUpdate) {
        let Some(msg) = update.message else {
            tracing::debug!(update_id = update.id.0, "ignoring non-message update");
            return;
        };
        let _guard = self.chat_locks.lock_chat(msg.chat_id).await;
        self.dispatcher.handle(&msg).await;
    }
}
