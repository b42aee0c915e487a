//! `UpdateSource` over Telegram `getUpdates` long polling.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;

use gcb_core::{
    domain::{InboundUpdate, UpdateId},
    errors::Error,
    intake::UpdateSource,
    Result,
};

use crate::inbound_update;

pub struct TelegramUpdates {
    bot: Bot,
    long_poll_timeout: Duration,
    skip_pending: bool,
}

impl TelegramUpdates {
    /// The bot's HTTP client timeout must be longer than `long_poll_timeout`.
    pub fn new(bot: Bot, long_poll_timeout: Duration, skip_pending: bool) -> Self {
        Self {
            bot,
            long_poll_timeout,
            skip_pending,
        }
    }
}

/// `getUpdates` offset for the update right after `after`.
fn next_offset(after: Option<UpdateId>) -> Option<i32> {
    after.map(|id| i32::try_from(id.0.saturating_add(1)).unwrap_or(i32::MAX))
}

fn fetch_err(e: teloxide::RequestError) -> Error {
    Error::TransportFetch(format!("getUpdates failed: {e}"))
}

#[async_trait]
impl UpdateSource for TelegramUpdates {
    async fn latest_seen(&self) -> Result<Option<UpdateId>> {
        // Telegram remembers the acknowledged offset; a plain restart resumes from there.
        if !self.skip_pending {
            return Ok(None);
        }

        // offset=-1 returns only the newest pending update and drops everything older.
        let newest = self
            .bot
            .get_updates()
            .offset(-1)
            .limit(1)
            .timeout(0)
            .await
            .map_err(fetch_err)?;

        let seen = newest.last().map(|u| UpdateId(i64::from(u.id)));
        if let Some(id) = seen {
            tracing::info!(update_id = id.0, "skipping pending updates");
        }
        Ok(seen)
    }

    async fn poll_updates(&self, after: Option<UpdateId>) -> Result<Vec<InboundUpdate>> {
        let timeout = u32::try_from(self.long_poll_timeout.as_secs()).unwrap_or(u32::MAX);
        let mut req = self.bot.get_updates().timeout(timeout);
        if let Some(offset) = next_offset(after) {
            req = req.offset(offset);
        }

        let updates = req.await.map_err(fetch_err)?;
        Ok(updates.iter().map(inbound_update).collect())
    }
}
