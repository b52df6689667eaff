//! Usage: Long-poll update loop; each update is handled on its own task.

use crate::bot::api::TelegramApi;
use crate::bot::handlers::BotContext;
use std::sync::Arc;
use std::time::Duration;

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct BotDispatcher {
    api: Arc<TelegramApi>,
    ctx: Arc<BotContext>,
}

impl BotDispatcher {
    pub fn new(api: Arc<TelegramApi>, ctx: Arc<BotContext>) -> Self {
        Self { api, ctx }
    }

    /// Poll until the surrounding task is cancelled. Handlers run on spawned
    /// tasks so a suspended `/auth` flow never blocks other users' updates.
    pub async fn run(&self) {
        let mut offset: i64 = 0;
        tracing::info!("bot update polling started");

        loop {
            let updates = match self.api.get_updates(offset, POLL_TIMEOUT_SECS).await {
                Ok(updates) => updates,
                Err(err) => {
                    tracing::warn!("getUpdates failed, retrying: {err}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let ctx = Arc::clone(&self.ctx);
                tokio::spawn(async move {
                    ctx.handle_update(update).await;
                });
            }
        }
    }
}
