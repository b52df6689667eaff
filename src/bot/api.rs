//! Usage: Minimal Telegram Bot API client (long polling + message methods).

use crate::bot::types::{ApiResponse, InlineKeyboardMarkup, Message, Update};
use crate::shared::error::AppResult;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Headroom on top of the long-poll timeout so the request outlives it.
const POLL_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct TelegramApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramApi {
    pub fn new(base_url: &str, token: &str) -> AppResult<Self> {
        if token.trim().is_empty() {
            return Err("SEC_INVALID_INPUT: telegram token must not be empty".into());
        }
        let http = reqwest::Client::builder()
            .user_agent(format!("hh-vacancy-bot/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| format!("SYSTEM_ERROR: telegram http client init failed: {e}"))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Option<Duration>,
    ) -> AppResult<T> {
        let mut request = self.http.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // The URL embeds the bot token, so errors must never echo it.
        let response = request
            .send()
            .await
            .map_err(|e| format!("TELEGRAM_API_ERROR: {method} request failed: {}", e.without_url()))?;

        let envelope = response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| format!("TELEGRAM_API_ERROR: {method} response parse failed: {}", e.without_url()))?;

        if !envelope.ok {
            let description = envelope
                .description
                .unwrap_or_else(|| "no description".to_string());
            return Err(format!("TELEGRAM_API_ERROR: {method} rejected: {description}").into());
        }
        envelope
            .result
            .ok_or_else(|| format!("TELEGRAM_API_ERROR: {method} returned ok without result").into())
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> AppResult<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        self.call(
            "getUpdates",
            &body,
            Some(Duration::from_secs(timeout_secs) + POLL_TIMEOUT_MARGIN),
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> AppResult<Message> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| format!("SYSTEM_ERROR: keyboard serialization failed: {e}"))?;
        }
        self.call("sendMessage", &body, None).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> AppResult<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| format!("SYSTEM_ERROR: keyboard serialization failed: {e}"))?;
        }
        // Telegram returns the edited Message (or `true` for inline messages);
        // the bot does not need either.
        let _: Value = self.call("editMessageText", &body, None).await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> AppResult<()> {
        let body = json!({ "callback_query_id": callback_query_id });
        let _: Value = self.call("answerCallbackQuery", &body, None).await?;
        Ok(())
    }
}
