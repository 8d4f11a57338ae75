use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::Serialize;

use super::{Notifier, format_message};
use crate::engine::WorkflowResult;
use crate::item::Item;

const API_BASE: &str = "https://api.telegram.org";

/// Sends results to a chat through the Telegram Bot API.
pub struct TelegramNotifier {
    client: reqwest::Client,
    token: String,
    chat_id: String,
    base_url: String,
}

impl TelegramNotifier {
    pub fn new(client: reqwest::Client, token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            chat_id: chat_id.into(),
            base_url: API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.token)
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, item: &Item, result: &WorkflowResult) -> Result<()> {
        let text = format_message(item, result);
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: &text,
            parse_mode: "Markdown",
        };
        let resp = self.client.post(self.endpoint()).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Telegram API error ({}): {}", status, text);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_embeds_token() {
        let n = TelegramNotifier::new(reqwest::Client::new(), "123:abc", "42");
        assert_eq!(n.endpoint(), "https://api.telegram.org/bot123:abc/sendMessage");
    }

    #[test]
    fn custom_base_url() {
        let n = TelegramNotifier::new(reqwest::Client::new(), "t", "1")
            .with_base_url("http://localhost:9000/");
        assert_eq!(n.endpoint(), "http://localhost:9000/bott/sendMessage");
    }
}
