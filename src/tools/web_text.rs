use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use serde_json::Value;

use super::{Tool, require_str, url_parameters};
use crate::consts::DEFAULT_TEXT_BUDGET;

/// Column width html2text wraps at. Wide enough to keep sentences intact.
const WRAP_WIDTH: usize = 120;

/// Bytes of HTML read before the rest of the page is dropped. The text
/// budget is applied after conversion, so this only has to be generous.
pub const DEFAULT_MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

/// Fetches a page and hands back its readable text, cut to a fixed budget.
pub struct HtmlToTextTool {
    client: reqwest::Client,
    budget: usize,
    max_bytes: usize,
}

impl Default for HtmlToTextTool {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_TEXT_BUDGET)
    }
}

impl HtmlToTextTool {
    pub fn new(client: reqwest::Client, budget: usize) -> Self {
        Self {
            client,
            budget,
            max_bytes: DEFAULT_MAX_PAGE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Only absolute http(s) URLs are fetched.
    pub fn parse_url(raw: &str) -> Result<Url> {
        let url = Url::parse(raw.trim()).with_context(|| format!("invalid URL: {}", raw))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => bail!("unsupported URL scheme: {}", other),
        }
    }

    /// Keep the first `budget` characters. Counts chars, not bytes.
    pub fn truncate(text: &str, budget: usize) -> String {
        text.chars().take(budget).collect()
    }

    async fn fetch_text(&self, raw: &str) -> Result<String> {
        let url = Self::parse_url(raw)?;
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            bail!("HTTP {}", resp.status());
        }
        let body = read_capped(resp, self.max_bytes).await?;
        let body = String::from_utf8_lossy(&body);
        let text = html2text::from_read(body.as_bytes(), WRAP_WIDTH)
            .map_err(|e| anyhow::anyhow!("could not convert HTML: {}", e))?;
        Ok(Self::truncate(text.trim(), self.budget))
    }
}

/// Read at most `limit` bytes of the body, then stop pulling from the socket.
async fn read_capped(resp: reqwest::Response, limit: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let room = limit - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[async_trait]
impl Tool for HtmlToTextTool {
    fn name(&self) -> &str {
        "html_to_text"
    }

    fn description(&self) -> &str {
        "Takes a URL, fetches the page and converts its HTML content to plain text. \
         Returns the first characters of the page for brevity."
    }

    fn parameters(&self) -> Value {
        url_parameters("The URL to fetch and convert.")
    }

    async fn execute(&self, args: &Value) -> Result<Value> {
        let url = require_str(args, "url")?;
        self.fetch_text(url)
            .await
            .map(Value::String)
            .map_err(|e| anyhow::anyhow!("Failed to fetch or process the URL. Error: {:#}", e))
    }
}
