pub mod mock;
pub mod openai;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::history::Turn;
use crate::tools::{ToolCall, ToolSpec};

/// Token usage from a single oracle call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Accumulate another usage into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    /// Total tokens (input + output).
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A named JSON schema the oracle's answer must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: &'static str,
    pub json: Value,
}

/// How the oracle may answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Free text, optionally asking for tool calls.
    FreeForm,
    /// A single JSON value matching the schema. No tool calls.
    Constrained(Schema),
}

/// Everything the oracle sees for one call.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub history: &'a [Turn],
    pub tools: &'a [ToolSpec],
}

/// What came back from one oracle call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleResponse {
    pub content: String,
    /// Requested lookups, in the order the oracle emitted them.
    pub calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

impl OracleResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.calls = calls;
        self
    }

    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.usage = Some(TokenUsage {
            input_tokens,
            output_tokens,
        });
        self
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("oracle API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("could not decode oracle response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("oracle returned an empty response")]
    Empty,

    #[error("oracle not configured: {0}")]
    NotConfigured(String),

    #[error("{0}")]
    Other(String),
}

/// The borrowed brain. An LLM in production, a script in tests.
#[async_trait]
pub trait Oracle: Send + Sync {
    fn model(&self) -> &str;
    async fn invoke(&self, request: &Request<'_>, mode: &Mode) -> Result<OracleResponse, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_accumulates() {
        let mut total = TokenUsage::default();
        total.add(TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        });
        total.add(TokenUsage {
            input_tokens: 1,
            output_tokens: 2,
        });
        assert_eq!(total.input_tokens, 11);
        assert_eq!(total.output_tokens, 7);
        assert_eq!(total.total(), 18);
    }

    #[test]
    fn response_builders() {
        let resp = OracleResponse::text("hi").with_usage(3, 4);
        assert_eq!(resp.content, "hi");
        assert!(resp.calls.is_empty());
        assert_eq!(resp.usage.unwrap().total(), 7);
    }
}
