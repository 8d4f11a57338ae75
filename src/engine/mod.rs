pub mod classify;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::consts::{DEFAULT_MAX_TURNS, DEFAULT_ORACLE_TIMEOUT_SECS, DEFAULT_TOOL_TIMEOUT_SECS};
use crate::cost::Rates;
use crate::history::ConversationHistory;
use crate::item::{CategorySet, Item};
use crate::oracle::{OracleError, OracleResponse, Schema};
use crate::tools::ToolCall;

/// The fixed shape the constrained oracle call must produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// The reasoning behind the category assignment.
    pub reasoning: String,
    /// A summary of the message content.
    pub summary: String,
    /// The category assigned to the message.
    pub category: String,
}

impl Classification {
    pub fn schema() -> Schema {
        Schema {
            name: "classification",
            json: serde_json::json!({
                "type": "object",
                "properties": {
                    "reasoning": {
                        "type": "string",
                        "description": "The reasoning behind the category assignment."
                    },
                    "summary": {
                        "type": "string",
                        "description": "A summary of the message content."
                    },
                    "category": {
                        "type": "string",
                        "description": "The category assigned to the message."
                    }
                },
                "required": ["reasoning", "summary", "category"],
                "additionalProperties": false
            }),
        }
    }

    /// Parse a constrained answer. Never defaults: anything that isn't the
    /// exact shape with a non-blank category and summary is a mismatch.
    pub fn parse(text: &str) -> Result<Self, WorkflowError> {
        let parsed: Classification = serde_json::from_str(extract_json(text))
            .map_err(|e| WorkflowError::ShapeMismatch(format!("{}; raw: {}", e, text)))?;
        if parsed.category.trim().is_empty() {
            return Err(WorkflowError::ShapeMismatch("empty category".to_string()));
        }
        if parsed.summary.trim().is_empty() {
            return Err(WorkflowError::ShapeMismatch("empty summary".to_string()));
        }
        Ok(parsed)
    }
}

/// The terminal artifact of a run. Built once, at extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowResult {
    pub category: String,
    pub summary: String,
    pub reasoning: String,
    /// Estimated USD spent on oracle calls for this run.
    pub cost: f64,
}

/// A completed run: the result plus the conversation that led to it.
#[derive(Debug, Clone)]
pub struct Run {
    pub result: WorkflowResult,
    pub history: ConversationHistory,
}

/// Where the engine is.
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Reason,
    Dispatch(Vec<ToolCall>),
    Extract,
    Done(WorkflowResult),
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Reason => "reason",
            State::Dispatch(_) => "dispatch",
            State::Extract => "extract",
            State::Done(_) => "done",
        }
    }
}

/// Route a free-form response. Tool calls go to dispatch unless the turn
/// cap is reached, in which case extraction is forced.
pub fn route(response: &OracleResponse, turns_taken: usize, max_turns: usize) -> State {
    if response.calls.is_empty() || turns_taken >= max_turns {
        State::Extract
    } else {
        State::Dispatch(response.calls.clone())
    }
}

/// Which oracle call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reason,
    Extract,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Reason => write!(f, "reasoning"),
            Phase::Extract => write!(f, "extraction"),
        }
    }
}

/// Failures that end a run for one item. Tool problems never show up here;
/// they are observations the oracle gets to read.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("oracle failed during {phase}: {source}")]
    Oracle {
        phase: Phase,
        #[source]
        source: OracleError,
    },

    #[error("oracle timed out during {phase} after {}s", timeout.as_secs())]
    OracleTimeout { phase: Phase, timeout: Duration },

    #[error("extraction result does not match the expected shape: {0}")]
    ShapeMismatch(String),

    #[error("item rejected: {0}")]
    Rejected(String),

    #[error("could not store result: {0}")]
    Store(String),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on reasoning turns. Reaching it forces extraction.
    pub max_turns: usize,
    pub oracle_timeout: Duration,
    pub tool_timeout: Duration,
    pub rates: Rates,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            oracle_timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            rates: Rates::default(),
        }
    }
}

/// Classifies one item per call. Holds no state between runs.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn run(&self, item: &Item, categories: &CategorySet) -> Result<Run, WorkflowError>;
}

/// Extract JSON from text that may be wrapped in markdown code fences.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(after) = trimmed.strip_prefix("```json")
        && let Some(json) = after.strip_suffix("```")
    {
        return json.trim();
    }
    if let Some(after) = trimmed.strip_prefix("```")
        && let Some(json) = after.strip_suffix("```")
    {
        return json.trim();
    }

    trimmed
}
