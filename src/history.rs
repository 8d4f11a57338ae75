//! The per-run conversation. Append-only, owned by exactly one run.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::engine::Classification;
use crate::oracle::TokenUsage;
use crate::tools::{Outcome, ToolCall, ToolResult};

/// A single entry in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Turn {
    /// One free-form oracle response.
    Oracle {
        content: String,
        calls: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    },
    /// The result of one tool call, fed back to the oracle.
    Observation(ToolResult),
    /// The constrained-mode answer that ends the run.
    Extraction {
        classification: Classification,
        usage: Option<TokenUsage>,
    },
}

impl Turn {
    pub fn usage(&self) -> Option<TokenUsage> {
        match self {
            Turn::Oracle { usage, .. } | Turn::Extraction { usage, .. } => *usage,
            Turn::Observation(_) => None,
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Turn::Oracle { content, calls, .. } if calls.is_empty() => {
                write!(f, "[oracle] {}", content)
            }
            Turn::Oracle { content, calls, .. } => {
                let names: Vec<&str> = calls.iter().map(|c| c.tool.as_str()).collect();
                write!(f, "[oracle] {} -> calls {}", content, names.join(", "))
            }
            Turn::Observation(result) => match &result.outcome {
                Outcome::Success(_) => write!(f, "[{}] ✓ {}", result.tool, result.outcome.render()),
                Outcome::Error(err) => write!(f, "[{}] ✗ {}", result.tool, err),
            },
            Turn::Extraction { classification, .. } => {
                write!(f, "[extract] {}", classification.category)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of free-form oracle turns so far.
    pub fn reasoning_turns(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| matches!(t, Turn::Oracle { .. }))
            .count()
    }

    /// Usage of every oracle response in the run, in order.
    pub fn usages(&self) -> impl Iterator<Item = Option<TokenUsage>> + '_ {
        self.turns
            .iter()
            .filter(|t| !matches!(t, Turn::Observation(_)))
            .map(Turn::usage)
    }

    /// Calls from the latest oracle turn that have no result recorded yet.
    pub fn pending_calls(&self) -> Vec<ToolCall> {
        let Some(pos) = self
            .turns
            .iter()
            .rposition(|t| matches!(t, Turn::Oracle { .. }))
        else {
            return Vec::new();
        };
        let Turn::Oracle { calls, .. } = &self.turns[pos] else {
            return Vec::new();
        };
        let answered: HashSet<&str> = self.turns[pos + 1..]
            .iter()
            .filter_map(|t| match t {
                Turn::Observation(r) => Some(r.call_id.as_str()),
                _ => None,
            })
            .collect();
        calls
            .iter()
            .filter(|c| !answered.contains(c.id.as_str()))
            .cloned()
            .collect()
    }

    /// The text to hand to constrained extraction.
    ///
    /// Prefers the latest oracle turn that asked for no tools. When every
    /// turn asked for tools (the turn cap cut the loop short), falls back to
    /// everything learned so far: oracle text plus successful observations.
    pub fn extraction_source(&self) -> Option<String> {
        let final_answer = self.turns.iter().rev().find_map(|t| match t {
            Turn::Oracle { content, calls, .. }
                if calls.is_empty() && !content.trim().is_empty() =>
            {
                Some(content.clone())
            }
            _ => None,
        });
        if final_answer.is_some() {
            return final_answer;
        }

        let digest: Vec<String> = self
            .turns
            .iter()
            .filter_map(|t| match t {
                Turn::Oracle { content, .. } if !content.trim().is_empty() => {
                    Some(content.clone())
                }
                Turn::Observation(r) if !r.outcome.is_error() => {
                    Some(format!("{} returned: {}", r.tool, r.outcome.render()))
                }
                _ => None,
            })
            .collect();

        if digest.is_empty() {
            None
        } else {
            Some(digest.join("\n\n"))
        }
    }
}
