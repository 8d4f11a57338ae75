use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

use super::{
    Classification, Engine, EngineConfig, Phase, Run, State, WorkflowError, WorkflowResult, route,
};
use crate::history::{ConversationHistory, Turn};
use crate::item::{CategorySet, Item};
use crate::oracle::{Mode, Oracle, OracleResponse, Request};
use crate::prompts::classify::{
    EXTRACTION_SYSTEM_PROMPT, build_classify_system_prompt, build_classify_user_prompt,
};
use crate::tools::{Outcome, ToolCall, ToolRegistry, ToolResult};

/// Observation recorded for calls the turn cap stopped us from running.
pub const TURN_LIMIT_MESSAGE: &str = "not executed: turn limit reached";

/// The reason → dispatch → extract loop. Wires together an Oracle and a
/// ToolRegistry; each run gets its own history.
pub struct ClassifyEngine {
    oracle: Arc<dyn Oracle>,
    tools: Arc<ToolRegistry>,
    config: EngineConfig,
}

impl ClassifyEngine {
    pub fn new(oracle: Arc<dyn Oracle>, tools: Arc<ToolRegistry>, config: EngineConfig) -> Self {
        Self {
            oracle,
            tools,
            config,
        }
    }

    pub fn model(&self) -> &str {
        self.oracle.model()
    }

    async fn call_oracle(
        &self,
        phase: Phase,
        request: &Request<'_>,
        mode: &Mode,
    ) -> Result<OracleResponse, WorkflowError> {
        let timeout = self.config.oracle_timeout;
        match tokio::time::timeout(timeout, self.oracle.invoke(request, mode)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(source)) => Err(WorkflowError::Oracle { phase, source }),
            Err(_) => Err(WorkflowError::OracleTimeout { phase, timeout }),
        }
    }

    /// Run every call concurrently; results come back in request order.
    async fn dispatch(&self, calls: Vec<ToolCall>) -> Vec<ToolResult> {
        let timeout = self.config.tool_timeout;

        let futures: Vec<_> = calls
            .into_iter()
            .map(|call| {
                let tools = Arc::clone(&self.tools);
                async move {
                    match tokio::time::timeout(timeout, tools.execute(&call)).await {
                        Ok(result) => result,
                        Err(_) => ToolResult::error(&call, "timed out"),
                    }
                }
            })
            .collect();

        let results = futures::future::join_all(futures).await;

        for result in &results {
            match &result.outcome {
                Outcome::Success(_) => debug!(tool = %result.tool, call_id = %result.call_id, "tool succeeded"),
                Outcome::Error(err) => warn!(tool = %result.tool, call_id = %result.call_id, error = %err, "tool failed"),
            }
        }

        results
    }

    async fn extract(
        &self,
        item: &Item,
        history: &mut ConversationHistory,
    ) -> Result<WorkflowResult, WorkflowError> {
        let pending = history.pending_calls();
        if !pending.is_empty() {
            warn!(
                pending = pending.len(),
                max_turns = self.config.max_turns,
                "turn limit reached, extracting with tool calls outstanding"
            );
            for call in &pending {
                history.push(Turn::Observation(ToolResult::error(call, TURN_LIMIT_MESSAGE)));
            }
        }

        let source = history
            .extraction_source()
            .unwrap_or_else(|| item.to_prompt_json().to_string());

        let request = Request {
            system: EXTRACTION_SYSTEM_PROMPT,
            user: &source,
            history: &[],
            tools: &[],
        };
        let mode = Mode::Constrained(Classification::schema());
        let response = self.call_oracle(Phase::Extract, &request, &mode).await?;
        let classification = Classification::parse(&response.content)?;

        history.push(Turn::Extraction {
            classification: classification.clone(),
            usage: response.usage,
        });

        let cost = self.config.rates.cost(history.usages());
        Ok(WorkflowResult {
            category: classification.category,
            summary: classification.summary,
            reasoning: classification.reasoning,
            cost,
        })
    }

    async fn drive(&self, item: &Item, categories: &CategorySet) -> Result<Run, WorkflowError> {
        let max_turns = self.config.max_turns.max(1);
        let specs = self.tools.specs().await;
        let system = build_classify_system_prompt(&specs);
        let user = build_classify_user_prompt(item, categories);

        let mut history = ConversationHistory::new();
        let mut state = State::Reason;

        loop {
            debug!(state = state.name(), history = history.len(), "step");
            state = match state {
                State::Reason => {
                    let request = Request {
                        system: &system,
                        user: &user,
                        history: history.turns(),
                        tools: &specs,
                    };
                    let response = self
                        .call_oracle(Phase::Reason, &request, &Mode::FreeForm)
                        .await?;
                    let turn = history.reasoning_turns() + 1;
                    let next = route(&response, turn, max_turns);
                    info!(
                        turn,
                        calls = response.calls.len(),
                        next = next.name(),
                        "reasoning turn"
                    );
                    history.push(Turn::Oracle {
                        content: response.content,
                        calls: response.calls,
                        usage: response.usage,
                    });
                    next
                }
                State::Dispatch(calls) => {
                    for result in self.dispatch(calls).await {
                        history.push(Turn::Observation(result));
                    }
                    State::Reason
                }
                State::Extract => State::Done(self.extract(item, &mut history).await?),
                State::Done(result) => {
                    info!(category = %result.category, cost = result.cost, "classified");
                    return Ok(Run { result, history });
                }
            };
        }
    }
}

#[async_trait]
impl Engine for ClassifyEngine {
    async fn run(&self, item: &Item, categories: &CategorySet) -> Result<Run, WorkflowError> {
        let span = info_span!("classify", item_id = item.id);
        self.drive(item, categories).instrument(span).await
    }
}
