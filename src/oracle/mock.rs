use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Mode, Oracle, OracleError, OracleResponse, Request};

/// A scripted oracle for tests. Returns pre-defined responses in order and
/// records the mode and history length of every call it receives.
pub struct MockOracle {
    responses: Vec<Result<OracleResponse, String>>,
    index: AtomicUsize,
    seen: Mutex<Vec<SeenCall>>,
}

/// What the mock was asked, for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenCall {
    pub constrained: bool,
    pub history_len: usize,
    pub user: String,
    pub tool_count: usize,
}

impl MockOracle {
    pub fn new(responses: Vec<OracleResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// Like [`MockOracle::new`], but `Err` entries fail that call.
    pub fn scripted(responses: Vec<Result<OracleResponse, String>>) -> Self {
        Self {
            responses,
            index: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenCall> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Oracle for MockOracle {
    fn model(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, request: &Request<'_>, mode: &Mode) -> Result<OracleResponse, OracleError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(SeenCall {
                constrained: matches!(mode, Mode::Constrained(_)),
                history_len: request.history.len(),
                user: request.user.to_string(),
                tool_count: request.tools.len(),
            });
        }

        let i = self.index.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(i) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(OracleError::Other(message.clone())),
            None => Err(OracleError::Other(format!(
                "MockOracle: no more responses (called {} times)",
                i + 1
            ))),
        }
    }
}
