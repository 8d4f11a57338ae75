//! One sweep over the store: classify every pending item, write results
//! back, notify.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::consts::{DEFAULT_CONCURRENCY, DEFAULT_NOTIFY_TIMEOUT_SECS, format_number};
use crate::cost::format_cost;
use crate::engine::{Engine, WorkflowError, WorkflowResult};
use crate::item::{CategorySet, Item, ItemUpdate, normalize_category};
use crate::notify::Notifier;
use crate::oracle::TokenUsage;
use crate::store::Store;

/// An item that made it all the way through.
#[derive(Debug, Clone)]
pub struct Classified {
    pub item_id: i64,
    pub result: WorkflowResult,
    /// What was written to the store (category normalized).
    pub update: ItemUpdate,
    pub reasoning_turns: usize,
    pub usage: TokenUsage,
}

/// An item that did not. It stays pending for the next sweep.
#[derive(Debug)]
pub struct ItemFailure {
    pub item_id: i64,
    pub error: WorkflowError,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub succeeded: Vec<Classified>,
    pub failed: Vec<ItemFailure>,
}

impl RunReport {
    pub fn total_cost(&self) -> f64 {
        self.succeeded.iter().map(|c| c.result.cost).sum()
    }

    pub fn total_usage(&self) -> TokenUsage {
        let mut total = TokenUsage::default();
        for c in &self.succeeded {
            total.add(c.usage);
        }
        total
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let usage = self.total_usage();
        writeln!(
            f,
            "classified {} item(s), {} failed",
            self.succeeded.len(),
            self.failed.len()
        )?;
        for c in &self.succeeded {
            writeln!(f, "  #{} → {}: {}", c.item_id, c.update.category, c.update.summary)?;
        }
        for failure in &self.failed {
            writeln!(f, "  #{} ✗ {}", failure.item_id, failure.error)?;
        }
        write!(
            f,
            "tokens: {} input + {} output, cost {}",
            format_number(usage.input_tokens),
            format_number(usage.output_tokens),
            format_cost(self.total_cost())
        )
    }
}

/// Refuse items the engine deliberately does not handle.
pub fn validate(item: &Item) -> Result<(), WorkflowError> {
    if item.has_media {
        return Err(WorkflowError::Rejected(
            "message carries binary media, which is not classified".to_string(),
        ));
    }
    Ok(())
}

pub struct Driver {
    engine: Arc<dyn Engine>,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    concurrency: usize,
    notify_timeout: Duration,
}

impl Driver {
    pub fn new(engine: Arc<dyn Engine>, store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            engine,
            store,
            notifier,
            concurrency: DEFAULT_CONCURRENCY,
            notify_timeout: Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECS),
        }
    }

    /// Items classified at once. Runs share nothing but the clients.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// How long a notification may take before it is abandoned.
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Classify every pending item. Only store reads fail the whole sweep;
    /// per-item problems land in [`RunReport::failed`].
    pub async fn sweep(&self) -> Result<RunReport> {
        let items = self
            .store
            .fetch_pending()
            .await
            .context("failed to fetch pending items")?;
        let categories = self
            .store
            .fetch_categories()
            .await
            .context("failed to fetch categories")?;
        info!(
            items = items.len(),
            categories = categories.len(),
            "fetched items requiring categorisation"
        );

        let outcomes: Vec<Result<Classified, ItemFailure>> = stream::iter(&items)
            .map(|item| self.process(item, &categories))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = RunReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(classified) => report.succeeded.push(classified),
                Err(failure) => report.failed.push(failure),
            }
        }
        report.succeeded.sort_by_key(|c| c.item_id);
        report.failed.sort_by_key(|f| f.item_id);
        Ok(report)
    }

    async fn process(&self, item: &Item, categories: &CategorySet) -> Result<Classified, ItemFailure> {
        let fail = |error: WorkflowError| {
            error!(item_id = item.id, error = %error, "item failed");
            ItemFailure {
                item_id: item.id,
                error,
            }
        };

        validate(item).map_err(fail)?;
        let run = self.engine.run(item, categories).await.map_err(fail)?;

        let update = ItemUpdate {
            category: normalize_category(&run.result.category),
            summary: run.result.summary.clone(),
            reasoning: run.result.reasoning.clone(),
            cost: run.result.cost,
            completed: false,
        };

        self.store
            .update(item.id, &update)
            .await
            .map_err(|e| fail(WorkflowError::Store(format!("{:#}", e))))?;
        info!(item_id = item.id, category = %update.category, "stored result");

        let notify = self.notifier.notify(item, &run.result);
        match tokio::time::timeout(self.notify_timeout, notify).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(item_id = item.id, error = %e, "notification failed"),
            Err(_) => warn!(
                item_id = item.id,
                timeout_secs = self.notify_timeout.as_secs_f64(),
                "notification timed out"
            ),
        }

        let mut usage = TokenUsage::default();
        for u in run.history.usages().flatten() {
            usage.add(u);
        }

        Ok(Classified {
            item_id: item.id,
            reasoning_turns: run.history.reasoning_turns(),
            result: run.result,
            update,
            usage,
        })
    }
}
