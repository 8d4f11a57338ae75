pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::cost::format_cost;
use crate::engine::WorkflowResult;
use crate::item::Item;

/// Tells someone an item was sorted. Best-effort: callers log failures and
/// move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, item: &Item, result: &WorkflowResult) -> Result<()>;
}

/// Render a result in Telegram's legacy Markdown: `*bold*` labels, with
/// every interpolated field escaped so links and code never open an entity.
pub fn format_message(item: &Item, result: &WorkflowResult) -> String {
    let mut msg = format!(
        "*Category:* {}\n*Summary:* {}",
        escape_markdown(&result.category),
        escape_markdown(&result.summary)
    );
    if let Some(title) = &item.title {
        msg.push_str(&format!("\n*Title:* {}", escape_markdown(title)));
    }
    msg.push_str(&format!("\n*Message:* {}", escape_markdown(&item.details)));
    msg.push_str(&format!("\n*Cost:* {}", format_cost(result.cost)));
    msg
}

/// Backslash the characters legacy Markdown treats as entity markers.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '[' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Writes notifications to the log. Used when no channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, item: &Item, result: &WorkflowResult) -> Result<()> {
        info!(
            item_id = item.id,
            category = %result.category,
            cost = %format_cost(result.cost),
            "{}",
            result.summary
        );
        Ok(())
    }
}
