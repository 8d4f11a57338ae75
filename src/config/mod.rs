//! Runtime settings. Every flag falls back to an environment variable, and
//! `main` loads a `.env` file first, so a plain `message-mind run` picks up
//! the same keys the deployment environment sets.

use anyhow::{Result, bail};
use clap::Args;
use std::time::Duration;

use crate::consts::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_TURNS, DEFAULT_NOTIFY_TIMEOUT_SECS, DEFAULT_ORACLE_TIMEOUT_SECS,
    DEFAULT_TEXT_BUDGET, DEFAULT_TOOL_TIMEOUT_SECS, default_db_path,
};
use crate::cost::Rates;
use crate::engine::EngineConfig;

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// SQLite database path (use :memory: for ephemeral)
    #[arg(short, long, global = true, env = "MIND_DB")]
    pub db: Option<String>,

    /// OpenAI API key
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Model name
    #[arg(short, long, global = true, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// OpenAI-compatible API root
    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// YouTube Data API key (enables video lookups)
    #[arg(long, global = true, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub youtube_api_key: Option<String>,

    /// Telegram bot token for notifications
    #[arg(long, global = true, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat to notify
    #[arg(long, global = true, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: Option<String>,

    /// USD per million input tokens
    #[arg(long, global = true, env = "MIND_INPUT_COST_PER_MTOK", default_value_t = Rates::default().input_per_million)]
    pub input_cost: f64,

    /// USD per million output tokens
    #[arg(long, global = true, env = "MIND_OUTPUT_COST_PER_MTOK", default_value_t = Rates::default().output_per_million)]
    pub output_cost: f64,

    /// Maximum reasoning turns before extraction is forced
    #[arg(long, global = true, env = "MIND_MAX_TURNS", default_value_t = DEFAULT_MAX_TURNS)]
    pub max_turns: usize,

    /// Characters of page text returned by html_to_text
    #[arg(long, global = true, env = "MIND_TEXT_BUDGET", default_value_t = DEFAULT_TEXT_BUDGET)]
    pub text_budget: usize,

    /// Oracle call timeout in seconds
    #[arg(long, global = true, env = "MIND_ORACLE_TIMEOUT_SECS", default_value_t = DEFAULT_ORACLE_TIMEOUT_SECS)]
    pub oracle_timeout: u64,

    /// Tool call timeout in seconds
    #[arg(short, long, global = true, env = "MIND_TOOL_TIMEOUT_SECS", default_value_t = DEFAULT_TOOL_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Notification timeout in seconds
    #[arg(long, global = true, env = "MIND_NOTIFY_TIMEOUT_SECS", default_value_t = DEFAULT_NOTIFY_TIMEOUT_SECS)]
    pub notify_timeout: u64,

    /// Items classified in parallel
    #[arg(short, long, global = true, env = "MIND_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

impl Settings {
    /// Reject values that would make a sweep misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            bail!("max turns must be at least 1");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        for (name, secs) in [
            ("oracle", self.oracle_timeout),
            ("tool", self.timeout),
            ("notify", self.notify_timeout),
        ] {
            if secs == 0 {
                bail!("{} timeout must be at least 1 second", name);
            }
        }
        if self.text_budget == 0 {
            bail!("text budget must be at least 1 character");
        }
        for (name, rate) in [("input", self.input_cost), ("output", self.output_cost)] {
            if !rate.is_finite() || rate < 0.0 {
                bail!("{} cost rate must be a non-negative number, got {}", name, rate);
            }
        }
        Ok(())
    }

    pub fn db_path(&self) -> Result<String> {
        match &self.db {
            Some(path) => Ok(path.clone()),
            None => Ok(default_db_path()?.to_string_lossy().into_owned()),
        }
    }

    pub fn rates(&self) -> Rates {
        Rates {
            input_per_million: self.input_cost,
            output_per_million: self.output_cost,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_turns: self.max_turns,
            oracle_timeout: Duration::from_secs(self.oracle_timeout),
            tool_timeout: Duration::from_secs(self.timeout),
            rates: self.rates(),
        }
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout)
    }

    /// Both halves of the Telegram config, or nothing.
    pub fn telegram(&self) -> Option<(&str, &str)> {
        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => {
                Some((token.as_str(), chat.as_str()))
            }
            _ => None,
        }
    }
}
