//! Project-wide constants.

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const REPO: &str = env!("CARGO_PKG_REPOSITORY");

/// Default oracle model when none is specified.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Characters of page text handed back by `html_to_text`.
pub const DEFAULT_TEXT_BUDGET: usize = 1000;

/// Reasoning turns before extraction is forced.
pub const DEFAULT_MAX_TURNS: usize = 6;

pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Items classified in parallel during a sweep.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Env var holding the log filter (`info`, `message_mind=debug`, ...).
pub const LOG_ENV: &str = "MIND_LOG";

/// Default database path: `~/.message-mind/message-mind.db`.
pub fn default_db_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("cannot determine home directory")?;
    Ok(home.join(".message-mind").join("message-mind.db"))
}

/// Format a number with comma separators (e.g. 1,234,567).
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consts_are_non_empty() {
        assert!(!REPO.is_empty());
        assert!(!DEFAULT_MODEL.is_empty());
    }

    #[test]
    fn defaults_are_sane() {
        assert_eq!(DEFAULT_TEXT_BUDGET, 1000);
        assert!(DEFAULT_MAX_TURNS >= 1);
        assert!(DEFAULT_CONCURRENCY >= 1);
    }

    #[test]
    fn default_db_path_lives_in_dot_dir() {
        if let Ok(path) = default_db_path() {
            assert!(path.ends_with(".message-mind/message-mind.db"));
        }
    }

    #[test]
    fn format_number_small() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
    }

    #[test]
    fn format_number_thousands_and_millions() {
        assert_eq!(format_number(1_234), "1,234");
        assert_eq!(format_number(123_456), "123,456");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
