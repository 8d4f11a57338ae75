use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::consts::LOG_ENV;

static INIT: Once = Once::new();

/// Install the global subscriber. Filter comes from `MIND_LOG`
/// (e.g. `MIND_LOG=message_mind=debug,reqwest=warn`), falling back to
/// `info`. Logs go to stderr so command output on stdout stays clean.
///
/// Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}
