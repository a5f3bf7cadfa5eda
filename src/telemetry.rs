//! Opt-in tracing setup.
//!
//! Traces go to a JSON-lines file in the temp dir rather than the terminal,
//! which raw mode and the operator messages own. `WAVETAP_TRACE_LOG`
//! overrides the destination.

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_subscriber::fmt::time::UtcTime;

use crate::config::Args;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub fn trace_log_path() -> PathBuf {
    env::var("WAVETAP_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("wavetap_trace.jsonl"))
}

pub fn init_tracing(args: &Args) {
    if !args.logs {
        return;
    }

    let _ = TRACING_INIT.get_or_init(|| {
        let path = trace_log_path();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(_) => return,
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(file)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
