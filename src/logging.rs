//! Logger setup
//!
//! `env_logger` does the formatting and filtering; every record it accepts
//! is also copied into the shared [`RecentLogs`] buffer for the debug view.

use log::{Log, Metadata, Record, SetLoggerError};
use std::sync::Arc;

use crate::state::RecentLogs;

/// `env_logger` plus a copy of each record in the recent-log buffer
pub struct RecentLogSink {
    inner: env_logger::Logger,
    recent: Arc<RecentLogs>,
}

impl RecentLogSink {
    pub fn new(inner: env_logger::Logger, recent: Arc<RecentLogs>) -> Self {
        Self { inner, recent }
    }
}

impl Log for RecentLogSink {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.inner.matches(record) {
            return;
        }
        self.recent.push(format!(
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        ));
        self.inner.log(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the logger; the filter comes from `RUST_LOG`, default `info`
pub fn init(recent: Arc<RecentLogs>) -> Result<(), SetLoggerError> {
    let inner = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .build();
    let max_level = inner.filter();
    log::set_boxed_logger(Box::new(RecentLogSink::new(inner, recent)))?;
    log::set_max_level(max_level);
    Ok(())
}
