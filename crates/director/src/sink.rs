//! Append-only collection of leveled error records shared by every pipeline phase

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{Level, debug, error, info, warn};

use crate::error::DirectorError;

/// Error severity levels, ordered from least to most serious
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Severe,
}

impl Severity {
    pub fn as_tracing_level(self) -> Level {
        match self {
            Severity::Debug => Level::DEBUG,
            Severity::Info => Level::INFO,
            Severity::Warning => Level::WARN,
            Severity::Severe => Level::ERROR,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Debug => write!(f, "DEBUG"),
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Severe => write!(f, "SEVERE"),
        }
    }
}

/// A single recorded problem
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub level: Severity,
    pub message: String,
    pub cause: Option<Arc<DirectorError>>,
}

impl ErrorRecord {
    pub fn new<S: Into<String>>(level: Severity, message: S) -> Self {
        Self {
            level,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: DirectorError) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.level == Severity::Severe
    }
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)?;
        if let Some(ref cause) = self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

/// Thread-safe append-only error list
#[derive(Debug, Default)]
pub struct ErrorSink {
    records: Mutex<Vec<ErrorRecord>>,
    fatal: AtomicBool,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: ErrorRecord) {
        if record.is_fatal() {
            self.fatal.store(true, Ordering::SeqCst);
        }
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
    }

    /// Log the record at its own level, then append it
    pub fn record_and_log(&self, record: ErrorRecord) {
        log_record(&record);
        self.record(record);
    }

    /// True once any SEVERE record was appended; never flips back
    pub fn has_fatal(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Print every accumulated record between separator lines
    pub fn log_summary(&self) {
        let records = self.snapshot();
        error!("============================================================");
        error!("Summary of {} encountered errors:", records.len());
        for record in &records {
            log_record(record);
        }
        error!("============================================================");
    }
}

fn log_record(record: &ErrorRecord) {
    let cause = record
        .cause
        .as_ref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default();

    match record.level.as_tracing_level() {
        Level::ERROR => error!("{}{}", record.message, cause),
        Level::WARN => warn!("{}{}", record.message, cause),
        Level::INFO => info!("{}{}", record.message, cause),
        _ => debug!("{}{}", record.message, cause),
    }
}
