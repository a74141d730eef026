//! Progress reporting, log forwarding, and cooperative cancellation.
//!
//! The pipeline never renders anything itself. It reports through an
//! [`ImportSink`] and polls a [`CancellationToken`] at row boundaries via a
//! [`Checkpoint`].

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use log::{error, info};

use crate::error::{ImportError, ImportResult};

/// Receiver for progress updates and log lines. Implementations must not block.
pub trait ImportSink: Send + Sync {
    fn progress(&self, percent: u8, message: &str);
    fn log(&self, message: &str, is_error: bool);
}

/// Forwards everything to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ImportSink for LogSink {
    fn progress(&self, percent: u8, message: &str) {
        info!("[{percent:>3}%] {message}");
    }

    fn log(&self, message: &str, is_error: bool) {
        if is_error {
            error!("{message}");
        } else {
            info!("{message}");
        }
    }
}

/// Shared cancellation flag; clones observe the same signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Integer percentage of `done` over `total`, clamped to 0..=100.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) as u128 * 100) / total as u128) as u8
}

/// Row-boundary hook shared by the read and load phases.
#[derive(Clone, Copy)]
pub struct Checkpoint<'a> {
    pub sink: &'a dyn ImportSink,
    pub cancel: &'a CancellationToken,
}

impl<'a> Checkpoint<'a> {
    pub fn new(sink: &'a dyn ImportSink, cancel: &'a CancellationToken) -> Self {
        Self { sink, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails with [`ImportError::Cancelled`] once the signal is raised.
    pub fn check(&self, committed: usize) -> ImportResult<()> {
        if self.is_cancelled() {
            Err(ImportError::Cancelled { committed })
        } else {
            Ok(())
        }
    }

    pub fn progress(&self, done: usize, total: usize, message: &str) {
        self.sink.progress(percent(done, total), message);
    }

    pub fn info(&self, message: &str) {
        self.sink.log(message, false);
    }

    pub fn error(&self, message: &str) {
        self.sink.log(message, true);
    }
}
