use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;

use crate::job::{JobId, Stage};

/// One progress event emitted by the stage executor.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub job: JobId,
    pub stage: Stage,
    /// Stage-local completion in [0, 100].
    pub percent: u8,
    pub message: String,
}

/// Consumer-supplied observer for progress events.
///
/// Called synchronously from the stage executor, so implementations must be
/// cheap and must never block. Shared across tasks when a stage fans out.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Callback that discards every event.
pub fn noop_progress() -> ProgressCallback {
    Arc::new(|_| {})
}

/// Callback that forwards events into a channel.
///
/// The channel is unbounded so emitters never block; a dropped receiver
/// means the consumer stopped listening and events are discarded.
pub fn channel_progress(tx: mpsc::UnboundedSender<ProgressUpdate>) -> ProgressCallback {
    Arc::new(move |update| {
        let _ = tx.send(update);
    })
}

/// Per-stage progress emitter.
///
/// Enforces the reporting contract: an event at 0 when the stage begins,
/// percent never decreasing within the stage, and a cap of 100. Safe to
/// share across concurrent tasks working on the same stage.
pub struct StageProgress {
    job: JobId,
    stage: Stage,
    callback: ProgressCallback,
    high_water: AtomicU8,
}

impl StageProgress {
    /// Enter a stage and emit the initial 0% event.
    pub fn begin(
        job: JobId,
        stage: Stage,
        callback: &ProgressCallback,
        message: impl Into<String>,
    ) -> Self {
        let reporter = Self {
            job,
            stage,
            callback: Arc::clone(callback),
            high_water: AtomicU8::new(0),
        };
        (reporter.callback)(ProgressUpdate {
            job,
            stage,
            percent: 0,
            message: message.into(),
        });
        reporter
    }

    /// Emit a progress event, clamped so percent never moves backwards.
    pub fn emit(&self, percent: u8, message: impl Into<String>) {
        let capped = percent.min(100);
        let previous = self.high_water.fetch_max(capped, Ordering::SeqCst);
        (self.callback)(ProgressUpdate {
            job: self.job,
            stage: self.stage,
            percent: previous.max(capped),
            message: message.into(),
        });
    }

    /// Emit the terminal 100% event for this stage.
    pub fn finish(&self, message: impl Into<String>) {
        self.emit(100, message);
    }
}
