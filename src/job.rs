use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FukikaeError, Result};

/// Unique identifier for one dubbing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a dubbing job.
///
/// The success path is strictly sequential: no stage may be skipped or
/// reordered. `Failed` is reachable from any non-terminal state. `Completed`
/// and `Failed` are terminal; no further code may move the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Extracting,
    Transcribing,
    Translating,
    Synthesizing,
    Muxing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Human label mirroring the status.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Extracting => "Extracting",
            Self::Transcribing => "Transcribing",
            Self::Translating => "Translating",
            Self::Synthesizing => "Synthesizing",
            Self::Muxing => "Muxing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// `Completed` and `Failed` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a transition to `next` is permitted by the state machine.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Failed {
            return true;
        }
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Extracting)
                | (Self::Extracting, Self::Transcribing)
                | (Self::Transcribing, Self::Translating)
                | (Self::Translating, Self::Synthesizing)
                | (Self::Synthesizing, Self::Muxing)
                | (Self::Muxing, Self::Completed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Transcribe,
    Translate,
    Synthesize,
    Mux,
}

impl Stage {
    /// The job status a job holds while this stage runs.
    pub fn status(self) -> JobStatus {
        match self {
            Self::Extract => JobStatus::Extracting,
            Self::Transcribe => JobStatus::Transcribing,
            Self::Translate => JobStatus::Translating,
            Self::Synthesize => JobStatus::Synthesizing,
            Self::Mux => JobStatus::Muxing,
        }
    }

    /// The stage label used in progress events and logging.
    pub fn label(self) -> &'static str {
        self.status().label()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One dubbing job: a single input video on its way to a dubbed output.
///
/// Created in `Pending` by the submission layer, exclusively owned and
/// mutated by the stage executor while it runs, and handed back to the
/// caller in a terminal state. A failed job is retried by submitting a new
/// job, never by resetting this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationJob {
    pub id: JobId,
    pub input_path: PathBuf,
    /// Set only when the job completed successfully.
    pub output_path: Option<PathBuf>,
    pub source_lang: String,
    pub target_lang: String,
    pub voice: String,
    pub status: JobStatus,
    /// Stage-local progress in [0, 100]; reset to 0 when a new stage begins.
    pub progress: u8,
    /// Non-empty exactly when `status` is `Failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TranslationJob {
    pub fn new<P: AsRef<Path>>(
        input_path: P,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            id: JobId::new(),
            input_path: input_path.as_ref().to_path_buf(),
            output_path: None,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            voice: voice.into(),
            status: JobStatus::Pending,
            progress: 0,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// File name of the input video, for display.
    pub fn file_name(&self) -> String {
        self.input_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.input_path.display().to_string())
    }

    /// Human label of the current position in the pipeline.
    pub fn current_stage(&self) -> &'static str {
        self.status.label()
    }

    /// Move the job to `next`, rejecting transitions the state machine forbids.
    pub fn advance(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_advance_to(next) {
            return Err(FukikaeError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Enter a stage: advance the status and reset stage-local progress.
    pub fn begin_stage(&mut self, stage: Stage) -> Result<()> {
        self.advance(stage.status())?;
        self.progress = 0;
        Ok(())
    }

    /// Record stage-local progress, clamped to 100.
    pub fn set_progress(&mut self, percent: u8) {
        self.progress = percent.min(100);
    }

    /// Terminal success: record the output artifact.
    pub fn complete(&mut self, output_path: PathBuf) -> Result<()> {
        self.advance(JobStatus::Completed)?;
        self.progress = 100;
        self.output_path = Some(output_path);
        self.error = None;
        Ok(())
    }

    /// Terminal failure: record the cause. No partial output is promoted.
    pub fn fail(&mut self, cause: impl Into<String>) -> Result<()> {
        self.advance(JobStatus::Failed)?;
        self.error = Some(cause.into());
        self.output_path = None;
        Ok(())
    }
}
