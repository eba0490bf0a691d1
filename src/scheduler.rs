// Batch scheduler
//
// Fans a set of pending jobs out over a bounded number of concurrent
// pipeline runs. Each job runs on its own task but only while holding a
// semaphore permit, so at most `concurrency` jobs are in flight at once;
// a job failure never disturbs its siblings.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::job::{JobId, JobStatus, TranslationJob};
use crate::pipeline::Pipeline;
use crate::progress::{ProgressCallback, ProgressUpdate};

/// Jobs spawn CPU- and GPU-heavy subprocesses, so batches default to a
/// small bound rather than one job per core.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 2;

/// Consumer-supplied observer for batch-level status lines.
pub type StatusCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Status callback that discards every line.
pub fn noop_status() -> StatusCallback {
    Arc::new(|_| {})
}

/// Shared handle designating which job's progress the consumer wants.
///
/// Per-job progress is forwarded only for the focused job, so a multi-job
/// batch never interleaves progress events from different jobs. Batch-level
/// status lines are unaffected.
#[derive(Clone, Default)]
pub struct FocusHandle {
    inner: Arc<RwLock<Option<JobId>>>,
}

impl FocusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self, job: JobId) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(job);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
    }

    pub fn focused(&self) -> Option<JobId> {
        self.inner.read().map(|guard| *guard).unwrap_or(None)
    }
}

/// Outcome of one batch run, with failed jobs enumerated explicitly.
#[derive(Debug)]
pub struct BatchReport {
    /// Every job handed to `run`, in submission order, each in a terminal
    /// state (or untouched if it was not `Pending` at call time).
    pub jobs: Vec<TranslationJob>,
    pub completed: usize,
    pub failed: Vec<(JobId, String)>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct BatchScheduler {
    pipeline: Arc<Pipeline>,
    concurrency: usize,
    semaphore: Arc<Semaphore>,
}

impl BatchScheduler {
    pub fn new(pipeline: Arc<Pipeline>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            pipeline,
            concurrency,
            semaphore: Arc::new(Semaphore::new(concurrency)),
        }
    }

    #[cfg(test)]
    pub(crate) fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Process every `Pending` job in the batch and return once all of them
    /// have resolved. Jobs already in another state pass through untouched.
    ///
    /// `on_status` receives one line per resolved job and a single final
    /// aggregate after the whole batch has settled.
    pub async fn run(
        &self,
        jobs: Vec<TranslationJob>,
        focus: &FocusHandle,
        on_progress: &ProgressCallback,
        on_status: &StatusCallback,
    ) -> BatchReport {
        let total = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Pending)
            .count();
        info!(
            "Starting batch of {} jobs (concurrency {})",
            total, self.concurrency
        );

        let counter = Arc::new(AtomicUsize::new(0));
        let mut join_set: JoinSet<(usize, TranslationJob)> = JoinSet::new();
        let mut finished: Vec<(usize, TranslationJob)> = Vec::new();

        for (index, mut job) in jobs.into_iter().enumerate() {
            if job.status != JobStatus::Pending {
                finished.push((index, job));
                continue;
            }

            let pipeline = Arc::clone(&self.pipeline);
            let semaphore = Arc::clone(&self.semaphore);
            let counter = Arc::clone(&counter);
            let focus = focus.clone();
            let on_progress = Arc::clone(on_progress);
            let on_status = Arc::clone(on_status);

            join_set.spawn(async move {
                // A job leaves Pending only while holding a permit, so at
                // most `concurrency` jobs are ever in flight. The semaphore
                // is never closed; a failed acquire leaves the job Pending.
                let Ok(permit) = semaphore.acquire_owned().await else {
                    return (index, job);
                };

                let progress: ProgressCallback = Arc::new(move |update: ProgressUpdate| {
                    if focus.focused() == Some(update.job) {
                        on_progress(update);
                    }
                });

                // The outcome lands on the job itself; siblings keep going.
                let _ = pipeline.process(&mut job, &progress).await;
                drop(permit);

                let done = counter.fetch_add(1, Ordering::SeqCst) + 1;
                on_status(format!("Completed {} of {} jobs", done, total));
                (index, job)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(entry) => finished.push(entry),
                Err(e) => warn!("Batch worker panicked: {}", e),
            }
        }

        // Completion order is arbitrary; reports keep submission order.
        finished.sort_by_key(|(index, _)| *index);
        let jobs: Vec<TranslationJob> = finished.into_iter().map(|(_, job)| job).collect();

        let completed = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Completed)
            .count();
        let failed: Vec<(JobId, String)> = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Failed)
            .map(|job| (job.id, job.error.clone().unwrap_or_default()))
            .collect();

        on_status(format!(
            "Batch finished: {} completed, {} failed",
            completed,
            failed.len()
        ));
        info!(
            "Batch finished: {} completed, {} failed",
            completed,
            failed.len()
        );

        BatchReport {
            jobs,
            completed,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::pipeline::mocks::*;
    use crate::progress::noop_progress;

    fn recording_status() -> (StatusCallback, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: StatusCallback = Arc::new(move |line| {
            sink.lock().unwrap().push(line);
        });
        (callback, seen)
    }

    fn write_inputs(dir: &std::path::Path, names: &[&str]) -> Vec<std::path::PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, b"v").unwrap();
                path
            })
            .collect()
    }

    #[tokio::test]
    async fn test_three_jobs_with_bound_two_respect_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["a.mp4", "b.mp4", "c.mp4"]);

        let probe = ConcurrencyProbe::default();
        let pipeline = Arc::new(Pipeline::with_providers(
            test_config(dir.path()),
            Box::new(MockTranscriber::with_probe(
                sample_segments(),
                probe.clone(),
                40,
            )),
            Box::new(MockTranslator::new()),
            Box::new(MockSynthesizer::new()),
            Box::new(MockMedia::new()),
        ));

        let jobs: Vec<TranslationJob> =
            inputs.iter().map(|path| pipeline.create_job(path)).collect();
        let scheduler = BatchScheduler::new(Arc::clone(&pipeline), 2);
        let (on_status, status_lines) = recording_status();

        let report = scheduler
            .run(jobs, &FocusHandle::new(), &noop_progress(), &on_status)
            .await;

        assert_eq!(report.completed, 3);
        assert!(report.all_succeeded());
        // Two jobs overlap, the third waits for a free slot.
        assert_eq!(probe.peak(), 2);

        let lines = status_lines.lock().unwrap().clone();
        let per_job: Vec<&str> = lines
            .iter()
            .filter(|line| line.starts_with("Completed"))
            .map(|line| line.as_str())
            .collect();
        assert_eq!(
            per_job,
            [
                "Completed 1 of 3 jobs",
                "Completed 2 of 3 jobs",
                "Completed 3 of 3 jobs"
            ]
        );
        assert_eq!(
            lines
                .iter()
                .filter(|line| line.starts_with("Batch finished"))
                .count(),
            1
        );
        assert_eq!(
            lines.last().map(|line| line.as_str()),
            Some("Batch finished: 3 completed, 0 failed")
        );
    }

    #[tokio::test]
    async fn test_failures_are_isolated_and_no_permit_leaks() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["good1.mp4", "bad.mp4", "good2.mp4"]);

        let pipeline = Arc::new(Pipeline::with_providers(
            test_config(dir.path()),
            Box::new(MockTranscriber::returning(sample_segments())),
            Box::new(MockTranslator::new()),
            Box::new(MockSynthesizer::new()),
            Box::new(MockMedia::failing_extract_for("bad")),
        ));

        let jobs: Vec<TranslationJob> =
            inputs.iter().map(|path| pipeline.create_job(path)).collect();
        let bad_id = jobs[1].id;

        let scheduler = BatchScheduler::new(Arc::clone(&pipeline), 2);
        let report = scheduler
            .run(jobs, &FocusHandle::new(), &noop_progress(), &noop_status())
            .await;

        assert_eq!(report.completed, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, bad_id);
        assert!(report.failed[0].1.contains("Cannot read"));

        // Submission order survives, and only the bad job failed.
        assert_eq!(report.jobs[0].status, JobStatus::Completed);
        assert_eq!(report.jobs[1].status, JobStatus::Failed);
        assert_eq!(report.jobs[2].status, JobStatus::Completed);
        assert!(report.jobs[1].error.is_some());

        // Every permit came back, success and failure alike.
        assert_eq!(scheduler.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_progress_is_forwarded_only_for_the_focused_job() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["first.mp4", "second.mp4"]);

        let pipeline = Arc::new(Pipeline::with_providers(
            test_config(dir.path()),
            Box::new(MockTranscriber::returning(sample_segments())),
            Box::new(MockTranslator::new()),
            Box::new(MockSynthesizer::new()),
            Box::new(MockMedia::new()),
        ));

        let jobs: Vec<TranslationJob> =
            inputs.iter().map(|path| pipeline.create_job(path)).collect();
        let focused_id = jobs[1].id;

        let focus = FocusHandle::new();
        focus.focus(focused_id);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let on_progress: ProgressCallback = Arc::new(move |update| {
            sink.lock().unwrap().push(update);
        });

        let scheduler = BatchScheduler::new(Arc::clone(&pipeline), 2);
        scheduler
            .run(jobs, &focus, &on_progress, &noop_status())
            .await;

        let events = seen.lock().unwrap();
        assert!(!events.is_empty());
        assert!(events.iter().all(|update| update.job == focused_id));
    }

    #[tokio::test]
    async fn test_jobs_already_terminal_are_not_reprocessed() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["fresh.mp4", "stale.mp4"]);

        let pipeline = Arc::new(Pipeline::with_providers(
            test_config(dir.path()),
            Box::new(MockTranscriber::returning(sample_segments())),
            Box::new(MockTranslator::new()),
            Box::new(MockSynthesizer::new()),
            Box::new(MockMedia::new()),
        ));

        let fresh = pipeline.create_job(&inputs[0]);
        let mut stale = pipeline.create_job(&inputs[1]);
        stale.fail("input vanished before the batch started").unwrap();

        let scheduler = BatchScheduler::new(Arc::clone(&pipeline), 2);
        let (on_status, status_lines) = recording_status();
        let report = scheduler
            .run(
                vec![fresh, stale],
                &FocusHandle::new(),
                &noop_progress(),
                &on_status,
            )
            .await;

        assert_eq!(report.jobs.len(), 2);
        assert_eq!(report.completed, 1);
        assert_eq!(report.jobs[1].status, JobStatus::Failed);
        assert_eq!(
            report.jobs[1].error.as_deref(),
            Some("input vanished before the batch started")
        );

        // Only the fresh job counted toward the batch total.
        let lines = status_lines.lock().unwrap();
        assert!(lines.iter().any(|line| line == "Completed 1 of 1 jobs"));
    }
}
