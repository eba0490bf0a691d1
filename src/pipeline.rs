// Stage executor
//
// Runs one dubbing job through its five stages in order: extract,
// transcribe, translate, synthesize, mux. Providers are resolved once at
// construction from the configuration snapshot; per-job scratch files live
// in a TempDir that cleans up on success and failure alike.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{FukikaeError, Result};
use crate::job::{JobStatus, Stage, TranslationJob};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait, TimedClip};
use crate::progress::{ProgressCallback, StageProgress};
use crate::subtitle::{generate_srt, SubtitleSegment};
use crate::transcribe::{Transcriber, TranscriberFactory};
use crate::translate::{Translator, TranslatorFactory};
use crate::tts::{Synthesizer, SynthesizerFactory};

pub struct Pipeline {
    config: Config,
    transcriber: Box<dyn Transcriber>,
    translator: Box<dyn Translator>,
    synthesizer: Box<dyn Synthesizer>,
    media: Box<dyn MediaProcessorTrait>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let transcriber = TranscriberFactory::create_transcriber(config.transcription.clone());
        let translator = TranslatorFactory::create_translator(config.translation.clone());
        let synthesizer = SynthesizerFactory::create_synthesizer(config.tts.clone());
        let media = MediaProcessorFactory::create_processor(config.media.clone());

        Ok(Self {
            config,
            transcriber,
            translator,
            synthesizer,
            media,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_providers(
        config: Config,
        transcriber: Box<dyn Transcriber>,
        translator: Box<dyn Translator>,
        synthesizer: Box<dyn Synthesizer>,
        media: Box<dyn MediaProcessorTrait>,
    ) -> Self {
        Self {
            config,
            transcriber,
            translator,
            synthesizer,
            media,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a `Pending` job for one input video, capturing the language
    /// pair and voice from the configuration snapshot.
    pub fn create_job<P: AsRef<Path>>(&self, input_path: P) -> TranslationJob {
        TranslationJob::new(
            input_path,
            self.config.source_lang.clone(),
            self.config.target_lang.clone(),
            self.config.tts.voice.clone(),
        )
    }

    /// Per-job preflight. Never mutates the job; a validation failure leaves
    /// it `Pending` so the caller decides what to do with it.
    pub fn validate_job(&self, job: &TranslationJob) -> Result<()> {
        debug!("Validating job {} ({})", job.id, job.file_name());

        if !job.input_path.exists() {
            return Err(FukikaeError::Validation(format!(
                "Input file not found: {}",
                job.input_path.display()
            )));
        }

        std::fs::create_dir_all(&self.config.output_dir).map_err(|e| {
            FukikaeError::Validation(format!(
                "Cannot create output directory {}: {}",
                self.config.output_dir.display(),
                e
            ))
        })?;
        tempfile::tempfile_in(&self.config.output_dir).map_err(|e| {
            FukikaeError::Validation(format!(
                "Output directory {} is not writable: {}",
                self.config.output_dir.display(),
                e
            ))
        })?;

        self.media
            .check_availability()
            .map_err(|e| FukikaeError::Validation(e.to_string()))?;
        self.transcriber
            .check_installed()
            .map_err(|e| FukikaeError::Validation(e.to_string()))?;
        self.translator
            .check_installed()
            .map_err(|e| FukikaeError::Validation(e.to_string()))?;
        self.synthesizer
            .check_installed()
            .map_err(|e| FukikaeError::Validation(e.to_string()))?;

        Ok(())
    }

    /// Run every stage for one job, strictly in order and fail-fast.
    ///
    /// The job ends `Completed` with its output recorded, or `Failed` with
    /// the cause attached; the first stage error aborts the rest. No
    /// automatic retry happens here; a failed job is retried by submitting
    /// a new one.
    pub async fn process(
        &self,
        job: &mut TranslationJob,
        progress: &ProgressCallback,
    ) -> Result<()> {
        info!("Processing job {}: {}", job.id, job.file_name());
        job.advance(JobStatus::Processing)?;

        match self.run_stages(job, progress).await {
            Ok(output_path) => {
                info!("Job {} completed: {}", job.id, output_path.display());
                job.complete(output_path)?;
                Ok(())
            }
            Err(e) => {
                warn!("Job {} failed while {}: {}", job.id, job.current_stage(), e);
                job.fail(e.to_string())?;
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        job: &mut TranslationJob,
        progress: &ProgressCallback,
    ) -> Result<PathBuf> {
        // Scratch space for the extracted track and synthesized clips; the
        // guard removes it on success and failure alike.
        let scratch = tempfile::tempdir()?;

        let (audio_path, duration_secs) =
            self.extract_stage(job, progress, scratch.path()).await?;
        let segments = self
            .transcribe_stage(job, progress, &audio_path, duration_secs)
            .await?;
        let segments = self.translate_stage(job, progress, segments).await?;
        let segments = self
            .synthesize_stage(job, progress, segments, scratch.path())
            .await?;
        self.mux_stage(job, progress, &segments).await
    }

    async fn extract_stage(
        &self,
        job: &mut TranslationJob,
        progress: &ProgressCallback,
        scratch: &Path,
    ) -> Result<(PathBuf, f64)> {
        job.begin_stage(Stage::Extract)?;
        let reporter =
            StageProgress::begin(job.id, Stage::Extract, progress, "Extracting audio track");

        let audio_path = scratch.join("audio.wav");
        self.media.extract_audio(&job.input_path, &audio_path).await?;

        reporter.emit(80, "Probing audio duration");
        let duration_secs = self.media.probe_duration(&audio_path).await?;

        job.set_progress(100);
        reporter.finish(format!("Audio extracted ({:.1}s)", duration_secs));
        Ok((audio_path, duration_secs))
    }

    async fn transcribe_stage(
        &self,
        job: &mut TranslationJob,
        progress: &ProgressCallback,
        audio_path: &Path,
        duration_secs: f64,
    ) -> Result<Vec<SubtitleSegment>> {
        job.begin_stage(Stage::Transcribe)?;
        let reporter =
            StageProgress::begin(job.id, Stage::Transcribe, progress, "Transcribing audio");

        let on_progress = |current_second: f64, percent: u8| {
            reporter.emit(
                percent,
                format!("Transcribed {:.0}s of audio", current_second),
            );
        };
        let segments = self
            .transcriber
            .transcribe_with_progress(audio_path, &job.source_lang, duration_secs, &on_progress)
            .await?;

        // Segments with inverted timing or no text would produce empty
        // clips downstream, so they are dropped here.
        let usable: Vec<SubtitleSegment> =
            segments.into_iter().filter(|s| s.is_usable()).collect();
        if usable.is_empty() {
            return Err(FukikaeError::Transcription(
                "No speech found in the audio track".to_string(),
            ));
        }

        job.set_progress(100);
        reporter.finish(format!("{} segments transcribed", usable.len()));
        Ok(usable)
    }

    async fn translate_stage(
        &self,
        job: &mut TranslationJob,
        progress: &ProgressCallback,
        mut segments: Vec<SubtitleSegment>,
    ) -> Result<Vec<SubtitleSegment>> {
        job.begin_stage(Stage::Translate)?;
        info!(
            "Translating {} segments from {} to {}",
            segments.len(),
            job.source_lang,
            job.target_lang
        );
        let reporter =
            StageProgress::begin(job.id, Stage::Translate, progress, "Translating segments");

        let total = segments.len();
        for (index, segment) in segments.iter_mut().enumerate() {
            let translated = self
                .translator
                .translate(&segment.source_text, &job.source_lang, &job.target_lang)
                .await?;
            segment.translated_text = Some(translated);

            let percent = ((index + 1) * 100 / total) as u8;
            job.set_progress(percent);
            reporter.emit(
                percent,
                format!("Translated {} of {} segments", index + 1, total),
            );
        }

        reporter.finish("Translation complete");
        Ok(segments)
    }

    async fn synthesize_stage(
        &self,
        job: &mut TranslationJob,
        progress: &ProgressCallback,
        mut segments: Vec<SubtitleSegment>,
        scratch: &Path,
    ) -> Result<Vec<SubtitleSegment>> {
        job.begin_stage(Stage::Synthesize)?;
        info!(
            "Synthesizing {} segments with concurrency {}",
            segments.len(),
            self.config.tts.concurrency
        );
        let reporter =
            StageProgress::begin(job.id, Stage::Synthesize, progress, "Synthesizing speech");

        let total = segments.len();
        let extension = self.synthesizer.file_extension();
        let tasks: Vec<(usize, String, PathBuf)> = segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let clip_path = scratch.join(format!("clip_{:04}.{}", index, extension));
                (index, segment.display_text().to_string(), clip_path)
            })
            .collect();

        let completed = AtomicUsize::new(0);
        let completed = &completed;
        let reporter = &reporter;

        let mut results = stream::iter(tasks)
            .map(|(index, text, clip_path)| async move {
                let result = self.synthesizer.synthesize(&text, &clip_path).await;
                if result.is_ok() {
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    reporter.emit(
                        (done * 100 / total) as u8,
                        format!("Synthesized {} of {} clips", done, total),
                    );
                }
                (index, result.map(|_| clip_path))
            })
            .buffer_unordered(self.config.tts.concurrency)
            .collect::<Vec<_>>()
            .await;

        // Clips complete in arbitrary order; timeline order comes back here.
        results.sort_by_key(|(index, _)| *index);
        for ((_, result), segment) in results.into_iter().zip(segments.iter_mut()) {
            segment.audio_path = Some(result?);
        }

        job.set_progress(100);
        reporter.finish("Synthesis complete");
        Ok(segments)
    }

    async fn mux_stage(
        &self,
        job: &mut TranslationJob,
        progress: &ProgressCallback,
        segments: &[SubtitleSegment],
    ) -> Result<PathBuf> {
        job.begin_stage(Stage::Mux)?;
        let reporter =
            StageProgress::begin(job.id, Stage::Mux, progress, "Assembling dubbed video");

        let stem = job
            .input_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| {
                FukikaeError::Media(format!(
                    "Invalid video filename: {}",
                    job.input_path.display()
                ))
            })?;
        let output_path = self
            .config
            .output_dir
            .join(format!("{}.{}.dub.mp4", stem, job.target_lang));
        let srt_path = self
            .config
            .output_dir
            .join(format!("{}.{}.dub.srt", stem, job.target_lang));

        let clips: Vec<TimedClip> = segments
            .iter()
            .filter_map(|segment| {
                segment.audio_path.as_ref().map(|path| TimedClip {
                    path: path.clone(),
                    start_secs: segment.start,
                    max_duration_secs: segment.duration(),
                })
            })
            .collect();

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        self.media
            .mux_dub(&job.input_path, &clips, &output_path)
            .await?;

        reporter.emit(90, "Writing subtitle sidecar");
        generate_srt(segments, &srt_path).await?;

        job.set_progress(100);
        reporter.finish(format!("Wrote {}", output_path.display()));
        Ok(output_path)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::mocks::*;
    use super::*;
    use crate::config::TtsProvider;
    use crate::progress::{noop_progress, ProgressUpdate};
    use crate::tts::SynthesizerFactory;

    fn recording() -> (ProgressCallback, Arc<Mutex<Vec<ProgressUpdate>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |update| {
            sink.lock().unwrap().push(update);
        });
        (callback, seen)
    }

    #[tokio::test]
    async fn test_process_runs_every_stage_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("lecture.mp4");
        std::fs::write(&input, b"fake video").unwrap();

        let media = MockMedia::new();
        let muxed = Arc::clone(&media.muxed);
        let pipeline = Pipeline::with_providers(
            test_config(dir.path()),
            Box::new(MockTranscriber::returning(sample_segments())),
            Box::new(MockTranslator::new()),
            Box::new(MockSynthesizer::new()),
            Box::new(media),
        );

        let mut job = pipeline.create_job(&input);
        pipeline.validate_job(&job).unwrap();
        pipeline.process(&mut job, &noop_progress()).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());
        assert_eq!(job.progress, 100);

        let output = job.output_path.clone().unwrap();
        assert!(output.exists());
        assert_eq!(
            output.file_name().unwrap().to_string_lossy(),
            "lecture.ja.dub.mp4"
        );

        let sidecar = output.with_extension("srt");
        assert!(sidecar.exists());
        let srt = std::fs::read_to_string(&sidecar).unwrap();
        assert!(srt.contains("first line in ja"));

        assert_eq!(muxed.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_translation_failure_marks_the_job_failed() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.mp4");
        std::fs::write(&input, b"v").unwrap();

        let synthesizer = MockSynthesizer::new();
        let synth_calls = Arc::clone(&synthesizer.calls);
        let pipeline = Pipeline::with_providers(
            test_config(dir.path()),
            Box::new(MockTranscriber::returning(sample_segments())),
            Box::new(MockTranslator::failing("model unavailable")),
            Box::new(synthesizer),
            Box::new(MockMedia::new()),
        );

        let mut job = pipeline.create_job(&input);
        let err = pipeline
            .process(&mut job, &noop_progress())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("model unavailable"));
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("model unavailable"));
        assert!(job.output_path.is_none());
        // Fail-fast: the synthesizer was never reached.
        assert!(synth_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validate_missing_input_leaves_job_pending() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::with_providers(
            test_config(dir.path()),
            Box::new(MockTranscriber::returning(sample_segments())),
            Box::new(MockTranslator::new()),
            Box::new(MockSynthesizer::new()),
            Box::new(MockMedia::new()),
        );

        let job = pipeline.create_job(dir.path().join("missing.mp4"));
        let err = pipeline.validate_job(&job).unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains("missing.mp4"));
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_validate_surfaces_the_voice_sample_rule() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.mp4");
        std::fs::write(&input, b"v").unwrap();

        let mut config = test_config(dir.path());
        config.tts.provider = TtsProvider::CosyVoice;
        config.tts.voice_sample = None;
        let synthesizer = SynthesizerFactory::create_synthesizer(config.tts.clone());

        let pipeline = Pipeline::with_providers(
            config,
            Box::new(MockTranscriber::returning(sample_segments())),
            Box::new(MockTranslator::new()),
            synthesizer,
            Box::new(MockMedia::new()),
        );

        let job = pipeline.create_job(&input);
        let err = pipeline.validate_job(&job).unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains("voice sample"));
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_progress_resets_per_stage_and_never_decreases() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"v").unwrap();

        let pipeline = Pipeline::with_providers(
            test_config(dir.path()),
            Box::new(MockTranscriber::returning(sample_segments())),
            Box::new(MockTranslator::new()),
            Box::new(MockSynthesizer::new()),
            Box::new(MockMedia::new()),
        );

        let (callback, seen) = recording();
        let mut job = pipeline.create_job(&input);
        pipeline.process(&mut job, &callback).await.unwrap();

        let events = seen.lock().unwrap();
        for stage in [
            Stage::Extract,
            Stage::Transcribe,
            Stage::Translate,
            Stage::Synthesize,
            Stage::Mux,
        ] {
            let percents: Vec<u8> = events
                .iter()
                .filter(|u| u.stage == stage)
                .map(|u| u.percent)
                .collect();
            assert!(!percents.is_empty(), "no events for {}", stage);
            assert_eq!(percents[0], 0, "{} did not start at 0", stage);
            assert_eq!(*percents.last().unwrap(), 100, "{} did not end at 100", stage);
            assert!(
                percents.windows(2).all(|w| w[0] <= w[1]),
                "{} percent went backwards: {:?}",
                stage,
                percents
            );
        }
    }

    #[tokio::test]
    async fn test_parallel_synthesis_restores_timeline_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ordered.mp4");
        std::fs::write(&input, b"v").unwrap();

        let media = MockMedia::new();
        let muxed = Arc::clone(&media.muxed);
        let pipeline = Pipeline::with_providers(
            test_config(dir.path()),
            Box::new(MockTranscriber::returning(sample_segments())),
            Box::new(MockTranslator::new()),
            Box::new(MockSynthesizer::staggered()),
            Box::new(media),
        );

        let mut job = pipeline.create_job(&input);
        pipeline.process(&mut job, &noop_progress()).await.unwrap();

        let recorded = muxed.lock().unwrap().clone();
        assert_eq!(
            recorded,
            vec![
                (0.0, "first line in ja".to_string()),
                (2.5, "second line in ja".to_string()),
                (5.0, "third line in ja".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_silent_audio_fails_in_transcription() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("silence.mp4");
        std::fs::write(&input, b"v").unwrap();

        let pipeline = Pipeline::with_providers(
            test_config(dir.path()),
            Box::new(MockTranscriber::returning(vec![SubtitleSegment::new(
                0.0, 1.0, "   ",
            )])),
            Box::new(MockTranslator::new()),
            Box::new(MockSynthesizer::new()),
            Box::new(MockMedia::new()),
        );

        let mut job = pipeline.create_job(&input);
        let err = pipeline
            .process(&mut job, &noop_progress())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("No speech"));
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_create_job_captures_the_config_snapshot() {
        let mut config = Config::default();
        config.source_lang = "ja".to_string();
        config.target_lang = "en".to_string();
        config.tts.voice = "en-US-GuyNeural".to_string();

        let pipeline = Pipeline::with_providers(
            config,
            Box::new(MockTranscriber::returning(Vec::new())),
            Box::new(MockTranslator::new()),
            Box::new(MockSynthesizer::new()),
            Box::new(MockMedia::new()),
        );

        let job = pipeline.create_job("/videos/talk.mp4");
        assert_eq!(job.source_lang, "ja");
        assert_eq!(job.target_lang, "en");
        assert_eq!(job.voice, "en-US-GuyNeural");
        assert_eq!(job.status, JobStatus::Pending);
    }
}
