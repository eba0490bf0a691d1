// Dependency checker
//
// Probes every external tool the active provider selection relies on and
// reports what is missing. Results are informational: processing never
// consults them, and per-job preflight runs its own narrower checks.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::Config;
use crate::error::{FukikaeError, Result};
use crate::transcribe::TranscriberFactory;
use crate::translate::TranslatorFactory;
use crate::tts::SynthesizerFactory;

/// Tool name to probe outcome, `None` meaning available.
///
/// Keys are role-qualified (`transcription (openai)`) because one provider
/// name can serve several roles with separate credentials. A `BTreeMap`
/// keeps the order deterministic, so repeat probes of an unchanged machine
/// compare equal.
pub type DependencyReport = BTreeMap<String, Option<String>>;

/// Probe every tool the current configuration depends on.
pub fn check_dependencies(config: &Config) -> DependencyReport {
    let mut report = DependencyReport::new();

    report.insert(
        "ffmpeg".to_string(),
        outcome(probe_media_binary(&config.media.ffmpeg_path)),
    );
    report.insert(
        "ffprobe".to_string(),
        outcome(probe_media_binary(&config.media.ffprobe_path)),
    );

    let transcriber = TranscriberFactory::create_transcriber(config.transcription.clone());
    report.insert(
        format!("transcription ({})", config.transcription.provider),
        outcome(transcriber.check_installed()),
    );

    let translator = TranslatorFactory::create_translator(config.translation.clone());
    report.insert(
        format!("translation ({})", config.translation.provider),
        outcome(translator.check_installed()),
    );

    let synthesizer = SynthesizerFactory::create_synthesizer(config.tts.clone());
    report.insert(
        format!("tts ({})", config.tts.provider),
        outcome(synthesizer.check_installed()),
    );

    for (tool, probe) in &report {
        match probe {
            None => debug!("{} is available", tool),
            Some(message) => debug!("{} is missing: {}", tool, message),
        }
    }

    report
}

fn outcome(result: Result<()>) -> Option<String> {
    result.err().map(|e| e.to_string())
}

fn probe_media_binary(binary_path: &str) -> Result<()> {
    let output = std::process::Command::new(binary_path)
        .arg("-version")
        .output()
        .map_err(|e| FukikaeError::Dependency(format!("{} not found: {}", binary_path, e)))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(FukikaeError::Dependency(format!(
            "{} version check failed",
            binary_path
        )))
    }
}
