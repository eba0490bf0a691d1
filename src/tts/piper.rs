use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Synthesizer, check_tts_binary};
use crate::config::TtsConfig;
use crate::error::{FukikaeError, Result};

/// Local piper engine: model file on disk, text on stdin, wav out.
pub struct PiperSynthesizer {
    config: TtsConfig,
}

impl PiperSynthesizer {
    pub fn new(config: TtsConfig) -> Self {
        Self { config }
    }

    fn model_path(&self) -> Result<&str> {
        match self.config.model.as_deref() {
            Some(model) if !model.trim().is_empty() => Ok(model),
            _ => Err(FukikaeError::Synthesis(
                "piper requires a voice model; set tts.model to an .onnx voice file".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Synthesizer for PiperSynthesizer {
    fn check_installed(&self) -> Result<()> {
        check_tts_binary(&self.config.binary_path, "Install with: pip install piper-tts")?;

        let model = self.model_path()?;
        if !Path::new(model).exists() {
            return Err(FukikaeError::Synthesis(format!(
                "Piper voice model not found: {}",
                model
            )));
        }
        Ok(())
    }

    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        let model = self.model_path()?;
        debug!("Synthesizing {} chars with piper model {}", text.len(), model);

        let mut cmd = tokio::process::Command::new(&self.config.binary_path);
        cmd.arg("--model")
            .arg(model)
            .arg("--output_file")
            .arg(output_path);

        // piper scales duration, not tempo: length_scale is the inverse of speed
        if (self.config.speed - 1.0).abs() > f32::EPSILON {
            cmd.arg("--length_scale")
                .arg(format!("{:.2}", 1.0 / self.config.speed));
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FukikaeError::Synthesis(format!("Failed to spawn piper: {}", e)))?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            FukikaeError::Synthesis("Failed to open piper stdin".to_string())
        })?;
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| FukikaeError::Synthesis(format!("Failed to write to piper: {}", e)))?;
        stdin
            .shutdown()
            .await
            .map_err(|e| FukikaeError::Synthesis(format!("Failed to close piper stdin: {}", e)))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| FukikaeError::Synthesis(format!("Failed to wait for piper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FukikaeError::Synthesis(format!("piper failed: {}", stderr)));
        }

        Ok(())
    }
}
