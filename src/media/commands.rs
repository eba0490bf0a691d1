use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::TimedClip;
use crate::error::{FukikaeError, Result};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy video stream
    pub fn copy_video(self) -> Self {
        self.arg("-c:v").arg("copy")
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Execute the command
    pub async fn execute(&self) -> Result<()> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| FukikaeError::Media(format!("Failed to execute media processor: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FukikaeError::Media(format!(
                "{} failed: {}",
                self.description, stderr
            )));
        }

        Ok(())
    }
}

/// Builder for the media operations the pipeline needs
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Build audio extraction command: 16 kHz mono PCM, the format every
    /// whisper backend accepts
    pub fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(16000)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }

    /// Build the dub muxing command.
    ///
    /// Each clip is trimmed to its segment window, delayed to its start
    /// offset, and mixed. The original track is mixed underneath at reduced
    /// volume when requested. The video stream is copied, never re-encoded.
    pub fn mux_dub<P: AsRef<Path>>(
        &self,
        video_path: P,
        clips: &[TimedClip],
        output_path: P,
        keep_background: bool,
        background_volume: f32,
    ) -> MediaCommand {
        let mut filter = String::new();
        let mut mix_inputs = Vec::new();

        if keep_background {
            filter.push_str(&format!("[0:a]volume={:.2}[bg];", background_volume));
            mix_inputs.push("[bg]".to_string());
        }

        for (index, clip) in clips.iter().enumerate() {
            // ffmpeg input 0 is the video; clips start at input 1
            let input = index + 1;
            let delay_ms = (clip.start_secs * 1000.0).round() as u64;
            filter.push_str(&format!(
                "[{}:a]atrim=0:{:.3},adelay={}|{}[seg{}];",
                input, clip.max_duration_secs, delay_ms, delay_ms, index
            ));
            mix_inputs.push(format!("[seg{}]", index));
        }

        filter.push_str(&mix_inputs.concat());
        filter.push_str(&format!(
            "amix=inputs={}:normalize=0,apad[aout]",
            mix_inputs.len()
        ));

        let mut cmd = MediaCommand::new(&self.binary_path, "Dub muxing")
            .overwrite()
            .input(&video_path);
        for clip in clips {
            cmd = cmd.input(&clip.path);
        }

        cmd.arg("-filter_complex")
            .arg(filter)
            .args(["-map", "0:v:0", "-map", "[aout]"])
            .copy_video()
            .audio_codec("aac")
            .arg("-shortest")
            .output(output_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}
