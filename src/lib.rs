//! Fukikae - Automated Video Dubbing
//!
//! A Rust implementation of an automated dubbing workflow: speech in a video
//! is transcribed, translated, re-synthesized in the target language and
//! muxed back onto the original footage using ffmpeg and a set of pluggable
//! transcription, translation and text-to-speech providers.

pub mod cli;
pub mod config;
pub mod doctor;
pub mod error;
pub mod job;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod subtitle;
pub mod transcribe;
pub mod translate;
pub mod tts;
