//! Speech input for relayed voice commands
//!
//! This module provides:
//! - Scoped microphone capture
//! - Speech-to-text using Whisper
//! - Resampling of captured audio to the recognition rate

pub mod capture;
pub mod recognizer;
pub mod resampler;

// Re-export commonly used types
pub use capture::{
    listen_once, AudioClip, CaptureConfig, CaptureScope, Microphone, SilentMicrophone,
    SPEECH_SAMPLE_RATE,
};
pub use recognizer::{
    OfflineRecognizer, RecognitionError, RecognitionResult, SpeechRecognizer, WhisperConfig,
};

#[cfg(feature = "audio-io")]
pub use capture::CpalMicrophone;
#[cfg(feature = "whisper")]
pub use recognizer::WhisperRecognizer;
