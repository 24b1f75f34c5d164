//! Speech-to-text

use super::capture::AudioClip;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Why a clip could not be transcribed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// Audio was captured but no speech could be made out
    #[error("Speech was unintelligible")]
    Unintelligible,

    /// The recognizer itself could not run
    #[error("Speech recognition service unavailable: {0}")]
    ServiceUnavailable(String),
}

pub type RecognitionResult = std::result::Result<String, RecognitionError>;

/// Turns captured audio into text
pub trait SpeechRecognizer {
    fn recognize(&mut self, clip: &AudioClip) -> RecognitionResult;
}

/// Configuration for the Whisper speech-to-text engine
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperConfig {
    /// Path to the Whisper model file
    pub model_path: PathBuf,

    /// Language to transcribe (None for auto-detection)
    pub language: Option<String>,

    /// Number of threads to use for transcription
    pub n_threads: i32,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.en.bin"),
            language: Some("en".to_string()),
            n_threads: 4,
        }
    }
}

/// Recognizer used when no speech engine is available
pub struct OfflineRecognizer {
    reason: String,
}

impl OfflineRecognizer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SpeechRecognizer for OfflineRecognizer {
    fn recognize(&mut self, _clip: &AudioClip) -> RecognitionResult {
        Err(RecognitionError::ServiceUnavailable(self.reason.clone()))
    }
}

/// Markers Whisper emits for audio without words
#[cfg_attr(not(feature = "whisper"), allow(dead_code))]
const NON_SPEECH_MARKERS: &[&str] = &["[BLANK_AUDIO]", "[NO_SPEECH]", "(silence)", "[silence]"];

/// Strip non-speech markers and surrounding whitespace from a transcript
#[cfg_attr(not(feature = "whisper"), allow(dead_code))]
fn clean_transcript(raw: &str) -> String {
    let mut text = raw.to_string();
    for marker in NON_SPEECH_MARKERS {
        text = text.replace(marker, "");
    }
    text.trim().to_string()
}

#[cfg(feature = "whisper")]
pub use self::whisper::WhisperRecognizer;

#[cfg(feature = "whisper")]
mod whisper {
    use super::{clean_transcript, RecognitionError, RecognitionResult, SpeechRecognizer, WhisperConfig};
    use crate::speech::capture::{AudioClip, SPEECH_SAMPLE_RATE};
    use crate::{HomeError, Result};
    use tracing::{debug, info};
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    /// Local Whisper model
    pub struct WhisperRecognizer {
        config: WhisperConfig,
        context: WhisperContext,
    }

    impl WhisperRecognizer {
        pub fn new(config: WhisperConfig) -> Result<Self> {
            info!("Loading Whisper model from: {:?}", config.model_path);

            if !config.model_path.exists() {
                return Err(HomeError::ModelLoadError(format!(
                    "Model file not found: {:?}",
                    config.model_path
                )));
            }

            let context = WhisperContext::new_with_params(
                config
                    .model_path
                    .to_str()
                    .ok_or_else(|| HomeError::ModelLoadError("Invalid model path".to_string()))?,
                WhisperContextParameters::default(),
            )
            .map_err(|e| {
                HomeError::ModelLoadError(format!("Failed to load Whisper model: {:?}", e))
            })?;

            info!("Whisper model loaded successfully");

            Ok(Self { config, context })
        }

        fn transcribe(&self, samples: &[f32]) -> std::result::Result<String, String> {
            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            params.set_n_threads(self.config.n_threads);
            params.set_translate(false);
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);
            if let Some(ref lang) = self.config.language {
                params.set_language(Some(lang.as_str()));
            }

            let mut state = self
                .context
                .create_state()
                .map_err(|e| format!("Failed to create state: {:?}", e))?;

            state
                .full(params, samples)
                .map_err(|e| format!("Transcription failed: {:?}", e))?;

            let segments = state
                .full_n_segments()
                .map_err(|e| format!("Failed to get segments: {:?}", e))?;

            let mut text = String::new();
            for i in 0..segments {
                let segment = state
                    .full_get_segment_text(i)
                    .map_err(|e| format!("Failed to get segment text: {:?}", e))?;
                text.push_str(&segment);
            }

            Ok(text)
        }
    }

    impl SpeechRecognizer for WhisperRecognizer {
        fn recognize(&mut self, clip: &AudioClip) -> RecognitionResult {
            if clip.is_empty() {
                return Err(RecognitionError::Unintelligible);
            }

            let clip = clip
                .resampled(SPEECH_SAMPLE_RATE)
                .map_err(|e| RecognitionError::ServiceUnavailable(e.to_string()))?;

            debug!("Transcribing {:.2}s of audio", clip.duration_seconds());

            let raw = self
                .transcribe(&clip.samples)
                .map_err(RecognitionError::ServiceUnavailable)?;

            let text = clean_transcript(&raw);
            if text.is_empty() {
                return Err(RecognitionError::Unintelligible);
            }

            Ok(text)
        }
    }
}
