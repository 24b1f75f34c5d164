//! Configuration for the dispatcher and its collaborators
//!
//! Loaded from a TOML file; every section and field is optional.
//!
//! ```toml
//! [home]
//! hub = "192.168.0.1"
//! bridge = "192.168.0.1"
//!
//! [storage]
//! preferences_db = "preferences.db"
//!
//! [classifier]
//! weights_path = "models/health_classifier.json"
//!
//! [signal]
//! eeg_path = "recordings/resting.txt"
//! sample_rate = 256
//!
//! [capture]
//! listen_secs = 4.0
//!
//! [stt]
//! model_path = "models/ggml-base.en.bin"
//! language = "en"
//! n_threads = 4
//! ```

use crate::speech::{CaptureConfig, WhisperConfig};
use crate::{HomeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Address used by both the hub and the lighting bridge out of the box
pub const DEFAULT_HOME_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1));

/// Network locations of home devices
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeAddresses {
    /// Home automation hub
    pub hub: IpAddr,

    /// Lighting bridge
    pub bridge: IpAddr,
}

impl Default for HomeAddresses {
    fn default() -> Self {
        Self {
            hub: DEFAULT_HOME_ADDRESS,
            bridge: DEFAULT_HOME_ADDRESS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding preferences
    pub preferences_db: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            preferences_db: PathBuf::from("preferences.db"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// JSON weights of the health classifier
    pub weights_path: PathBuf,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::from("models/health_classifier.json"),
        }
    }
}

/// EEG samples attached to console signals
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Whitespace-separated samples; none means no EEG until an `eeg:` line
    pub eeg_path: Option<PathBuf>,

    /// Sample rate of `eeg_path` in Hz
    pub sample_rate: u32,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            eeg_path: None,
            sample_rate: 256,
        }
    }
}

/// Complete configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeConfig {
    pub home: HomeAddresses,

    pub storage: StorageConfig,

    pub classifier: ClassifierConfig,

    pub signal: SignalConfig,

    /// Microphone capture for relayed voice commands
    pub capture: CaptureConfig,

    /// STT (Whisper) configuration
    pub stt: WhisperConfig,

    /// Whether to capture from the system microphone
    pub enable_audio_input: bool,

    /// Whether to load the speech recognition model
    pub enable_speech_recognition: bool,
}

impl Default for HomeConfig {
    fn default() -> Self {
        Self {
            home: HomeAddresses::default(),
            storage: StorageConfig::default(),
            classifier: ClassifierConfig::default(),
            signal: SignalConfig::default(),
            capture: CaptureConfig::default(),
            stt: WhisperConfig::default(),
            enable_audio_input: cfg!(feature = "audio-io"),
            enable_speech_recognition: cfg!(feature = "whisper"),
        }
    }
}

impl HomeConfig {
    /// Default configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("smart-home-bci").join("config.toml"))
    }

    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            HomeError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_toml(&content).map_err(|e| match e {
            HomeError::ConfigError(msg) => {
                HomeError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| HomeError::ConfigError(e.to_string()))
    }

    /// Load `path` if given, else the default location if it exists, else defaults
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(default) if default.exists() => Self::load(default),
            _ => {
                debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn with_hub(mut self, hub: IpAddr) -> Self {
        self.home.hub = hub;
        self
    }

    pub fn with_bridge(mut self, bridge: IpAddr) -> Self {
        self.home.bridge = bridge;
        self
    }

    pub fn with_preferences_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.preferences_db = path.into();
        self
    }

    pub fn with_classifier_weights(mut self, path: impl Into<PathBuf>) -> Self {
        self.classifier.weights_path = path.into();
        self
    }

    pub fn with_eeg_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.signal.eeg_path = Some(path.into());
        self
    }

    /// Record silence instead of opening the system microphone
    pub fn without_audio_input(mut self) -> Self {
        self.enable_audio_input = false;
        self
    }

    /// Skip loading the speech model; voice commands report the service as unavailable
    pub fn without_speech_recognition(mut self) -> Self {
        self.enable_speech_recognition = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.capture.listen_duration()?;

        if !self.classifier.weights_path.exists() {
            return Err(HomeError::ConfigError(format!(
                "Classifier weights not found: {}",
                self.classifier.weights_path.display()
            )));
        }

        if self.signal.sample_rate == 0 {
            return Err(HomeError::ConfigError(
                "signal sample_rate must be positive".to_string(),
            ));
        }

        if let Some(eeg) = self.signal.eeg_path.as_ref().filter(|p| !p.exists()) {
            return Err(HomeError::ConfigError(format!(
                "EEG sample file not found: {}",
                eeg.display()
            )));
        }

        if self.enable_speech_recognition && !self.stt.model_path.exists() {
            return Err(HomeError::ConfigError(format!(
                "Whisper model not found: {}",
                self.stt.model_path.display()
            )));
        }

        if self.stt.n_threads < 1 {
            return Err(HomeError::ConfigError(
                "n_threads must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
