//! Smart home command dispatcher driven by decoded brain signals and voice.
//!
//! Decoded utterances are parsed into typed intents and routed to home
//! actuators, a preference store, or a health classifier.

pub mod command;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod speech;
pub mod storage;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum HomeError {
    #[error("Signal device error: {0}")]
    DeviceError(String),

    #[error("Actuator error: {0}")]
    ActuatorError(String),

    #[error("Classifier error: {0}")]
    ClassifierError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Model load error: {0}")]
    ModelLoadError(String),

    #[error("Malformed preference directive: {0}")]
    MalformedPreference(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Dispatcher already stopped")]
    Stopped,
}

impl From<std::io::Error> for HomeError {
    fn from(e: std::io::Error) -> Self {
        HomeError::IOError(e.to_string())
    }
}

impl From<rusqlite::Error> for HomeError {
    fn from(e: rusqlite::Error) -> Self {
        HomeError::StorageError(e.to_string())
    }
}

impl HomeError {
    /// Check if the dispatch loop may continue after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            // A badly spoken directive only affects the current utterance
            HomeError::MalformedPreference(_) => true,
            HomeError::DeviceError(_) => false,
            HomeError::ActuatorError(_) => false,
            HomeError::ClassifierError(_) => false,
            HomeError::StorageError(_) => false,
            HomeError::AudioDeviceError(_) => false,
            HomeError::AudioProcessingError(_) => false,
            HomeError::ModelLoadError(_) => false,
            HomeError::ConfigError(_) => false,
            HomeError::IOError(_) => false,
            HomeError::Stopped => false,
        }
    }

    /// Get the phrase spoken back to the user
    pub fn user_message(&self) -> String {
        match self {
            HomeError::MalformedPreference(text) => {
                format!("Could not understand preference: {}", text)
            }
            HomeError::DeviceError(_) => {
                "Signal device error. Please check the headset connection.".to_string()
            }
            HomeError::ActuatorError(_) => {
                "A home device did not respond.".to_string()
            }
            HomeError::ClassifierError(_) => {
                "Health monitoring failed.".to_string()
            }
            HomeError::StorageError(_) => {
                "Preferences could not be saved.".to_string()
            }
            HomeError::AudioDeviceError(_) => {
                "Audio device error. Please check your microphone.".to_string()
            }
            HomeError::AudioProcessingError(_) => {
                "Audio processing failed.".to_string()
            }
            HomeError::ModelLoadError(_) => {
                "Failed to load a model. Please verify model files are present.".to_string()
            }
            HomeError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            HomeError::IOError(_) => {
                "File system error occurred.".to_string()
            }
            HomeError::Stopped => {
                "The assistant has already stopped.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, HomeError>;
