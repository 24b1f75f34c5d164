//! External collaborators of the dispatcher
//!
//! - Signal acquisition and decoding (brain-computer interface)
//! - Home actuators (lights, thermostat, speakers, door, display)
//! - Health classifier

pub mod classifier;
pub mod home;
pub mod signal;

// Re-export commonly used types
pub use classifier::{DenseNetwork, HealthClassifier, HealthStatus};
pub use home::{execute, DryRunHome, HomeActuators};
pub use signal::{ConsoleDecoder, EegWindow, HealthData, Signal, SignalDecoder};
