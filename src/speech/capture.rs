//! Microphone capture
//!
//! The microphone is only held inside a [`CaptureScope`]; dropping the scope
//! releases it, so every exit path (including errors) gives the device back.

use crate::{HomeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sample rate expected by speech recognition
pub const SPEECH_SAMPLE_RATE: u32 = 16000;

/// Longest recording window for one utterance
pub const MAX_LISTEN_SECS: f32 = 60.0;

/// Captured mono audio
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Convert to `rate`, returning a copy when already there
    pub fn resampled(&self, rate: u32) -> Result<AudioClip> {
        let samples = super::resampler::resample_mono(&self.samples, self.sample_rate, rate)?;
        Ok(AudioClip::new(samples, rate))
    }
}

/// Capture settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// How long one utterance is recorded for, in seconds
    pub listen_secs: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { listen_secs: 4.0 }
    }
}

impl CaptureConfig {
    /// Recording window, rejecting values outside (0, MAX_LISTEN_SECS]
    pub fn listen_duration(&self) -> Result<Duration> {
        let secs = self.listen_secs;
        if !(secs > 0.0 && secs <= MAX_LISTEN_SECS) {
            return Err(HomeError::ConfigError(format!(
                "listen_secs must be in (0, {}], got {}",
                MAX_LISTEN_SECS, secs
            )));
        }
        Duration::try_from_secs_f32(secs)
            .map_err(|e| HomeError::ConfigError(format!("Invalid listen_secs {}: {}", secs, e)))
    }
}

/// An audio input device
pub trait Microphone {
    /// Take exclusive use of the device
    fn acquire(&mut self) -> Result<()>;

    /// Give the device back; must be safe to call when not acquired
    fn release(&mut self);

    /// Record one utterance
    fn record(&mut self) -> Result<AudioClip>;
}

/// Holds a microphone for the lifetime of the scope
pub struct CaptureScope<'a> {
    mic: &'a mut dyn Microphone,
}

impl<'a> CaptureScope<'a> {
    pub fn open(mic: &'a mut dyn Microphone) -> Result<Self> {
        mic.acquire()?;
        debug!("Microphone acquired");
        Ok(Self { mic })
    }

    pub fn listen(&mut self) -> Result<AudioClip> {
        self.mic.record()
    }
}

impl Drop for CaptureScope<'_> {
    fn drop(&mut self) {
        self.mic.release();
        debug!("Microphone released");
    }
}

/// Open a capture scope, record one utterance and release the device
pub fn listen_once(mic: &mut dyn Microphone) -> Result<AudioClip> {
    let mut scope = CaptureScope::open(mic)?;
    info!("Listening...");
    scope.listen()
}

/// Stand-in used when no audio input is available
///
/// Every recording is empty, which recognizers report as unintelligible.
#[derive(Debug, Default)]
pub struct SilentMicrophone {
    acquired: bool,
}

impl SilentMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }
}

impl Microphone for SilentMicrophone {
    fn acquire(&mut self) -> Result<()> {
        self.acquired = true;
        Ok(())
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn record(&mut self) -> Result<AudioClip> {
        warn!("No audio input available, recording silence");
        Ok(AudioClip::new(Vec::new(), SPEECH_SAMPLE_RATE))
    }
}

#[cfg(feature = "audio-io")]
pub use self::cpal_input::CpalMicrophone;

#[cfg(feature = "audio-io")]
mod cpal_input {
    use super::{AudioClip, CaptureConfig, Microphone, SPEECH_SAMPLE_RATE};
    use crate::{HomeError, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{Device, Stream, StreamConfig};
    use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tracing::{debug, error, info};

    /// Default system input device
    pub struct CpalMicrophone {
        device: Device,
        config: StreamConfig,
        stream: Option<Stream>,
        is_recording: Arc<Mutex<bool>>,
        listen: Duration,
        audio_tx: Sender<Vec<f32>>,
        audio_rx: Receiver<Vec<f32>>,
    }

    impl CpalMicrophone {
        pub fn new(capture: &CaptureConfig) -> Result<Self> {
            let host = cpal::default_host();

            let device = host
                .default_input_device()
                .ok_or_else(|| HomeError::AudioDeviceError("No input device available".into()))?;

            info!(
                "Using input device: {}",
                device.name().unwrap_or_else(|_| "Unknown".to_string())
            );

            let config = device
                .default_input_config()
                .map_err(|e| {
                    HomeError::AudioDeviceError(format!("Failed to get input config: {}", e))
                })?
                .into();

            let (audio_tx, audio_rx) = bounded(1000);

            Ok(Self {
                device,
                config,
                stream: None,
                is_recording: Arc::new(Mutex::new(false)),
                listen: capture.listen_duration()?,
                audio_tx,
                audio_rx,
            })
        }

        pub fn sample_rate(&self) -> u32 {
            self.config.sample_rate.0
        }
    }

    impl Microphone for CpalMicrophone {
        fn acquire(&mut self) -> Result<()> {
            if self.stream.is_some() {
                return Ok(());
            }

            let channels = self.config.channels as usize;
            let is_recording = Arc::clone(&self.is_recording);
            let audio_tx = self.audio_tx.clone();

            let err_fn = |err| {
                error!("Audio input stream error: {}", err);
            };

            let stream = self
                .device
                .build_input_stream(
                    &self.config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !*is_recording.lock() {
                            return;
                        }

                        let samples = if channels == 1 {
                            data.to_vec()
                        } else {
                            data.chunks(channels)
                                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                                .collect()
                        };

                        if let Err(e) = audio_tx.try_send(samples) {
                            debug!("Dropped audio chunk: {}", e);
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| {
                    HomeError::AudioDeviceError(format!("Failed to build input stream: {}", e))
                })?;

            stream.play().map_err(|e| {
                HomeError::AudioDeviceError(format!("Failed to start input stream: {}", e))
            })?;

            self.stream = Some(stream);
            Ok(())
        }

        fn release(&mut self) {
            *self.is_recording.lock() = false;
            if let Some(stream) = self.stream.take() {
                drop(stream);
                debug!("Input stream closed");
            }
            while self.audio_rx.try_recv().is_ok() {}
        }

        fn record(&mut self) -> Result<AudioClip> {
            if self.stream.is_none() {
                return Err(HomeError::AudioDeviceError("Microphone not acquired".into()));
            }

            let mut samples = Vec::new();
            *self.is_recording.lock() = true;

            let deadline = Instant::now() + self.listen;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match self.audio_rx.recv_timeout(remaining) {
                    Ok(chunk) => samples.extend_from_slice(&chunk),
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => {
                        *self.is_recording.lock() = false;
                        return Err(HomeError::AudioDeviceError(
                            "Audio channel disconnected".into(),
                        ));
                    }
                }
            }

            *self.is_recording.lock() = false;

            let clip = AudioClip::new(samples, self.sample_rate());
            debug!("Captured {:.2}s of audio", clip.duration_seconds());
            clip.resampled(SPEECH_SAMPLE_RATE)
        }
    }

    impl Drop for CpalMicrophone {
        fn drop(&mut self) {
            self.release();
        }
    }
}
