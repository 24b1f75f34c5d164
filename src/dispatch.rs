//! Command dispatch loop
//!
//! Pulls one decoded utterance per step, classifies it and performs exactly
//! one action (or none). The loop runs until the farewell phrase moves it
//! from [`LoopState::Running`] to [`LoopState::Stopped`].

use crate::command::{match_command, parse_utterance, HomeCommand, Intent};
use crate::config::HomeConfig;
use crate::device::{
    execute, DenseNetwork, DryRunHome, HealthClassifier, HealthStatus, HomeActuators, Signal,
    SignalDecoder,
};
use crate::speech::{
    listen_once, Microphone, OfflineRecognizer, RecognitionError, SilentMicrophone,
    SpeechRecognizer,
};
use crate::storage::{Preference, PreferenceStore, SqlitePreferenceStore};
use crate::{HomeError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

pub const FAREWELL_REPLY: &str = "Goodbye";
pub const INVALID_VOICE_REPLY: &str = "Invalid voice command";
pub const UNINTELLIGIBLE_REPLY: &str = "Sorry, I could not understand your voice command";
pub const SERVICE_ERROR_REPLY: &str =
    "Sorry, there was an issue with the speech recognition service";

/// Dispatcher lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Where an executed command came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandSource {
    Signal,
    Voice,
}

/// Events emitted after each handled utterance
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchEvent {
    /// A home command ran
    CommandExecuted {
        command: HomeCommand,
        source: CommandSource,
    },

    /// Voice transcription succeeded but named no command
    VoiceUnmatched(String),

    /// Voice transcription failed
    VoiceFailed(RecognitionError),

    /// A preference row was appended
    PreferenceStored(Preference),

    /// A preference directive could not be parsed
    PreferenceRejected(String),

    /// The classifier scored the current health features
    HealthAssessed { score: f32, status: HealthStatus },

    /// The utterance matched nothing
    Ignored(String),

    /// The farewell phrase ended the session
    Stopped,
}

/// Collaborators the dispatcher acts through
pub struct HomeContext {
    pub decoder: Box<dyn SignalDecoder>,
    pub home: Box<dyn HomeActuators>,
    pub microphone: Box<dyn Microphone>,
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub classifier: Box<dyn HealthClassifier>,
    pub preferences: Box<dyn PreferenceStore>,
}

impl HomeContext {
    /// Build every collaborator except the decoder from configuration
    pub fn from_config(config: &HomeConfig, decoder: Box<dyn SignalDecoder>) -> Result<Self> {
        config.validate()?;

        let home = DryRunHome::new(config.home.hub, config.home.bridge);
        let classifier = DenseNetwork::load(&config.classifier.weights_path)?;
        let preferences = SqlitePreferenceStore::open(&config.storage.preferences_db)?;

        Ok(Self {
            decoder,
            home: Box::new(home),
            microphone: build_microphone(config)?,
            recognizer: build_recognizer(config)?,
            classifier: Box::new(classifier),
            preferences: Box::new(preferences),
        })
    }
}

fn build_microphone(config: &HomeConfig) -> Result<Box<dyn Microphone>> {
    #[cfg(feature = "audio-io")]
    {
        if config.enable_audio_input {
            let mic = crate::speech::CpalMicrophone::new(&config.capture)?;
            return Ok(Box::new(mic));
        }
    }

    if config.enable_audio_input {
        warn!("Built without audio-io support, voice commands will record silence");
    }
    Ok(Box::new(SilentMicrophone::new()))
}

fn build_recognizer(config: &HomeConfig) -> Result<Box<dyn SpeechRecognizer>> {
    #[cfg(feature = "whisper")]
    {
        if config.enable_speech_recognition {
            let recognizer = crate::speech::WhisperRecognizer::new(config.stt.clone())?;
            return Ok(Box::new(recognizer));
        }
    }

    let reason = if config.enable_speech_recognition {
        "built without whisper support"
    } else {
        "speech recognition disabled"
    };
    info!("Speech recognition offline: {}", reason);
    Ok(Box::new(OfflineRecognizer::new(reason)))
}

/// Single-threaded dispatch loop
pub struct Dispatcher {
    ctx: HomeContext,
    state: LoopState,
    started: bool,
    events: Option<Sender<DispatchEvent>>,
}

impl Dispatcher {
    pub fn new(ctx: HomeContext) -> Self {
        Self {
            ctx,
            state: LoopState::Running,
            started: false,
            events: None,
        }
    }

    /// Report events to an existing channel
    pub fn with_events(mut self, events: Sender<DispatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Create an event channel and return its receiving end
    pub fn event_receiver(&mut self) -> Receiver<DispatchEvent> {
        let (tx, rx) = unbounded();
        self.events = Some(tx);
        rx
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn context(&self) -> &HomeContext {
        &self.ctx
    }

    /// Start signal acquisition
    pub fn start(&mut self) -> Result<()> {
        if self.state == LoopState::Stopped {
            return Err(HomeError::Stopped);
        }
        if !self.started {
            self.ctx.decoder.start()?;
            self.started = true;
            info!("Dispatcher started");
        }
        Ok(())
    }

    /// Run until the farewell phrase or a fatal error
    pub fn run(&mut self) -> Result<()> {
        self.start()?;

        while self.state == LoopState::Running {
            if let Err(e) = self.step() {
                error!("Dispatch loop failed: {}", e);
                if let Err(say_err) = self.ctx.decoder.say(&e.user_message()) {
                    warn!("Could not report failure: {}", say_err);
                }
                return Err(e);
            }
        }

        info!("Dispatcher stopped");
        Ok(())
    }

    /// Acquire and handle one utterance
    pub fn step(&mut self) -> Result<LoopState> {
        if self.state == LoopState::Stopped {
            return Err(HomeError::Stopped);
        }
        self.start()?;

        let signal = self.ctx.decoder.get_signal()?;
        let text = self.ctx.decoder.to_text(&signal)?;
        debug!("Decoded utterance: {:?}", text);

        self.handle(&signal, &text)?;
        Ok(self.state)
    }

    fn handle(&mut self, signal: &Signal, text: &str) -> Result<()> {
        let intent = match parse_utterance(text) {
            Ok(intent) => intent,
            Err(e) if e.is_recoverable() => {
                warn!("Rejected utterance {:?}: {}", text, e);
                self.say(&e.user_message())?;
                self.emit(DispatchEvent::PreferenceRejected(text.to_string()));
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match intent {
            Intent::Command(command) => {
                execute(self.ctx.home.as_mut(), command)?;
                info!("Executed {:?}", command);
                self.say(&format!("Command executed: {}", text))?;
                self.emit(DispatchEvent::CommandExecuted {
                    command,
                    source: CommandSource::Signal,
                });
            }
            Intent::Farewell => {
                self.ctx.decoder.stop()?;
                self.say(FAREWELL_REPLY)?;
                self.state = LoopState::Stopped;
                self.emit(DispatchEvent::Stopped);
            }
            Intent::VoiceRelay { hint } => self.relay_voice(&hint)?,
            Intent::SetPreference(preference) => {
                self.ctx.preferences.insert(&preference)?;
                self.say(&format!(
                    "Preference set: {} to {}",
                    preference.name, preference.value
                ))?;
                self.emit(DispatchEvent::PreferenceStored(preference));
            }
            Intent::MonitorHealth => {
                let data = self.ctx.decoder.health_data(signal)?;
                let score = self.ctx.classifier.predict(data.features())?;
                let status = HealthStatus::from_score(score);
                info!(
                    "Health alpha={:.3} beta={:.3} score={:.3} -> {}",
                    data.alpha, data.beta, score, status
                );
                self.say(&format!("Health status: {}", status))?;
                self.emit(DispatchEvent::HealthAssessed { score, status });
            }
            Intent::Unrecognized => {
                debug!("Ignoring utterance {:?}", text);
                self.emit(DispatchEvent::Ignored(text.to_string()));
            }
        }

        Ok(())
    }

    fn relay_voice(&mut self, hint: &str) -> Result<()> {
        if !hint.is_empty() {
            debug!("Voice command hint: {:?}", hint);
        }

        let clip = listen_once(self.ctx.microphone.as_mut())?;

        match self.ctx.recognizer.recognize(&clip) {
            Ok(transcript) => {
                info!("You said: {}", transcript);
                match match_command(&transcript) {
                    Some(command) => {
                        execute(self.ctx.home.as_mut(), command)?;
                        self.say(&format!("Voice command executed: {}", transcript))?;
                        self.emit(DispatchEvent::CommandExecuted {
                            command,
                            source: CommandSource::Voice,
                        });
                    }
                    None => {
                        self.say(INVALID_VOICE_REPLY)?;
                        self.emit(DispatchEvent::VoiceUnmatched(transcript));
                    }
                }
            }
            Err(RecognitionError::Unintelligible) => {
                warn!("Voice command was unintelligible");
                self.say(UNINTELLIGIBLE_REPLY)?;
                self.emit(DispatchEvent::VoiceFailed(RecognitionError::Unintelligible));
            }
            Err(RecognitionError::ServiceUnavailable(reason)) => {
                warn!("Speech recognition unavailable: {}", reason);
                self.say(SERVICE_ERROR_REPLY)?;
                self.emit(DispatchEvent::VoiceFailed(
                    RecognitionError::ServiceUnavailable(reason),
                ));
            }
        }

        Ok(())
    }

    fn say(&mut self, phrase: &str) -> Result<()> {
        debug!("Saying: {}", phrase);
        self.ctx.decoder.say(phrase)
    }

    fn emit(&self, event: DispatchEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.try_send(event) {
                debug!("Dropped dispatch event: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ConsoleDecoder;
    use crate::speech::AudioClip;
    use parking_lot::Mutex;
    use std::io::{Cursor, Write};
    use std::sync::Arc;

    struct NoHome;

    impl HomeActuators for NoHome {
        fn lights_on(&mut self) -> Result<()> {
            Err(HomeError::ActuatorError("bridge unreachable".into()))
        }
        fn lights_off(&mut self) -> Result<()> {
            Ok(())
        }
        fn set_temperature(&mut self, _degrees: f32) -> Result<()> {
            Ok(())
        }
        fn play(&mut self, _source: &str) -> Result<()> {
            Ok(())
        }
        fn stop_music(&mut self) -> Result<()> {
            Ok(())
        }
        fn unlock_door(&mut self) -> Result<()> {
            Ok(())
        }
        fn lock_door(&mut self) -> Result<()> {
            Ok(())
        }
        fn display(&mut self, _page: &str) -> Result<()> {
            Ok(())
        }
        fn sleep_mode(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct FixedScore(f32);

    impl HealthClassifier for FixedScore {
        fn predict(&mut self, _features: [f32; 2]) -> Result<f32> {
            Ok(self.0)
        }
    }

    struct Echo;

    impl SpeechRecognizer for Echo {
        fn recognize(&mut self, _clip: &AudioClip) -> crate::speech::RecognitionResult {
            Ok("play some music".to_string())
        }
    }

    fn dispatcher(input: &str) -> Dispatcher {
        let ctx = HomeContext {
            decoder: Box::new(ConsoleDecoder::new(Cursor::new(input.to_string()), Vec::new())),
            home: Box::new(NoHome),
            microphone: Box::new(SilentMicrophone::new()),
            recognizer: Box::new(Echo),
            classifier: Box::new(FixedScore(0.2)),
            preferences: Box::new(SqlitePreferenceStore::open_in_memory().unwrap()),
        };
        Dispatcher::new(ctx)
    }

    #[test]
    fn test_farewell_stops_loop() {
        let mut d = dispatcher("hello\ngoodbye\nturn off the lights\n");
        let events = d.event_receiver();
        d.run().unwrap();

        assert_eq!(d.state(), LoopState::Stopped);
        let collected: Vec<_> = events.try_iter().collect();
        assert_eq!(
            collected,
            vec![
                DispatchEvent::Ignored("hello".into()),
                DispatchEvent::Stopped
            ]
        );
        assert!(matches!(d.step(), Err(HomeError::Stopped)));
    }

    #[test]
    fn test_actuator_failure_is_fatal() {
        let mut d = dispatcher("turn on the lights\ngoodbye\n");
        let err = d.run().unwrap_err();
        assert!(matches!(err, HomeError::ActuatorError(_)));
        assert_eq!(d.state(), LoopState::Running);
    }

    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_fatal_error_is_spoken() {
        let output = SharedOutput::default();
        let decoder = ConsoleDecoder::new(
            Cursor::new("turn on the lights\n".to_string()),
            output.clone(),
        );
        let mut d = Dispatcher::new(HomeContext {
            decoder: Box::new(decoder),
            ..dispatcher("").ctx
        });

        assert!(matches!(d.run(), Err(HomeError::ActuatorError(_))));
        let spoken = String::from_utf8(output.0.lock().clone()).unwrap();
        assert_eq!(spoken, "A home device did not respond.\n");
    }

    #[test]
    fn test_malformed_preference_does_not_stop_loop() {
        let mut d = dispatcher("set preference foo bar\ngoodbye\n");
        let events = d.event_receiver();
        d.run().unwrap();

        let first = events.try_recv().unwrap();
        assert_eq!(
            first,
            DispatchEvent::PreferenceRejected("set preference foo bar".into())
        );
        assert_eq!(d.context().preferences.count().unwrap(), 0);
    }

    #[test]
    fn test_voice_relay_uses_transcript() {
        let mut d = dispatcher("voice command\n");
        let events = d.event_receiver();
        assert_eq!(d.step().unwrap(), LoopState::Running);
        assert_eq!(
            events.try_recv().unwrap(),
            DispatchEvent::CommandExecuted {
                command: HomeCommand::PlayMusic,
                source: CommandSource::Voice
            }
        );
    }

    #[test]
    fn test_health_monitoring_event() {
        let mut d = dispatcher("monitor health\n");
        let events = d.event_receiver();
        d.step().unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            DispatchEvent::HealthAssessed {
                score: 0.2,
                status: HealthStatus::Normal
            }
        );
    }
}
