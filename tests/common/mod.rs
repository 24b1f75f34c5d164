//! Scripted collaborators for dispatcher tests

#![allow(dead_code)]

use parking_lot::Mutex;
use smart_home_bci::device::{HealthClassifier, HealthData, HomeActuators, Signal, SignalDecoder};
use smart_home_bci::dispatch::{Dispatcher, HomeContext};
use smart_home_bci::speech::{
    AudioClip, Microphone, RecognitionError, RecognitionResult, SpeechRecognizer,
    SPEECH_SAMPLE_RATE,
};
use smart_home_bci::storage::SqlitePreferenceStore;
use smart_home_bci::{HomeError, Result};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

/// What the decoder observed
#[derive(Debug, Default)]
pub struct DecoderLog {
    pub spoken: Vec<String>,
    pub started: bool,
    pub stopped: bool,
    pub signals_read: usize,
}

/// Decoder that replays a fixed list of utterances
pub struct ScriptedDecoder {
    utterances: VecDeque<String>,
    health: HealthData,
    log: Arc<Mutex<DecoderLog>>,
}

impl SignalDecoder for ScriptedDecoder {
    fn start(&mut self) -> Result<()> {
        self.log.lock().started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.lock().stopped = true;
        Ok(())
    }

    fn get_signal(&mut self) -> Result<Signal> {
        self.log.lock().signals_read += 1;
        self.utterances
            .pop_front()
            .map(Signal::from_text)
            .ok_or_else(|| HomeError::DeviceError("script exhausted".into()))
    }

    fn to_text(&mut self, signal: &Signal) -> Result<String> {
        Ok(signal.transcript.clone().unwrap_or_default())
    }

    fn health_data(&mut self, _signal: &Signal) -> Result<HealthData> {
        Ok(self.health)
    }

    fn say(&mut self, phrase: &str) -> Result<()> {
        self.log.lock().spoken.push(phrase.to_string());
        Ok(())
    }
}

/// Actuators that record every call
#[derive(Clone, Default)]
pub struct RecordingHome {
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingHome {
    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().push(call);
        Ok(())
    }
}

impl HomeActuators for RecordingHome {
    fn lights_on(&mut self) -> Result<()> {
        self.record("lights on".into())
    }
    fn lights_off(&mut self) -> Result<()> {
        self.record("lights off".into())
    }
    fn set_temperature(&mut self, degrees: f32) -> Result<()> {
        self.record(format!("thermostat {}", degrees))
    }
    fn play(&mut self, source: &str) -> Result<()> {
        self.record(format!("play {}", source))
    }
    fn stop_music(&mut self) -> Result<()> {
        self.record("stop music".into())
    }
    fn unlock_door(&mut self) -> Result<()> {
        self.record("unlock".into())
    }
    fn lock_door(&mut self) -> Result<()> {
        self.record("lock".into())
    }
    fn display(&mut self, page: &str) -> Result<()> {
        self.record(format!("display {}", page))
    }
    fn sleep_mode(&mut self) -> Result<()> {
        self.record("sleep".into())
    }
}

/// Microphone usage counters
#[derive(Debug, Default)]
pub struct MicLog {
    pub acquired: bool,
    pub acquisitions: usize,
    pub releases: usize,
}

pub struct ScriptedMic {
    pub fail_record: bool,
    log: Arc<Mutex<MicLog>>,
}

impl Microphone for ScriptedMic {
    fn acquire(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.acquired = true;
        log.acquisitions += 1;
        Ok(())
    }

    fn release(&mut self) {
        let mut log = self.log.lock();
        log.acquired = false;
        log.releases += 1;
    }

    fn record(&mut self) -> Result<AudioClip> {
        if self.fail_record {
            return Err(HomeError::AudioDeviceError("microphone unplugged".into()));
        }
        Ok(AudioClip::new(vec![0.05; 1600], SPEECH_SAMPLE_RATE))
    }
}

/// Recognizer that replays scripted outcomes
pub struct ScriptedRecognizer {
    results: VecDeque<RecognitionResult>,
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn recognize(&mut self, _clip: &AudioClip) -> RecognitionResult {
        self.results
            .pop_front()
            .unwrap_or(Err(RecognitionError::Unintelligible))
    }
}

pub struct FixedClassifier {
    pub score: f32,
    pub seen: Arc<Mutex<Vec<[f32; 2]>>>,
}

impl HealthClassifier for FixedClassifier {
    fn predict(&mut self, features: [f32; 2]) -> Result<f32> {
        self.seen.lock().push(features);
        Ok(self.score)
    }
}

/// Handles onto the shared state of a scripted dispatcher
pub struct Harness {
    pub dispatcher: Dispatcher,
    pub decoder: Arc<Mutex<DecoderLog>>,
    pub home: RecordingHome,
    pub mic: Arc<Mutex<MicLog>>,
    pub features: Arc<Mutex<Vec<[f32; 2]>>>,
}

impl Harness {
    pub fn spoken(&self) -> Vec<String> {
        self.decoder.lock().spoken.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.home.calls.lock().clone()
    }

    pub fn preference_count(&self) -> usize {
        self.dispatcher.context().preferences.count().unwrap()
    }
}

/// Builder for a fully scripted dispatcher
pub struct HarnessBuilder {
    utterances: Vec<String>,
    transcripts: Vec<RecognitionResult>,
    score: f32,
    health: HealthData,
    fail_mic: bool,
}

impl HarnessBuilder {
    pub fn new(utterances: &[&str]) -> Self {
        Self {
            utterances: utterances.iter().map(|u| u.to_string()).collect(),
            transcripts: Vec::new(),
            score: 0.1,
            health: HealthData::new(0.4, 0.2),
            fail_mic: false,
        }
    }

    pub fn transcripts(mut self, results: Vec<RecognitionResult>) -> Self {
        self.transcripts = results;
        self
    }

    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn health(mut self, health: HealthData) -> Self {
        self.health = health;
        self
    }

    pub fn failing_mic(mut self) -> Self {
        self.fail_mic = true;
        self
    }

    pub fn build(self) -> Harness {
        let store = SqlitePreferenceStore::open_in_memory().unwrap();
        self.build_with_store(store)
    }

    pub fn build_at(self, db: &Path) -> Harness {
        let store = SqlitePreferenceStore::open(db).unwrap();
        self.build_with_store(store)
    }

    fn build_with_store(self, store: SqlitePreferenceStore) -> Harness {
        let decoder_log = Arc::new(Mutex::new(DecoderLog::default()));
        let mic_log = Arc::new(Mutex::new(MicLog::default()));
        let features = Arc::new(Mutex::new(Vec::new()));
        let home = RecordingHome::default();

        let ctx = HomeContext {
            decoder: Box::new(ScriptedDecoder {
                utterances: self.utterances.into(),
                health: self.health,
                log: Arc::clone(&decoder_log),
            }),
            home: Box::new(home.clone()),
            microphone: Box::new(ScriptedMic {
                fail_record: self.fail_mic,
                log: Arc::clone(&mic_log),
            }),
            recognizer: Box::new(ScriptedRecognizer {
                results: self.transcripts.into(),
            }),
            classifier: Box::new(FixedClassifier {
                score: self.score,
                seen: Arc::clone(&features),
            }),
            preferences: Box::new(store),
        };

        Harness {
            dispatcher: Dispatcher::new(ctx),
            decoder: decoder_log,
            home,
            mic: mic_log,
            features,
        }
    }
}
