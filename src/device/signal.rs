//! Signal acquisition and decoding

use crate::command::FAREWELL;
use crate::{HomeError, Result};
use rustfft::{num_complex::Complex, FftPlanner};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Alpha band in Hz (inclusive)
pub const ALPHA_BAND: (f32, f32) = (8.0, 12.0);

/// Beta band in Hz (inclusive)
pub const BETA_BAND: (f32, f32) = (13.0, 30.0);

/// Console lines starting with this tag carry an EEG window, not an utterance
pub const EEG_LINE_TAG: &str = "eeg:";

/// One acquired signal sample
#[derive(Clone, Debug, Default)]
pub struct Signal {
    /// Raw samples (mono)
    pub samples: Vec<f32>,

    /// Sample rate of `samples` in Hz
    pub sample_rate: u32,

    /// Text already decoded by the acquisition source, if any
    pub transcript: Option<String>,
}

impl Signal {
    /// A signal that carries only decoded text
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            transcript: Some(text.into()),
            ..Default::default()
        }
    }

    /// Duration of the sample window in seconds
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Features fed to the health classifier
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HealthData {
    pub alpha: f32,
    pub beta: f32,
}

impl HealthData {
    pub fn new(alpha: f32, beta: f32) -> Self {
        Self { alpha, beta }
    }

    /// Feature vector in classifier order
    pub fn features(&self) -> [f32; 2] {
        [self.alpha, self.beta]
    }

    /// Relative alpha and beta band power of a sample window
    ///
    /// Each value is the band's share of the total spectral power (DC
    /// excluded), so both lie in [0, 1]. Silent or empty windows give zeros.
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        let n = samples.len();
        if n < 2 || sample_rate == 0 {
            return Self::default();
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let mut spectrum: Vec<Complex<f32>> =
            samples.iter().map(|&x| Complex::new(x, 0.0)).collect();
        fft.process(&mut spectrum);

        let bin_hz = sample_rate as f32 / n as f32;
        let mut total = 0.0f32;
        let mut alpha = 0.0f32;
        let mut beta = 0.0f32;

        for (k, bin) in spectrum.iter().enumerate().take(n / 2 + 1).skip(1) {
            let power = bin.norm_sqr();
            let freq = k as f32 * bin_hz;

            total += power;
            if freq >= ALPHA_BAND.0 && freq <= ALPHA_BAND.1 {
                alpha += power;
            } else if freq >= BETA_BAND.0 && freq <= BETA_BAND.1 {
                beta += power;
            }
        }

        if total <= f32::EPSILON {
            return Self::default();
        }

        Self {
            alpha: alpha / total,
            beta: beta / total,
        }
    }
}

/// Raw EEG samples attached to the signals a decoder yields
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EegWindow {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl EegWindow {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Parse whitespace-separated samples
    pub fn parse(text: &str, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(HomeError::DeviceError(
                "EEG sample rate must be positive".into(),
            ));
        }

        let samples = text
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        HomeError::DeviceError(format!("Invalid EEG sample: {}", token))
                    })
            })
            .collect::<Result<Vec<f32>>>()?;

        Ok(Self::new(samples, sample_rate))
    }

    /// Load samples from a text file
    pub fn load(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            HomeError::DeviceError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let window = Self::parse(&content, sample_rate)?;
        info!(
            "Loaded {} EEG samples at {} Hz from {}",
            window.samples.len(),
            sample_rate,
            path.display()
        );
        Ok(window)
    }

    /// Parse the payload of an `eeg: <rate> <samples...>` console line
    fn from_console_line(payload: &str) -> Result<Self> {
        let payload = payload.trim();
        let (rate, samples) = payload
            .split_once(char::is_whitespace)
            .unwrap_or((payload, ""));
        let rate = rate
            .parse::<u32>()
            .map_err(|_| HomeError::DeviceError(format!("Invalid EEG sample rate: {}", rate)))?;
        Self::parse(samples, rate)
    }
}

/// Brain-computer interface that yields decoded utterances
pub trait SignalDecoder {
    /// Begin acquisition
    fn start(&mut self) -> Result<()>;

    /// End acquisition
    fn stop(&mut self) -> Result<()>;

    /// Block until the next signal sample is available
    fn get_signal(&mut self) -> Result<Signal>;

    /// Decode a signal into text (possibly empty)
    fn to_text(&mut self, signal: &Signal) -> Result<String>;

    /// Derive health features from a signal
    fn health_data(&mut self, signal: &Signal) -> Result<HealthData>;

    /// Speak a phrase back to the user
    fn say(&mut self, phrase: &str) -> Result<()>;
}

/// Decoder that reads already-decoded utterances line by line
///
/// Phrases are "spoken" by writing them as lines to the output. When the
/// input is exhausted the decoder yields the farewell phrase so the session
/// ends normally.
///
/// A line of the form `eeg: <rate> <samples...>` replaces the EEG window
/// attached to the signals that follow and is not dispatched itself.
pub struct ConsoleDecoder<R, W> {
    reader: R,
    writer: W,
    running: bool,
    window: EegWindow,
}

impl ConsoleDecoder<io::StdinLock<'static>, io::Stdout> {
    /// Read from stdin and speak to stdout
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R, W> ConsoleDecoder<R, W> {
    /// Attach `window` to every signal until an `eeg:` line replaces it
    pub fn with_eeg_window(mut self, window: EegWindow) -> Self {
        self.window = window;
        self
    }

    fn signal(&self, text: &str) -> Signal {
        Signal {
            samples: self.window.samples.clone(),
            sample_rate: self.window.sample_rate,
            transcript: Some(text.to_string()),
        }
    }
}

impl<R: BufRead, W: Write> ConsoleDecoder<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            running: false,
            window: EegWindow::default(),
        }
    }

    /// Whether acquisition is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Consume the decoder and return the output sink
    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<R: BufRead, W: Write> SignalDecoder for ConsoleDecoder<R, W> {
    fn start(&mut self) -> Result<()> {
        self.running = true;
        info!("Console decoder started");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running = false;
        info!("Console decoder stopped");
        Ok(())
    }

    fn get_signal(&mut self) -> Result<Signal> {
        if !self.running {
            return Err(HomeError::DeviceError("Decoder not started".into()));
        }

        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| HomeError::DeviceError(format!("Failed to read signal: {}", e)))?;

            if read == 0 {
                info!("Input closed, ending session");
                return Ok(self.signal(FAREWELL));
            }

            let line = line.trim_end_matches(['\r', '\n']);
            let is_eeg = line
                .get(..EEG_LINE_TAG.len())
                .is_some_and(|tag| tag.eq_ignore_ascii_case(EEG_LINE_TAG));
            if !is_eeg {
                debug!("Read signal line: {:?}", line);
                return Ok(self.signal(line));
            }

            match EegWindow::from_console_line(&line[EEG_LINE_TAG.len()..]) {
                Ok(window) => {
                    debug!(
                        "EEG window updated: {} samples at {} Hz",
                        window.samples.len(),
                        window.sample_rate
                    );
                    self.window = window;
                }
                Err(e) => warn!("Ignoring EEG line: {}", e),
            }
        }
    }

    fn to_text(&mut self, signal: &Signal) -> Result<String> {
        Ok(signal.transcript.clone().unwrap_or_default())
    }

    fn health_data(&mut self, signal: &Signal) -> Result<HealthData> {
        Ok(HealthData::from_samples(&signal.samples, signal.sample_rate))
    }

    fn say(&mut self, phrase: &str) -> Result<()> {
        writeln!(self.writer, "{}", phrase)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::io::Cursor;

    fn sine(freq: f32, sample_rate: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_alpha_tone_is_alpha_dominant() {
        let samples = sine(10.0, 128, 128);
        let data = HealthData::from_samples(&samples, 128);
        assert!(data.alpha > 0.9, "alpha = {}", data.alpha);
        assert!(data.beta < 0.1, "beta = {}", data.beta);
    }

    #[test]
    fn test_beta_tone_is_beta_dominant() {
        let samples = sine(20.0, 128, 128);
        let data = HealthData::from_samples(&samples, 128);
        assert!(data.beta > 0.9, "beta = {}", data.beta);
        assert!(data.alpha < 0.1, "alpha = {}", data.alpha);
    }

    #[test]
    fn test_long_window_band_shares() {
        // One minute at 256 Hz
        let samples = sine(10.0, 256, 256 * 60);
        let data = HealthData::from_samples(&samples, 256);
        assert!(data.alpha > 0.99, "alpha = {}", data.alpha);
        assert!(data.beta < 0.01, "beta = {}", data.beta);
    }

    #[test]
    fn test_empty_and_silent_windows() {
        assert_eq!(HealthData::from_samples(&[], 128), HealthData::default());
        assert_eq!(HealthData::from_samples(&[0.0; 64], 128), HealthData::default());
        assert_eq!(HealthData::from_samples(&[1.0; 64], 0), HealthData::default());
    }

    #[test]
    fn test_console_decoder_reads_lines() {
        let input = Cursor::new("turn on the lights\r\nmonitor health\n");
        let mut decoder = ConsoleDecoder::new(input, Vec::new());
        decoder.start().unwrap();

        let signal = decoder.get_signal().unwrap();
        assert_eq!(decoder.to_text(&signal).unwrap(), "turn on the lights");

        let signal = decoder.get_signal().unwrap();
        assert_eq!(decoder.to_text(&signal).unwrap(), "monitor health");

        // Exhausted input ends the session
        let signal = decoder.get_signal().unwrap();
        assert_eq!(decoder.to_text(&signal).unwrap(), FAREWELL);
    }

    #[test]
    fn test_eeg_line_feeds_health_data() {
        let tone: Vec<String> = sine(20.0, 128, 128).iter().map(|v| v.to_string()).collect();
        let input = format!("monitor health\neeg: 128 {}\nmonitor health\n", tone.join(" "));
        let mut decoder = ConsoleDecoder::new(Cursor::new(input), Vec::new());
        decoder.start().unwrap();

        let before = decoder.get_signal().unwrap();
        assert_eq!(decoder.health_data(&before).unwrap(), HealthData::default());

        // The eeg line is consumed, not returned as an utterance
        let after = decoder.get_signal().unwrap();
        assert_eq!(decoder.to_text(&after).unwrap(), "monitor health");
        assert_eq!(after.sample_rate, 128);
        let data = decoder.health_data(&after).unwrap();
        assert!(data.beta > 0.9, "beta = {}", data.beta);
    }

    #[test]
    fn test_malformed_eeg_line_is_skipped() {
        let input = Cursor::new("eeg: fast 1 2 3\nEEG: 128 1 x\ngood night\n");
        let mut decoder = ConsoleDecoder::new(input, Vec::new());
        decoder.start().unwrap();

        let signal = decoder.get_signal().unwrap();
        assert_eq!(decoder.to_text(&signal).unwrap(), "good night");
        assert!(signal.samples.is_empty());
    }

    #[test]
    fn test_eeg_window_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("window.txt");
        std::fs::write(&path, "0.5 -0.5\n0.25\n").unwrap();

        let window = EegWindow::load(&path, 256).unwrap();
        assert_eq!(window, EegWindow::new(vec![0.5, -0.5, 0.25], 256));

        let mut decoder = ConsoleDecoder::new(Cursor::new("monitor health\n"), Vec::new())
            .with_eeg_window(window);
        decoder.start().unwrap();
        let signal = decoder.get_signal().unwrap();
        assert_eq!(signal.samples.len(), 3);
        assert_eq!(signal.sample_rate, 256);

        assert!(EegWindow::load(dir.path().join("missing.txt"), 256).is_err());
        assert!(EegWindow::parse("1 2", 0).is_err());
        assert!(EegWindow::parse("1 nan", 256).is_err());
    }

    #[test]
    fn test_console_decoder_requires_start() {
        let mut decoder = ConsoleDecoder::new(Cursor::new("hello\n"), Vec::new());
        assert!(matches!(
            decoder.get_signal(),
            Err(HomeError::DeviceError(_))
        ));
    }

    #[test]
    fn test_console_decoder_say_writes_lines() {
        let mut decoder = ConsoleDecoder::new(Cursor::new(""), Vec::new());
        decoder.say("Goodbye").unwrap();
        assert_eq!(decoder.into_writer(), b"Goodbye\n");
    }

    #[test]
    fn test_signal_duration() {
        let signal = Signal {
            samples: vec![0.0; 256],
            sample_rate: 128,
            transcript: None,
        };
        assert_eq!(signal.duration_seconds(), 2.0);
        assert_eq!(Signal::default().duration_seconds(), 0.0);
    }
}
