//! Utterance parsing
//!
//! Turns a decoded utterance into a typed [`Intent`]. Fixed phrases are
//! matched after normalization, directives are matched by prefix and keep
//! the original casing of their payload.

use crate::storage::Preference;
use crate::{HomeError, Result};
use std::fmt;
use std::ops::RangeInclusive;

/// Phrase that ends the session
pub const FAREWELL: &str = "goodbye";

/// Phrase that requests a health assessment
pub const MONITOR_HEALTH: &str = "monitor health";

/// Prefix that hands the next command over to the microphone
pub const VOICE_PREFIX: &str = "voice command";

/// Prefix of a preference directive
pub const PREFERENCE_PREFIX: &str = "set preference";

/// Separator between preference name and value
pub const PREFERENCE_SEPARATOR: &str = " to ";

/// Accepted thermostat setpoints, wide enough for Celsius and Fahrenheit targets
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 5.0..=95.0;

const TEMPERATURE_PREFIX: &str = "set the temperature to ";
const TEMPERATURE_SUFFIX: &str = " degrees";

/// Fixed phrases and the command each one triggers
const FIXED_COMMANDS: &[(&str, HomeCommand)] = &[
    ("turn on the lights", HomeCommand::LightsOn),
    ("turn off the lights", HomeCommand::LightsOff),
    ("play some music", HomeCommand::PlayMusic),
    ("stop the music", HomeCommand::StopMusic),
    ("open the door", HomeCommand::OpenDoor),
    ("close the door", HomeCommand::CloseDoor),
    ("show me the weather", HomeCommand::ShowWeather),
    ("show me the news", HomeCommand::ShowNews),
    ("good night", HomeCommand::GoodNight),
];

/// Home automation commands
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HomeCommand {
    LightsOn,
    LightsOff,
    /// Target temperature in degrees
    SetTemperature(f32),
    PlayMusic,
    StopMusic,
    OpenDoor,
    CloseDoor,
    ShowWeather,
    ShowNews,
    GoodNight,
}

impl HomeCommand {
    /// Every command that is triggered by a fixed phrase
    pub fn fixed() -> impl Iterator<Item = (&'static str, HomeCommand)> {
        FIXED_COMMANDS.iter().copied()
    }
}

impl fmt::Display for HomeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let HomeCommand::SetTemperature(degrees) = self {
            return write!(f, "{}{}{}", TEMPERATURE_PREFIX, degrees, TEMPERATURE_SUFFIX);
        }
        let phrase = FIXED_COMMANDS
            .iter()
            .find(|(_, command)| command == self)
            .map(|(phrase, _)| *phrase)
            .unwrap_or_default();
        f.write_str(phrase)
    }
}

/// What an utterance asks for
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    /// Run a home command
    Command(HomeCommand),
    /// End the session
    Farewell,
    /// Listen on the microphone for the actual command
    VoiceRelay {
        /// Whatever followed the prefix, kept for logging only
        hint: String,
    },
    /// Store a user preference
    SetPreference(Preference),
    /// Classify the current health features
    MonitorHealth,
    /// Nothing to do
    Unrecognized,
}

/// Normalize an utterance for phrase matching
///
/// Lower-cases, collapses whitespace and drops trailing punctuation that
/// recognizers tend to append.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    trim_trailing_punctuation(&collapsed).to_string()
}

fn trim_trailing_punctuation(text: &str) -> &str {
    text.trim_end()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim_end()
}

/// Match an utterance against the command phrases
///
/// The temperature phrase only matches with a numeric operand, so the
/// template `set the temperature to X degrees` itself never matches.
pub fn match_command(text: &str) -> Option<HomeCommand> {
    let normalized = normalize(text);

    if let Some((_, command)) = FIXED_COMMANDS
        .iter()
        .find(|(phrase, _)| *phrase == normalized)
    {
        return Some(*command);
    }

    parse_temperature(&normalized).map(HomeCommand::SetTemperature)
}

fn parse_temperature(normalized: &str) -> Option<f32> {
    let operand = normalized
        .strip_prefix(TEMPERATURE_PREFIX)?
        .strip_suffix(TEMPERATURE_SUFFIX)?;

    // Plain decimals only: no sign, exponent or special values
    let (whole, fraction) = operand.split_once('.').unwrap_or((operand, "0"));
    let plain = !whole.is_empty()
        && !fraction.is_empty()
        && whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit());
    if !plain {
        return None;
    }

    let degrees: f32 = operand.parse().ok()?;
    TEMPERATURE_RANGE.contains(&degrees).then_some(degrees)
}

/// Strip a directive prefix, matched case-insensitively on a word boundary
///
/// Trailing punctuation is dropped first, so `Voice command.` still matches.
fn strip_directive<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let trimmed = trim_trailing_punctuation(text.trim_start());
    let head = trimmed.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }

    let rest = &trimmed[prefix.len()..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Split a preference payload into name and value at the first separator
///
/// The separator matches in any case. Trailing punctuation is not part of
/// the value.
pub fn parse_preference(payload: &str) -> Result<Preference> {
    // ASCII lowering keeps byte offsets valid for `payload`
    let at = payload
        .to_ascii_lowercase()
        .find(PREFERENCE_SEPARATOR)
        .ok_or_else(|| HomeError::MalformedPreference(payload.to_string()))?;

    let name = payload[..at].trim();
    let value = trim_trailing_punctuation(&payload[at + PREFERENCE_SEPARATOR.len()..]).trim();
    if name.is_empty() || value.is_empty() {
        return Err(HomeError::MalformedPreference(payload.to_string()));
    }

    Ok(Preference::new(name, value))
}

/// Classify an utterance
///
/// Checks run in a fixed order: command phrases, farewell, voice prefix,
/// preference prefix, health request. A preference directive without a
/// usable `" to "` separator is reported as [`HomeError::MalformedPreference`].
pub fn parse_utterance(text: &str) -> Result<Intent> {
    if let Some(command) = match_command(text) {
        return Ok(Intent::Command(command));
    }

    let normalized = normalize(text);
    if normalized == FAREWELL {
        return Ok(Intent::Farewell);
    }

    if let Some(hint) = strip_directive(text, VOICE_PREFIX) {
        return Ok(Intent::VoiceRelay {
            hint: hint.to_string(),
        });
    }

    if let Some(payload) = strip_directive(text, PREFERENCE_PREFIX) {
        return parse_preference(payload).map(Intent::SetPreference);
    }

    if normalized == MONITOR_HEALTH {
        return Ok(Intent::MonitorHealth);
    }

    Ok(Intent::Unrecognized)
}
