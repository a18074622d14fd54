use std::fmt;

use regex::Regex;
use serde::Serialize;

use crate::config::SpeechConfig;

lazy_static! {
    static ref MOBILE_USER_AGENT: Regex =
        Regex::new(r"(?i)Android|iPhone|iPad|iPod").expect("valid regex");
}

pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    MOBILE_USER_AGENT.is_match(user_agent)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Voice parameters for one client.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeechSettings {
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl SpeechSettings {
    pub fn new(config: &SpeechConfig, mobile: bool) -> Self {
        // phone speakers are quieter and the default rate drags on them
        let (rate, volume) = if mobile {
            (config.mobile_rate, config.mobile_volume)
        } else {
            (config.rate, 1.0)
        };
        SpeechSettings {
            lang: config.lang.clone(),
            rate,
            pitch: config.pitch,
            volume,
        }
    }

    pub fn for_user_agent(config: &SpeechConfig, user_agent: Option<&str>) -> Self {
        Self::new(config, user_agent.map(is_mobile_user_agent).unwrap_or(false))
    }

    pub fn utterance(&self, text: &str) -> Utterance {
        Utterance {
            text: text.to_owned(),
            lang: self.lang.clone(),
            rate: self.rate,
            pitch: self.pitch,
            volume: self.volume,
        }
    }
}

impl Default for SpeechSettings {
    fn default() -> Self {
        SpeechSettings::new(&SpeechConfig::default(), false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeechError {
    Unsupported,
    Failed(String),
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechError::Unsupported => write!(f, "Speech synthesis not supported"),
            SpeechError::Failed(reason) => write!(f, "Speech synthesis failed: {}", reason),
        }
    }
}

impl std::error::Error for SpeechError {}

/// A speech synthesizer. `speak` must drop whatever is still queued before
/// starting the new utterance, so narrations never pile up.
pub trait SpeechOutput: Send {
    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError>;
    fn cancel(&mut self);
}

/// Writes every utterance to the log. Used when there is no audio device.
pub struct LogSpeech;

impl SpeechOutput for LogSpeech {
    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError> {
        info!("[speech] {}", utterance.text);
        Ok(())
    }

    fn cancel(&mut self) {}
}

pub struct NoSpeech;

impl SpeechOutput for NoSpeech {
    fn speak(&mut self, _utterance: Utterance) -> Result<(), SpeechError> {
        Err(SpeechError::Unsupported)
    }

    fn cancel(&mut self) {}
}
