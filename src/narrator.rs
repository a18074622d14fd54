use regex::{Captures, Regex};

use crate::navigation::Instruction;
use crate::speech::{SpeechOutput, SpeechSettings};

pub const NO_INSTRUCTIONS: &str = "No instructions available";

lazy_static! {
    static ref CONTINUE: Regex = Regex::new(r"\bContinue\b(?: for\b)?").expect("valid regex");
    static ref DESTINATION: Regex = Regex::new(r"\bDestination\b").expect("valid regex");
    // A direction together with whatever already qualifies it, so one pass
    // decides the final wording and a phrased direction is left alone.
    static ref DIRECTION: Regex = Regex::new(
        r"\b(?:(?P<phrased>Turn|Bear|Keep|Merge|Take|the|a)\s+)?(?:Make a\s+)?(?:(?P<modifier>sharp|slight)\s+)?(?P<direction>left|right)\b"
    )
    .expect("valid regex");
}

/// Kilometers with one decimal, halves rounded up (`1250` → `1.3`).
/// `{:.1}` alone would round ties to even.
pub fn kilometers(distance_m: f64) -> String {
    format!("{:.1}", (distance_m / 100.0).round() / 10.0)
}

fn format_distance(distance_m: f64) -> String {
    if distance_m < 1000.0 {
        format!("{} meters", distance_m.round() as i64)
    } else {
        format!("{} kilometers", kilometers(distance_m))
    }
}

/// Turns routing text such as `slight left onto Palm Avenue` into spoken
/// phrasing (`Bear left onto Palm Avenue`), prefixed with the step distance.
pub fn phrase_instruction(instruction: &Instruction) -> String {
    let text = CONTINUE.replace_all(&instruction.text, "Continue for");
    let text = DESTINATION.replace_all(&text, "You have reached your destination");
    let text = DIRECTION.replace_all(&text, |caps: &Captures| {
        if caps.name("phrased").is_some() {
            return caps[0].to_owned();
        }
        let direction = &caps["direction"];
        match caps.name("modifier").map(|m| m.as_str()) {
            Some("sharp") => format!("Take a sharp {}", direction),
            Some(_) => format!("Bear {}", direction),
            None => format!("Turn {}", direction),
        }
    });

    if instruction.distance_m > 0.0 {
        format!("In {}, {}", format_distance(instruction.distance_m), text)
    } else {
        text.into_owned()
    }
}

pub struct Narrator {
    speech: Box<dyn SpeechOutput>,
    settings: SpeechSettings,
    last_spoken: Option<String>,
}

impl Narrator {
    pub fn new(speech: Box<dyn SpeechOutput>, settings: SpeechSettings) -> Self {
        Narrator {
            speech,
            settings,
            last_spoken: None,
        }
    }

    pub fn last_spoken(&self) -> Option<&str> {
        self.last_spoken.as_deref()
    }

    /// Speech problems never reach the caller: the session keeps working
    /// with visual output only.
    pub fn speak(&mut self, text: &str) {
        if let Err(e) = self.speech.speak(self.settings.utterance(text)) {
            warn!("{}: {}", e, text);
        }
    }

    pub fn speak_instruction(&mut self, instruction: &Instruction) -> String {
        let text = phrase_instruction(instruction);
        self.speak(&text);
        self.last_spoken = Some(text.clone());
        text
    }

    pub fn repeat(&mut self) {
        match self.last_spoken.clone() {
            Some(text) => self.speak(&text),
            None => self.speak(NO_INSTRUCTIONS),
        }
    }

    pub fn cancel(&mut self) {
        self.speech.cancel();
    }
}
