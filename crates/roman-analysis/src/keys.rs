//! Local key estimation: an HMM over (tonic, mode) states observing the
//! pitch-class set of each eighth note.

use std::fmt;
use std::str::FromStr;

use harmony::PitchClass;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::hmm::Hmm;
use crate::{Error, Result};

/// A key: tonic pitch class plus mode. Written `<tonic>-True` for major and
/// `<tonic>-False` for minor, e.g. `7-True` is G major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyState {
    pub tonic: PitchClass,
    pub major: bool,
}

impl KeyState {
    pub const C_MAJOR: KeyState = KeyState {
        tonic: PitchClass::C,
        major: true,
    };
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.major { "True" } else { "False" };
        write!(f, "{}-{}", self.tonic.value(), mode)
    }
}

impl FromStr for KeyState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (tonic, mode) = s
            .split_once('-')
            .ok_or_else(|| format!("key state {s:?} lacks '-'"))?;
        let tonic: i32 = tonic
            .parse()
            .map_err(|e| format!("key state {s:?}: tonic: {e}"))?;
        if !(0..12).contains(&tonic) {
            return Err(format!("key state {s:?}: tonic out of range"));
        }
        let major = match mode {
            "True" => true,
            "False" => false,
            other => return Err(format!("key state {s:?}: mode {other:?}")),
        };
        Ok(KeyState {
            tonic: PitchClass::new(tonic),
            major,
        })
    }
}

/// Labelled key sequences for training.
///
/// Text format: one `<state> <observation>` pair per line; a line starting
/// with `.` ends the current sequence. Each added text also starts fresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    sequences: Vec<Vec<(KeyState, String)>>,
}

impl TrainingSet {
    pub fn parse(text: &str) -> Result<Self> {
        let mut set = Self::default();
        set.add_text(text)?;
        Ok(set)
    }

    pub fn add_text(&mut self, text: &str) -> Result<()> {
        let mut current: Vec<(KeyState, String)> = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('.') {
                self.push(std::mem::take(&mut current));
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(state), Some(observation)) = (fields.next(), fields.next()) else {
                return Err(Error::MalformedLine {
                    line: i + 1,
                    reason: "expected a state and an observation".into(),
                });
            };
            let state = state
                .parse()
                .map_err(|reason| Error::MalformedLine { line: i + 1, reason })?;
            current.push((state, observation.to_string()));
        }
        self.push(current);
        Ok(())
    }

    pub fn sequences(&self) -> &[Vec<(KeyState, String)>] {
        &self.sequences
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    fn push(&mut self, sequence: Vec<(KeyState, String)>) {
        if !sequence.is_empty() {
            self.sequences.push(sequence);
        }
    }
}

/// Decodes one key per eighth-note observation.
#[derive(Debug, Clone)]
pub struct KeyModel {
    hmm: Hmm<KeyState, String>,
}

impl KeyModel {
    pub fn train(set: &TrainingSet) -> Result<Self> {
        let hmm = Hmm::train(set.sequences())?;
        info!(
            keys = hmm.states().len(),
            sequences = set.len(),
            "trained key model"
        );
        Ok(Self { hmm })
    }

    pub fn decode(&self, observations: &[String]) -> Vec<KeyState> {
        self.hmm.decode(observations)
    }

    pub fn keys(&self) -> &[KeyState] {
        self.hmm.states()
    }
}
