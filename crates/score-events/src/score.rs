use serde::{Deserialize, Serialize};

use crate::note::Event;
use crate::{Error, Offset, Result};

/// A validated meter. Deserializing goes through [`TimeSignature::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeSignature")]
pub struct TimeSignature {
    numerator: u8,
    denominator: u8,
}

#[derive(Deserialize)]
struct RawTimeSignature {
    numerator: u8,
    denominator: u8,
}

impl TryFrom<RawTimeSignature> for TimeSignature {
    type Error = Error;

    fn try_from(raw: RawTimeSignature) -> Result<Self> {
        Self::new(raw.numerator, raw.denominator)
    }
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u8) -> Result<Self> {
        if numerator == 0 || denominator == 0 || !denominator.is_power_of_two() {
            return Err(Error::InvalidTimeSignature {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn numerator(&self) -> u8 {
        self.numerator
    }

    pub fn denominator(&self) -> u8 {
        self.denominator
    }

    /// Whole eighth notes in one measure (`6/8` → 6, `2/2` → 8, `3/8` → 3).
    pub fn eighths_per_measure(&self) -> u32 {
        self.numerator as u32 * 8 / self.denominator as u32
    }

    /// Measure length in quarter notes.
    pub fn measure_length(&self) -> Offset {
        Offset::new(self.numerator as i64 * 4, self.denominator as i64)
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// One measure of one part. Event offsets are relative to `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// Bar number; pickups and other numbers below 1 are not analyzed.
    pub number: i32,
    /// Offset of the measure's downbeat from the start of the piece.
    pub start: Offset,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub measures: Vec<Measure>,
}

/// What the analysis needs from a parsed score.
pub trait ScoreProvider {
    fn time_signature(&self) -> TimeSignature;

    /// Parts (staves or instruments), each an ordered list of measures.
    fn parts(&self) -> &[Part];
}

/// A plain in-memory score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub time_signature: TimeSignature,
    pub parts: Vec<Part>,
}

impl ScoreProvider for Score {
    fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    fn parts(&self) -> &[Part] {
        &self.parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eighths_per_measure() {
        let cases = [(4, 4, 8), (3, 4, 6), (2, 4, 4), (2, 2, 8), (6, 8, 6), (3, 8, 3)];
        for (n, d, expected) in cases {
            let ts = TimeSignature::new(n, d).unwrap();
            assert_eq!(ts.eighths_per_measure(), expected, "{ts}");
        }
    }

    #[test]
    fn measure_length_in_quarters() {
        assert_eq!(TimeSignature::new(6, 8).unwrap().measure_length(), Offset::new(3, 1));
        assert_eq!(TimeSignature::new(2, 2).unwrap().measure_length(), Offset::new(4, 1));
    }

    #[test]
    fn rejects_odd_denominators() {
        assert!(TimeSignature::new(3, 5).is_err());
        assert!(TimeSignature::new(0, 4).is_err());
    }

    #[test]
    fn deserializing_validates() {
        let ts: TimeSignature = toml::from_str("numerator = 6\ndenominator = 8\n").unwrap();
        assert_eq!((ts.numerator(), ts.denominator()), (6, 8));
        assert_eq!(ts.eighths_per_measure(), 6);

        let err = toml::from_str::<TimeSignature>("numerator = 3\ndenominator = 0\n").unwrap_err();
        assert!(err.to_string().contains("3/0"), "{err}");
    }
}
