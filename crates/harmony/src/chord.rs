use serde::{Deserialize, Serialize};
use std::fmt;

use crate::numeral::{self, RomanNumeral, NUMERALS, NUMERAL_CLASSES};
use crate::pitch::{PitchClass, PitchClassSet};

const INVERSIONS: [&str; 3] = ["", "6", "64"];
const SEVENTH_INVERSIONS: [&str; 4] = ["7", "65", "43", "2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    AugmentedTriad,
    MajorTriad,
    MinorTriad,
    DiminishedTriad,
    DominantSeventh,
    MinorSeventh,
    HalfDiminishedSeventh,
    FullyDiminishedSeventh,
    AugmentedSeventh,
}

impl ChordQuality {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AugmentedTriad => "augmented triad",
            Self::MajorTriad => "major triad",
            Self::MinorTriad => "minor triad",
            Self::DiminishedTriad => "diminished triad",
            Self::DominantSeventh => "dominant seventh",
            Self::MinorSeventh => "minor seventh",
            Self::HalfDiminishedSeventh => "half-diminished seventh",
            Self::FullyDiminishedSeventh => "fully-diminished seventh",
            Self::AugmentedSeventh => "augmented seventh",
        }
    }

    pub fn is_seventh(&self) -> bool {
        matches!(
            self,
            Self::DominantSeventh
                | Self::MinorSeventh
                | Self::HalfDiminishedSeventh
                | Self::FullyDiminishedSeventh
                | Self::AugmentedSeventh
        )
    }

    /// Major third above the root: spelled with an uppercase numeral.
    pub fn is_major(&self) -> bool {
        matches!(
            self,
            Self::MajorTriad | Self::DominantSeventh | Self::AugmentedTriad | Self::AugmentedSeventh
        )
    }

    fn marker(&self) -> &'static str {
        match self {
            Self::DiminishedTriad | Self::FullyDiminishedSeventh => "o",
            Self::HalfDiminishedSeventh => "/o",
            Self::AugmentedTriad | Self::AugmentedSeventh => "+",
            _ => "",
        }
    }
}

impl fmt::Display for ChordQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A chord template: quality plus interval set above the root.
pub struct ChordTemplate {
    pub quality: ChordQuality,
    pub intervals: PitchClassSet,
}

impl ChordTemplate {
    const fn new(quality: ChordQuality, intervals: &[u8]) -> Self {
        Self {
            quality,
            intervals: PitchClassSet::from_intervals(intervals),
        }
    }
}

/// The closed template catalog. Matching tries these in order.
pub static TEMPLATES: &[ChordTemplate] = &[
    ChordTemplate::new(ChordQuality::AugmentedTriad, &[0, 4, 8]),
    ChordTemplate::new(ChordQuality::MajorTriad, &[0, 4, 7]),
    ChordTemplate::new(ChordQuality::MinorTriad, &[0, 3, 7]),
    ChordTemplate::new(ChordQuality::DiminishedTriad, &[0, 3, 6]),
    ChordTemplate::new(ChordQuality::DominantSeventh, &[0, 4, 7, 10]),
    ChordTemplate::new(ChordQuality::MinorSeventh, &[0, 3, 7, 10]),
    ChordTemplate::new(ChordQuality::HalfDiminishedSeventh, &[0, 3, 6, 10]),
    ChordTemplate::new(ChordQuality::FullyDiminishedSeventh, &[0, 3, 6, 9]),
    ChordTemplate::new(ChordQuality::AugmentedSeventh, &[0, 4, 8, 11]),
];

fn quality_of(intervals: PitchClassSet) -> Option<ChordQuality> {
    TEMPLATES
        .iter()
        .find(|t| t.intervals == intervals)
        .map(|t| t.quality)
}

/// An absolute chord. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    pub root: PitchClass,
    pub quality: ChordQuality,
    /// 0 = root position, 1 = first inversion, ...
    pub inversion: u8,
    pub pitch_classes: PitchClassSet,
}

/// Exact template match. The first template (catalog order) and first
/// transposition (0..12) whose pitch classes equal `pitch_classes` wins;
/// the inversion comes from where `bass` sits above that root.
pub fn match_template(pitch_classes: PitchClassSet, bass: PitchClass) -> Option<Chord> {
    for template in TEMPLATES {
        for k in 0..12 {
            if pitch_classes.transpose(-k) != template.intervals {
                continue;
            }
            let root = PitchClass::new(k);
            let inversion = match root.interval_to(bass) {
                3 | 4 => 1,
                6..=8 => 2,
                9..=11 => 3,
                _ => 0,
            };
            return Some(Chord {
                root,
                quality: template.quality,
                inversion,
                pitch_classes,
            });
        }
    }
    None
}

impl Chord {
    /// Template match over sounding MIDI pitches; the lowest is the bass.
    pub fn from_midi(pitches: &[u8]) -> Option<Chord> {
        let bass = *pitches.iter().min()?;
        match_template(PitchClassSet::from_midi(pitches), PitchClass::from_midi(bass))
    }

    /// Builds the chord a numeral denotes in the major/minor key on `key`.
    ///
    /// A secondary target (`/V`) first moves the key to that degree.
    /// Returns `None` when the degree is not one of I–VII, the figures are
    /// not a known triad or seventh inversion, or the implied pitch classes
    /// match no template.
    pub fn from_numeral_and_key(rn: &RomanNumeral, key: PitchClass) -> Option<Chord> {
        let mut key = key;
        let mut text = rn.as_str();

        if let Some(slash) = text.rfind('/').filter(|&i| i > 0) {
            let secondary = &text[slash + 1..];
            if NUMERALS.contains(&secondary.to_ascii_uppercase().as_str()) {
                key = key.transpose(numeral::interval_from_tonic(secondary)? as i32);
                text = &text[..slash];
            }
        }

        let degree = numeral::just_numeral(text);
        let root = numeral::interval_from_tonic(degree)?;
        let rest = &text[degree.len()..];
        let figures: String = rest.chars().filter(|c| "234567".contains(*c)).collect();

        let third = if degree.chars().all(|c| c.is_ascii_uppercase()) { 4 } else { 3 };
        let fifth = if rest.contains('+') {
            8
        } else if rest.contains('o') {
            6
        } else {
            7
        };

        let (inversion, intervals) =
            if let Some(i) = INVERSIONS.iter().position(|f| *f == figures) {
                (i, PitchClassSet::from_intervals(&[0, third, fifth]))
            } else if let Some(i) = SEVENTH_INVERSIONS.iter().position(|f| *f == figures) {
                let seventh = if numeral::is_diminished(text) {
                    9
                } else if rest.contains('+') {
                    11
                } else {
                    10
                };
                (i, PitchClassSet::from_intervals(&[0, third, fifth, seventh]))
            } else {
                return None;
            };

        let quality = quality_of(intervals)?;
        let root = key.transpose(root as i32);
        Some(Chord {
            root,
            quality,
            inversion: inversion as u8,
            pitch_classes: intervals.transpose(root.value() as i32),
        })
    }

    pub fn is_seventh(&self) -> bool {
        self.quality.is_seventh()
    }

    /// Figured-bass suffix: `""`, `6`, `64` for triads; `7`, `65`, `43`, `2`
    /// for sevenths.
    pub fn inversion_name(&self) -> &'static str {
        let names: &[&'static str] = if self.is_seventh() {
            &SEVENTH_INVERSIONS
        } else {
            &INVERSIONS
        };
        names.get(self.inversion as usize).copied().unwrap_or("")
    }

    /// This chord as a numeral in the key on `key`.
    ///
    /// Dominant sevenths off the fifth degree are spelled as secondary
    /// dominants (`V7/V` rather than `II7`); the target is always written
    /// uppercase. Roots on degrees with no numeral (♭II, ♯IV) give `None`.
    pub fn as_roman(&self, key: PitchClass) -> Option<RomanNumeral> {
        let degree = key.interval_to(self.root);

        if self.quality == ChordQuality::DominantSeventh && degree != 7 {
            let tonic = self.root.transpose(-7);
            let primary = self.as_roman(tonic)?;
            let target = key.interval_to(tonic);
            let i = NUMERAL_CLASSES.iter().position(|c| c.contains(&target))?;
            if i == 0 {
                return Some(primary);
            }
            return Some(RomanNumeral::new_unchecked(format!("{}/{}", primary, NUMERALS[i])));
        }

        let i = NUMERAL_CLASSES.iter().position(|c| c.contains(&degree))?;
        let mut text = NUMERALS[i].to_string();
        if !self.quality.is_major() {
            text = text.to_lowercase();
        }
        text.push_str(self.quality.marker());
        text.push_str(self.inversion_name());
        Some(RomanNumeral::new_unchecked(text))
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {}", self.root, self.inversion_name(), self.quality)
    }
}
