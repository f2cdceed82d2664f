//! Harmonic profiles ("sections") and the distance used to rank them.
//!
//! Template sections come from a fixed catalog, one per numeral; observed
//! sections are built on demand from the notes sounding in a span. Both
//! live in scale-degree space: pitch class 0 is the tonic of the key.

use std::collections::{BTreeMap, BTreeSet};

use harmony::{PitchClass, RomanNumeral};
use score_events::Note;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const REQUIRED_PENALTY: f64 = 200.0;
const AMBIGUOUS_BASS_PENALTY: f64 = 101.0;
const BASS_MISMATCH_PENALTY: f64 = 2.0;

/// Duration multipliers for observed profiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileWeights {
    /// Weight per quarter note of a passing tone. Default: 0.5.
    pub passing_weight: f64,
    /// Weight per quarter note of any other note. Default: 3.0.
    pub harmonic_weight: f64,
}

impl Default for ProfileWeights {
    fn default() -> Self {
        Self {
            passing_weight: 0.5,
            harmonic_weight: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Set for template sections, `None` for observed ones.
    pub numeral: Option<RomanNumeral>,
    /// Scale degree → share of total weight. Sums to 1 unless empty.
    pub histogram: BTreeMap<PitchClass, f64>,
    /// Scale degree of the bass, `None` when ambiguous.
    pub bass: Option<PitchClass>,
    /// Degrees that must sound for a span to match this section.
    pub required: BTreeSet<PitchClass>,
}

impl Section {
    /// A section with `histogram` rescaled to sum to 1.
    pub fn new(
        numeral: Option<RomanNumeral>,
        histogram: BTreeMap<PitchClass, f64>,
        bass: Option<PitchClass>,
        required: BTreeSet<PitchClass>,
    ) -> Self {
        Self {
            numeral,
            histogram: normalized(histogram),
            bass,
            required,
        }
    }

    /// Profile of the given notes, transposed so that `key` is degree 0.
    pub fn observed(notes: &[Note], key: PitchClass, weights: &ProfileWeights) -> Self {
        let mut histogram: BTreeMap<PitchClass, f64> = BTreeMap::new();
        for note in notes {
            let weight = if note.passing {
                weights.passing_weight
            } else {
                weights.harmonic_weight
            };
            let duration = *note.duration.numer() as f64 / *note.duration.denom() as f64;
            let degree = note.pitch_class().transpose(-(key.value() as i32));
            *histogram.entry(degree).or_insert(0.0) += weight * duration;
        }
        Self::new(None, histogram, bass_degree(notes, key), BTreeSet::new())
    }

    /// Dissimilarity of `other` to this section; lower is closer.
    ///
    /// Sums a penalty of 200 when a degree required by either side is
    /// absent from `other`, the squared Euclidean distance of the
    /// histograms, and a bass term: 0 when equal, 101 when exactly one side
    /// is ambiguous, 2 otherwise. Not a metric.
    pub fn distance(&self, other: &Section) -> f64 {
        let missing_required = self
            .required
            .union(&other.required)
            .any(|degree| !other.histogram.contains_key(degree));
        let penalty = if missing_required { REQUIRED_PENALTY } else { 0.0 };

        penalty + histogram_distance(&self.histogram, &other.histogram) + bass_distance(self.bass, other.bass)
    }

    /// Parses a 4-line template record: numeral, 12 histogram weights,
    /// 12 bass weights (first nonzero slot is the bass), 12 `0`/`1`
    /// required flags.
    pub fn parse_record(record: &str, index: usize) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedRecord { index, reason };

        let lines: Vec<&str> = record.trim().lines().collect();
        let [numeral, weights, basses, required] = lines[..] else {
            return Err(malformed(format!("expected 4 lines, found {}", lines.len())));
        };

        let numeral = RomanNumeral::parse(numeral.trim())?;
        let weights = parse_slots(weights).map_err(|e| malformed(format!("histogram: {e}")))?;
        let basses = parse_slots(basses).map_err(|e| malformed(format!("bass: {e}")))?;
        let required: Vec<&str> = required.split_whitespace().collect();
        if required.len() != 12 {
            return Err(malformed(format!("required: expected 12 slots, found {}", required.len())));
        }

        let histogram = weights
            .iter()
            .enumerate()
            .filter(|(_, &w)| w > 0.0)
            .map(|(i, &w)| (PitchClass::new(i as i32), w))
            .collect();
        let bass = basses
            .iter()
            .position(|&w| w > 0.0)
            .map(|i| PitchClass::new(i as i32));
        let required = required
            .iter()
            .enumerate()
            .filter(|(_, flag)| **flag == "1")
            .map(|(i, _)| PitchClass::new(i as i32))
            .collect();

        Ok(Self::new(Some(numeral), histogram, bass, required))
    }
}

/// Template sections for major and minor keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateCatalog {
    pub major: Vec<Section>,
    pub minor: Vec<Section>,
}

impl TemplateCatalog {
    pub fn from_texts(major: &str, minor: &str) -> Result<Self> {
        Ok(Self {
            major: parse_sections(major)?,
            minor: parse_sections(minor)?,
        })
    }

    pub fn for_mode(&self, major: bool) -> &[Section] {
        if major {
            &self.major
        } else {
            &self.minor
        }
    }
}

/// Parses records separated by blank lines. Empty blocks are skipped.
pub fn parse_sections(text: &str) -> Result<Vec<Section>> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .enumerate()
        .map(|(index, block)| Section::parse_record(block, index))
        .collect()
}

fn parse_slots(line: &str) -> std::result::Result<Vec<f64>, String> {
    let slots = line
        .split_whitespace()
        .map(|s| s.parse::<f64>().map_err(|e| format!("{s:?}: {e}")))
        .collect::<std::result::Result<Vec<f64>, String>>()?;
    if slots.len() != 12 {
        return Err(format!("expected 12 slots, found {}", slots.len()));
    }
    Ok(slots)
}

fn normalized(histogram: BTreeMap<PitchClass, f64>) -> BTreeMap<PitchClass, f64> {
    let mut total: f64 = histogram.values().sum();
    if total == 0.0 {
        total = 1.0;
    }
    histogram.into_iter().map(|(pc, w)| (pc, w / total)).collect()
}

/// Scale degree of the lowest note, or `None` when the texture leaves the
/// bass in doubt: a single note, or a lowest note that the next higher
/// pitch sits within a whole step of without sounding together with it.
fn bass_degree(notes: &[Note], key: PitchClass) -> Option<PitchClass> {
    if notes.len() < 2 {
        return None;
    }
    let mut sorted: Vec<&Note> = notes.iter().collect();
    sorted.sort_by(|a, b| a.midi.cmp(&b.midi).then(a.offset.cmp(&b.offset)));
    let lowest = sorted[0];

    let next = sorted.iter().find(|n| n.midi != lowest.midi)?;
    if next.midi - lowest.midi > 2 || next.offset == lowest.offset {
        Some(lowest.pitch_class().transpose(-(key.value() as i32)))
    } else {
        None
    }
}

fn histogram_distance(a: &BTreeMap<PitchClass, f64>, b: &BTreeMap<PitchClass, f64>) -> f64 {
    let keys: BTreeSet<&PitchClass> = a.keys().chain(b.keys()).collect();
    keys.into_iter()
        .map(|pc| {
            let x = a.get(pc).copied().unwrap_or(0.0);
            let y = b.get(pc).copied().unwrap_or(0.0);
            (x - y) * (x - y)
        })
        .sum()
}

fn bass_distance(a: Option<PitchClass>, b: Option<PitchClass>) -> f64 {
    match (a, b) {
        (Some(x), Some(y)) if x == y => 0.0,
        (None, None) => 0.0,
        (Some(_), None) | (None, Some(_)) => AMBIGUOUS_BASS_PENALTY,
        _ => BASS_MISMATCH_PENALTY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use score_events::Offset;

    const TONIC_RECORD: &str = "I
3 0 0 0 2 0 0 2 0 0 0 0
1 0 0 0 0 0 0 0 0 0 0 0
1 0 0 0 1 0 0 0 0 0 0 0";

    fn note(midi: u8, eighth: i64, eighths: i64) -> Note {
        Note::new(midi, Offset::new(eighth, 2), Offset::new(eighths, 2))
    }

    fn pc(v: i32) -> PitchClass {
        PitchClass::new(v)
    }

    #[test]
    fn record_parses_and_normalizes() {
        let section = Section::parse_record(TONIC_RECORD, 0).unwrap();
        assert_eq!(section.numeral.as_ref().unwrap().as_str(), "I");
        assert_eq!(section.histogram.len(), 3);
        assert!((section.histogram[&pc(0)] - 3.0 / 7.0).abs() < 1e-12);
        assert_eq!(section.bass, Some(pc(0)));
        assert_eq!(section.required, [pc(0), pc(4)].into_iter().collect());
    }

    #[test]
    fn malformed_records_are_rejected() {
        assert!(matches!(
            Section::parse_record("I\n1 0 0", 3),
            Err(Error::MalformedRecord { index: 3, .. })
        ));
        let short_row = TONIC_RECORD.replace("3 0 0 0 2 0 0 2 0 0 0 0", "3 0 0 0 2");
        assert!(Section::parse_record(&short_row, 0).is_err());
        let bad_numeral = TONIC_RECORD.replacen('I', "X", 1);
        assert!(matches!(Section::parse_record(&bad_numeral, 0), Err(Error::Harmony(_))));
    }

    #[test]
    fn catalog_skips_blank_blocks() {
        let text = format!("{TONIC_RECORD}\n\n{}\n\n", TONIC_RECORD.replacen('I', "V", 1));
        let sections = parse_sections(&text).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].numeral.as_ref().unwrap().as_str(), "V");
    }

    #[test]
    fn self_distance_is_zero_without_requirements() {
        let histogram = [(pc(0), 2.0), (pc(4), 1.0), (pc(7), 1.0)].into_iter().collect();
        let a = Section::new(None, histogram, Some(pc(0)), BTreeSet::new());
        assert_eq!(a.distance(&a), 0.0);
        let ambiguous = Section { bass: None, ..a.clone() };
        assert_eq!(ambiguous.distance(&ambiguous), 0.0);
    }

    #[test]
    fn distance_terms() {
        let template = Section::parse_record(TONIC_RECORD, 0).unwrap();
        let c_e_g = [note(48, 0, 2), note(64, 0, 2), note(67, 0, 2)];
        let observed = Section::observed(&c_e_g, pc(0), &ProfileWeights::default());
        let close = template.distance(&observed);
        assert!(close >= 0.0 && close < 1.0, "{close}");

        // No E: required degree missing
        let c_g = [note(48, 0, 2), note(67, 0, 2)];
        let observed = Section::observed(&c_g, pc(0), &ProfileWeights::default());
        assert!(template.distance(&observed) > REQUIRED_PENALTY);

        // E in the bass instead of C
        let e_g_c = [note(52, 0, 2), note(67, 0, 2), note(72, 0, 2)];
        let observed = Section::observed(&e_g_c, pc(0), &ProfileWeights::default());
        let mismatch = template.distance(&observed);
        assert!(mismatch >= BASS_MISMATCH_PENALTY && mismatch < 3.0, "{mismatch}");
    }

    #[test]
    fn bass_penalties() {
        assert_eq!(bass_distance(Some(pc(0)), Some(pc(0))), 0.0);
        assert_eq!(bass_distance(Some(pc(0)), None), 101.0);
        assert_eq!(bass_distance(None, Some(pc(7))), 101.0);
        assert_eq!(bass_distance(Some(pc(0)), Some(pc(7))), 2.0);
    }

    #[test]
    fn passing_tones_weigh_less() {
        let mut passing = note(62, 1, 1);
        passing.passing = true;
        let notes = [note(60, 0, 1), passing];
        let section = Section::observed(&notes, pc(0), &ProfileWeights::default());
        // 3 × 0.5 against 0.5 × 0.5
        assert!((section.histogram[&pc(0)] - 1.5 / 1.75).abs() < 1e-12);
        assert!((section.histogram[&pc(2)] - 0.25 / 1.75).abs() < 1e-12);
    }

    #[test]
    fn observed_profile_is_in_scale_degrees() {
        // G B D in G
        let notes = [note(43, 0, 2), note(59, 0, 2), note(62, 0, 2)];
        let section = Section::observed(&notes, pc(7), &ProfileWeights::default());
        let degrees: Vec<u8> = section.histogram.keys().map(|p| p.value()).collect();
        assert_eq!(degrees, vec![0, 4, 7]);
        assert_eq!(section.bass, Some(pc(0)));
        let total: f64 = section.histogram.values().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bass_is_ambiguous_for_close_successive_notes() {
        // C then D a step above, one after the other
        let notes = [note(48, 0, 1), note(50, 1, 1), note(67, 0, 2)];
        assert_eq!(bass_degree(&notes, pc(0)), None);
        // Struck together they leave C in the bass
        let notes = [note(48, 0, 1), note(50, 0, 1)];
        assert_eq!(bass_degree(&notes, pc(0)), Some(pc(0)));
        assert_eq!(bass_degree(&[note(48, 0, 1)], pc(0)), None);
        // Doubled lowest pitch only
        assert_eq!(bass_degree(&[note(48, 0, 1), note(48, 1, 1)], pc(0)), None);
    }
}
