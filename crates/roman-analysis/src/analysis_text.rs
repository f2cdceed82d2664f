//! Reader for hand-written analyses in the RomanText style:
//!
//! ```text
//! Time signature: 3/4
//! m1 C: I b3 V7
//! m2 I
//! ```
//!
//! `bN` tokens give the beat of the numeral that follows them; a token
//! ending in `:` changes key (uppercase tonic for major). Variant lines
//! (`m3var1 ...`) and everything not starting with `m` are ignored.

use harmony::{PitchClass, RomanNumeral};

use crate::label::Label;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy)]
struct Meter {
    top: u32,
    bottom: u32,
}

impl Meter {
    /// Beat number (1-based, in the meter's notated unit) to eighth units.
    fn units(&self, beat: f64) -> u32 {
        let eighths = match (self.top, self.bottom) {
            (_, 4) => (beat - 1.0) * 2.0,
            (2, 2) => (beat - 1.0) * 4.0,
            (3, 8) => beat - 1.0,
            (6, 8) => ((beat - 1.0) * 3.0).round(),
            _ => beat * 2.0,
        };
        eighths.round().max(0.0) as u32
    }

    /// Measure length in quarter notes.
    fn beats(&self) -> f64 {
        match (self.top, self.bottom) {
            (top, 4) => top as f64,
            (2, 2) => 4.0,
            (3, 8) => 1.5,
            (6, 8) => 3.0,
            _ => 4.0,
        }
    }
}

/// Parses an analysis into labels with score 0.
///
/// Each label stops where the next label of the same measure starts, or at
/// the end of the measure. Beats past the end of the measure are clamped
/// to it. Numerals before the first key are skipped.
pub fn parse_analysis(text: &str) -> Result<Vec<Label>> {
    let mut meter = Meter { top: 4, bottom: 4 };
    let mut measure_beats = meter.beats();
    let mut key: Option<(PitchClass, bool)> = None;
    // (measure, start unit, key, major, numeral)
    let mut found: Vec<(u32, u32, PitchClass, bool, RomanNumeral)> = Vec::new();
    let mut measure_ends: Vec<u32> = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let malformed = |reason: String| Error::MalformedLine { line: i + 1, reason };

        if line.to_lowercase().contains("ime signature") {
            if let Some(parsed) = parse_meter(line) {
                meter = parsed;
                measure_beats = meter.beats();
            }
        }
        if line.contains("Measure duration") {
            let value = line.split_whitespace().nth(2).unwrap_or_default();
            measure_beats = value
                .parse()
                .map_err(|e| malformed(format!("measure duration {value:?}: {e}")))?;
        }

        if !line.starts_with('m') || line.find("var").is_some_and(|at| at > 0) {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(measure) = tokens.first().and_then(|t| t[1..].parse::<u32>().ok()) else {
            continue;
        };
        let first_label = found.len();

        for (j, token) in tokens.iter().enumerate() {
            if let Some(at) = token.find(':').filter(|&at| at > 0) {
                let name = &token[..at];
                let tonic: PitchClass = name
                    .parse()
                    .map_err(|e| malformed(format!("key {name:?}: {e}")))?;
                let major = name.starts_with(|c: char| c.is_ascii_uppercase());
                key = Some((tonic, major));
                continue;
            }
            let Ok(numeral) = RomanNumeral::parse(token) else {
                continue;
            };
            let Some((tonic, major)) = key else {
                continue;
            };
            let beat = tokens[..j]
                .iter()
                .rev()
                .find_map(|t| beat_label(t))
                .unwrap_or(1.0);
            found.push((measure, meter.units(beat), tonic, major, numeral));
        }
        let end = (measure_beats * 2.0).round().max(0.0) as u32;
        measure_ends.extend(std::iter::repeat(end).take(found.len() - first_label));
    }

    let labels = found
        .iter()
        .enumerate()
        .map(|(i, (measure, start, tonic, major, numeral))| {
            let end = measure_ends[i];
            let start = (*start).min(end);
            let stop = match found.get(i + 1) {
                Some(next) if next.0 == *measure => next.1.min(measure_ends[i + 1]),
                _ => end,
            };
            Label {
                score: 0.0,
                measure: *measure,
                start_unit: start,
                stop_unit: stop.max(start),
                key: *tonic,
                major: *major,
                numeral: numeral.clone(),
            }
        })
        .collect();
    Ok(labels)
}

fn parse_meter(line: &str) -> Option<Meter> {
    let slash = line.find('/')?;
    let top: String = line[..slash]
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let bottom: String = line[slash + 1..].chars().take_while(char::is_ascii_digit).collect();
    Some(Meter {
        top: top.parse().ok()?,
        bottom: bottom.parse().ok()?,
    })
}

/// The beat of a `bN` token.
fn beat_label(token: &str) -> Option<f64> {
    token.strip_prefix('b')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn summary(labels: &[Label]) -> Vec<(u32, u32, u32, &str)> {
        labels
            .iter()
            .map(|l| (l.measure, l.start_unit, l.stop_unit, l.numeral.as_str()))
            .collect()
    }

    #[test]
    fn reads_three_four() {
        let text = "\
Composer: Mozart
Time Signature: 3/4
m1 C: I b3 V7
m2 b1 I b2 ii6/5 b3 V
m3var1 C: IV
note: nothing here
";
        let labels = parse_analysis(text).unwrap();
        assert_eq!(
            summary(&labels),
            vec![
                (1, 0, 4, "I"),
                (1, 4, 6, "V7"),
                (2, 0, 2, "I"),
                (2, 2, 4, "ii65"),
                (2, 4, 6, "V"),
            ]
        );
        assert!(labels.iter().all(|l| l.major && l.key == PitchClass::C && l.score == 0.0));
    }

    #[test]
    fn key_changes_and_minor_keys() {
        let text = "m1 Bb: I b3 g: V\nm2 i";
        let labels = parse_analysis(text).unwrap();
        assert_eq!(labels[0].key, PitchClass::new(10));
        assert!(labels[0].major);
        assert_eq!(labels[1].key, PitchClass::new(7));
        assert!(!labels[1].major);
        assert_eq!(labels[2].key, PitchClass::new(7));
        // 4/4 by default
        assert_eq!(labels[2].stop_unit, 8);
    }

    #[test]
    fn compound_and_cut_time_beats() {
        let six_eight = parse_analysis("Time signature: 6/8\nm1 F: I b2 V").unwrap();
        assert_eq!(summary(&six_eight), vec![(1, 0, 3, "I"), (1, 3, 6, "V")]);

        let cut = parse_analysis("Time signature: 2/2\nm4 D: V b2 I").unwrap();
        assert_eq!(summary(&cut), vec![(4, 0, 4, "V"), (4, 4, 8, "I")]);

        let three_eight = parse_analysis("Time signature: 3/8\nm1 A: I b3 V").unwrap();
        assert_eq!(summary(&three_eight), vec![(1, 0, 2, "I"), (1, 2, 3, "V")]);
    }

    #[test]
    fn measure_duration_overrides_meter() {
        let labels = parse_analysis("Time signature: 4/4\nMeasure duration: 1.5\nm1 C: I").unwrap();
        assert_eq!(labels[0].stop_unit, 3);
        assert!(matches!(
            parse_analysis("Measure duration: long"),
            Err(Error::MalformedLine { line: 1, .. })
        ));
    }

    #[test]
    fn beats_past_the_measure_end_are_clamped() {
        let labels = parse_analysis("Measure duration: 1\nm1 C: I b4 V").unwrap();
        assert_eq!(summary(&labels), vec![(1, 0, 2, "I"), (1, 2, 2, "V")]);
        assert!(labels.iter().all(|l| l.start_unit <= l.stop_unit));

        let grid = crate::label::beat_grid(&labels);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0].1.len(), 2);
    }

    #[test]
    fn numerals_before_a_key_are_skipped() {
        let labels = parse_analysis("m1 I b3 C: V").unwrap();
        assert_eq!(summary(&labels), vec![(1, 4, 8, "V")]);
    }
}
