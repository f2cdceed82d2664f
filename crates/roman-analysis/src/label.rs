use std::collections::BTreeSet;
use std::fmt;

use harmony::{PitchClass, RomanNumeral};
use score_events::Offset;
use serde::{Deserialize, Serialize};

use crate::keys::KeyState;

/// A harmonic annotation of one span of one measure.
///
/// Positions are eighth-note units from the downbeat, so `start_unit = 3`
/// is beat 1.5 in quarter notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Goodness of fit; lower is better.
    pub score: f64,
    pub measure: u32,
    pub start_unit: u32,
    pub stop_unit: u32,
    pub key: PitchClass,
    pub major: bool,
    pub numeral: RomanNumeral,
}

impl Label {
    pub fn start_beat(&self) -> Offset {
        Offset::new(self.start_unit as i64, 2)
    }

    pub fn stop_beat(&self) -> Offset {
        Offset::new(self.stop_unit as i64, 2)
    }

    pub fn key_state(&self) -> KeyState {
        KeyState {
            tonic: self.key,
            major: self.major,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start_unit >= self.stop_unit
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tonic = self.key.name(self.key.prefers_flats());
        let key = if self.major {
            tonic.to_string()
        } else {
            tonic.to_ascii_lowercase()
        };
        write!(
            f,
            "m{} {}-{} {}: {} ({:.3})",
            self.measure,
            self.start_beat(),
            self.stop_beat(),
            key,
            self.numeral,
            self.score
        )
    }
}

/// One eighth-note slot of a [`beat_grid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSlot {
    pub numeral: RomanNumeral,
    pub key: PitchClass,
    pub major: bool,
    pub score: f64,
}

/// Expands labels into one row of eighth-note slots per measure.
///
/// Rows are as long as the furthest label end. A slot no label covers
/// repeats the slot before it; leading uncovered slots stay empty.
pub fn beat_grid(labels: &[Label]) -> Vec<(u32, Vec<Option<GridSlot>>)> {
    let Some(measure_len) = labels.iter().map(|l| l.stop_unit).max() else {
        return Vec::new();
    };
    let measures: BTreeSet<u32> = labels.iter().map(|l| l.measure).collect();

    measures
        .into_iter()
        .map(|number| {
            let mut row: Vec<Option<GridSlot>> = vec![None; measure_len as usize];
            for label in labels.iter().filter(|l| l.measure == number) {
                let stop = (label.stop_unit as usize).min(row.len());
                let start = (label.start_unit as usize).min(stop);
                for slot in &mut row[start..stop] {
                    *slot = Some(GridSlot {
                        numeral: label.numeral.clone(),
                        key: label.key,
                        major: label.major,
                        score: label.score,
                    });
                }
            }
            for i in 1..row.len() {
                if row[i].is_none() {
                    row[i] = row[i - 1].clone();
                }
            }
            (number, row)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn label(measure: u32, start: u32, stop: u32, numeral: &str) -> Label {
        Label {
            score: 0.0,
            measure,
            start_unit: start,
            stop_unit: stop,
            key: PitchClass::C,
            major: true,
            numeral: RomanNumeral::parse(numeral).unwrap(),
        }
    }

    fn numerals(row: &[Option<GridSlot>]) -> Vec<Option<&str>> {
        row.iter()
            .map(|slot| slot.as_ref().map(|s| s.numeral.as_str()))
            .collect()
    }

    #[test]
    fn beats_are_half_units() {
        let l = label(4, 3, 8, "V7");
        assert_eq!(l.start_beat(), Offset::new(3, 2));
        assert_eq!(l.stop_beat(), Offset::from_integer(4));
        assert_eq!(l.key_state(), KeyState::C_MAJOR);
        assert_eq!(l.to_string(), "m4 3/2-4 C: V7 (0.000)");
    }

    #[test]
    fn grid_fills_uncovered_slots_forward() {
        let labels = vec![
            label(1, 0, 2, "I"),
            label(1, 4, 6, "V"),
            label(2, 2, 6, "IV"),
        ];
        let grid = beat_grid(&labels);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].0, 1);
        assert_eq!(
            numerals(&grid[0].1),
            vec![Some("I"), Some("I"), Some("I"), Some("I"), Some("V"), Some("V")]
        );
        assert_eq!(
            numerals(&grid[1].1),
            vec![None, None, Some("IV"), Some("IV"), Some("IV"), Some("IV")]
        );
    }

    #[test]
    fn grid_ignores_inverted_spans() {
        let labels = vec![label(1, 0, 4, "I"), label(1, 6, 2, "V")];
        let grid = beat_grid(&labels);
        assert_eq!(numerals(&grid[0].1), vec![Some("I"); 4]);
    }

    #[test]
    fn empty_grid() {
        assert!(beat_grid(&[]).is_empty());
    }
}
