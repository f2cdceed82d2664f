//! Sub-spans of a measure that receive candidate labels.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// `[start, stop)` in eighth-note units from the downbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub stop: u32,
}

impl Span {
    pub const fn new(start: u32, stop: u32) -> Self {
        Self { start, stop }
    }

    fn shifted(self, units: u32) -> Self {
        Self::new(self.start + units, self.stop + units)
    }

    pub fn len(&self) -> u32 {
        self.stop.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The spans checked in one measure of the given meter.
///
/// Built by halving (or, in triple meters, thirding) the measure down to
/// single eighths: each level lists its sub-level spans at every position,
/// then the whole. `2/4` gives `[0,1) [1,2) [0,2) [2,3) [3,4) [2,4) [0,4)`.
pub fn spans_to_check(numerator: u8, denominator: u8) -> Result<Vec<Span>> {
    catalog(numerator, denominator).ok_or(Error::UnsupportedMeter {
        numerator,
        denominator,
    })
}

/// Length of the measure the spans cover, in eighths.
pub fn mark_len(spans: &[Span]) -> u32 {
    spans.iter().map(|s| s.stop).max().unwrap_or(0)
}

fn catalog(n: u8, d: u8) -> Option<Vec<Span>> {
    match (n, d) {
        (n, 2) => catalog(n.checked_mul(2)?, 4),
        (1, 8) => Some(vec![Span::new(0, 1)]),
        (3, 8) => Some(repeated(catalog(1, 8)?, 1, 3)),
        (6, 8) => Some(repeated(catalog(3, 8)?, 3, 2)),
        (1, 4) => Some(repeated(catalog(1, 8)?, 1, 2)),
        (2, 4) | (4, 4) => Some(repeated(catalog(n / 2, 4)?, n as u32, 2)),
        (3, 4) => Some(repeated(catalog(1, 4)?, 2, 3)),
        _ => None,
    }
}

/// `part` at `copies` positions `step` units apart, then the whole span.
fn repeated(part: Vec<Span>, step: u32, copies: u32) -> Vec<Span> {
    let mut spans: Vec<Span> = (0..copies)
        .flat_map(|i| part.iter().map(move |s| s.shifted(i * step)))
        .collect();
    spans.push(Span::new(0, step * copies));
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(spans: &[Span]) -> Vec<(u32, u32)> {
        spans.iter().map(|s| (s.start, s.stop)).collect()
    }

    #[test]
    fn two_four() {
        let spans = spans_to_check(2, 4).unwrap();
        assert_eq!(
            pairs(&spans),
            vec![(0, 1), (1, 2), (0, 2), (2, 3), (3, 4), (2, 4), (0, 4)]
        );
        assert_eq!(mark_len(&spans), 4);
    }

    #[test]
    fn three_eight_and_six_eight() {
        assert_eq!(
            pairs(&spans_to_check(3, 8).unwrap()),
            vec![(0, 1), (1, 2), (2, 3), (0, 3)]
        );
        let six = spans_to_check(6, 8).unwrap();
        assert_eq!(six.len(), 9);
        assert_eq!(six[4], Span::new(3, 4));
        assert_eq!(six[7], Span::new(3, 6));
        assert_eq!(mark_len(&six), 6);
    }

    #[test]
    fn three_four_groups_by_quarter() {
        let spans = spans_to_check(3, 4).unwrap();
        assert_eq!(spans.len(), 10);
        assert_eq!(spans[3], Span::new(2, 3));
        assert_eq!(spans[9], Span::new(0, 6));
    }

    #[test]
    fn cut_time_matches_common_time() {
        let common = spans_to_check(4, 4).unwrap();
        assert_eq!(common.len(), 15);
        assert_eq!(mark_len(&common), 8);
        assert_eq!(spans_to_check(2, 2).unwrap(), common);
        assert_eq!(pairs(&spans_to_check(1, 4).unwrap()), vec![(0, 1), (1, 2), (0, 2)]);
    }

    #[test]
    fn spans_stay_inside_the_measure() {
        for (n, d) in [(1, 8), (3, 8), (6, 8), (1, 4), (2, 4), (3, 4), (4, 4), (2, 2)] {
            let spans = spans_to_check(n, d).unwrap();
            let len = mark_len(&spans);
            assert!(spans.iter().all(|s| s.start < s.stop && s.stop <= len), "{n}/{d}");
            assert!(spans.contains(&Span::new(0, len)));
        }
    }

    #[test]
    fn unsupported_meters() {
        for (n, d) in [(5, 4), (9, 8), (3, 2), (7, 16)] {
            assert!(matches!(
                spans_to_check(n, d),
                Err(Error::UnsupportedMeter { numerator, denominator }) if (numerator, denominator) == (n, d)
            ));
        }
    }
}
