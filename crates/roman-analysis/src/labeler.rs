//! Candidate generation and greedy per-measure label selection.

use score_events::NoteSource;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::keys::KeyState;
use crate::label::Label;
use crate::markov::MarkovModel;
use crate::section::{ProfileWeights, Section, TemplateCatalog};
use crate::spans::{mark_len, Span};

/// Parameters for label selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelerParams {
    /// Weight of the transition prior against template distance. Default: 0.8.
    pub markov_factor: f64,
    /// Weighted cost at or above which no candidate is accepted. Default: 100.
    pub acceptance_threshold: f64,
    /// Best templates kept per checked span. Default: 3.
    pub candidates_per_span: usize,
    /// Costs this close to the minimum count as tied. Default: 1e-6.
    pub tie_epsilon: f64,
}

impl Default for LabelerParams {
    fn default() -> Self {
        Self {
            markov_factor: 0.8,
            acceptance_threshold: 100.0,
            candidates_per_span: 3,
            tie_epsilon: 1e-6,
        }
    }
}

/// Everything the labeler reads besides the score.
#[derive(Debug, Clone, Copy)]
pub struct LabelerContext<'a> {
    pub catalog: &'a TemplateCatalog,
    pub transitions: &'a MarkovModel,
    pub weights: &'a ProfileWeights,
    pub params: &'a LabelerParams,
}

/// Labels every measure in turn.
///
/// `keys` holds one decoded key per eighth note of the piece, measure after
/// measure, `mark_len(spans)` entries per measure.
pub fn label_piece<N: NoteSource + ?Sized>(
    notes: &N,
    measures: &[u32],
    spans: &[Span],
    keys: &[KeyState],
    ctx: &LabelerContext<'_>,
) -> Vec<Label> {
    let len = mark_len(spans);
    let mut labels: Vec<Label> = Vec::new();
    let mut prev: Option<Label> = None;
    let mut last_key = KeyState::C_MAJOR;
    let mut base = 0usize;

    for &measure in measures {
        let candidates = measure_candidates(notes, measure, spans, keys, base, &mut last_key, ctx);
        let chosen = label_measure(&candidates, ctx.transitions, len, prev.as_ref(), ctx.params);
        debug!(
            measure,
            candidates = candidates.len(),
            chosen = %chosen.iter().map(|l| l.numeral.as_str()).collect::<Vec<_>>().join(" "),
            "labelled measure"
        );
        if let Some(last) = chosen.last() {
            prev = Some(last.clone());
        }
        labels.extend(chosen);
        base += len as usize;
    }
    labels
}

/// The best few template matches for every checked span of one measure,
/// sorted by distance. Equal distances keep span order.
pub fn measure_candidates<N: NoteSource + ?Sized>(
    notes: &N,
    measure: u32,
    spans: &[Span],
    keys: &[KeyState],
    base: usize,
    last_key: &mut KeyState,
    ctx: &LabelerContext<'_>,
) -> Vec<Label> {
    let mut results: Vec<Label> = Vec::new();
    for span in spans {
        let index = base + span.start as usize;
        let key = match keys.get(index) {
            Some(&key) => key,
            None => {
                warn!(measure, index, key = %last_key, "no decoded key for span; keeping previous key");
                *last_key
            }
        };
        *last_key = key;

        let observed = Section::observed(
            &notes.notes_in_span(measure, span.start, span.stop),
            key.tonic,
            ctx.weights,
        );
        let mut choices: Vec<Label> = ctx
            .catalog
            .for_mode(key.major)
            .iter()
            .filter_map(|template| {
                Some(Label {
                    score: template.distance(&observed),
                    measure,
                    start_unit: span.start,
                    stop_unit: span.stop,
                    key: key.tonic,
                    major: key.major,
                    numeral: template.numeral.clone()?,
                })
            })
            .collect();
        choices.sort_by(|a, b| a.score.total_cmp(&b.score));
        choices.truncate(ctx.params.candidates_per_span);
        results.extend(choices);
    }
    results.sort_by(|a, b| a.score.total_cmp(&b.score));
    results
}

/// Greedily covers one measure with candidates, left to right.
///
/// The opening label must start on the downbeat and end before the
/// measure's main subdivision boundary; every later label must start
/// exactly where the chain stands. Costs add the transition penalty
/// `markov_factor × (1 − p)`, except that the opening label ignores a
/// previous label in another key. When nothing is cheap enough (or no
/// candidate starts at the current position) the chain skips one eighth,
/// leaving a gap for refinement to close.
pub fn label_measure(
    candidates: &[Label],
    transitions: &MarkovModel,
    mark_len: u32,
    prev: Option<&Label>,
    params: &LabelerParams,
) -> Vec<Label> {
    let weighted = |from: &Label, to: &Label| {
        to.score + params.markov_factor * (1.0 - transitions.score(&from.numeral, &to.numeral))
    };

    let bound = opening_bound(mark_len);
    let opening: Vec<(f64, &Label)> = candidates
        .iter()
        .filter(|l| l.start_unit == 0 && l.stop_unit < bound)
        .map(|l| match prev {
            Some(p) if p.key == l.key => (weighted(p, l), l),
            _ => (l.score, l),
        })
        .collect();

    let mut chosen: Vec<Label> = Vec::new();
    let mut pos = 0;
    if let Some((_, first)) = min_with_tiebreak(&opening, params.tie_epsilon) {
        pos = first.stop_unit;
        chosen.push(first.clone());
    }

    while pos < mark_len {
        let choices: Vec<(f64, &Label)> = candidates
            .iter()
            .filter(|l| l.start_unit == pos)
            .map(|l| match chosen.last() {
                Some(cur) => (weighted(cur, l), l),
                None => (l.score, l),
            })
            .collect();
        match min_with_tiebreak(&choices, params.tie_epsilon) {
            Some((cost, choice)) if cost < params.acceptance_threshold && choice.stop_unit > pos => {
                pos = choice.stop_unit;
                chosen.push(choice.clone());
            }
            _ => {
                debug!(measure = ?candidates.first().map(|l| l.measure), pos, "gap");
                pos += 1;
            }
        }
    }
    chosen
}

/// Exclusive upper limit on the end of a measure's opening label.
fn opening_bound(mark_len: u32) -> u32 {
    if mark_len == 3 {
        4
    } else {
        mark_len
    }
}

/// Lowest cost; among costs within `epsilon` of it, the shortest numeral;
/// then the earliest candidate.
fn min_with_tiebreak<'a>(choices: &[(f64, &'a Label)], epsilon: f64) -> Option<(f64, &'a Label)> {
    let best = choices.iter().map(|(cost, _)| *cost).min_by(f64::total_cmp)?;
    choices
        .iter()
        .filter(|(cost, _)| cost - best < epsilon)
        .min_by_key(|(_, label)| label.numeral.len())
        .map(|&(cost, label)| (cost, label))
}
