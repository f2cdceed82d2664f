//! Rule-based repairs applied to the labeler's output.
//!
//! Each pass takes the label list by value and returns the repaired list.
//! Order matters: later passes assume earlier ones ran (for example
//! [`fix_inversions`] expects gaps to be filled already).

use harmony::{PitchClass, RomanNumeral};
use score_events::NoteSource;
use tracing::{debug, warn};

use crate::label::Label;

/// Two-label rewrites: (first, required second or `None` for any) → first.
static PREFIX_REWRITES: [(&str, Option<&str>, &str); 2] = [("ii2", Some("I"), "I"), ("ii7", None, "I6")];

/// Three-label rewrites of the middle label.
static TRIPLE_REWRITES: [([&str; 3], &str); 2] = [(["I64", "ii65", "I6"], "V2"), (["I", "ii2", "I"], "I")];

static RENAMES: [(&str, &str); 3] = [("V/iv", "I"), ("V/IV", "I"), ("V6/IV", "I6")];

static TONICS: [&str; 4] = ["I", "I6", "i", "i6"];

/// Runs every pass in order.
pub fn refine<N: NoteSource + ?Sized>(labels: Vec<Label>, notes: &N) -> Vec<Label> {
    let labels = fill_gaps(labels);
    let labels = fix_prefixes(labels);
    let labels = fix_triples(labels);
    let labels = join_adjacents(labels);
    let labels = fix_inversions(labels, notes);
    let labels = rename_errors(labels);
    let labels = fix_common_errors(labels, notes);
    let labels = fix_vs(labels, notes);
    fix_basses(labels, notes)
}

/// Extends each label to the start of the next one, or to the end of the
/// measure when the next label is in a later measure.
pub fn fill_gaps(mut labels: Vec<Label>) -> Vec<Label> {
    let Some(measure_len) = labels.iter().map(|l| l.stop_unit).max() else {
        return labels;
    };
    for i in 1..labels.len() {
        let (next_measure, next_start) = (labels[i].measure, labels[i].start_unit);
        let label = &mut labels[i - 1];
        if next_measure > label.measure {
            label.stop_unit = label.stop_unit.max(measure_len);
        } else if label.stop_unit != next_start {
            label.stop_unit = next_start;
        }
    }
    labels
}

/// Rewrites known mislabelled pivots by looking at the label that follows.
/// Runs right to left so a rewrite can enable the one before it.
pub fn fix_prefixes(mut labels: Vec<Label>) -> Vec<Label> {
    for i in (0..labels.len().saturating_sub(1)).rev() {
        let rewrite = PREFIX_REWRITES.iter().find(|(first, second, _)| {
            labels[i].numeral == *first && second.map_or(true, |s| labels[i + 1].numeral == s)
        });
        if let Some(&(_, _, to)) = rewrite {
            rewrite_numeral(&mut labels[i], to, "prefix");
        }
    }
    labels
}

pub fn fix_triples(mut labels: Vec<Label>) -> Vec<Label> {
    for i in 0..labels.len().saturating_sub(2) {
        let rewrite = TRIPLE_REWRITES.iter().find(|(pattern, _)| {
            pattern
                .iter()
                .zip(&labels[i..i + 3])
                .all(|(numeral, label)| label.numeral == *numeral)
        });
        if let Some(&(_, to)) = rewrite {
            rewrite_numeral(&mut labels[i + 1], to, "triple");
        }
    }
    labels
}

/// Merges each run of same-measure labels with identical numerals into
/// its first label, which then spans the whole run.
pub fn join_adjacents(labels: Vec<Label>) -> Vec<Label> {
    let mut joined: Vec<Label> = Vec::with_capacity(labels.len());
    for label in labels {
        match joined.last_mut() {
            Some(prev) if prev.measure == label.measure && prev.numeral == label.numeral => {
                prev.stop_unit = label.stop_unit;
            }
            _ => joined.push(label),
        }
    }
    joined
}

/// Settles neighbouring labels that differ only in inversion by comparing
/// the lowest pitch sounding under each.
///
/// When the second bass is more than a tritone above the first, or the
/// basses are the same, the second label takes the first's inversion. When
/// a six-four chord's bass sits more than eleven semitones above the next
/// bass, the six-four takes the second label's inversion.
pub fn fix_inversions<N: NoteSource + ?Sized>(mut labels: Vec<Label>, notes: &N) -> Vec<Label> {
    for i in 0..labels.len().saturating_sub(1) {
        let (a, b) = (&labels[i], &labels[i + 1]);
        if a.numeral == b.numeral || !a.numeral.same_root_class(&b.numeral) {
            continue;
        }
        let (Some(a_bass), Some(b_bass)) = (lowest_midi(notes, a), lowest_midi(notes, b)) else {
            warn!(measure = a.measure, "no sounding notes to compare inversions");
            continue;
        };
        let first = a.numeral.clone();
        if a_bass + 6 < b_bass || a_bass == b_bass {
            set_numeral(&mut labels[i + 1], first.clone(), "inversion");
        }
        if b_bass + 11 < a_bass && first.as_str().contains("64") {
            let second = labels[i + 1].numeral.clone();
            set_numeral(&mut labels[i], second, "inversion");
        }
    }
    labels
}

/// Secondary dominants of IV that are really the tonic.
pub fn rename_errors(mut labels: Vec<Label>) -> Vec<Label> {
    for label in &mut labels {
        if let Some(&(_, to)) = RENAMES.iter().find(|(from, _)| label.numeral == *from) {
            rewrite_numeral(label, to, "rename");
        }
    }
    labels
}

/// A plain `ii` resolving to the tonic over a sounding leading tone is a
/// leading-tone chord.
pub fn fix_common_errors<N: NoteSource + ?Sized>(mut labels: Vec<Label>, notes: &N) -> Vec<Label> {
    for i in 0..labels.len().saturating_sub(1) {
        let resolves = TONICS.iter().any(|t| labels[i + 1].numeral == *t);
        if resolves
            && labels[i].numeral == "ii"
            && sounds(notes, &labels[i], 11)
        {
            rewrite_numeral(&mut labels[i], "viio6", "common error");
        }
    }
    labels
}

/// Adds or drops the seventh of `V` according to whether the fourth scale
/// degree sounds, and reads `viio64` as `V2`.
pub fn fix_vs<N: NoteSource + ?Sized>(mut labels: Vec<Label>, notes: &N) -> Vec<Label> {
    for label in &mut labels {
        if label.numeral == "V" && sounds(notes, label, 5) {
            rewrite_numeral(label, "V7", "dominant");
        }
        if label.numeral == "V7" && !sounds(notes, label, 5) {
            rewrite_numeral(label, "V", "dominant");
        }
        // The fifth above the tonic is not checked.
        if label.numeral == "viio64" {
            rewrite_numeral(label, "V2", "dominant");
        }
    }
    labels
}

/// A tonic six-four over the tonic in the bass is root position.
pub fn fix_basses<N: NoteSource + ?Sized>(mut labels: Vec<Label>, notes: &N) -> Vec<Label> {
    for label in &mut labels {
        if label.numeral != "I64" {
            continue;
        }
        let Some(bass) = lowest_midi(notes, label) else {
            warn!(measure = label.measure, "no sounding notes under I64");
            continue;
        };
        if PitchClass::from_midi(bass) == label.key {
            rewrite_numeral(label, "I", "bass");
        }
    }
    labels
}

fn lowest_midi<N: NoteSource + ?Sized>(notes: &N, label: &Label) -> Option<u8> {
    notes
        .notes_in_span(label.measure, label.start_unit, label.stop_unit)
        .iter()
        .map(|n| n.midi)
        .min()
}

/// Whether the scale degree `degree` semitones above the label's key sounds
/// anywhere in its span.
fn sounds<N: NoteSource + ?Sized>(notes: &N, label: &Label, degree: i32) -> bool {
    let target = label.key.transpose(degree);
    notes
        .notes_in_span(label.measure, label.start_unit, label.stop_unit)
        .iter()
        .any(|n| n.pitch_class() == target)
}

fn rewrite_numeral(label: &mut Label, to: &'static str, pass: &str) {
    set_numeral(label, RomanNumeral::from_static(to), pass);
}

fn set_numeral(label: &mut Label, to: RomanNumeral, pass: &str) {
    if label.numeral != to {
        debug!(measure = label.measure, start = label.start_unit, from = %label.numeral, to = %to, pass, "rewrite");
        label.numeral = to;
    }
}
