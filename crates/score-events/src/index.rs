use std::collections::BTreeMap;

use harmony::PitchClassSet;
use tracing::debug;

use crate::note::{Event, Note};
use crate::passing::{mark_passing_tones, PassingToneParams};
use crate::score::{ScoreProvider, TimeSignature};
use crate::Offset;

/// Sounding notes of a measure span, addressed in eighth-note units from
/// the downbeat.
pub trait NoteSource {
    fn notes_in_span(&self, measure: u32, start_unit: u32, stop_unit: u32) -> Vec<Note>;
}

/// A score indexed by measure number, with passing tones marked.
///
/// Measures sharing a number across parts are queried together. Voices are
/// dissolved into their notes and chords at construction.
#[derive(Debug, Clone)]
pub struct IndexedScore {
    time_signature: TimeSignature,
    /// measure number → one leaf list per part
    measures: BTreeMap<u32, Vec<Vec<Event>>>,
}

impl IndexedScore {
    pub fn new<P: ScoreProvider + ?Sized>(provider: &P, params: &PassingToneParams) -> Self {
        let mut measures: BTreeMap<u32, Vec<Vec<Event>>> = BTreeMap::new();
        // (absolute onset, measure number, part slot, leaf index)
        let mut flat: Vec<(Offset, u32, usize, usize)> = Vec::new();

        for part in provider.parts() {
            for measure in &part.measures {
                if measure.number < 1 {
                    continue;
                }
                let number = measure.number as u32;
                let slots = measures.entry(number).or_default();
                let leaves: Vec<Event> = measure.events.iter().flat_map(Event::leaves).collect();
                for (leaf_index, leaf) in leaves.iter().enumerate() {
                    if let Some(offset) = leaf.offset() {
                        flat.push((measure.start + offset, number, slots.len(), leaf_index));
                    }
                }
                slots.push(leaves);
            }
        }

        flat.sort_by(|a, b| a.0.cmp(&b.0));
        let absolute: Vec<Event> = flat
            .iter()
            .map(|&(onset, number, slot, leaf)| measures[&number][slot][leaf].clone().with_offset(onset))
            .collect();
        let flags = mark_passing_tones(&absolute, params);

        let mut passing = 0usize;
        for (&flag, &(_, number, slot, leaf)) in flags.iter().zip(&flat) {
            if let Some(event) = measures
                .get_mut(&number)
                .and_then(|slots| slots.get_mut(slot))
                .and_then(|leaves| leaves.get_mut(leaf))
            {
                event.set_passing(flag);
                passing += usize::from(flag);
            }
        }
        debug!(
            events = absolute.len(),
            passing,
            measures = measures.len(),
            "indexed score"
        );

        Self {
            time_signature: provider.time_signature(),
            measures,
        }
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    /// Analyzed measure numbers in ascending order.
    pub fn measure_numbers(&self) -> Vec<u32> {
        self.measures.keys().copied().collect()
    }

    /// Notes overlapping `[start, stop)` in quarter notes from the downbeat.
    ///
    /// Notes that began earlier and are still sounding count; durations are
    /// not clipped to the span.
    pub fn notes_in_measure(&self, number: u32, start: Offset, stop: Offset) -> Vec<Note> {
        let Some(slots) = self.measures.get(&number) else {
            return Vec::new();
        };
        slots
            .iter()
            .flatten()
            .filter(|event| overlaps(event, start, stop))
            .flat_map(Event::flatten_to_notes)
            .collect()
    }

    /// One observation symbol per eighth note of every measure, in order.
    pub fn observations(&self) -> Vec<String> {
        let eighths = self.time_signature.eighths_per_measure();
        self.measures
            .keys()
            .flat_map(|&number| {
                (0..eighths).map(move |i| observation_symbol(&self.notes_in_span(number, i, i + 1)))
            })
            .collect()
    }
}

impl NoteSource for IndexedScore {
    fn notes_in_span(&self, measure: u32, start_unit: u32, stop_unit: u32) -> Vec<Note> {
        self.notes_in_measure(
            measure,
            Offset::new(start_unit as i64, 2),
            Offset::new(stop_unit as i64, 2),
        )
    }
}

fn overlaps(event: &Event, start: Offset, stop: Offset) -> bool {
    let (Some(onset), Some(duration)) = (event.offset(), event.duration()) else {
        return false;
    };
    if onset >= stop {
        return false;
    }
    onset + duration > start || (duration == Offset::from_integer(0) && onset >= start)
}

/// Sorted distinct pitch classes joined by commas, or `None` for silence.
pub fn observation_symbol(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "None".to_string();
    }
    notes
        .iter()
        .map(Note::pitch_class)
        .collect::<PitchClassSet>()
        .to_string()
}
