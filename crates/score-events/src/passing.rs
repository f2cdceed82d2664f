use serde::{Deserialize, Serialize};

use crate::note::Event;

/// Parameters controlling passing-tone detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassingToneParams {
    /// Neighbouring events searched on each side. Default: 10.
    pub window: usize,
    /// Largest interval (semitones) that still counts as a step. Default: 2.
    pub max_step: u8,
}

impl Default for PassingToneParams {
    fn default() -> Self {
        Self {
            window: 10,
            max_step: 2,
        }
    }
}

/// Flags each event that moves by step into and out of its neighbours.
///
/// `events` must be notes and chords in score order with absolute offsets.
/// An event is passing when every one of its pitches lies within
/// `max_step` of some pitch ending exactly at its onset, and also of some
/// pitch starting exactly at its end. Events with no abutting neighbour on
/// either side are never passing.
pub fn mark_passing_tones(events: &[Event], params: &PassingToneParams) -> Vec<bool> {
    let len = events.len();
    events
        .iter()
        .enumerate()
        .map(|(i, event)| {
            let (Some(onset), Some(end)) = (event.offset(), event.end()) else {
                return false;
            };
            let pitches = event.pitches();

            let left: Vec<u8> = events[i.saturating_sub(params.window)..i]
                .iter()
                .filter(|other| other.end() == Some(onset))
                .flat_map(Event::pitches)
                .collect();
            let right: Vec<u8> = events[i + 1..(i + 1 + params.window).min(len)]
                .iter()
                .filter(|other| other.offset() == Some(end))
                .flat_map(Event::pitches)
                .collect();

            is_stepwise(&pitches, &left, params.max_step)
                && is_stepwise(&pitches, &right, params.max_step)
        })
        .collect()
}

fn is_stepwise(pitches: &[u8], neighbours: &[u8], max_step: u8) -> bool {
    pitches
        .iter()
        .all(|&p| neighbours.iter().any(|&q| p.abs_diff(q) <= max_step))
}
