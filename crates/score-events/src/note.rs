use harmony::PitchClass;
use serde::{Deserialize, Serialize};

use crate::Offset;

/// A single sounding pitch with measure-relative timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub midi: u8,
    pub offset: Offset,
    pub duration: Offset,
    /// Set by passing-tone marking; false until a score is indexed.
    #[serde(default)]
    pub passing: bool,
}

impl Note {
    pub fn new(midi: u8, offset: Offset, duration: Offset) -> Self {
        Self {
            midi,
            offset,
            duration,
            passing: false,
        }
    }

    pub fn pitch_class(&self) -> PitchClass {
        PitchClass::from_midi(self.midi)
    }

    pub fn end(&self) -> Offset {
        self.offset + self.duration
    }
}

/// Several pitches struck together, sharing one duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordEvent {
    pub pitches: Vec<u8>,
    pub offset: Offset,
    pub duration: Offset,
    #[serde(default)]
    pub passing: bool,
}

impl ChordEvent {
    pub fn new(pitches: Vec<u8>, offset: Offset, duration: Offset) -> Self {
        Self {
            pitches,
            offset,
            duration,
            passing: false,
        }
    }
}

/// What a measure contains: notes, chords, or nested voices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Note(Note),
    Chord(ChordEvent),
    Voice(Vec<Event>),
}

impl Event {
    pub fn note(midi: u8, offset: Offset, duration: Offset) -> Self {
        Event::Note(Note::new(midi, offset, duration))
    }

    pub fn chord(pitches: Vec<u8>, offset: Offset, duration: Offset) -> Self {
        Event::Chord(ChordEvent::new(pitches, offset, duration))
    }

    /// Onset of a note or chord; voices have none of their own.
    pub fn offset(&self) -> Option<Offset> {
        match self {
            Event::Note(n) => Some(n.offset),
            Event::Chord(c) => Some(c.offset),
            Event::Voice(_) => None,
        }
    }

    pub fn duration(&self) -> Option<Offset> {
        match self {
            Event::Note(n) => Some(n.duration),
            Event::Chord(c) => Some(c.duration),
            Event::Voice(_) => None,
        }
    }

    pub fn end(&self) -> Option<Offset> {
        Some(self.offset()? + self.duration()?)
    }

    /// Every MIDI pitch sounding in this event, voices included.
    pub fn pitches(&self) -> Vec<u8> {
        match self {
            Event::Note(n) => vec![n.midi],
            Event::Chord(c) => c.pitches.clone(),
            Event::Voice(children) => children.iter().flat_map(Event::pitches).collect(),
        }
    }

    /// The same note or chord moved to start at `offset`.
    pub fn with_offset(self, offset: Offset) -> Self {
        match self {
            Event::Note(n) => Event::Note(Note { offset, ..n }),
            Event::Chord(c) => Event::Chord(ChordEvent { offset, ..c }),
            voice => voice,
        }
    }

    pub fn is_passing(&self) -> bool {
        match self {
            Event::Note(n) => n.passing,
            Event::Chord(c) => c.passing,
            Event::Voice(_) => false,
        }
    }

    pub fn set_passing(&mut self, passing: bool) {
        match self {
            Event::Note(n) => n.passing = passing,
            Event::Chord(c) => c.passing = passing,
            Event::Voice(_) => {}
        }
    }

    /// Notes and chords with voices dissolved, in document order.
    pub fn leaves(&self) -> Vec<Event> {
        match self {
            Event::Voice(children) => children.iter().flat_map(Event::leaves).collect(),
            leaf => vec![leaf.clone()],
        }
    }

    /// One `Note` per sounding pitch. Chord members share the chord's
    /// offset, duration and passing flag.
    pub fn flatten_to_notes(&self) -> Vec<Note> {
        match self {
            Event::Note(n) => vec![n.clone()],
            Event::Chord(c) => c
                .pitches
                .iter()
                .map(|&midi| Note {
                    midi,
                    offset: c.offset,
                    duration: c.duration,
                    passing: c.passing,
                })
                .collect(),
            Event::Voice(children) => children.iter().flat_map(Event::flatten_to_notes).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64, d: i64) -> Offset {
        Offset::new(n, d)
    }

    #[test]
    fn chord_expands_to_shared_timing() {
        let mut chord = Event::chord(vec![60, 64, 67], q(1, 2), q(1, 1));
        chord.set_passing(true);
        let notes = chord.flatten_to_notes();
        assert_eq!(notes.len(), 3);
        assert!(notes.iter().all(|n| n.offset == q(1, 2) && n.duration == q(1, 1) && n.passing));
        assert_eq!(notes[1].pitch_class().value(), 4);
    }

    #[test]
    fn voices_flatten_recursively() {
        let voice = Event::Voice(vec![
            Event::note(72, q(0, 1), q(1, 1)),
            Event::Voice(vec![Event::chord(vec![48, 55], q(0, 1), q(2, 1))]),
        ]);
        assert_eq!(voice.flatten_to_notes().len(), 3);
        assert_eq!(voice.leaves().len(), 2);
        assert_eq!(voice.pitches(), vec![72, 48, 55]);
        assert_eq!(voice.offset(), None);
    }

    #[test]
    fn end_is_offset_plus_duration() {
        let note = Event::note(60, q(3, 2), q(1, 2));
        assert_eq!(note.end(), Some(q(2, 1)));
    }
}
