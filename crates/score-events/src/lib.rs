pub mod index;
pub mod note;
pub mod passing;
pub mod score;

pub use index::{observation_symbol, IndexedScore, NoteSource};
pub use note::{ChordEvent, Event, Note};
pub use passing::{mark_passing_tones, PassingToneParams};
pub use score::{Measure, Part, Score, ScoreProvider, TimeSignature};

/// Offsets and durations in quarter notes.
pub type Offset = num_rational::Rational64;

/// Errors from building score structures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid time signature {numerator}/{denominator}")]
    InvalidTimeSignature { numerator: u8, denominator: u8 },
}

pub type Result<T> = std::result::Result<T, Error>;
