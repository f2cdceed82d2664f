//! Tonal vocabulary shared by the score and analysis crates.
//!
//! - [`PitchClass`] and [`PitchClassSet`]: mod-12 pitch arithmetic.
//! - [`RomanNumeral`]: validated scale-degree labels such as `V65/V`.
//! - [`Chord`]: template matching from sounding pitches, and conversion
//!   between chords and numerals in a key.
//!
//! ```
//! use harmony::{Chord, PitchClass};
//!
//! let chord = Chord::from_midi(&[60, 64, 67]).unwrap();
//! let numeral = chord.as_roman(PitchClass::C).unwrap();
//! assert_eq!(numeral.as_str(), "I");
//! ```

pub mod chord;
pub mod numeral;
pub mod pitch;

pub use chord::{match_template, Chord, ChordQuality, ChordTemplate, TEMPLATES};
pub use numeral::RomanNumeral;
pub use pitch::{PitchClass, PitchClassSet};

/// Errors from parsing tonal vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("malformed numeral {numeral:?}: {reason}")]
    MalformedNumeral { numeral: String, reason: String },

    #[error("unknown pitch name {0:?}")]
    UnknownPitchName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
