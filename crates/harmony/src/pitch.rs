use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Pitch classes conventionally spelled with flats.
pub static FLAT_KEY_ROOTS: [u8; 6] = [1, 3, 5, 6, 8, 10];

/// A pitch class, C=0 through B=11. All arithmetic wraps mod 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);

    pub fn new(value: i32) -> Self {
        PitchClass(value.rem_euclid(12) as u8)
    }

    pub fn from_midi(midi: u8) -> Self {
        PitchClass(midi % 12)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn transpose(self, semitones: i32) -> Self {
        Self::new(self.0 as i32 + semitones)
    }

    /// Ascending interval in semitones (0–11) from `self` up to `other`.
    pub fn interval_to(self, other: PitchClass) -> u8 {
        (other.0 + 12 - self.0) % 12
    }

    pub fn name(self, use_flats: bool) -> &'static str {
        if use_flats {
            NOTE_NAMES_FLAT[self.0 as usize]
        } else {
            NOTE_NAMES_SHARP[self.0 as usize]
        }
    }

    /// Whether a key on this tonic is conventionally spelled with flats.
    pub fn prefers_flats(self) -> bool {
        FLAT_KEY_ROOTS.contains(&self.0)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name(self.prefers_flats()))
    }
}

/// Parses a note name: a letter, any number of sharps (`#`, `s`) or
/// flats (`b`, `-`), and an optional octave number which is ignored.
impl FromStr for PitchClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let natural = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(Error::UnknownPitchName(s.to_string())),
        };

        let mut offset = 0i32;
        for c in chars {
            match c {
                '#' | 's' => offset += 1,
                'b' | '-' => offset -= 1,
                '0'..='9' => {}
                _ => return Err(Error::UnknownPitchName(s.to_string())),
            }
        }

        Ok(PitchClass::new(natural + offset))
    }
}

/// A set of pitch classes stored as a 12-bit mask (bit i = pitch class i).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PitchClassSet(u16);

impl PitchClassSet {
    pub const fn from_intervals(intervals: &[u8]) -> Self {
        let mut mask = 0u16;
        let mut i = 0;
        while i < intervals.len() {
            mask |= 1 << (intervals[i] % 12);
            i += 1;
        }
        Self(mask)
    }

    pub fn from_midi(pitches: &[u8]) -> Self {
        pitches.iter().map(|&p| PitchClass::from_midi(p)).collect()
    }

    pub fn insert(&mut self, pc: PitchClass) {
        self.0 |= 1 << pc.value();
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        self.0 & (1 << pc.value()) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Every member moved up by `semitones` (negative moves down).
    pub fn transpose(self, semitones: i32) -> Self {
        let shift = semitones.rem_euclid(12) as u32;
        let mask = self.0 as u32;
        Self((((mask << shift) | (mask >> (12 - shift))) & 0xFFF) as u16)
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = PitchClass> + '_ {
        (0..12u8)
            .filter(move |&i| self.0 & (1 << i) != 0)
            .map(PitchClass)
    }
}

impl FromIterator<PitchClass> for PitchClassSet {
    fn from_iter<I: IntoIterator<Item = PitchClass>>(iter: I) -> Self {
        let mut set = PitchClassSet::default();
        for pc in iter {
            set.insert(pc);
        }
        set
    }
}

/// Comma-separated ascending members, e.g. `0,4,7`.
impl fmt::Display for PitchClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for pc in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}", pc.value())?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_wraps() {
        for p in 0..12 {
            for t in -24..24 {
                let moved = PitchClass::new(p).transpose(t);
                assert!(moved.value() < 12);
                assert_eq!(moved, PitchClass::new(p + t));
            }
        }
        assert_eq!(PitchClass::new(-1).value(), 11);
        assert_eq!(PitchClass::from_midi(61).value(), 1);
    }

    #[test]
    fn interval_is_ascending() {
        assert_eq!(PitchClass::new(0).interval_to(PitchClass::new(7)), 7);
        assert_eq!(PitchClass::new(7).interval_to(PitchClass::new(0)), 5);
        assert_eq!(PitchClass::new(4).interval_to(PitchClass::new(4)), 0);
    }

    #[test]
    fn parse_pitch_names() {
        assert_eq!("C".parse::<PitchClass>().unwrap().value(), 0);
        assert_eq!("Ab4".parse::<PitchClass>().unwrap().value(), 8);
        assert_eq!("F#".parse::<PitchClass>().unwrap().value(), 6);
        assert_eq!("B-".parse::<PitchClass>().unwrap().value(), 10);
        assert_eq!("cb".parse::<PitchClass>().unwrap().value(), 11);
        assert_eq!("A##b".parse::<PitchClass>().unwrap().value(), 10);
        assert!("H".parse::<PitchClass>().is_err());
        assert!("".parse::<PitchClass>().is_err());
    }

    #[test]
    fn spelling_follows_key_convention() {
        assert_eq!(PitchClass::new(10).to_string(), "Bb");
        assert_eq!(PitchClass::new(6).to_string(), "Gb");
        assert_eq!(PitchClass::new(7).to_string(), "G");
        assert_eq!(PitchClass::new(6).name(false), "F#");
    }

    #[test]
    fn set_transpose_rotates() {
        let c_major = PitchClassSet::from_intervals(&[0, 4, 7]);
        let g_major = PitchClassSet::from_intervals(&[7, 11, 2]);
        assert_eq!(c_major.transpose(7), g_major);
        assert_eq!(g_major.transpose(-7), c_major);
        assert_eq!(c_major.transpose(12), c_major);
        assert_eq!(c_major.len(), 3);
    }

    #[test]
    fn set_display_is_sorted() {
        let set = PitchClassSet::from_midi(&[67, 60, 76, 48]);
        assert_eq!(set.to_string(), "0,4,7");
        assert_eq!(PitchClassSet::default().to_string(), "");
    }
}
