//! Roman-numeral grammar.
//!
//! A numeral is `[degree][quality marker][inversion figures][/secondary]`,
//! for example `I`, `ii6`, `viio7`, `ii/o65`, `V43/V`. Case of the degree
//! encodes the quality of the third: uppercase major, lowercase minor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

const NUMERAL_CHARS: &str = "iIvVN+o/234567";
const LEADING_CHARS: &str = "ivIVN";
const DEGREE_CHARS: &str = "ivIV";

pub(crate) const NUMERALS: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

/// Semitones above the tonic for each degree. Degrees III, VI and VII have
/// two variants: the first is the minor-key (uppercase) form, the second
/// the major-key (lowercase) form.
pub(crate) const NUMERAL_CLASSES: [&[u8]; 7] = [&[0], &[2], &[3, 4], &[5], &[7], &[8, 9], &[10, 11]];

/// A validated Roman numeral. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RomanNumeral(String);

impl RomanNumeral {
    /// Parse and validate a numeral. Figures written with a slash
    /// (`V6/5`) are normalized to the compact form (`V65`).
    pub fn parse(text: &str) -> crate::Result<Self> {
        let compact = without_figure_slash(text);
        validate(&compact)?;
        Ok(Self(compact))
    }

    /// Numeral from a literal in a fixed rewrite table.
    pub fn from_static(text: &'static str) -> Self {
        debug_assert!(validate(text).is_ok(), "invalid numeral literal {text:?}");
        Self(text.to_string())
    }

    pub(crate) fn new_unchecked(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the textual form; shorter numerals are preferred on ties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The bare degree letters, e.g. `vii` for `viio65`.
    pub fn just_numeral(&self) -> &str {
        just_numeral(&self.0)
    }

    /// Degree plus secondary degree with inversion and quality stripped:
    /// `V65/V` becomes `V/V`, `ii6` becomes `ii`.
    pub fn root_class(&self) -> String {
        root_class(&self.0)
    }

    /// Same degree (ignoring case), differing at most in inversion or quality.
    pub fn same_root_class(&self, other: &RomanNumeral) -> bool {
        self.root_class().eq_ignore_ascii_case(&other.root_class())
    }

    /// Reduced form used when inversions are ignored.
    pub fn reduced(&self) -> RomanNumeral {
        RomanNumeral(self.root_class())
    }

    pub fn is_augmented(&self) -> bool {
        self.0.contains('+')
    }

    /// Diminished triad or fully-diminished seventh.
    pub fn is_diminished(&self) -> bool {
        is_diminished(&self.0)
    }

    pub fn is_half_diminished(&self) -> bool {
        match self.0.find('o') {
            Some(i) => i > 0 && self.0.as_bytes()[i - 1] == b'/',
            None => false,
        }
    }

    /// Text after the last slash when it names a degree (`V` in `V7/V`).
    pub fn secondary(&self) -> Option<&str> {
        let i = self.0.rfind('/')?;
        let after = &self.0[i + 1..];
        NUMERALS
            .contains(&after.to_ascii_uppercase().as_str())
            .then_some(after)
    }

    /// Semitones of the numeral's root above its (local) tonic.
    pub fn interval_from_tonic(&self) -> Option<u8> {
        interval_from_tonic(&self.0)
    }

    /// Figured form with a slash between adjacent figures: `V65` → `V6/5`.
    pub fn figured(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + 2);
        let bytes = self.0.as_bytes();
        for (i, &b) in bytes.iter().enumerate() {
            out.push(b as char);
            if i + 1 < bytes.len() && b.is_ascii_digit() && bytes[i + 1].is_ascii_digit() {
                out.push('/');
            }
        }
        out
    }
}

impl fmt::Display for RomanNumeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RomanNumeral {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RomanNumeral::parse(s)
    }
}

impl TryFrom<String> for RomanNumeral {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RomanNumeral::parse(&value)
    }
}

impl From<RomanNumeral> for String {
    fn from(value: RomanNumeral) -> Self {
        value.0
    }
}

impl PartialEq<str> for RomanNumeral {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RomanNumeral {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

fn validate(text: &str) -> crate::Result<()> {
    let malformed = |reason: &str| Error::MalformedNumeral {
        numeral: text.to_string(),
        reason: reason.to_string(),
    };

    let first = text.chars().next().ok_or_else(|| malformed("empty"))?;
    if let Some(c) = text.chars().find(|c| !NUMERAL_CHARS.contains(*c)) {
        return Err(malformed(&format!("unexpected character {c:?}")));
    }
    if !LEADING_CHARS.contains(first) {
        return Err(malformed("must start with a degree"));
    }
    Ok(())
}

/// Removes the first slash that sits between two figures.
fn without_figure_slash(text: &str) -> String {
    let bytes = text.as_bytes();
    for i in 1..bytes.len().saturating_sub(1) {
        if bytes[i] == b'/' && bytes[i - 1].is_ascii_digit() && bytes[i + 1].is_ascii_digit() {
            return format!("{}{}", &text[..i], &text[i + 1..]);
        }
    }
    text.to_string()
}

pub(crate) fn just_numeral(text: &str) -> &str {
    let end = text
        .find(|c: char| !DEGREE_CHARS.contains(c))
        .unwrap_or(text.len());
    &text[..end]
}

fn root_class(text: &str) -> String {
    let Some(j) = text.find('/') else {
        return just_numeral(text).to_string();
    };
    let mut result = format!(
        "{}/{}",
        just_numeral(&text[..j]),
        just_numeral(&text[j + 1..])
    );
    if result.ends_with('/') {
        result.pop();
    }
    result
}

pub(crate) fn is_diminished(text: &str) -> bool {
    match text.find('o') {
        Some(i) => !(i > 0 && text.as_bytes()[i - 1] == b'/'),
        None => false,
    }
}

/// Semitones of a numeral's degree above the tonic. Uppercase III, VI
/// and VII take the minor-key variant, lowercase the major-key one.
pub(crate) fn interval_from_tonic(text: &str) -> Option<u8> {
    let degree_text = just_numeral(text);
    let degree = NUMERALS
        .iter()
        .position(|n| *n == degree_text.to_ascii_uppercase())?;
    let candidates = NUMERAL_CLASSES[degree];
    if candidates.len() == 1 || degree_text.chars().all(|c| c.is_ascii_uppercase()) {
        Some(candidates[0])
    } else {
        Some(candidates[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rn(s: &str) -> RomanNumeral {
        RomanNumeral::parse(s).unwrap()
    }

    #[test]
    fn accepts_well_formed_numerals() {
        for s in ["I", "ii6", "V7", "viio7", "ii/o65", "V43/V", "N6", "III+", "iv64"] {
            assert!(RomanNumeral::parse(s).is_ok(), "{s} should parse");
        }
    }

    #[test]
    fn rejects_malformed_numerals() {
        for s in ["", "6", "o7", "X", "V9", "Ger6", "+I"] {
            assert!(
                matches!(RomanNumeral::parse(s), Err(Error::MalformedNumeral { .. })),
                "{s} should be rejected"
            );
        }
    }

    #[test]
    fn figure_slash_is_compacted() {
        assert_eq!(rn("ii6/5").as_str(), "ii65");
        assert_eq!(rn("V6/4/V").as_str(), "V64/V");
        assert_eq!(rn("vii/o7").as_str(), "vii/o7");
        assert_eq!(rn("V43").figured(), "V4/3");
        assert_eq!(rn("V65/V").figured(), "V6/5/V");
    }

    #[test]
    fn parse_is_left_inverse_of_display() {
        for s in ["I", "V65/V", "ii/o7", "viio43", "IV64"] {
            let numeral = rn(s);
            assert_eq!(rn(&numeral.to_string()), numeral);
        }
    }

    #[test]
    fn root_class_strips_figures() {
        assert_eq!(rn("V65/V").root_class(), "V/V");
        assert_eq!(rn("ii6").root_class(), "ii");
        assert_eq!(rn("ii/o7").root_class(), "ii");
        assert_eq!(rn("viio7").root_class(), "vii");
        assert!(rn("I6").same_root_class(&rn("I64")));
        assert!(rn("V7").same_root_class(&rn("v")));
        assert!(!rn("V7").same_root_class(&rn("V7/V")));
        assert_eq!(rn("V65/V").reduced().as_str(), "V/V");
    }

    #[test]
    fn quality_markers() {
        assert!(rn("viio7").is_diminished());
        assert!(!rn("viio7").is_half_diminished());
        assert!(rn("vii/o7").is_half_diminished());
        assert!(!rn("vii/o7").is_diminished());
        assert!(rn("III+").is_augmented());
        assert!(!rn("V7").is_diminished());
    }

    #[test]
    fn degree_intervals_follow_case() {
        assert_eq!(rn("V").interval_from_tonic(), Some(7));
        assert_eq!(rn("iv").interval_from_tonic(), Some(5));
        assert_eq!(rn("vi").interval_from_tonic(), Some(9));
        assert_eq!(rn("VI").interval_from_tonic(), Some(8));
        assert_eq!(rn("iii").interval_from_tonic(), Some(4));
        assert_eq!(rn("III").interval_from_tonic(), Some(3));
        assert_eq!(rn("viio").interval_from_tonic(), Some(11));
        assert_eq!(rn("VII").interval_from_tonic(), Some(10));
        assert_eq!(rn("N6").interval_from_tonic(), None);
    }

    #[test]
    fn secondary_target() {
        assert_eq!(rn("V7/V").secondary(), Some("V"));
        assert_eq!(rn("V/vi").secondary(), Some("vi"));
        assert_eq!(rn("ii/o7").secondary(), None);
        assert_eq!(rn("I").secondary(), None);
    }
}
