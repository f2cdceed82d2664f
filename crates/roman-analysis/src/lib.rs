//! Roman-numeral analysis of notated piano music.
//!
//! Pipeline, per piece:
//!
//! 1. [`IndexedScore::observations`](score_events::IndexedScore::observations)
//!    turns every eighth note into a pitch-class observation.
//! 2. [`KeyModel`] decodes the most likely key at each eighth (Viterbi).
//! 3. [`labeler`] scores template [`Section`]s against each checked
//!    sub-span and greedily covers every measure, biased by the
//!    [`MarkovModel`] of chord transitions.
//! 4. [`mod@refine`] repairs systematic errors in the raw labels.
//!
//! [`RomanAnalyzer`] runs the whole thing.

pub mod analysis_text;
pub mod config;
pub mod engine;
pub mod hmm;
pub mod keys;
pub mod label;
pub mod labeler;
pub mod markov;
pub mod refine;
pub mod section;
pub mod spans;

pub use analysis_text::parse_analysis;
pub use config::{AnalysisConfig, ConfigError, ConfigSources, TransitionsConfig};
pub use engine::{ModelPaths, RomanAnalyzer, TransitionSource};
pub use hmm::Hmm;
pub use keys::{KeyModel, KeyState, TrainingSet};
pub use label::{beat_grid, GridSlot, Label};
pub use labeler::LabelerParams;
pub use markov::MarkovModel;
pub use refine::refine;
pub use section::{ProfileWeights, Section, TemplateCatalog};
pub use spans::{spans_to_check, Span};

/// Errors from loading models and catalogs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed template record {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("training set contains no observations")]
    EmptyTrainingSet,

    #[error("unsupported meter {numerator}/{denominator}")]
    UnsupportedMeter { numerator: u8, denominator: u8 },

    #[error(transparent)]
    Harmony(#[from] harmony::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
