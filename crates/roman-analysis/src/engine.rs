use std::path::{Path, PathBuf};

use anyhow::Context;
use score_events::{IndexedScore, ScoreProvider};
use tracing::info;

use crate::analysis_text::parse_analysis;
use crate::config::AnalysisConfig;
use crate::keys::{KeyModel, TrainingSet};
use crate::label::Label;
use crate::labeler::{label_piece, LabelerContext};
use crate::markov::MarkovModel;
use crate::refine::refine;
use crate::section::TemplateCatalog;
use crate::spans::spans_to_check;
use crate::Result;

/// Where the transition prior comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionSource {
    /// A stored transition table.
    Table(PathBuf),
    /// Hand-written analyses to count transitions from.
    Analyses(Vec<PathBuf>),
}

/// Model files for [`RomanAnalyzer::from_files`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPaths {
    /// Key training texts; each file is at least one sequence.
    pub key_training: Vec<PathBuf>,
    pub transitions: TransitionSource,
    pub major_templates: PathBuf,
    pub minor_templates: PathBuf,
}

/// Roman-numeral analysis engine.
///
/// Owns the trained key model, the transition prior and the template
/// catalog; all three are read-only once built, so one analyzer can serve
/// any number of pieces.
#[derive(Debug, Clone)]
pub struct RomanAnalyzer {
    key_model: KeyModel,
    transitions: MarkovModel,
    templates: TemplateCatalog,
    config: AnalysisConfig,
}

impl RomanAnalyzer {
    pub fn new(
        key_model: KeyModel,
        transitions: MarkovModel,
        templates: TemplateCatalog,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            key_model,
            transitions,
            templates,
            config,
        }
    }

    /// Builds every model from files on disk.
    pub fn from_files(paths: &ModelPaths, config: AnalysisConfig) -> anyhow::Result<Self> {
        let mut training = TrainingSet::default();
        for path in &paths.key_training {
            training
                .add_text(&read(path)?)
                .with_context(|| format!("parsing key training data {}", path.display()))?;
        }
        let key_model = KeyModel::train(&training).context("training key model")?;

        let use_inversions = config.transitions.use_inversions;
        let transitions = match &paths.transitions {
            TransitionSource::Table(path) => MarkovModel::parse(&read(path)?, use_inversions)
                .with_context(|| format!("parsing transition table {}", path.display()))?,
            TransitionSource::Analyses(files) => {
                let mut analyses = Vec::with_capacity(files.len());
                for path in files {
                    let labels = parse_analysis(&read(path)?)
                        .with_context(|| format!("parsing analysis {}", path.display()))?;
                    analyses.push(labels);
                }
                MarkovModel::train(&analyses, use_inversions)
            }
        };

        let templates = TemplateCatalog::from_texts(&read(&paths.major_templates)?, &read(&paths.minor_templates)?)
            .context("parsing chord templates")?;
        info!(
            keys = key_model.keys().len(),
            transitions = transitions.sources(),
            use_inversions = transitions.use_inversions(),
            major_templates = templates.major.len(),
            minor_templates = templates.minor.len(),
            "loaded analysis models"
        );

        Ok(Self::new(key_model, transitions, templates, config))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Indexes a score with this analyzer's passing-tone settings.
    pub fn index<P: ScoreProvider + ?Sized>(&self, provider: &P) -> IndexedScore {
        IndexedScore::new(provider, &self.config.passing)
    }

    /// Runs the whole pipeline on a parsed score.
    pub fn analyze_score<P: ScoreProvider + ?Sized>(&self, provider: &P) -> Result<Vec<Label>> {
        self.analyze(&self.index(provider))
    }

    /// Decodes keys, labels every measure and refines the result.
    pub fn analyze(&self, score: &IndexedScore) -> Result<Vec<Label>> {
        let meter = score.time_signature();
        let spans = spans_to_check(meter.numerator(), meter.denominator())?;
        let measures = score.measure_numbers();

        let observations = score.observations();
        let keys = self.key_model.decode(&observations);

        let ctx = LabelerContext {
            catalog: &self.templates,
            transitions: &self.transitions,
            weights: &self.config.profile,
            params: &self.config.labeler,
        };
        let raw = label_piece(score, &measures, &spans, &keys, &ctx);
        let raw_count = raw.len();
        let labels = refine(raw, score);

        info!(
            %meter,
            measures = measures.len(),
            eighths = observations.len(),
            raw = raw_count,
            labels = labels.len(),
            "analyzed piece"
        );
        Ok(labels)
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use score_events::{Event, Measure, Offset, Part, Score, TimeSignature};

    const MAJOR: &str = "\
I
3 0 0 0 2 0 0 2 0 0 0 0
1 0 0 0 0 0 0 0 0 0 0 0
1 0 0 0 1 0 0 1 0 0 0 0
";

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn one_chord_score(meter: TimeSignature) -> Score {
        Score {
            time_signature: meter,
            parts: vec![Part {
                measures: vec![Measure {
                    number: 1,
                    start: Offset::from_integer(0),
                    events: vec![Event::chord(vec![48, 64, 67], Offset::from_integer(0), meter.measure_length())],
                }],
            }],
        }
    }

    #[test]
    fn loads_models_and_analyzes() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ModelPaths {
            key_training: vec![write(dir.path(), "keys.txt", "0-True 0,4,7\n0-True 0,4,7\n")],
            transitions: TransitionSource::Analyses(vec![write(dir.path(), "a.txt", "m1 C: I b3 V\nm2 I\n")]),
            major_templates: write(dir.path(), "major.txt", MAJOR),
            minor_templates: write(dir.path(), "minor.txt", MAJOR),
        };
        let analyzer = RomanAnalyzer::from_files(&paths, AnalysisConfig::default()).unwrap();
        let labels = analyzer
            .analyze_score(&one_chord_score(TimeSignature::new(4, 4).unwrap()))
            .unwrap();

        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].numeral, "I");
        assert_eq!((labels[0].start_unit, labels[0].stop_unit), (0, 8));
    }

    #[test]
    fn missing_files_are_named() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ModelPaths {
            key_training: vec![dir.path().join("absent.txt")],
            transitions: TransitionSource::Table(dir.path().join("table.txt")),
            major_templates: dir.path().join("major.txt"),
            minor_templates: dir.path().join("minor.txt"),
        };
        let err = RomanAnalyzer::from_files(&paths, AnalysisConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("absent.txt"));
    }

    #[test]
    fn unsupported_meters_are_reported() {
        let training = TrainingSet::parse("0-True 0,4,7").unwrap();
        let analyzer = RomanAnalyzer::new(
            KeyModel::train(&training).unwrap(),
            MarkovModel::default(),
            TemplateCatalog::from_texts(MAJOR, MAJOR).unwrap(),
            AnalysisConfig::default(),
        );
        let err = analyzer
            .analyze_score(&one_chord_score(TimeSignature::new(5, 4).unwrap()))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMeter { numerator: 5, denominator: 4 }));
    }
}
