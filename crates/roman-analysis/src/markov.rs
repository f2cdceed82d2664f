//! First-order chord-transition prior.

use std::collections::BTreeMap;

use harmony::RomanNumeral;
use tracing::debug;

use crate::label::Label;
use crate::{Error, Result};

/// Probability of one numeral following another within a key.
///
/// With `use_inversions` off, numerals are compared by degree and
/// secondary degree only (`V65/V` and `V/V` are the same symbol).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkovModel {
    table: BTreeMap<String, BTreeMap<String, f64>>,
    use_inversions: bool,
}

impl MarkovModel {
    pub fn new(table: BTreeMap<String, BTreeMap<String, f64>>, use_inversions: bool) -> Self {
        Self {
            table,
            use_inversions,
        }
    }

    /// Parses the table format: one source numeral per line followed by
    /// `target probability` pairs.
    pub fn parse(text: &str, use_inversions: bool) -> Result<Self> {
        let mut table = BTreeMap::new();
        for (i, line) in text.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let Some(source) = fields.next() else {
                continue;
            };
            let rest: Vec<&str> = fields.collect();
            if rest.len() % 2 != 0 {
                return Err(Error::MalformedLine {
                    line: i + 1,
                    reason: format!("{source}: unpaired target {:?}", rest[rest.len() - 1]),
                });
            }
            let targets = rest
                .chunks(2)
                .map(|pair| {
                    let p: f64 = pair[1].parse().map_err(|e| Error::MalformedLine {
                        line: i + 1,
                        reason: format!("{source} → {}: {e}", pair[0]),
                    })?;
                    Ok((pair[0].to_string(), p))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            table.insert(source.to_string(), targets);
        }
        Ok(Self::new(table, use_inversions))
    }

    /// Estimates transitions from labelled analyses. Only adjacent pairs in
    /// the same key count; each source's outgoing probabilities sum to 1.
    pub fn train(analyses: &[Vec<Label>], use_inversions: bool) -> Self {
        let mut counts: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();
        let mut pairs = 0usize;
        for analysis in analyses {
            for window in analysis.windows(2) {
                let (a, b) = (&window[0], &window[1]);
                if a.key != b.key {
                    continue;
                }
                let source = symbol(&a.numeral, use_inversions);
                let target = symbol(&b.numeral, use_inversions);
                *counts.entry(source).or_default().entry(target).or_insert(0) += 1;
                pairs += 1;
            }
        }

        let table = counts
            .into_iter()
            .map(|(source, targets)| {
                let total: u32 = targets.values().sum();
                let row = targets
                    .into_iter()
                    .map(|(t, n)| (t, n as f64 / total as f64))
                    .collect();
                (source, row)
            })
            .collect::<BTreeMap<_, _>>();
        debug!(sources = table.len(), pairs, "trained transition model");
        Self::new(table, use_inversions)
    }

    pub fn use_inversions(&self) -> bool {
        self.use_inversions
    }

    pub fn sources(&self) -> usize {
        self.table.len()
    }

    /// Probability that `t` follows `s`: 1 when they are the same symbol,
    /// 0 when the table has no entry.
    pub fn score(&self, s: &RomanNumeral, t: &RomanNumeral) -> f64 {
        self.symbol_score(&symbol(s, self.use_inversions), &symbol(t, self.use_inversions))
    }

    /// Mean transition probability over the changes in `numerals`; 1 when
    /// there are none.
    pub fn list_score(&self, numerals: &[RomanNumeral]) -> f64 {
        let symbols: Vec<String> = numerals
            .iter()
            .map(|n| symbol(n, self.use_inversions))
            .collect();
        let scores: Vec<f64> = symbols
            .windows(2)
            .filter(|w| w[0] != w[1])
            .map(|w| self.symbol_score(&w[0], &w[1]))
            .collect();
        if scores.is_empty() {
            return 1.0;
        }
        scores.iter().sum::<f64>() / scores.len() as f64
    }

    fn symbol_score(&self, s: &str, t: &str) -> f64 {
        if s == t {
            return 1.0;
        }
        self.table
            .get(s)
            .and_then(|row| row.get(t))
            .copied()
            .unwrap_or(0.0)
    }
}

fn symbol(numeral: &RomanNumeral, use_inversions: bool) -> String {
    if use_inversions {
        numeral.as_str().to_string()
    } else {
        numeral.reduced().as_str().to_string()
    }
}
