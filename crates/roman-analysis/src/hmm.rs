//! Discrete hidden Markov model with add-one smoothing and Viterbi decoding.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{Error, Result};

/// A supervised-trained HMM over states `S` and observation symbols `O`.
///
/// States are kept in sorted order; decoding ties always resolve to the
/// state that sorts first, so results are reproducible. Observations never
/// seen in training share a single reserved symbol.
#[derive(Debug, Clone)]
pub struct Hmm<S, O> {
    states: Vec<S>,
    /// symbol → column in `emission`; column `symbols.len()` is the unseen symbol
    symbols: BTreeMap<O, usize>,
    /// Natural-log probabilities.
    start: Vec<f64>,
    transition: Vec<Vec<f64>>,
    emission: Vec<Vec<f64>>,
}

impl<S: Ord + Clone, O: Ord + Clone> Hmm<S, O> {
    /// Counts starts, transitions and emissions over labelled sequences.
    /// Every count begins at 1 so nothing has zero probability.
    pub fn train(sequences: &[Vec<(S, O)>]) -> Result<Self> {
        let states: Vec<S> = sequences
            .iter()
            .flatten()
            .map(|(s, _)| s.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if states.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        let symbols: BTreeMap<O, usize> = sequences
            .iter()
            .flatten()
            .map(|(_, o)| o.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, o)| (o, i))
            .collect();

        let n = states.len();
        let state_index = |s: &S| states.binary_search(s).unwrap_or_default();
        let mut start = vec![1.0; n];
        let mut transition = vec![vec![1.0; n]; n];
        let mut emission = vec![vec![1.0; symbols.len() + 1]; n];

        for sequence in sequences {
            let Some((first, _)) = sequence.first() else {
                continue;
            };
            start[state_index(first)] += 1.0;
            for (state, symbol) in sequence {
                emission[state_index(state)][symbols[symbol]] += 1.0;
            }
            for pair in sequence.windows(2) {
                transition[state_index(&pair[0].0)][state_index(&pair[1].0)] += 1.0;
            }
        }

        debug!(
            states = n,
            symbols = symbols.len(),
            sequences = sequences.len(),
            "trained hmm"
        );

        Ok(Self {
            states,
            symbols,
            start: log_normalized(&start),
            transition: transition.iter().map(|row| log_normalized(row)).collect(),
            emission: emission.iter().map(|row| log_normalized(row)).collect(),
        })
    }

    pub fn states(&self) -> &[S] {
        &self.states
    }

    /// Most likely state sequence for `observations`.
    pub fn decode(&self, observations: &[O]) -> Vec<S> {
        if observations.is_empty() {
            return Vec::new();
        }
        let unseen = self.symbols.len();
        let columns: Vec<usize> = observations
            .iter()
            .map(|o| self.symbols.get(o).copied().unwrap_or(unseen))
            .collect();
        let n = self.states.len();

        let mut score: Vec<f64> = (0..n)
            .map(|s| self.start[s] + self.emission[s][columns[0]])
            .collect();
        let mut back: Vec<Vec<usize>> = Vec::with_capacity(columns.len());

        for &column in &columns[1..] {
            let mut next = vec![f64::NEG_INFINITY; n];
            let mut from = vec![0usize; n];
            for s in 0..n {
                let (best, arg) = argmax((0..n).map(|p| score[p] + self.transition[p][s]));
                next[s] = best + self.emission[s][column];
                from[s] = arg;
            }
            score = next;
            back.push(from);
        }

        let (_, mut state) = argmax(score.iter().copied());
        let mut path = vec![state];
        for from in back.iter().rev() {
            state = from[state];
            path.push(state);
        }
        path.reverse();
        path.into_iter().map(|s| self.states[s].clone()).collect()
    }
}

/// First maximum of a non-empty sequence.
fn argmax(values: impl Iterator<Item = f64>) -> (f64, usize) {
    let mut best = (f64::NEG_INFINITY, 0);
    for (i, v) in values.enumerate() {
        if v > best.0 {
            best = (v, i);
        }
    }
    best
}

fn log_normalized(counts: &[f64]) -> Vec<f64> {
    let total: f64 = counts.iter().sum();
    counts.iter().map(|c| (c / total).ln()).collect()
}
