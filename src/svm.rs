//! Linear-kernel C-SVC over `linfa-svm` machines.
//!
//! `linfa-svm` separates two classes. More than two are handled one-vs-one:
//! one machine per class pair, and prediction takes a majority vote with ties
//! going to the class that sorts first.

use linfa::prelude::*;
use linfa::Dataset;
use linfa_svm::{Svm, SvmError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmParams {
    /// Penalty on margin violations, the same for both sides of a pair.
    pub c: f64,
    /// Optimality gap at which the solver stops.
    pub epsilon: f64,
}

impl Default for SvmParams {
    fn default() -> Self {
        SvmParams { c: 1.0, epsilon: 1e-10 }
    }
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("no samples")]
    Empty,
    #[error("{samples} samples but {labels} labels")]
    LengthMismatch { samples: usize, labels: usize },
    #[error("sample {row} has {found} values, expected {expected}")]
    Ragged { row: usize, expected: usize, found: usize },
    #[error("samples must cover at least two classes")]
    SingleClass,
    #[error("sample {0} holds a non-finite value")]
    NonFinite(usize),
    #[error(transparent)]
    Solver(#[from] SvmError),
}

/// Machine separating `classes[positive]` (true) from `classes[negative]`.
#[derive(Serialize, Deserialize)]
struct PairMachine {
    positive: usize,
    negative: usize,
    machine: Svm<f64, bool>,
}

#[derive(Serialize, Deserialize)]
pub struct LinearSvm {
    classes: Vec<i32>,
    var_count: usize,
    machines: Vec<PairMachine>,
}

fn fit_pair(rows: &[&[f32]], targets: Vec<bool>, params: &SvmParams) -> Result<Svm<f64, bool>, TrainError> {
    let records = Array2::from_shape_fn((rows.len(), rows[0].len()), |(i, j)| f64::from(rows[i][j]));
    let dataset = Dataset::new(records, Array1::from(targets));
    let machine = Svm::<f64, bool>::params()
        .linear_kernel()
        .pos_neg_weights(params.c, params.c)
        .eps(params.epsilon)
        .fit(&dataset)?;
    Ok(machine)
}

impl LinearSvm {
    /// Trains on row samples; `responses[i]` is the class of `samples[i]`.
    pub fn train(samples: &[Vec<f32>], responses: &[i32], params: &SvmParams) -> Result<Self, TrainError> {
        if samples.is_empty() {
            return Err(TrainError::Empty);
        }
        if samples.len() != responses.len() {
            return Err(TrainError::LengthMismatch {
                samples: samples.len(),
                labels: responses.len(),
            });
        }
        let var_count = samples[0].len();
        if let Some((row, s)) = samples.iter().enumerate().find(|(_, s)| s.len() != var_count) {
            return Err(TrainError::Ragged {
                row,
                expected: var_count,
                found: s.len(),
            });
        }
        if let Some(row) = samples.iter().position(|s| s.iter().any(|v| !v.is_finite())) {
            return Err(TrainError::NonFinite(row));
        }

        let mut classes = responses.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(TrainError::SingleClass);
        }

        let mut machines = Vec::new();
        for positive in 0..classes.len() {
            for negative in positive + 1..classes.len() {
                let (rows, targets): (Vec<&[f32]>, Vec<bool>) = samples
                    .iter()
                    .zip(responses)
                    .filter(|(_, r)| **r == classes[positive] || **r == classes[negative])
                    .map(|(s, r)| (s.as_slice(), *r == classes[positive]))
                    .unzip();
                let machine = fit_pair(&rows, targets, params)?;
                debug!(
                    positive = classes[positive],
                    negative = classes[negative],
                    support = machine.nsupport(),
                    "pair machine trained"
                );
                machines.push(PairMachine { positive, negative, machine });
            }
        }

        Ok(LinearSvm { classes, var_count, machines })
    }

    /// Class label voted for by the most pair machines.
    pub fn predict(&self, sample: &[f32]) -> i32 {
        let record = Array2::from_shape_fn((1, sample.len()), |(_, j)| f64::from(sample[j]));
        let mut votes = vec![0usize; self.classes.len()];
        for pair in &self.machines {
            let decision: Array1<bool> = pair.machine.predict(&record);
            let winner = if decision[0] { pair.positive } else { pair.negative };
            votes[winner] += 1;
        }
        let mut best = 0;
        for (i, v) in votes.iter().enumerate() {
            if *v > votes[best] {
                best = i;
            }
        }
        self.classes[best]
    }

    pub fn classes(&self) -> &[i32] {
        &self.classes
    }

    /// Length of the samples the model was trained on.
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Structural checks for a model that came from outside, e.g. a file.
    pub fn check(&self) -> Result<(), String> {
        let k = self.classes.len();
        if k < 2 {
            return Err(format!("model has {} classes", k));
        }
        if self.classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err("class table is not sorted and unique".into());
        }
        if self.machines.len() != k * (k - 1) / 2 {
            return Err(format!("{} pair machines for {} classes", self.machines.len(), k));
        }
        let mut seen = vec![false; k * k];
        for pair in &self.machines {
            if pair.positive >= k || pair.negative >= k || pair.positive == pair.negative {
                return Err("pair machine refers to a missing class".into());
            }
            let slot = pair.positive.min(pair.negative) * k + pair.positive.max(pair.negative);
            if std::mem::replace(&mut seen[slot], true) {
                return Err("class pair trained twice".into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cluster(center: [f32; 2], n: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| {
                let dx = (i % 3) as f32 * 0.1 - 0.1;
                let dy = (i % 4) as f32 * 0.1 - 0.15;
                vec![center[0] + dx, center[1] + dy]
            })
            .collect()
    }

    #[test]
    fn separates_two_clusters() {
        let mut samples = cluster([1.0, 1.0], 12);
        samples.extend(cluster([-1.0, -1.0], 12));
        let labels: Vec<i32> = (0..24).map(|i| if i < 12 { 0 } else { 1 }).collect();

        let model = LinearSvm::train(&samples, &labels, &SvmParams::default()).unwrap();
        assert_eq!(model.classes(), &[0, 1]);
        assert_eq!(model.var_count(), 2);
        assert_eq!(model.predict(&[0.9, 1.2]), 0);
        assert_eq!(model.predict(&[-1.1, -0.8]), 1);
    }

    #[test]
    fn one_vs_one_votes_across_three_classes() {
        let mut samples = cluster([3.0, 0.0], 9);
        samples.extend(cluster([-3.0, 0.0], 9));
        samples.extend(cluster([0.0, 3.0], 9));
        let labels: Vec<i32> = (0..27).map(|i| [4, 1, 2][i / 9]).collect();

        let model = LinearSvm::train(&samples, &labels, &SvmParams::default()).unwrap();
        assert_eq!(model.classes(), &[1, 2, 4]);
        assert_eq!(model.predict(&[3.1, 0.1]), 4);
        assert_eq!(model.predict(&[-2.9, -0.2]), 1);
        assert_eq!(model.predict(&[0.1, 2.8]), 2);
        model.check().unwrap();
    }

    #[test]
    fn rejects_inconsistent_input() {
        let params = SvmParams::default();
        assert!(matches!(LinearSvm::train(&[], &[], &params), Err(TrainError::Empty)));
        assert!(matches!(
            LinearSvm::train(&[vec![1.0], vec![2.0]], &[0], &params),
            Err(TrainError::LengthMismatch { samples: 2, labels: 1 })
        ));
        assert!(matches!(
            LinearSvm::train(&[vec![1.0], vec![2.0, 3.0]], &[0, 1], &params),
            Err(TrainError::Ragged { row: 1, expected: 1, found: 2 })
        ));
        assert!(matches!(
            LinearSvm::train(&[vec![1.0], vec![2.0]], &[3, 3], &params),
            Err(TrainError::SingleClass)
        ));
        assert!(matches!(
            LinearSvm::train(&[vec![1.0], vec![f32::NAN]], &[0, 1], &params),
            Err(TrainError::NonFinite(1))
        ));
    }

    #[test]
    fn solver_rejects_non_positive_penalty() {
        let samples = vec![vec![1.0, 1.0], vec![-1.0, -1.0]];
        let params = SvmParams { c: 0.0, ..Default::default() };
        assert!(matches!(
            LinearSvm::train(&samples, &[0, 1], &params),
            Err(TrainError::Solver(_))
        ));
    }

    #[test]
    fn model_survives_json() {
        let mut samples = cluster([2.0, -1.0], 6);
        samples.extend(cluster([-2.0, 1.0], 6));
        let labels: Vec<i32> = (0..12).map(|i| if i < 6 { 1 } else { 5 }).collect();
        let model = LinearSvm::train(&samples, &labels, &SvmParams::default()).unwrap();

        let text = serde_json::to_string(&model).unwrap();
        let back: LinearSvm = serde_json::from_str(&text).unwrap();
        back.check().unwrap();
        for s in &samples {
            assert_eq!(back.predict(s), model.predict(s));
        }
    }

    #[test]
    fn check_catches_missing_pairs() {
        let mut samples = cluster([3.0, 0.0], 6);
        samples.extend(cluster([-3.0, 0.0], 6));
        samples.extend(cluster([0.0, 3.0], 6));
        let labels: Vec<i32> = (0..18).map(|i| (i / 6) as i32).collect();
        let mut model = LinearSvm::train(&samples, &labels, &SvmParams::default()).unwrap();
        model.machines.pop();
        assert!(model.check().is_err());
        model.machines.truncate(1);
        model.classes = vec![0, 1];
        assert!(model.check().is_ok());
        model.classes = vec![1, 0];
        assert!(model.check().is_err());
    }
}
