//! Support vector machines: model evaluation, SMO training and Platt scaling.

use crate::kernel::Kernel;
use facetrack_core::FeatureVector;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A trained kernel expansion `f(x) = sum_i c_i * k(sv_i, x) + bias`.
#[derive(Debug, Clone)]
pub struct SvmModel {
    pub kernel: Kernel,
    pub support_vectors: Vec<FeatureVector>,
    pub coefficients: Vec<f64>,
    pub bias: f64,
}

impl SvmModel {
    /// Signed distance to the separating hyperplane in feature space.
    pub fn decision_value(&self, features: &[f32]) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.coefficients)
            .map(|(sv, &c)| c * self.kernel.compute(sv, features))
            .sum::<f64>()
            + self.bias
    }
}

/// Logistic mapping from decision values to probabilities,
/// `p = 1 / (1 + exp(a * f + b))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sigmoid {
    pub a: f64,
    pub b: f64,
}

impl Sigmoid {
    pub fn probability(&self, decision_value: f64) -> f64 {
        let f = self.a * decision_value + self.b;
        if f >= 0.0 {
            let e = (-f).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + f.exp())
        }
    }
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self { a: -1.0, b: 0.0 }
    }
}

/// Sequential minimal optimization for the soft-margin SVM dual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoTrainer {
    /// Box constraint `C`.
    pub constraint: f64,
    /// KKT violation tolerance.
    pub tolerance: f64,
    /// Sweeps without any change before the optimization stops.
    pub max_passes: u32,
    pub max_iterations: u32,
}

impl Default for SmoTrainer {
    fn default() -> Self {
        Self {
            constraint: 1.0,
            tolerance: 1e-3,
            max_passes: 10,
            max_iterations: 1000,
        }
    }
}

struct SmoState<'a> {
    labels: &'a [f64],
    gram: Vec<f64>,
    n: usize,
    alphas: Vec<f64>,
    errors: Vec<f64>,
    bias: f64,
    constraint: f64,
}

impl SmoState<'_> {
    #[inline]
    fn k(&self, i: usize, j: usize) -> f64 {
        self.gram[i * self.n + j]
    }

    fn take_step(&mut self, i: usize, j: usize) -> bool {
        if i == j {
            return false;
        }
        let (yi, yj) = (self.labels[i], self.labels[j]);
        let (ai, aj) = (self.alphas[i], self.alphas[j]);
        let (ei, ej) = (self.errors[i], self.errors[j]);
        let c = self.constraint;

        let (low, high) = if yi != yj {
            ((aj - ai).max(0.0), (c + aj - ai).min(c))
        } else {
            ((ai + aj - c).max(0.0), (ai + aj).min(c))
        };
        if high - low < 1e-12 {
            return false;
        }
        let eta = 2.0 * self.k(i, j) - self.k(i, i) - self.k(j, j);
        if eta >= 0.0 {
            return false;
        }

        let aj_new = (aj - yj * (ei - ej) / eta).clamp(low, high);
        if (aj_new - aj).abs() < 1e-5 * (aj_new + aj + 1e-5) {
            return false;
        }
        let ai_new = ai + yi * yj * (aj - aj_new);
        let (di, dj) = (ai_new - ai, aj_new - aj);

        let b1 = self.bias - ei - yi * di * self.k(i, i) - yj * dj * self.k(i, j);
        let b2 = self.bias - ej - yi * di * self.k(i, j) - yj * dj * self.k(j, j);
        let bias = if ai_new > 0.0 && ai_new < c {
            b1
        } else if aj_new > 0.0 && aj_new < c {
            b2
        } else {
            (b1 + b2) * 0.5
        };
        let db = bias - self.bias;

        for k in 0..self.n {
            self.errors[k] += yi * di * self.k(i, k) + yj * dj * self.k(j, k) + db;
        }
        self.alphas[i] = ai_new;
        self.alphas[j] = aj_new;
        self.bias = bias;
        true
    }

    fn violates_kkt(&self, i: usize, tolerance: f64) -> bool {
        let r = self.labels[i] * self.errors[i];
        (r < -tolerance && self.alphas[i] < self.constraint) || (r > tolerance && self.alphas[i] > 0.0)
    }

    /// Try the partner with the largest error difference first, then all others.
    fn examine(&mut self, i: usize) -> bool {
        let ei = self.errors[i];
        let best = (0..self.n)
            .filter(|&j| j != i)
            .max_by(|&a, &b| {
                (ei - self.errors[a])
                    .abs()
                    .total_cmp(&(ei - self.errors[b]).abs())
            });
        if let Some(j) = best {
            if self.take_step(i, j) {
                return true;
            }
        }
        (0..self.n).any(|offset| {
            let j = (i + 1 + offset) % self.n;
            Some(j) != best && self.take_step(i, j)
        })
    }
}

impl SmoTrainer {
    /// Train on labeled examples (`true` = positive).
    ///
    /// Returns `None` unless both classes are present.
    pub fn train(&self, kernel: Kernel, examples: &[(FeatureVector, bool)]) -> Option<SvmModel> {
        let n = examples.len();
        let positives = examples.iter().filter(|(_, label)| *label).count();
        if positives == 0 || positives == n {
            return None;
        }

        let labels: Vec<f64> = examples
            .iter()
            .map(|(_, label)| if *label { 1.0 } else { -1.0 })
            .collect();
        let mut gram = vec![0.0; n * n];
        for i in 0..n {
            for j in i..n {
                let v = kernel.compute(&examples[i].0, &examples[j].0);
                gram[i * n + j] = v;
                gram[j * n + i] = v;
            }
        }

        let mut state = SmoState {
            labels: &labels,
            gram,
            n,
            alphas: vec![0.0; n],
            errors: labels.iter().map(|y| -y).collect(),
            bias: 0.0,
            constraint: self.constraint,
        };

        let mut passes = 0;
        let mut iterations = 0;
        while passes < self.max_passes && iterations < self.max_iterations {
            let mut changed = 0;
            for i in 0..n {
                if state.violates_kkt(i, self.tolerance) && state.examine(i) {
                    changed += 1;
                }
            }
            passes = if changed == 0 { passes + 1 } else { 0 };
            iterations += 1;
        }

        let mut support_vectors = Vec::new();
        let mut coefficients = Vec::new();
        for (i, (features, _)) in examples.iter().enumerate() {
            if state.alphas[i] > 1e-8 {
                support_vectors.push(FeatureVector::clone(features));
                coefficients.push(state.alphas[i] * labels[i]);
            }
        }
        debug!(
            examples = n,
            support_vectors = support_vectors.len(),
            iterations,
            "SMO training finished"
        );
        if support_vectors.is_empty() {
            return None;
        }

        Some(SvmModel {
            kernel,
            support_vectors,
            coefficients,
            bias: state.bias,
        })
    }
}

/// Fit Platt's sigmoid to decision values with Newton's method and
/// backtracking line search, using the regularized targets
/// `(N+ + 1) / (N+ + 2)` and `1 / (N- + 2)`.
pub fn fit_sigmoid(decision_values: &[f64], labels: &[bool]) -> Sigmoid {
    const MAX_ITERATIONS: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPSILON: f64 = 1e-5;

    let prior1 = labels.iter().filter(|&&l| l).count() as f64;
    let prior0 = labels.len() as f64 - prior1;
    let hi = (prior1 + 1.0) / (prior1 + 2.0);
    let lo = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = labels.iter().map(|&l| if l { hi } else { lo }).collect();

    let objective = |a: f64, b: f64| -> f64 {
        decision_values
            .iter()
            .zip(&targets)
            .map(|(&d, &t)| {
                let f = d * a + b;
                if f >= 0.0 {
                    t * f + (-f).exp().ln_1p()
                } else {
                    (t - 1.0) * f + f.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    for _ in 0..MAX_ITERATIONS {
        let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
        let (mut g1, mut g2) = (0.0, 0.0);
        for (&d, &t) in decision_values.iter().zip(&targets) {
            let f = d * a + b;
            let (p, q) = if f >= 0.0 {
                let e = (-f).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += d * d * d2;
            h22 += d2;
            h21 += d * d2;
            let d1 = t - p;
            g1 += d * d1;
            g2 += d1;
        }
        if g1.abs() < EPSILON && g2.abs() < EPSILON {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let (new_a, new_b) = (a + step * da, b + step * db);
            let new_f = objective(new_a, new_b);
            if new_f < fval + 1e-4 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step *= 0.5;
        }
        if step < MIN_STEP {
            debug!("sigmoid line search failed");
            break;
        }
    }

    Sigmoid { a, b }
}
