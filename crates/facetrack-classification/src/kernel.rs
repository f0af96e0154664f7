//! Kernel functions for SVM-style classifiers.

use facetrack_core::{Result, TrackError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kernel function, resolved once when the configuration is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    /// `<a, b>`
    Linear,
    /// `(gamma * <a, b> + coef0) ^ degree`
    Polynomial { degree: i32, gamma: f64, coef0: f64 },
    /// `exp(-gamma * |a - b|^2)`
    Rbf { gamma: f64 },
}

impl Kernel {
    /// Names of the serialized `type` tag.
    pub const KINDS: &'static [&'static str] = &["linear", "polynomial", "rbf"];

    pub fn compute(&self, a: &[f32], b: &[f32]) -> f64 {
        match *self {
            Kernel::Linear => dot(a, b),
            Kernel::Polynomial {
                degree,
                gamma,
                coef0,
            } => (gamma * dot(a, b) + coef0).powi(degree),
            Kernel::Rbf { gamma } => {
                let dist: f64 = a
                    .iter()
                    .zip(b)
                    .map(|(&x, &y)| {
                        let d = (x - y) as f64;
                        d * d
                    })
                    .sum();
                (-gamma * dist).exp()
            }
        }
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Kernel::Linear => Ok(()),
            Kernel::Polynomial { degree, gamma, .. } => {
                if degree < 1 || gamma <= 0.0 {
                    return Err(TrackError::InvalidParameter(format!(
                        "polynomial kernel needs degree >= 1 and gamma > 0, got {degree}/{gamma}"
                    )));
                }
                Ok(())
            }
            Kernel::Rbf { gamma } => {
                if !(gamma > 0.0) {
                    return Err(TrackError::InvalidParameter(format!(
                        "rbf kernel needs gamma > 0, got {gamma}"
                    )));
                }
                Ok(())
            }
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Rbf { gamma: 0.05 }
    }
}

/// Parse a kernel name with default parameters (`linear`, `poly`, `rbf`).
impl FromStr for Kernel {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Kernel::Linear),
            "poly" | "polynomial" => Ok(Kernel::Polynomial {
                degree: 2,
                gamma: 0.05,
                coef0: 0.0,
            }),
            "rbf" => Ok(Kernel::default()),
            other => Err(TrackError::unknown("kernel", other)),
        }
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum()
}
