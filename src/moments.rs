//! Latency moments and their descriptive statistics
//!
//! A [`Moments`] value summarizes a latency distribution in five accumulators:
//! the sample count (`m0`), the mean (`m1`) and the sums of the 2nd through 4th
//! powers of deviations from the mean (`m2`..`m4`). [`MomentAnnotations`] turns
//! them into the statistics shown on each edge of the dependency graph.
//!
//! ```
//! use service_depgraph::moments::{MomentAnnotations, Moments};
//!
//! let moments = Moments::new(10.0, 5.0, 20.0, 0.0, 40.0);
//! let stats = MomentAnnotations::from_moments(&moments);
//!
//! assert_eq!(stats.variance, 2.0);
//! assert_eq!(stats.skewness, Some(0.0));
//! assert_eq!(stats.kurtosis, Some(-2.0));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a set of moments cannot be summarized
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MomentsError {
    #[error("sample count must be positive, got {0}")]
    NonPositiveCount(f64),

    #[error("second moment must not be negative, got {0}")]
    NegativeSecondMoment(f64),

    #[error("moment {field} is not a finite number")]
    NonFinite { field: &'static str },
}

/// Raw moment accumulators for one call edge
///
/// Missing fields deserialize as zero, which [`Moments::validate`] then rejects.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Moments {
    /// Sample count
    pub m0: f64,
    /// Mean
    pub m1: f64,
    /// Sum of squared deviations from the mean
    pub m2: f64,
    /// Sum of cubed deviations from the mean
    pub m3: f64,
    /// Sum of fourth-power deviations from the mean
    pub m4: f64,
}

impl Moments {
    pub fn new(m0: f64, m1: f64, m2: f64, m3: f64, m4: f64) -> Self {
        Self { m0, m1, m2, m3, m4 }
    }

    /// Moments of a single observation
    pub fn of(value: f64) -> Self {
        Self::new(1.0, value, 0.0, 0.0, 0.0)
    }

    /// Moments of a sample, computed in two passes
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let count = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / count;

        let mut moments = Self::new(count, mean, 0.0, 0.0, 0.0);
        for value in samples {
            let d = value - mean;
            let d2 = d * d;
            moments.m2 += d2;
            moments.m3 += d2 * d;
            moments.m4 += d2 * d2;
        }
        moments
    }

    /// Check that the moments describe a non-empty, well-formed distribution
    pub fn validate(&self) -> Result<(), MomentsError> {
        for (field, value) in [
            ("m0", self.m0),
            ("m1", self.m1),
            ("m2", self.m2),
            ("m3", self.m3),
            ("m4", self.m4),
        ] {
            if !value.is_finite() {
                return Err(MomentsError::NonFinite { field });
            }
        }

        if self.m0 <= 0.0 {
            return Err(MomentsError::NonPositiveCount(self.m0));
        }
        if self.m2 < 0.0 {
            return Err(MomentsError::NegativeSecondMoment(self.m2));
        }

        Ok(())
    }

    /// Combine two moment sets as if they had been computed over the union
    /// of both samples.
    ///
    /// Uses the pairwise update for central moment sums, so neither side has to
    /// be recomputed from raw observations.
    pub fn merge(&self, other: &Moments) -> Moments {
        if other.m0 == 0.0 {
            return *self;
        }
        if self.m0 == 0.0 {
            return *other;
        }

        let na = self.m0;
        let nb = other.m0;
        let n = na + nb;
        let delta = other.m1 - self.m1;
        let delta2 = delta * delta;

        let mean = self.m1 + delta * nb / n;

        let m2 = self.m2 + other.m2 + delta2 * na * nb / n;

        let m3 = self.m3
            + other.m3
            + delta2 * delta * na * nb * (na - nb) / (n * n)
            + 3.0 * delta * (na * other.m2 - nb * self.m2) / n;

        let m4 = self.m4
            + other.m4
            + delta2 * delta2 * na * nb * (na * na - na * nb + nb * nb) / (n * n * n)
            + 6.0 * delta2 * (na * na * other.m2 + nb * nb * self.m2) / (n * n)
            + 4.0 * delta * (na * other.m3 - nb * self.m3) / n;

        Moments::new(n, mean, m2, m3, m4)
    }
}

/// Descriptive statistics derived from [`Moments`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MomentAnnotations {
    pub count: f64,
    pub mean: f64,
    pub variance: f64,
    pub stddev: f64,
    /// `None` when the distribution has no variance
    pub skewness: Option<f64>,
    /// Excess kurtosis; `None` when the distribution has no variance
    pub kurtosis: Option<f64>,
}

impl MomentAnnotations {
    /// Apply the summary formulas without validating the input.
    ///
    /// A zero count produces NaN or infinite values, exactly as the formulas do.
    /// Use [`MomentAnnotations::summarize`] for checked input.
    pub fn from_moments(moments: &Moments) -> Self {
        let count = moments.m0;
        let variance = moments.m2 / count;
        let stddev = variance.sqrt();

        let (skewness, kurtosis) = if moments.m2 == 0.0 {
            (None, None)
        } else {
            (
                Some(count.sqrt() * moments.m3 / moments.m2.powf(1.5)),
                Some(count * moments.m4 / moments.m2.powi(2) - 3.0),
            )
        };

        Self {
            count,
            mean: moments.m1,
            variance,
            stddev,
            skewness,
            kurtosis,
        }
    }

    /// Validate the moments, then summarize them
    pub fn summarize(moments: &Moments) -> Result<Self, MomentsError> {
        moments.validate()?;
        Ok(Self::from_moments(moments))
    }
}
