// Log-normal scoring of metric timings

use crate::error::ScoringError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const INVERSE_ERFC_ONE_FIFTH: f64 = 0.9061938024368232;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFactor {
    #[default]
    Mobile,
    Desktop,
}

impl FormFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormFactor::Mobile => "mobile",
            FormFactor::Desktop => "desktop",
        }
    }
}

impl FromStr for FormFactor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mobile" => Ok(FormFactor::Mobile),
            "desktop" => Ok(FormFactor::Desktop),
            _ => Err(format!("Unknown form factor: {}", s)),
        }
    }
}

impl fmt::Display for FormFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control points of a log-normal scoring curve, in ms.
///
/// A value equal to `median` scores 0.5, a value equal to `p10` scores 0.9.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCurve {
    pub p10: f64,
    pub median: f64,
}

impl ScoreCurve {
    pub fn new(p10: f64, median: f64) -> Result<Self, ScoringError> {
        let curve = Self { p10, median };
        curve.validate()?;
        Ok(curve)
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.median.is_nan() || self.median <= 0.0 {
            return Err(ScoringError::InvalidMedian(self.median));
        }
        if self.p10.is_nan() || self.p10 <= 0.0 {
            return Err(ScoringError::InvalidP10(self.p10));
        }
        if self.p10 >= self.median {
            return Err(ScoringError::P10NotBelowMedian {
                p10: self.p10,
                median: self.median,
            });
        }
        Ok(())
    }

    pub fn score(&self, value: f64) -> Result<f64, ScoringError> {
        log_normal_score(self, value)
    }
}

/// Complementary log-normal CDF through the curve's control points, clamped so the
/// control points land exactly on 0.9 and 0.5.
pub fn log_normal_score(curve: &ScoreCurve, value: f64) -> Result<f64, ScoringError> {
    curve.validate()?;
    if value <= 0.0 {
        return Ok(1.0);
    }

    let x_log_ratio = (value / curve.median).max(f64::MIN_POSITIVE).ln();
    let p10_log_ratio = -(curve.p10 / curve.median).max(f64::MIN_POSITIVE).ln();
    let standardized_x = x_log_ratio * INVERSE_ERFC_ONE_FIFTH / p10_log_ratio;
    let complementary_percentile = (1.0 - erf(standardized_x)) / 2.0;

    let score = if value <= curve.p10 {
        complementary_percentile.clamp(0.9, 1.0)
    } else if value <= curve.median {
        complementary_percentile.clamp(0.5, 0.899_999_999_999_999_9)
    } else {
        complementary_percentile.clamp(0.0, 0.499_999_999_999_999_94)
    };
    Ok(score)
}

/// Abramowitz and Stegun 7.1.26.
fn erf(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    let sign = x.signum();
    let x = x.abs();

    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let t = 1.0 / (1.0 + p * x);
    let y = t * (a1 + t * (a2 + t * (a3 + t * (a4 + t * a5))));
    sign * (1.0 - y * (-x * x).exp())
}
