//! Resolution of the `cal_min` and `cal_max` header fields.

use crate::error::{ParRecError, Result};
use crate::scaling::{ScaleTable, ScalingMode};
use crate::volume::{min_max, RawVolume};
use log::debug;
use std::str::FromStr;

/// Where one end of the calibration range comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationBound {
    /// A value given by the user.
    Literal(f64),
    /// The extreme of the scaled data.
    Parse,
}

impl FromStr for CalibrationBound {
    type Err = ParRecError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "parse" {
            return Ok(CalibrationBound::Parse);
        }
        s.trim()
            .parse::<f64>()
            .map(CalibrationBound::Literal)
            .map_err(|_| {
                ParRecError::Config(format!(
                    "calibration value `{}` is neither a number nor `parse`",
                    s
                ))
            })
    }
}

impl Default for CalibrationBound {
    fn default() -> Self {
        CalibrationBound::Parse
    }
}

/// The policy for both ends of the calibration range.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationPolicy {
    /// Source of `cal_min`.
    pub min: CalibrationBound,
    /// Source of `cal_max`.
    pub max: CalibrationBound,
}

impl CalibrationPolicy {
    /// Create a policy out of its two ends.
    pub fn new(min: CalibrationBound, max: CalibrationBound) -> Self {
        CalibrationPolicy { min, max }
    }

    /// Resolve `(cal_min, cal_max)` for the given raw samples.
    ///
    /// The scaled samples are materialized at most once, and only if one
    /// of the ends is `Parse`. With scaling off, or without a scale table,
    /// the extremes of the raw samples are used directly.
    pub fn resolve(
        &self,
        raw: &RawVolume,
        table: Option<&ScaleTable>,
        mode: ScalingMode,
    ) -> Result<(f64, f64)> {
        let (min, max) = match (self.min, self.max) {
            (CalibrationBound::Literal(min), CalibrationBound::Literal(max)) => {
                return Ok((min, max))
            }
            _ => {
                let extremes = match (mode, table) {
                    (ScalingMode::Off, _) | (_, None) => min_max(raw.iter_f64()),
                    (_, Some(table)) => {
                        let scaled = table.apply(raw)?;
                        min_max(scaled.iter().copied())
                    }
                };
                let (lo, hi) = extremes.ok_or_else(|| {
                    ParRecError::Format("no samples to compute the calibration range".to_string())
                })?;
                debug!("Data range: [{}, {}]", lo, hi);
                (lo, hi)
            }
        };

        let cal_min = match self.min {
            CalibrationBound::Literal(v) => v,
            CalibrationBound::Parse => min,
        };
        let cal_max = match self.max {
            CalibrationBound::Literal(v) => v,
            CalibrationBound::Parse => max,
        };
        Ok((cal_min, cal_max))
    }
}
