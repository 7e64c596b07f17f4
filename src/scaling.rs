//! Intensity scaling: scale tables produced by the source header, and the
//! decision of how those factors are represented in the output.
//!
//! A NIfTI-1 header holds a single `(scl_slope, scl_inter)` pair. When
//! every frame of the source shares one factor, the samples are written
//! untouched and that pair goes to the header. When factors differ, the
//! samples are scaled before writing and stored as `f64`, with an identity
//! pair in the header.

use crate::error::{ParRecError, Result};
use crate::typedef::NiftiType;
use crate::volume::{fortran_array, RawVolume};
use log::debug;
use ndarray::ArrayD;
use std::fmt;
use std::str::FromStr;

/// The scaling requested for a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalingMode {
    /// Displayed values, as shown on the scanner console.
    Dv,
    /// Floating point values, proportional to the signal.
    Fp,
    /// No scaling, raw samples are kept.
    Off,
}

impl ScalingMode {
    /// The scale method to query from the source header, if any.
    pub fn method(self) -> Option<ScaleMethod> {
        match self {
            ScalingMode::Dv => Some(ScaleMethod::DisplayedValue),
            ScalingMode::Fp => Some(ScaleMethod::FloatingPoint),
            ScalingMode::Off => None,
        }
    }
}

impl Default for ScalingMode {
    fn default() -> Self {
        ScalingMode::Dv
    }
}

impl FromStr for ScalingMode {
    type Err = ParRecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dv" => Ok(ScalingMode::Dv),
            "fp" => Ok(ScalingMode::Fp),
            "off" => Ok(ScalingMode::Off),
            _ => Err(ParRecError::Config(format!(
                "unknown scaling mode `{}`, expected dv, fp or off",
                s
            ))),
        }
    }
}

impl fmt::Display for ScalingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScalingMode::Dv => "dv",
            ScalingMode::Fp => "fp",
            ScalingMode::Off => "off",
        })
    }
}

/// The method used by the source header to derive scale factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaleMethod {
    /// `rescale slope` and `rescale intercept`.
    DisplayedValue,
    /// Factors derived from `scale slope` as well.
    FloatingPoint,
}

/// A single `real = stored * slope + intercept` factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor {
    /// Multiplicative term.
    pub slope: f64,
    /// Additive term.
    pub intercept: f64,
}

impl ScaleFactor {
    /// The factor that leaves values unchanged.
    pub const IDENTITY: ScaleFactor = ScaleFactor {
        slope: 1.,
        intercept: 0.,
    };

    /// Create a new scale factor.
    pub fn new(slope: f64, intercept: f64) -> Self {
        ScaleFactor { slope, intercept }
    }

    /// Apply this factor to a stored value.
    #[inline]
    pub fn apply(self, value: f64) -> f64 {
        value * self.slope + self.intercept
    }
}

/// An ordered sequence of scale factors, each covering one contiguous
/// frame of `frame_len` samples in Fortran order. Frames are usually
/// whole volumes, or single slices when the source scales per slice.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleTable {
    factors: Vec<ScaleFactor>,
    frame_len: usize,
}

impl ScaleTable {
    /// Create a table of factors, each covering `frame_len` samples.
    pub fn new(factors: Vec<ScaleFactor>, frame_len: usize) -> Self {
        ScaleTable { factors, frame_len }
    }

    /// The scale factors, in frame order.
    pub fn factors(&self) -> &[ScaleFactor] {
        &self.factors
    }

    /// The number of samples covered by each factor.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Number of factors in the table.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// Whether the table has no factors.
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// The single factor shared by every frame, if there is one.
    pub fn uniform(&self) -> Option<ScaleFactor> {
        let first = *self.factors.first()?;
        if self
            .factors
            .iter()
            .all(|f| f.slope == first.slope && f.intercept == first.intercept)
        {
            Some(first)
        } else {
            None
        }
    }

    /// Materialize the fully scaled samples of `raw`, each scaled by the
    /// factor of its own frame.
    pub fn apply(&self, raw: &RawVolume) -> Result<ArrayD<f64>> {
        let expected = self.factors.len() * self.frame_len;
        if raw.len() != expected {
            return Err(ParRecError::Format(format!(
                "scale table covers {} samples, image has {}",
                expected,
                raw.len()
            )));
        }
        let frame_len = self.frame_len.max(1);
        let scaled = raw
            .iter_f64()
            .enumerate()
            .map(|(i, v)| self.factors[i / frame_len].apply(v))
            .collect();
        fortran_array(raw.shape(), scaled)
    }
}

/// How samples are stored in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageMode {
    /// Unscaled samples, identity factor in the header.
    Raw,
    /// Unscaled samples, the one shared factor in the header.
    Uniform,
    /// Samples scaled per frame and stored as `f64`.
    Prescaled,
}

/// The outcome of resolving the scaling of one conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleDecision {
    /// The factor to write in the header.
    pub factor: ScaleFactor,
    /// How samples are stored.
    pub storage: StorageMode,
}

impl ScaleDecision {
    /// Decide how the factors in `table` are represented, given the
    /// requested scaling `mode`. A missing table means there is nothing
    /// to scale.
    pub fn resolve(table: Option<&ScaleTable>, mode: ScalingMode) -> ScaleDecision {
        let table = match (mode, table) {
            (ScalingMode::Off, _) | (_, None) => {
                return ScaleDecision {
                    factor: ScaleFactor::IDENTITY,
                    storage: StorageMode::Raw,
                }
            }
            (_, Some(table)) => table,
        };

        match table.uniform() {
            Some(factor) => {
                debug!(
                    "Uniform scaling: slope {}, intercept {}",
                    factor.slope, factor.intercept
                );
                ScaleDecision {
                    factor,
                    storage: StorageMode::Uniform,
                }
            }
            None => {
                debug!(
                    "{} distinct frame scale factors, prescaling samples",
                    table.len()
                );
                ScaleDecision {
                    factor: ScaleFactor::IDENTITY,
                    storage: StorageMode::Prescaled,
                }
            }
        }
    }

    /// The data type of the output, given the type of the raw samples.
    pub fn output_type(&self, raw: NiftiType) -> NiftiType {
        match self.storage {
            StorageMode::Prescaled => NiftiType::Float64,
            StorageMode::Raw | StorageMode::Uniform => raw,
        }
    }
}
