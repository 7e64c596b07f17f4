//! Settings of a conversion run.

use crate::calibration::CalibrationPolicy;
use crate::error::{ParRecError, Result};
use crate::parrec::Origin;
use crate::scaling::ScalingMode;
use std::path::{Path, PathBuf};

/// Options shared by every conversion of a batch. Built once, validated
/// with [`ConversionOptions::validate`], and only read afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversionOptions {
    /// Directory of the outputs. Outputs go next to their inputs if unset.
    pub output_dir: Option<PathBuf>,
    /// Whether to gzip the NIfTI output.
    pub compressed: bool,
    /// Whether existing outputs may be replaced.
    pub overwrite: bool,
    /// Whether to convert truncated sources, dropping incomplete volumes.
    pub permit_truncated: bool,
    /// Intensity scaling.
    pub scaling: ScalingMode,
    /// Reference point of the world coordinates.
    pub origin: Origin,
    /// Sources of `cal_min` and `cal_max`.
    pub calibration: CalibrationPolicy,
    /// Whether to embed the PAR text in a header extension.
    pub store_header: bool,
    /// Whether to export b-values and gradient vectors.
    pub bvs: bool,
    /// Whether to export the EPI dwell time.
    pub dwell_time: bool,
    /// Magnetic field strength in Tesla, needed for the dwell time.
    pub field_strength: Option<f64>,
}

impl ConversionOptions {
    /// Set the output directory.
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set whether the output is compressed.
    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Set whether existing outputs are replaced.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set whether truncated sources are converted.
    pub fn with_permit_truncated(mut self, permit: bool) -> Self {
        self.permit_truncated = permit;
        self
    }

    /// Set the scaling mode.
    pub fn with_scaling(mut self, scaling: ScalingMode) -> Self {
        self.scaling = scaling;
        self
    }

    /// Set the origin of the world coordinates.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Set the calibration policy.
    pub fn with_calibration(mut self, calibration: CalibrationPolicy) -> Self {
        self.calibration = calibration;
        self
    }

    /// Set whether the PAR text is embedded in the output.
    pub fn with_store_header(mut self, store: bool) -> Self {
        self.store_header = store;
        self
    }

    /// Set whether diffusion information is exported.
    pub fn with_bvs(mut self, bvs: bool) -> Self {
        self.bvs = bvs;
        self
    }

    /// Request the dwell time, computed for the given field strength.
    pub fn with_dwell_time(mut self, field_strength: f64) -> Self {
        self.dwell_time = true;
        self.field_strength = Some(field_strength);
        self
    }

    /// The output directory, if any.
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Check the options for consistency before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.dwell_time {
            match self.field_strength {
                None => {
                    return Err(ParRecError::Config(
                        "the dwell time needs the field strength".to_string(),
                    ))
                }
                Some(t) if !(t.is_finite() && t > 0.) => {
                    return Err(ParRecError::Config(format!(
                        "field strength must be a positive number of Tesla, got {}",
                        t
                    )))
                }
                Some(_) => {}
            }
        }
        if let Some(dir) = &self.output_dir {
            if !dir.is_dir() {
                return Err(ParRecError::Config(format!(
                    "output directory {} does not exist",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}
