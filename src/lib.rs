//! Conversion of PAR/REC scanner images into the NIfTI-1 file format.
//!
//! The crate reads the PAR text header and the raw REC samples of an
//! acquisition, and writes a single NIfTI-1 file (`.nii` or `.nii.gz`)
//! with the same geometry and intensity scaling. Diffusion b-values and
//! gradients, as well as the EPI dwell time, can be exported to
//! companion text files.
//!
//! # Example
//!
//! ```no_run
//! use parrec2nii::{convert_file, ConversionOptions, ScalingMode};
//!
//! let options = ConversionOptions::default()
//!     .with_compressed(true)
//!     .with_scaling(ScalingMode::Fp);
//! options.validate()?;
//! let output = convert_file("scan.PAR", &options)?;
//! println!("wrote {}", output.display());
//! # Ok::<(), parrec2nii::ParRecError>(())
//! ```
//!
//! Each input of a batch is converted on its own: failures are collected
//! by [`batch::run`] instead of stopping the batch.
#![deny(missing_debug_implementations)]
#![warn(missing_docs, unused_extern_crates, trivial_casts, unused_results)]

#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate num_derive;

pub mod affine;
pub mod batch;
pub mod calibration;
pub mod convert;
pub mod error;
pub mod extension;
pub mod header;
pub mod options;
pub mod parrec;
pub mod scaling;
pub mod sidecar;
pub mod typedef;
mod util;
pub mod volume;
pub mod writer;

pub use crate::calibration::{CalibrationBound, CalibrationPolicy};
pub use crate::convert::convert_file;
pub use crate::error::{ConversionError, ParRecError, Result};
pub use crate::header::NiftiHeader;
pub use crate::options::ConversionOptions;
pub use crate::parrec::{Origin, ParRecHeader, ParRecImage};
pub use crate::scaling::{ScaleDecision, ScaleFactor, ScaleTable, ScalingMode, StorageMode};
pub use crate::typedef::NiftiType;
