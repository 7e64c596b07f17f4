//! # parrec2nii
//!
//! Convert PAR/REC images into NIfTI-1 files.
//!
//! ```bash
//! # Compressed output, with b-values and gradients, in an output directory
//! parrec2nii -c -b -o converted/ scan1.PAR scan2.PAR
//!
//! # Dwell time of an EPI scan acquired at 3T
//! parrec2nii -d --field-strength 3 fmri.PAR
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use parrec2nii::batch::{self, BatchError};
use parrec2nii::{CalibrationBound, CalibrationPolicy, ConversionOptions, Origin, ScalingMode};

/// Convert PAR/REC files to NIfTI-1
#[derive(Parser, Debug)]
#[command(name = "parrec2nii")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory of the output files, next to each input by default
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Write gzip compressed images (.nii.gz)
    #[arg(short, long)]
    compressed: bool,

    /// Convert truncated files, dropping incomplete volumes
    #[arg(long)]
    permit_truncated: bool,

    /// Write b-values and gradient vectors of diffusion scans
    #[arg(short, long)]
    bvs: bool,

    /// Write the dwell time of EPI scans (needs --field-strength)
    #[arg(short, long)]
    dwell_time: bool,

    /// Magnetic field strength of the scanner, in Tesla
    #[arg(long, value_name = "TESLA")]
    field_strength: Option<f64>,

    /// Reference point of the world coordinates: `scanner` (isocentre)
    /// or `fov` (centre of the field of view)
    #[arg(long, value_name = "ORIGIN", default_value = "scanner")]
    origin: String,

    /// Calibration range: numbers, or `parse` to use the data range
    #[arg(
        short,
        long,
        num_args = 2,
        value_names = ["MIN", "MAX"],
        default_values = ["parse", "parse"]
    )]
    minmax: Vec<String>,

    /// Embed the PAR header text in the output as a comment extension
    #[arg(long)]
    store_header: bool,

    /// Intensity scaling of the output: `dv` (displayed values), `fp`
    /// (floating point values) or `off` (raw stored values)
    #[arg(long, value_name = "MODE", default_value = "dv")]
    scaling: String,

    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,

    /// PAR files to convert
    #[arg(value_name = "INFILE", required = true)]
    infiles: Vec<PathBuf>,
}

impl Cli {
    fn options(&self) -> Result<ConversionOptions> {
        let bound = |i: usize| -> Result<CalibrationBound> {
            let value = self.minmax.get(i).map(String::as_str).unwrap_or("parse");
            Ok(value.parse::<CalibrationBound>()?)
        };
        let calibration = CalibrationPolicy::new(bound(0)?, bound(1)?);
        let options = ConversionOptions {
            output_dir: self.output_dir.clone(),
            compressed: self.compressed,
            overwrite: self.overwrite,
            permit_truncated: self.permit_truncated,
            scaling: self.scaling.parse::<ScalingMode>()?,
            origin: self.origin.parse::<Origin>()?,
            calibration,
            store_header: self.store_header,
            bvs: self.bvs,
            dwell_time: self.dwell_time,
            field_strength: self.field_strength,
        };
        options.validate()?;
        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let options = cli.options().context("Invalid options")?;
    BatchError::check(batch::run(&cli.infiles, &options))?;
    info!("Converted {} file(s)", cli.infiles.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parrec2nii::ParRecError;

    fn config_error(args: &[&str]) -> ParRecError {
        let cli = Cli::try_parse_from(args).unwrap();
        let err = cli.options().unwrap_err();
        match err.downcast::<ParRecError>() {
            Ok(e) => e,
            Err(other) => panic!("expected a conversion error, got {:?}", other),
        }
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["parrec2nii", "scan.PAR"]).unwrap();
        let options = cli.options().unwrap();
        assert_eq!(options.origin, Origin::Scanner);
        assert_eq!(options.scaling, ScalingMode::Dv);
        assert_eq!(options.calibration, CalibrationPolicy::default());
        assert!(!options.compressed);
    }

    #[test]
    fn choices_are_parsed() {
        let cli = Cli::try_parse_from([
            "parrec2nii", "--origin", "fov", "--scaling", "off", "-m", "0", "parse", "-c",
            "scan.PAR",
        ])
        .unwrap();
        let options = cli.options().unwrap();
        assert_eq!(options.origin, Origin::Fov);
        assert_eq!(options.scaling, ScalingMode::Off);
        assert_eq!(options.calibration.min, CalibrationBound::Literal(0.));
        assert_eq!(options.calibration.max, CalibrationBound::Parse);
        assert!(options.compressed);
    }

    #[test]
    fn invalid_choices_are_config_errors() {
        for args in [
            &["parrec2nii", "--origin", "bogus", "scan.PAR"][..],
            &["parrec2nii", "--scaling", "raw", "scan.PAR"][..],
            &["parrec2nii", "-m", "foo", "1", "scan.PAR"][..],
            &["parrec2nii", "-d", "scan.PAR"][..],
        ] {
            match config_error(args) {
                ParRecError::Config(_) => {}
                other => panic!("{:?}: expected a config error, got {:?}", args, other),
            }
        }
    }
}
