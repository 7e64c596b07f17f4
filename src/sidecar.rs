//! Companion text files written next to a converted image: diffusion
//! b-values and gradient vectors, and the EPI dwell time.
//!
//! Values are written with the shortest representation that reads back
//! to the same `f64`, so the files are reproducible bit for bit.

use crate::error::{ParRecError, Result};
use crate::parrec::ParRecHeader;
use crate::util::with_suffix;
use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Gyromagnetic ratio of the proton, in MHz/T.
pub const GYROMAGNETIC_RATIO: f64 = 42.576;
/// Chemical shift between water and fat, in ppm.
pub const PROTON_WATER_FAT_SHIFT: f64 = 3.4;

/// Compute the effective echo spacing (dwell time) of an EPI
/// acquisition, in seconds.
///
/// # Errors
///
/// `NotApplicable` if the echo train length is not positive, and `Config`
/// if the field strength is not positive.
pub fn calculate_dwell_time(
    water_fat_shift: f64,
    echo_train_length: i64,
    field_strength: f64,
) -> Result<f64> {
    if !(field_strength > 0.) {
        return Err(ParRecError::Config(format!(
            "field strength must be positive, got {}",
            field_strength
        )));
    }
    if echo_train_length <= 0 {
        return Err(ParRecError::NotApplicable("echo train length is not positive"));
    }
    let etl = echo_train_length as f64;
    Ok((etl - 1.) * water_fat_shift
        / (GYROMAGNETIC_RATIO * PROTON_WATER_FAT_SHIFT * field_strength * (etl + 1.)))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

/// Write one line of values, each followed by a space.
fn write_row<W: Write>(mut writer: W, values: impl IntoIterator<Item = f64>) -> Result<()> {
    for v in values {
        write!(writer, "{:?} ", v)?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Write b-values as a single row to `<base>.bvals` and, if given, the
/// gradient table transposed to one row per axis to `<base>.bvecs`.
/// Returns the paths written.
pub fn write_bvals_bvecs<P: AsRef<Path>>(
    base: P,
    bvals: &[f64],
    bvecs: Option<&[[f64; 3]]>,
) -> Result<Vec<PathBuf>> {
    let base = base.as_ref();
    if let Some(bvecs) = bvecs {
        if bvecs.len() != bvals.len() {
            return Err(ParRecError::Format(format!(
                "{} gradient vectors for {} b-values",
                bvecs.len(),
                bvals.len()
            )));
        }
    }
    let mut written = Vec::with_capacity(2);

    let path = with_suffix(base, ".bvals");
    let mut writer = create(&path)?;
    write_row(&mut writer, bvals.iter().copied())?;
    writer.flush()?;
    written.push(path);

    if let Some(bvecs) = bvecs {
        let path = with_suffix(base, ".bvecs");
        let mut writer = create(&path)?;
        for axis in 0..3 {
            write_row(&mut writer, bvecs.iter().map(|v| v[axis]))?;
        }
        writer.flush()?;
        written.push(path);
    }
    Ok(written)
}

/// Write the dwell time in seconds to `<base>.dwell_time`.
pub fn write_dwell_time<P: AsRef<Path>>(base: P, dwell_time: f64) -> Result<PathBuf> {
    let path = with_suffix(base, ".dwell_time");
    let mut writer = create(&path)?;
    writeln!(writer, "{:?}", dwell_time)?;
    writer.flush()?;
    Ok(path)
}

/// Export the diffusion table of a header, if the acquisition has one.
/// A missing table is not an error.
pub fn export_diffusion(header: &ParRecHeader, base: &Path) -> Result<()> {
    let table = match header.diffusion_table() {
        Some(table) => table,
        None => {
            warn!("No diffusion information in header, bvals/bvecs not written");
            return Ok(());
        }
    };
    if table.bvecs.is_none() {
        warn!("No gradient directions in header, only b-values are written");
    }
    for path in write_bvals_bvecs(base, &table.bvals, table.bvecs.as_deref())? {
        info!("Wrote {}", path.display());
    }
    Ok(())
}

/// Export the dwell time of an EPI acquisition. Acquisitions without
/// EPI factors are skipped with a warning.
pub fn export_dwell_time(header: &ParRecHeader, field_strength: f64, base: &Path) -> Result<()> {
    let dwell_time = header
        .water_fat_shift()
        .and_then(|wfs| calculate_dwell_time(wfs, header.echo_train_length()?, field_strength));
    match dwell_time {
        Ok(dwell_time) => {
            let path = write_dwell_time(base, dwell_time)?;
            info!(
                "Wrote dwell time ({:?} sec, assuming a {}T magnet) to {}",
                dwell_time,
                field_strength,
                path.display()
            );
            Ok(())
        }
        Err(e) if e.is_skip() => {
            warn!("No EPI factors, dwell time not written ({})", e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
