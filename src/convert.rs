//! Conversion of a single PAR/REC image into a NIfTI-1 file.
//!
//! The steps run in a fixed order: the output path is resolved and
//! checked, the source is loaded, a target header is built and given its
//! calibration range, the PAR text is optionally embedded, the scaling is
//! resolved, the image is written, and the companion files follow.

use crate::error::{ParRecError, Result};
use crate::extension::{Extension, ExtensionSequence};
use crate::header::NiftiHeader;
use crate::options::ConversionOptions;
use crate::parrec::ParRecImage;
use crate::scaling::{ScaleDecision, ScaleTable, StorageMode};
use crate::sidecar::{export_diffusion, export_dwell_time};
use crate::typedef::{Unit, NIFTI_ECODE_COMMENT};
use crate::util::{output_base, with_suffix};
use crate::volume::RawVolume;
use crate::writer::{finish_sink, open_sink, vox_offset, write_nifti, Sink};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// The path of the NIfTI file produced for an input.
pub fn output_path<P: AsRef<Path>>(input: P, options: &ConversionOptions) -> PathBuf {
    let base = output_base(input, options.output_dir());
    with_suffix(base, if options.compressed { ".nii.gz" } else { ".nii" })
}

/// Build the target header of an image: shape, voxel sizes, units and
/// spatial transform. Data type, scaling, calibration and data offset are
/// left for the following steps.
pub fn build_header(image: &ParRecImage, options: &ConversionOptions) -> Result<NiftiHeader> {
    let source = image.header();
    let mut header = NiftiHeader::default();
    header.set_data_type(image.data().data_type());
    header.set_shape(image.data().shape())?;
    header.set_affine(
        &source.spatial_transform(options.origin),
        options.origin.xform_code(),
    );
    header.set_zooms(&source.zooms());
    header.set_xyzt_units(Unit::Mm, Unit::Sec);
    header.set_description_str(source.general_info().protocol_name.as_str())?;
    Ok(header)
}

/// Convert one PAR/REC image, returning the path of the NIfTI file.
pub fn convert_file<P: AsRef<Path>>(input: P, options: &ConversionOptions) -> Result<PathBuf> {
    let input = input.as_ref();
    let base = output_base(input, options.output_dir());
    let out_path = output_path(input, options);
    if !options.overwrite && out_path.exists() {
        return Err(ParRecError::FileExists(out_path));
    }

    info!("Processing {}", input.display());
    let image = ParRecImage::load(input, options.permit_truncated)?;
    let mut header = build_header(&image, options)?;

    let table = options
        .scaling
        .method()
        .map(|method| image.header().scale_table(method));
    let (cal_min, cal_max) = options
        .calibration
        .resolve(image.data(), table.as_ref(), options.scaling)?;
    header.cal_min = cal_min as f32;
    header.cal_max = cal_max as f32;

    let mut extensions = ExtensionSequence::default();
    if options.store_header {
        extensions.push(Extension::new(
            NIFTI_ECODE_COMMENT,
            image.raw_header().to_vec(),
        )?);
    }
    header.vox_offset = vox_offset(&extensions) as f32;
    debug!("Data offset at {} bytes", header.vox_offset);

    let decision = ScaleDecision::resolve(table.as_ref(), options.scaling);
    header.scl_slope = decision.factor.slope as f32;
    header.scl_inter = decision.factor.intercept as f32;
    header.set_data_type(decision.output_type(image.data().data_type()));

    let mut sink = open_sink(&out_path, options.compressed, options.overwrite)?;
    let written = write_payload(&mut sink, &header, &extensions, image.data(), table.as_ref(), decision)
        .and_then(|_| finish_sink(sink));
    if let Err(e) = written {
        // the sink is closed by now, do not leave a partial file behind
        let _ = discard_partial(&out_path);
        return Err(e);
    }
    info!("Wrote {}", out_path.display());

    if options.bvs {
        export_diffusion(image.header(), &base)?;
    }
    if options.dwell_time {
        let field_strength = options.field_strength.ok_or_else(|| {
            ParRecError::Config("the dwell time needs the field strength".to_string())
        })?;
        export_dwell_time(image.header(), field_strength, &base)?;
    }
    Ok(out_path)
}

/// Remove a partially written output, returning whether it is gone.
/// A failed removal is logged, the caller already has an error to report.
fn discard_partial(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "Could not remove partial output {}: {}",
                path.display(),
                e
            );
            false
        }
    }
}

fn write_payload(
    sink: &mut Sink,
    header: &NiftiHeader,
    extensions: &ExtensionSequence,
    data: &RawVolume,
    table: Option<&ScaleTable>,
    decision: ScaleDecision,
) -> Result<()> {
    match (decision.storage, table) {
        (StorageMode::Prescaled, Some(table)) => {
            let scaled = table.apply(data)?;
            write_nifti(sink, header, extensions, &scaled)
        }
        (StorageMode::Prescaled, None) => Err(ParRecError::Format(
            "prescaled storage without a scale table".to_string(),
        )),
        (StorageMode::Raw, _) | (StorageMode::Uniform, _) => match data {
            RawVolume::Uint8(a) => write_nifti(sink, header, extensions, a),
            RawVolume::Uint16(a) => write_nifti(sink, header, extensions, a),
        },
    }
}
