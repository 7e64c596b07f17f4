mod util;

use approx::assert_abs_diff_eq;
use nalgebra::Vector4;
use parrec2nii::sidecar::calculate_dwell_time;
use parrec2nii::{
    convert_file, CalibrationBound, CalibrationPolicy, ConversionOptions, NiftiType, Origin,
    ParRecError, ScalingMode,
};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

use util::{NiftiFile, Synthetic};

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[test]
fn uniform_scaling_keeps_raw_samples() {
    let dir = tempdir().unwrap();
    let source = Synthetic::default();
    let par = source.write_to(dir.path(), "uniform");

    let out = convert_file(&par, &ConversionOptions::default()).unwrap();
    assert_eq!(out, dir.path().join("uniform.nii"));

    let nifti = NiftiFile::open(&out);
    assert_eq!(nifti.header.data_type().unwrap(), NiftiType::Uint16);
    assert_eq!(nifti.header.scl_slope, 2.5);
    assert_eq!(nifti.header.scl_inter, -3.);
    assert_eq!(nifti.header.dim, [4, 4, 3, 2, 3, 1, 1, 1]);
    let raw: Vec<f64> = source.samples().into_iter().map(f64::from).collect();
    assert_eq!(nifti.values(), raw);

    // calibration follows the scaled data
    let (lo, hi) = min_max(raw.iter().map(|v| v * 2.5 - 3.));
    assert_eq!(nifti.header.cal_min, lo as f32);
    assert_eq!(nifti.header.cal_max, hi as f32);
}

#[test]
fn distinct_scale_factors_are_prescaled() {
    let dir = tempdir().unwrap();
    let source = Synthetic {
        scaling: vec![(1., 0.), (2., 0.), (0.5, 10.)],
        ..Synthetic::default()
    };
    let par = source.write_to(dir.path(), "prescaled");

    let out = convert_file(&par, &ConversionOptions::default()).unwrap();
    let nifti = NiftiFile::open(&out);
    assert_eq!(nifti.header.data_type().unwrap(), NiftiType::Float64);
    assert_eq!(nifti.header.bitpix, 64);
    assert_eq!(nifti.header.scl_slope, 1.);
    assert_eq!(nifti.header.scl_inter, 0.);

    let volume_len = source.volume_len();
    let expected: Vec<f64> = source
        .samples()
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let (slope, intercept) = source.scaling[i / volume_len];
            f64::from(s) * slope + intercept
        })
        .collect();
    assert_eq!(nifti.values(), expected);
    let (lo, hi) = min_max(expected.iter().copied());
    assert_eq!(nifti.header.cal_min, lo as f32);
    assert_eq!(nifti.header.cal_max, hi as f32);
}

#[test]
fn floating_point_scaling() {
    let dir = tempdir().unwrap();
    let par = Synthetic::default().write_to(dir.path(), "fp");
    let options = ConversionOptions::default().with_scaling(ScalingMode::Fp);
    let nifti = NiftiFile::open(convert_file(&par, &options).unwrap());
    assert_eq!(nifti.header.data_type().unwrap(), NiftiType::Uint16);
    assert_eq!(nifti.header.scl_slope, 2.);
    assert_eq!(nifti.header.scl_inter, (-3. / (2.5 * 0.5)) as f32);
}

#[test]
fn scaling_off_uses_raw_range() {
    let dir = tempdir().unwrap();
    let source = Synthetic {
        bits: 8,
        scaling: vec![(1., 0.), (2., 0.), (0.5, 10.)],
        ..Synthetic::default()
    };
    let par = source.write_to(dir.path(), "raw");
    let options = ConversionOptions::default().with_scaling(ScalingMode::Off);
    let nifti = NiftiFile::open(convert_file(&par, &options).unwrap());

    assert_eq!(nifti.header.data_type().unwrap(), NiftiType::Uint8);
    assert_eq!(nifti.header.scl_slope, 1.);
    assert_eq!(nifti.header.scl_inter, 0.);
    let raw: Vec<f64> = source.samples().into_iter().map(f64::from).collect();
    assert_eq!(nifti.values(), raw);
    let (lo, hi) = min_max(raw.into_iter());
    assert_eq!(nifti.header.cal_min, lo as f32);
    assert_eq!(nifti.header.cal_max, hi as f32);
}

#[test]
fn literal_calibration() {
    let dir = tempdir().unwrap();
    let par = Synthetic::default().write_to(dir.path(), "literal");
    let options = ConversionOptions::default().with_calibration(CalibrationPolicy::new(
        "-5".parse::<CalibrationBound>().unwrap(),
        "500.25".parse::<CalibrationBound>().unwrap(),
    ));
    let nifti = NiftiFile::open(convert_file(&par, &options).unwrap());
    assert_eq!(nifti.header.cal_min, -5.);
    assert_eq!(nifti.header.cal_max, 500.25);
}

#[test]
fn geometry_and_units() {
    let dir = tempdir().unwrap();
    let par = Synthetic::default().write_to(dir.path(), "geometry");

    let fov = ConversionOptions::default()
        .with_origin(Origin::Fov)
        .with_output_dir(dir.path().join("fov"));
    fs::create_dir(dir.path().join("fov")).unwrap();
    let fov = NiftiFile::open(convert_file(&par, &fov).unwrap());
    let scanner = NiftiFile::open(convert_file(&par, &ConversionOptions::default()).unwrap());

    assert_eq!(fov.header.qform_code, 2);
    assert_eq!(fov.header.sform_code, 2);
    assert_eq!(scanner.header.sform_code, 1);
    assert_eq!(fov.header.xyzt_units, 2 | 8);
    assert_eq!(&fov.header.pixdim[1..5], &[2., 2., 3.5, 2.]);

    // the centre of the volume is the origin of the field of view
    let centre = fov.header.sform_affine() * Vector4::new(1.5, 1., 0.5, 1.);
    assert_abs_diff_eq!(centre, Vector4::new(0., 0., 0., 1.), epsilon = 1e-4);
    // off-centre (ap, fh, rl) = (5, -10, 2.5) is RAS (-2.5, -5, -10)
    let shift = scanner.header.sform_affine().column(3) - fov.header.sform_affine().column(3);
    assert_abs_diff_eq!(shift, Vector4::new(-2.5, -5., -10., 0.), epsilon = 1e-4);
    assert_abs_diff_eq!(scanner.header.quatern_x, -2.5 + fov.header.quatern_x, epsilon = 1e-4);
}

#[test]
fn header_is_embedded() {
    let dir = tempdir().unwrap();
    let source = Synthetic::default();
    let par = source.write_to(dir.path(), "embedded");
    let options = ConversionOptions::default().with_store_header(true);
    let nifti = NiftiFile::open(convert_file(&par, &options).unwrap());

    let text = source.par_text();
    let esize = (8 + text.len() + 15) / 16 * 16;
    assert_eq!(nifti.header.vox_offset as usize, 352 + esize);
    assert_eq!(&nifti.extensions[..4], &[1, 0, 0, 0]);
    assert_eq!(&nifti.extensions[4..8], &(esize as i32).to_le_bytes());
    assert_eq!(&nifti.extensions[8..12], &6i32.to_le_bytes());
    assert_eq!(&nifti.extensions[12..12 + text.len()], text.as_bytes());
    assert!(nifti.extensions[12 + text.len()..].iter().all(|b| *b == 0));
    assert_eq!(nifti.values().len(), source.samples().len());
}

#[test]
fn conversion_is_reproducible() {
    for &compressed in &[false, true] {
        let dir = tempdir().unwrap();
        let par = Synthetic::default().write_to(dir.path(), "twice");
        let options = ConversionOptions::default()
            .with_compressed(compressed)
            .with_store_header(true)
            .with_overwrite(true);
        let out = convert_file(&par, &options).unwrap();
        let first = fs::read(&out).unwrap();
        assert_eq!(convert_file(&par, &options).unwrap(), out);
        assert_eq!(fs::read(&out).unwrap(), first);
    }
}

#[test]
fn compressed_output() {
    let dir = tempdir().unwrap();
    let source = Synthetic::default();
    let par = source.write_to(dir.path(), "gz");
    let options = ConversionOptions::default().with_compressed(true);
    let out = convert_file(&par, &options).unwrap();
    assert_eq!(out, dir.path().join("gz.nii.gz"));
    assert_eq!(&fs::read(&out).unwrap()[..2], &[0x1f, 0x8b]);
    let nifti = NiftiFile::open(&out);
    assert_eq!(nifti.values().len(), source.samples().len());
}

#[test]
fn existing_output_is_kept() {
    let dir = tempdir().unwrap();
    let par = Synthetic::default().write_to(dir.path(), "guarded");
    let out = convert_file(&par, &ConversionOptions::default()).unwrap();
    let before = fs::read(&out).unwrap();

    // a different calibration would change the file if it were written
    let options = ConversionOptions::default().with_calibration(CalibrationPolicy::new(
        CalibrationBound::Literal(0.),
        CalibrationBound::Literal(1.),
    ));
    match convert_file(&par, &options) {
        Err(ParRecError::FileExists(path)) => assert_eq!(path, out),
        other => panic!("expected an existing file error, got {:?}", other),
    }
    assert_eq!(fs::read(&out).unwrap(), before);

    let _ = convert_file(&par, &options.with_overwrite(true)).unwrap();
    assert!(fs::read(&out).unwrap() != before);
}

#[test]
fn diffusion_tables() {
    let dir = tempdir().unwrap();
    let source = Synthetic {
        diffusion: Some(vec![
            (0., [0., 0., 0.]),
            (1000., [1., 0., 0.]),
            (1000., [0., 0.6, 0.8]),
        ]),
        ..Synthetic::default()
    };
    let par = source.write_to(dir.path(), "dwi");
    let options = ConversionOptions::default().with_bvs(true);
    let _ = convert_file(&par, &options).unwrap();

    let bvals = fs::read_to_string(dir.path().join("dwi.bvals")).unwrap();
    assert_eq!(bvals, "0.0 1000.0 1000.0 \n");
    assert_eq!(bvals.lines().count(), 1);
    assert_eq!(bvals.split_whitespace().count(), 3);

    // (ap, fh, rl) gradients of transverse slices are (rl, ap, fh) in voxel axes
    let bvecs = fs::read_to_string(dir.path().join("dwi.bvecs")).unwrap();
    assert_eq!(bvecs, "0.0 0.0 0.8 \n0.0 1.0 0.0 \n0.0 0.0 0.6 \n");
    assert!(bvecs.lines().all(|l| l.split_whitespace().count() == 3));
}

#[test]
fn no_diffusion_no_tables() {
    let dir = tempdir().unwrap();
    let par = Synthetic::default().write_to(dir.path(), "anat");
    let options = ConversionOptions::default().with_bvs(true);
    let _ = convert_file(&par, &options).unwrap();
    assert!(!dir.path().join("anat.bvals").exists());
    assert!(!dir.path().join("anat.bvecs").exists());
}

#[test]
fn dwell_time() {
    let dir = tempdir().unwrap();
    let source = Synthetic {
        epi_factor: 35,
        ..Synthetic::default()
    };
    let par = source.write_to(dir.path(), "epi");
    let options = ConversionOptions::default().with_dwell_time(3.);
    let _ = convert_file(&par, &options).unwrap();

    let expected = calculate_dwell_time(11.5, 35, 3.).unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join("epi.dwell_time")).unwrap(),
        format!("{:?}\n", expected)
    );
}

#[test]
fn dwell_time_skipped_without_epi() {
    let dir = tempdir().unwrap();
    let par = Synthetic::default().write_to(dir.path(), "se");
    let options = ConversionOptions::default().with_dwell_time(1.5);
    let out = convert_file(&par, &options).unwrap();
    assert!(out.exists());
    assert!(!dir.path().join("se.dwell_time").exists());
}

#[test]
fn truncated_rec_file() {
    let dir = tempdir().unwrap();
    let source = Synthetic {
        missing_slices: 1,
        ..Synthetic::default()
    };
    let par = source.write_to(dir.path(), "short");

    match convert_file(&par, &ConversionOptions::default()) {
        Err(ParRecError::Format(_)) => {}
        other => panic!("expected a format error, got {:?}", other),
    }
    assert!(!dir.path().join("short.nii").exists());

    let options = ConversionOptions::default().with_permit_truncated(true);
    let nifti = NiftiFile::open(convert_file(&par, &options).unwrap());
    assert_eq!(&nifti.header.dim[..5], &[4, 4, 3, 2, 2]);
    assert_eq!(nifti.values().len(), 2 * source.volume_len());
}

#[test]
fn single_volume_is_three_dimensional() {
    let dir = tempdir().unwrap();
    let source = Synthetic {
        volumes: 1,
        scaling: vec![(1., 0.)],
        ..Synthetic::default()
    };
    let par = source.write_to(dir.path(), "vol");
    let nifti = NiftiFile::open(convert_file(&par, &ConversionOptions::default()).unwrap());
    assert_eq!(&nifti.header.dim[..4], &[3, 4, 3, 2]);
    assert_eq!(&nifti.header.pixdim[1..4], &[2., 2., 3.5]);
}
