//! Parsing of PAR header files, versions 4, 4.1 and 4.2.
//!
//! A PAR file is a text file with a block of general information lines
//! (`.  label : value`) followed by one line of whitespace separated
//! numbers per stored slice image. Comment lines start with `#`.

use super::geometry::{Origin, SlabGeometry, SliceOrientation};
use crate::affine::Affine4;
use crate::error::{ParRecError, Result};
use crate::scaling::{ScaleFactor, ScaleMethod, ScaleTable};
use log::warn;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::io::Read;

const BANNER: &str = "Research image export tool";

/// Version of the PAR file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParVersion {
    /// V4
    V4,
    /// V4.1, adds diffusion gradients to the image definitions.
    V41,
    /// V4.2, adds the ASL label type.
    V42,
}

impl ParVersion {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "V4" => Some(ParVersion::V4),
            "V4.1" => Some(ParVersion::V41),
            "V4.2" => Some(ParVersion::V42),
            _ => None,
        }
    }

    /// Number of values in one image definition line.
    pub fn columns(self) -> usize {
        match self {
            ParVersion::V4 => 41,
            ParVersion::V41 => 48,
            ParVersion::V42 => 49,
        }
    }
}

/// The general information block of a PAR file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeneralInfo {
    /// Patient name.
    pub patient_name: String,
    /// Examination name.
    pub exam_name: String,
    /// Protocol name.
    pub protocol_name: String,
    /// Number of slices in a volume.
    pub max_slices: usize,
    /// Number of dynamic scans, when the header states it.
    pub max_dynamics: Option<usize>,
    /// Repetition time in milliseconds.
    pub repetition_time: Option<f64>,
    /// Water fat shift in pixels.
    pub water_fat_shift: Option<f64>,
    /// Mid slice angulation about `(ap, fh, rl)`, in degrees.
    pub angulation: [f64; 3],
    /// Mid slice off-centre along `(ap, fh, rl)`, in millimetres.
    pub off_center: [f64; 3],
    /// Echo planar imaging factor, 0 or 1 when the scan is not EPI.
    pub epi_factor: Option<i64>,
    /// Whether the acquisition is diffusion weighted.
    pub diffusion: bool,
    /// Labels not interpreted by the parser, with their raw values.
    pub other: BTreeMap<String, String>,
}

/// One image definition line, describing a single stored slice.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub struct ImageDefinition {
    pub slice_number: i64,
    pub echo_number: i64,
    pub dynamic_number: i64,
    pub cardiac_phase: i64,
    pub image_type: i64,
    pub scanning_sequence: i64,
    /// Position of the slice in the REC file, in images.
    pub rec_index: usize,
    pub pixel_bits: u32,
    pub recon_resolution: [usize; 2],
    pub rescale_intercept: f64,
    pub rescale_slope: f64,
    pub scale_slope: f64,
    pub slice_thickness: f64,
    pub slice_gap: f64,
    pub slice_orientation: i64,
    pub pixel_spacing: [f64; 2],
    pub echo_time: f64,
    pub diffusion_b_factor: f64,
    /// 0 before V4.1.
    pub b_value_number: i64,
    /// 0 before V4.1.
    pub gradient_orientation_number: i64,
    /// Gradient direction along `(ap, fh, rl)`, from V4.1 on.
    pub diffusion: Option<[f64; 3]>,
    /// 0 before V4.2.
    pub label_type: i64,
}

impl ImageDefinition {
    fn parse(line: &str, version: ParVersion, lineno: usize) -> Result<Self> {
        let values = line
            .split_whitespace()
            .map(|t| {
                t.parse::<f64>().map_err(|_| {
                    ParRecError::Format(format!("line {}: `{}` is not a number", lineno, t))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if values.len() != version.columns() {
            return Err(ParRecError::Format(format!(
                "line {}: expected {} values in image definition, found {}",
                lineno,
                version.columns(),
                values.len()
            )));
        }
        let int = |i: usize| values[i] as i64;
        let (b_value_number, gradient_orientation_number, diffusion) =
            if version >= ParVersion::V41 {
                (int(41), int(42), Some([values[45], values[46], values[47]]))
            } else {
                (0, 0, None)
            };
        Ok(ImageDefinition {
            slice_number: int(0),
            echo_number: int(1),
            dynamic_number: int(2),
            cardiac_phase: int(3),
            image_type: int(4),
            scanning_sequence: int(5),
            rec_index: int(6).max(0) as usize,
            pixel_bits: int(7).max(0) as u32,
            recon_resolution: [int(9).max(0) as usize, int(10).max(0) as usize],
            rescale_intercept: values[11],
            rescale_slope: values[12],
            scale_slope: values[13],
            slice_thickness: values[22],
            slice_gap: values[23],
            slice_orientation: int(25),
            pixel_spacing: [values[28], values[29]],
            echo_time: values[30],
            diffusion_b_factor: values[33],
            b_value_number,
            gradient_orientation_number,
            diffusion,
            label_type: if version >= ParVersion::V42 { int(48) } else { 0 },
        })
    }

    /// The key identifying the volume this slice belongs to, in sort order.
    fn volume_key(&self) -> [i64; 8] {
        [
            self.dynamic_number,
            self.cardiac_phase,
            self.echo_number,
            self.label_type,
            self.image_type,
            self.scanning_sequence,
            self.b_value_number,
            self.gradient_orientation_number,
        ]
    }
}

/// Per-volume diffusion weighting.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionTable {
    /// One b-value per volume.
    pub bvals: Vec<f64>,
    /// One unit gradient per volume, in voxel axes, when the header
    /// records gradient directions.
    pub bvecs: Option<Vec<[f64; 3]>>,
}

/// A parsed PAR header, with its image definitions sorted into whole
/// volumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ParRecHeader {
    version: ParVersion,
    general: GeneralInfo,
    images: Vec<ImageDefinition>,
    n_slices: usize,
    pixel_bits: u32,
    resolution: [usize; 2],
    pixel_spacing: [f64; 2],
    slice_step: f64,
    orientation: SliceOrientation,
}

impl ParRecHeader {
    /// Read and parse a PAR header from the given byte stream.
    ///
    /// When `permit_truncated` is set, a trailing incomplete volume is
    /// dropped with a warning instead of failing.
    pub fn from_reader<R: Read>(mut input: R, permit_truncated: bool) -> Result<Self> {
        let mut raw = Vec::new();
        let _ = input.read_to_end(&mut raw)?;
        // names are not always valid UTF-8
        let text = String::from_utf8_lossy(&raw);
        ParRecHeader::parse(&text, permit_truncated)
    }

    /// Parse the text of a PAR header.
    pub fn parse(text: &str, permit_truncated: bool) -> Result<Self> {
        let mut version = None;
        let mut general = GeneralInfo::default();
        let mut seen = (false, false, false);
        let mut images = Vec::new();

        for (i, line) in text.lines().enumerate() {
            let lineno = i + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                if let Some(pos) = comment.find(BANNER) {
                    let token = comment[pos + BANNER.len()..].trim();
                    version = Some(ParVersion::from_token(token).ok_or_else(|| {
                        ParRecError::Format(format!("unsupported PAR version `{}`", token))
                    })?);
                }
                continue;
            }
            if let Some(info) = line.strip_prefix('.') {
                let (label, value) = match info.find(':') {
                    Some(pos) => (info[..pos].trim(), info[pos + 1..].trim()),
                    None => {
                        return Err(ParRecError::Format(format!(
                            "line {}: general information without a value",
                            lineno
                        )))
                    }
                };
                // column alignment varies between exports
                let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
                general_info_entry(&mut general, &mut seen, &label, value, lineno)?;
                continue;
            }
            let version = version.ok_or_else(|| {
                ParRecError::Format("missing `Research image export tool` version line".into())
            })?;
            images.push(ImageDefinition::parse(line, version, lineno)?);
        }

        let version = version.ok_or_else(|| {
            ParRecError::Format("missing `Research image export tool` version line".into())
        })?;
        match seen {
            (true, true, true) => {}
            (false, _, _) => return Err(missing("Max. number of slices/locations")),
            (_, false, _) => return Err(missing("Angulation midslice")),
            (_, _, false) => return Err(missing("Off Centre midslice")),
        }
        if images.is_empty() {
            return Err(ParRecError::Format("no image definitions".into()));
        }
        let n_slices = general.max_slices;
        if n_slices == 0 {
            return Err(ParRecError::Format("number of slices is zero".into()));
        }

        images.sort_by_key(|d| (d.volume_key(), d.slice_number));

        let remainder = images.len() % n_slices;
        if remainder != 0 {
            if !permit_truncated {
                return Err(ParRecError::Format(format!(
                    "{} image definitions do not fill volumes of {} slices, the header may be truncated",
                    images.len(),
                    n_slices
                )));
            }
            warn!(
                "PAR header is truncated, dropping {} slices of an incomplete volume",
                remainder
            );
            images.truncate(images.len() - remainder);
            if images.is_empty() {
                return Err(ParRecError::Format("no complete volume in header".into()));
            }
        }

        for volume in images.chunks(n_slices) {
            let key = volume[0].volume_key();
            if volume.iter().any(|d| d.volume_key() != key)
                || volume
                    .windows(2)
                    .any(|w| w[0].slice_number >= w[1].slice_number)
            {
                return Err(ParRecError::Format(
                    "image definitions do not form complete volumes".into(),
                ));
            }
        }

        if let Some(expected) = general.max_dynamics {
            let found = images
                .iter()
                .map(|d| d.dynamic_number)
                .collect::<BTreeSet<_>>()
                .len();
            if found != expected {
                let msg = format!(
                    "header inconsistency: found {} dynamics, general information claims {}",
                    found, expected
                );
                if !permit_truncated {
                    return Err(ParRecError::Format(msg));
                }
                warn!("{}", msg);
            }
        }

        let pixel_bits = unique(&images, "image pixel size", |d| d.pixel_bits)?;
        if pixel_bits != 8 && pixel_bits != 16 {
            return Err(ParRecError::Format(format!(
                "unsupported pixel size of {} bits",
                pixel_bits
            )));
        }
        let resolution = unique(&images, "recon resolution", |d| d.recon_resolution)?;
        // slice sizes in bytes must be addressable
        let slice_bytes = resolution[0]
            .checked_mul(resolution[1])
            .and_then(|n| n.checked_mul(pixel_bits as usize / 8));
        if slice_bytes.unwrap_or(0) == 0 {
            return Err(ParRecError::Format(format!(
                "invalid recon resolution {:?}",
                resolution
            )));
        }
        let pixel_spacing = unique(&images, "pixel spacing", |d| d.pixel_spacing)?;
        let thickness = unique(&images, "slice thickness", |d| d.slice_thickness)?;
        let gap = unique(&images, "slice gap", |d| d.slice_gap)?;
        let code = unique(&images, "slice orientation", |d| d.slice_orientation)?;
        let orientation = SliceOrientation::from_code(code).ok_or_else(|| {
            ParRecError::Format(format!("unknown slice orientation {}", code))
        })?;

        Ok(ParRecHeader {
            version,
            general,
            images,
            n_slices,
            pixel_bits,
            resolution,
            pixel_spacing,
            slice_step: thickness + gap,
            orientation,
        })
    }

    /// The PAR format version.
    pub fn version(&self) -> ParVersion {
        self.version
    }

    /// The general information block.
    pub fn general_info(&self) -> &GeneralInfo {
        &self.general
    }

    /// Image definitions, sorted by volume and then by slice.
    pub fn image_definitions(&self) -> &[ImageDefinition] {
        &self.images
    }

    /// Number of slices per volume.
    pub fn n_slices(&self) -> usize {
        self.n_slices
    }

    /// Number of complete volumes.
    pub fn n_volumes(&self) -> usize {
        self.images.len() / self.n_slices
    }

    /// Bits per stored sample, 8 or 16.
    pub fn pixel_bits(&self) -> u32 {
        self.pixel_bits
    }

    /// Number of samples in one slice image.
    pub fn slice_len(&self) -> usize {
        self.resolution[0] * self.resolution[1]
    }

    /// Slice orientation shared by every image.
    pub fn slice_orientation(&self) -> SliceOrientation {
        self.orientation
    }

    /// Shape of the image data: `(x, y, slices)`, followed by the number
    /// of volumes when there is more than one.
    pub fn data_shape(&self) -> Vec<usize> {
        let mut shape = vec![self.resolution[0], self.resolution[1], self.n_slices];
        if self.n_volumes() > 1 {
            shape.push(self.n_volumes());
        }
        shape
    }

    /// Voxel sizes in millimetres, followed by the repetition time in
    /// seconds when there is more than one volume.
    pub fn zooms(&self) -> Vec<f64> {
        let mut zooms = vec![self.pixel_spacing[0], self.pixel_spacing[1], self.slice_step];
        if self.n_volumes() > 1 {
            zooms.push(self.general.repetition_time.unwrap_or(0.) / 1000.);
        }
        zooms
    }

    /// Keep only the first `n` volumes.
    pub fn truncate_volumes(&mut self, n: usize) {
        self.images.truncate(n * self.n_slices);
    }

    /// One scale factor per stored slice, in data order.
    pub fn scale_table(&self, method: ScaleMethod) -> ScaleTable {
        let factors = self
            .images
            .iter()
            .map(|d| match method {
                ScaleMethod::DisplayedValue => ScaleFactor::new(d.rescale_slope, d.rescale_intercept),
                ScaleMethod::FloatingPoint => ScaleFactor::new(
                    1. / d.scale_slope,
                    d.rescale_intercept / (d.rescale_slope * d.scale_slope),
                ),
            })
            .collect();
        ScaleTable::new(factors, self.slice_len())
    }

    fn slab(&self) -> SlabGeometry {
        SlabGeometry {
            shape: [self.resolution[0], self.resolution[1], self.n_slices],
            zooms: [self.pixel_spacing[0], self.pixel_spacing[1], self.slice_step],
            orientation: self.orientation,
            angulation: self.general.angulation,
            off_center: self.general.off_center,
        }
    }

    /// The voxel to RAS+ affine of the data.
    pub fn spatial_transform(&self, origin: Origin) -> Affine4 {
        self.slab().affine(origin)
    }

    /// b-values and gradient directions of each volume, or `None` if the
    /// acquisition is not diffusion weighted.
    pub fn diffusion_table(&self) -> Option<DiffusionTable> {
        if !self.general.diffusion {
            return None;
        }
        let firsts = self.images.chunks(self.n_slices).map(|v| &v[0]);
        let bvals = firsts.clone().map(|d| d.diffusion_b_factor).collect();
        let slab = self.slab();
        let bvecs = firsts
            .map(|d| d.diffusion.map(|g| slab.gradient_to_voxel(g)))
            .collect::<Option<Vec<_>>>();
        Some(DiffusionTable { bvals, bvecs })
    }

    /// Water fat shift in pixels.
    pub fn water_fat_shift(&self) -> Result<f64> {
        self.general
            .water_fat_shift
            .ok_or(ParRecError::NotApplicable("no water fat shift in header"))
    }

    /// Echo train length of an EPI acquisition.
    pub fn echo_train_length(&self) -> Result<i64> {
        match self.general.epi_factor {
            Some(etl) if etl > 0 => Ok(etl),
            _ => Err(ParRecError::NotApplicable("not an EPI acquisition")),
        }
    }
}

fn missing(label: &str) -> ParRecError {
    ParRecError::Format(format!("missing general information `{}`", label))
}

fn unique<T, F>(images: &[ImageDefinition], what: &str, f: F) -> Result<T>
where
    T: PartialEq + Copy + Debug,
    F: Fn(&ImageDefinition) -> T,
{
    let first = f(&images[0]);
    match images.iter().map(&f).find(|v| *v != first) {
        None => Ok(first),
        Some(other) => Err(ParRecError::Format(format!(
            "{} is not unique: {:?} and {:?}",
            what, first, other
        ))),
    }
}

fn parse_numbers(value: &str, lineno: usize) -> Result<Vec<f64>> {
    value
        .split_whitespace()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| ParRecError::Format(format!("line {}: `{}` is not a number", lineno, t)))
        })
        .collect()
}

fn parse_triplet(value: &str, lineno: usize) -> Result<[f64; 3]> {
    let values = parse_numbers(value, lineno)?;
    match *values.as_slice() {
        [a, b, c] => Ok([a, b, c]),
        _ => Err(ParRecError::Format(format!(
            "line {}: expected three values, found `{}`",
            lineno, value
        ))),
    }
}

fn parse_scalar(value: &str, lineno: usize) -> Result<f64> {
    parse_numbers(value, lineno)?
        .first()
        .copied()
        .ok_or_else(|| ParRecError::Format(format!("line {}: missing value", lineno)))
}

fn general_info_entry(
    general: &mut GeneralInfo,
    seen: &mut (bool, bool, bool),
    label: &str,
    value: &str,
    lineno: usize,
) -> Result<()> {
    match label {
        "Patient name" => general.patient_name = value.to_string(),
        "Examination name" => general.exam_name = value.to_string(),
        "Protocol name" => general.protocol_name = value.to_string(),
        "Max. number of slices/locations" => {
            general.max_slices = parse_scalar(value, lineno)? as usize;
            seen.0 = true;
        }
        "Max. number of dynamics" => {
            general.max_dynamics = Some(parse_scalar(value, lineno)? as usize)
        }
        "Repetition time [ms]" | "Repetition time [msec]" => {
            general.repetition_time = Some(parse_scalar(value, lineno)?)
        }
        "Water Fat shift [pixels]" => general.water_fat_shift = Some(parse_scalar(value, lineno)?),
        "Angulation midslice(ap,fh,rl)[degr]" => {
            general.angulation = parse_triplet(value, lineno)?;
            seen.1 = true;
        }
        "Off Centre midslice(ap,fh,rl) [mm]" => {
            general.off_center = parse_triplet(value, lineno)?;
            seen.2 = true;
        }
        "EPI factor <0,1=no EPI>" => {
            general.epi_factor = Some(parse_scalar(value, lineno)? as i64)
        }
        "Diffusion <0=no 1=yes> ?" => {
            general.diffusion = parse_scalar(value, lineno)? != 0.
        }
        _ => {
            let _ = general.other.insert(label.to_string(), value.to_string());
        }
    }
    Ok(())
}
