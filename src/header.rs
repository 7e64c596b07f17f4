//! This module defines the `NiftiHeader` struct, the target header
//! record which is filled in during a conversion and serialized
//! in front of the voxel data.

use crate::affine::{affine_to_quaternion, decompose_affine};
use crate::error::{ParRecError, Result};
use crate::typedef::{NiftiType, Unit, XForm};
use byteordered::{ByteOrdered, Endianness};
use nalgebra::Matrix4;
use num_traits::FromPrimitive;
use std::io::Read;
use std::ops::Deref;

/// Magic code for full NIFTI-1 files (extention ".nii[.gz]").
pub const MAGIC_CODE_NIP1: &[u8; 4] = b"n+1\0";

/// Size of the NIFTI-1 header, in bytes.
pub const HEADER_SIZE: usize = 348;

/// Offset of the voxel data in a single file without extensions:
/// the header plus the 4-byte extender.
pub const MIN_VOX_OFFSET: usize = HEADER_SIZE + 4;

/// The NIFTI-1 header data type.
/// All fields are public and named after the specification's header file.
/// The type of each field was adjusted according to their use and
/// array limitations.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// Header size, must be 348
    pub sizeof_hdr: i32,
    /// Unused in NIFTI-1
    pub data_type: [u8; 10],
    /// Unused in NIFTI-1
    pub db_name: [u8; 18],
    /// Unused in NIFTI-1
    pub extents: i32,
    /// Unused in NIFTI-1
    pub session_error: i16,
    /// Unused in NIFTI-1
    pub regular: u8,
    /// MRI slice ordering
    pub dim_info: u8,
    /// Data array dimensions
    pub dim: [u16; 8],
    /// 1st intent parameter
    pub intent_p1: f32,
    /// 2nd intent parameter
    pub intent_p2: f32,
    /// 3rd intent parameter
    pub intent_p3: f32,
    /// NIFTI_INTENT_* code
    pub intent_code: i16,
    /// Defines the data type!
    pub datatype: i16,
    /// Number of bits per voxel
    pub bitpix: i16,
    /// First slice index
    pub slice_start: i16,
    /// Grid spacings
    pub pixdim: [f32; 8],
    /// Offset into .nii file to reach the volume
    pub vox_offset: f32,
    /// Data scaling: slope
    pub scl_slope: f32,
    /// Data scaling: offset
    pub scl_inter: f32,
    /// Last slice index
    pub slice_end: i16,
    /// Slice timing order
    pub slice_code: u8,
    /// Units of pixdim[1..4]
    pub xyzt_units: u8,
    /// Max display intensity
    pub cal_max: f32,
    /// Min display intensity
    pub cal_min: f32,
    /// Time for 1 slice
    pub slice_duration: f32,
    /// Time axis shift
    pub toffset: f32,
    /// Unused in NIFTI-1
    pub glmax: i32,
    /// Unused in NIFTI-1
    pub glmin: i32,

    /// Any text you like
    pub descrip: Vec<u8>,
    /// Auxiliary filename
    pub aux_file: [u8; 24],
    /// NIFTI_XFORM_* code
    pub qform_code: i16,
    /// NIFTI_XFORM_* code
    pub sform_code: i16,
    /// Quaternion b param
    pub quatern_b: f32,
    /// Quaternion c param
    pub quatern_c: f32,
    /// Quaternion d param
    pub quatern_d: f32,
    /// Quaternion x shift
    pub quatern_x: f32,
    /// Quaternion y shift
    pub quatern_y: f32,
    /// Quaternion z shift
    pub quatern_z: f32,

    /// 1st row affine transform
    pub srow_x: [f32; 4],
    /// 2nd row affine transform
    pub srow_y: [f32; 4],
    /// 3rd row affine transform
    pub srow_z: [f32; 4],

    /// 'name' or meaning of data
    pub intent_name: [u8; 16],

    /// Magic code, always `b"n+1\0"` for the files written here
    pub magic: [u8; 4],

    /// Byte order of the header and of the voxel data
    pub endianness: Endianness,
}

impl Default for NiftiHeader {
    fn default() -> NiftiHeader {
        NiftiHeader {
            sizeof_hdr: HEADER_SIZE as i32,
            data_type: [0; 10],
            db_name: [0; 18],
            extents: 0,
            session_error: 0,
            regular: 0,
            dim_info: 0,
            dim: [1, 0, 0, 0, 0, 0, 0, 0],
            intent_p1: 0.,
            intent_p2: 0.,
            intent_p3: 0.,
            intent_code: 0,
            datatype: 0,
            bitpix: 0,
            slice_start: 0,
            pixdim: [1.; 8],
            vox_offset: MIN_VOX_OFFSET as f32,
            scl_slope: 1.,
            scl_inter: 0.,
            slice_end: 0,
            slice_code: 0,
            xyzt_units: 0,
            cal_max: 0.,
            cal_min: 0.,
            slice_duration: 0.,
            toffset: 0.,
            glmax: 0,
            glmin: 0,

            descrip: vec![0; 80],
            aux_file: [0; 24],
            qform_code: 0,
            sform_code: 0,
            quatern_b: 0.,
            quatern_c: 0.,
            quatern_d: 0.,
            quatern_x: 0.,
            quatern_y: 0.,
            quatern_z: 0.,

            srow_x: [0.; 4],
            srow_y: [0.; 4],
            srow_z: [0.; 4],

            intent_name: [0; 16],

            magic: *MAGIC_CODE_NIP1,

            endianness: Endianness::Little,
        }
    }
}

impl NiftiHeader {
    /// Read a NIfTI-1 header from the given byte stream, detecting its byte
    /// order from the `sizeof_hdr` field. It is assumed that the input is
    /// currently at the start of the NIFTI header.
    pub fn from_reader<S: Read>(mut input: S) -> Result<NiftiHeader> {
        let mut raw = [0u8; HEADER_SIZE];
        input.read_exact(&mut raw)?;

        let endianness = if raw[..4] == (HEADER_SIZE as i32).to_le_bytes() {
            Endianness::Little
        } else if raw[..4] == (HEADER_SIZE as i32).to_be_bytes() {
            Endianness::Big
        } else {
            return Err(ParRecError::Format("not a NIfTI-1 header".to_string()));
        };
        parse_header(&raw[..], endianness)
    }

    /// Get the data type as a validated enum.
    pub fn data_type(&self) -> Result<NiftiType> {
        NiftiType::from_i16(self.datatype)
            .ok_or_else(|| ParRecError::Format(format!("invalid datatype {}", self.datatype)))
    }

    /// Set the data type, along with the matching `bitpix`.
    pub fn set_data_type(&mut self, datatype: NiftiType) {
        self.datatype = datatype as i16;
        self.bitpix = (datatype.size_of() * 8) as i16;
    }

    /// Set `dim` from a concrete shape of up to 7 dimensions.
    pub fn set_shape(&mut self, shape: &[usize]) -> Result<()> {
        if shape.is_empty() || shape.len() > 7 {
            return Err(ParRecError::Format(format!(
                "cannot store a volume of rank {}",
                shape.len()
            )));
        }
        let mut dim = [1u16; 8];
        dim[0] = shape.len() as u16;
        for (d, s) in dim[1..].iter_mut().zip(shape) {
            if *s > i16::MAX as usize {
                return Err(ParRecError::Format(format!("dimension {} is too large", s)));
            }
            *d = *s as u16;
        }
        self.dim = dim;
        Ok(())
    }

    /// Retrieve the effective shape of the volume (without `dim[0]`).
    pub fn shape(&self) -> &[u16] {
        let rank = usize::from(self.dim[0]).min(7);
        &self.dim[1..=rank]
    }

    /// Set the grid spacings, `pixdim[1..]`, leaving the qfac in `pixdim[0]`.
    pub fn set_zooms(&mut self, zooms: &[f64]) {
        for (p, z) in self.pixdim[1..].iter_mut().zip(zooms) {
            *p = *z as f32;
        }
    }

    /// Set the space and time units of `pixdim`.
    pub fn set_xyzt_units(&mut self, space: Unit, time: Unit) {
        self.xyzt_units = (space as u8 & 0o0007) | (time as u8 & 0o0070);
    }

    /// Set both spatial transforms (sform rows and qform quaternion)
    /// from a voxel to world affine, with the given codes.
    pub fn set_affine(&mut self, affine: &Matrix4<f64>, code: XForm) {
        self.srow_x = [
            affine[(0, 0)] as f32,
            affine[(0, 1)] as f32,
            affine[(0, 2)] as f32,
            affine[(0, 3)] as f32,
        ];
        self.srow_y = [
            affine[(1, 0)] as f32,
            affine[(1, 1)] as f32,
            affine[(1, 2)] as f32,
            affine[(1, 3)] as f32,
        ];
        self.srow_z = [
            affine[(2, 0)] as f32,
            affine[(2, 1)] as f32,
            affine[(2, 2)] as f32,
            affine[(2, 3)] as f32,
        ];
        self.sform_code = code as i16;

        let (rotation, zooms, qfac, translation) = decompose_affine(affine);
        let quaternion = affine_to_quaternion(&rotation);
        self.quatern_b = quaternion[1] as f32;
        self.quatern_c = quaternion[2] as f32;
        self.quatern_d = quaternion[3] as f32;
        self.quatern_x = translation[0] as f32;
        self.quatern_y = translation[1] as f32;
        self.quatern_z = translation[2] as f32;
        self.pixdim[0] = qfac as f32;
        for (p, z) in self.pixdim[1..4].iter_mut().zip(zooms.iter()) {
            *p = *z as f32;
        }
        self.qform_code = code as i16;
    }

    /// Retrieve the sform affine as a 4x4 matrix.
    pub fn sform_affine(&self) -> Matrix4<f64> {
        let mut affine = Matrix4::identity();
        for (r, row) in [self.srow_x, self.srow_y, self.srow_z].iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                affine[(r, c)] = f64::from(*v);
            }
        }
        affine
    }

    /// Safely set the `descrip` field using a buffer.
    pub fn set_description<D>(&mut self, description: D) -> Result<()>
    where
        D: Into<Vec<u8>>,
        D: Deref<Target = [u8]>,
    {
        let len = description.len();
        if len < 80 {
            let mut descrip = vec![0; 80];
            descrip[..len].copy_from_slice(&description);
            self.descrip = descrip;
            Ok(())
        } else if len == 80 {
            self.descrip = description.into();
            Ok(())
        } else {
            Err(ParRecError::IncorrectDescriptionLength(len))
        }
    }

    /// Safely set the `descrip` field using a &str, truncating it to the
    /// 80 byte limit at a character boundary.
    pub fn set_description_str<T>(&mut self, description: T) -> Result<()>
    where
        T: Into<String>,
    {
        let mut description = description.into();
        while description.len() > 80 {
            let _ = description.pop();
        }
        self.set_description(description.as_bytes())
    }
}

fn parse_header(raw: &[u8], endianness: Endianness) -> Result<NiftiHeader> {
    let mut input = ByteOrdered::runtime(raw, endianness);
    let mut h = NiftiHeader {
        endianness,
        ..NiftiHeader::default()
    };

    h.sizeof_hdr = input.read_i32()?;
    input.read_exact(&mut h.data_type)?;
    input.read_exact(&mut h.db_name)?;
    h.extents = input.read_i32()?;
    h.session_error = input.read_i16()?;
    h.regular = input.read_u8()?;
    h.dim_info = input.read_u8()?;
    for v in &mut h.dim {
        *v = input.read_u16()?;
    }
    h.intent_p1 = input.read_f32()?;
    h.intent_p2 = input.read_f32()?;
    h.intent_p3 = input.read_f32()?;
    h.intent_code = input.read_i16()?;
    h.datatype = input.read_i16()?;
    h.bitpix = input.read_i16()?;
    h.slice_start = input.read_i16()?;
    for v in &mut h.pixdim {
        *v = input.read_f32()?;
    }
    h.vox_offset = input.read_f32()?;
    h.scl_slope = input.read_f32()?;
    h.scl_inter = input.read_f32()?;
    h.slice_end = input.read_i16()?;
    h.slice_code = input.read_u8()?;
    h.xyzt_units = input.read_u8()?;
    h.cal_max = input.read_f32()?;
    h.cal_min = input.read_f32()?;
    h.slice_duration = input.read_f32()?;
    h.toffset = input.read_f32()?;
    h.glmax = input.read_i32()?;
    h.glmin = input.read_i32()?;

    // descrip is 80-elem vec already
    input.read_exact(h.descrip.as_mut_slice())?;
    input.read_exact(&mut h.aux_file)?;
    h.qform_code = input.read_i16()?;
    h.sform_code = input.read_i16()?;
    h.quatern_b = input.read_f32()?;
    h.quatern_c = input.read_f32()?;
    h.quatern_d = input.read_f32()?;
    h.quatern_x = input.read_f32()?;
    h.quatern_y = input.read_f32()?;
    h.quatern_z = input.read_f32()?;
    for v in &mut h.srow_x {
        *v = input.read_f32()?;
    }
    for v in &mut h.srow_y {
        *v = input.read_f32()?;
    }
    for v in &mut h.srow_z {
        *v = input.read_f32()?;
    }
    input.read_exact(&mut h.intent_name)?;
    input.read_exact(&mut h.magic)?;

    debug_assert_eq!(h.descrip.len(), 80);

    if &h.magic != MAGIC_CODE_NIP1 {
        Err(ParRecError::Format("not a single-file NIfTI-1 header".to_string()))
    } else {
        Ok(h)
    }
}
