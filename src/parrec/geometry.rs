//! Voxel to world geometry of PAR/REC acquisitions.
//!
//! Scanner coordinates are expressed in the PSL frame (posterior,
//! superior, left), which matches the `(ap, fh, rl)` triplets of the PAR
//! header. The final affine maps voxel indices to RAS+ millimetres.

use crate::affine::{from_matvec, rotation_x, rotation_y, rotation_z, Affine3, Affine4};
use crate::error::{ParRecError, Result};
use crate::typedef::XForm;
use nalgebra::Vector3;
use std::fmt;
use std::str::FromStr;

/// The reference point of the world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Scanner isocentre, honouring the off-centre of the acquisition.
    Scanner,
    /// Centre of the field of view.
    Fov,
}

impl Origin {
    /// The NIfTI transform code matching this origin.
    pub fn xform_code(self) -> XForm {
        match self {
            Origin::Scanner => XForm::ScannerAnat,
            Origin::Fov => XForm::AlignedAnat,
        }
    }
}

impl Default for Origin {
    fn default() -> Self {
        Origin::Scanner
    }
}

impl FromStr for Origin {
    type Err = ParRecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scanner" => Ok(Origin::Scanner),
            "fov" => Ok(Origin::Fov),
            _ => Err(ParRecError::Config(format!(
                "unrecognized origin `{}`, expected scanner or fov",
                s
            ))),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Scanner => "scanner",
            Origin::Fov => "fov",
        })
    }
}

/// Orientation of the acquired slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliceOrientation {
    /// Axial slices.
    Transverse,
    /// Sagittal slices.
    Sagittal,
    /// Coronal slices.
    Coronal,
}

impl SliceOrientation {
    /// Interpret the `slice orientation` column of an image definition.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SliceOrientation::Transverse),
            2 => Some(SliceOrientation::Sagittal),
            3 => Some(SliceOrientation::Coronal),
            _ => None,
        }
    }

    /// Permutation (with flips) from acquisition axes to PSL axes.
    pub fn acq_to_psl(self) -> Affine3 {
        match self {
            #[rustfmt::skip]
            SliceOrientation::Transverse => Affine3::new(
                0., 1., 0.,
                0., 0., 1.,
                1., 0., 0.,
            ),
            SliceOrientation::Sagittal => Affine3::from_diagonal(&Vector3::new(1., -1., -1.)),
            #[rustfmt::skip]
            SliceOrientation::Coronal => Affine3::new(
                0., 0.,  1.,
                0., -1., 0.,
                1., 0.,  0.,
            ),
        }
    }
}

#[rustfmt::skip]
fn psl_to_ras() -> Affine3 {
    Affine3::new(
        0.,  0., -1.,
        -1., 0., 0.,
        0.,  1., 0.,
    )
}

/// The orientation and position of an acquired slab.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlabGeometry {
    /// Number of voxels along x, y and slices.
    pub shape: [usize; 3],
    /// Voxel sizes in millimetres.
    pub zooms: [f64; 3],
    /// Slice orientation.
    pub orientation: SliceOrientation,
    /// Angulation of the mid slice about `(ap, fh, rl)`, in degrees.
    pub angulation: [f64; 3],
    /// Off-centre of the mid slice along `(ap, fh, rl)`, in millimetres.
    pub off_center: [f64; 3],
}

impl SlabGeometry {
    /// The rotation of the slab in PSL space.
    fn rotation(&self) -> Affine3 {
        let ap = self.angulation[0].to_radians();
        let fh = self.angulation[1].to_radians();
        let rl = self.angulation[2].to_radians();
        rotation_z(rl) * rotation_x(ap) * rotation_y(fh)
    }

    /// Voxel to RAS+ affine, with the world origin at the scanner
    /// isocentre or at the centre of the volume.
    pub fn affine(&self, origin: Origin) -> Affine4 {
        let center = Vector3::new(
            -(self.shape[0] as f64 - 1.) / 2.,
            -(self.shape[1] as f64 - 1.) / 2.,
            -(self.shape[2] as f64 - 1.) / 2.,
        );
        let zooms = Affine3::from_diagonal(&Vector3::new(
            self.zooms[0],
            self.zooms[1],
            self.zooms[2],
        ));
        let linear = self.rotation() * self.orientation.acq_to_psl() * zooms;
        let mut translation = linear * center;
        if origin == Origin::Scanner {
            translation += Vector3::new(self.off_center[0], self.off_center[1], self.off_center[2]);
        }
        let to_ras = psl_to_ras();
        from_matvec(&(to_ras * linear), &(to_ras * translation))
    }

    /// Rotate a diffusion gradient from `(ap, fh, rl)` into voxel axes.
    pub fn gradient_to_voxel(&self, gradient: [f64; 3]) -> [f64; 3] {
        // the permutation is orthogonal, its transpose is its inverse
        let v = self.orientation.acq_to_psl().transpose()
            * Vector3::new(gradient[0], gradient[1], gradient[2]);
        [v[0], v[1], v[2]]
    }
}
