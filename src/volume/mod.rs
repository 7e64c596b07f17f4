//! This module defines the in-memory representation of the raw samples
//! read from a REC file, along with the data element API used to move
//! samples in and out of byte streams.
//!
//! Arrays are kept in column major order (also called Fortran order),
//! the order in which NIfTI stores voxels, with the shape
//! `(x, y, slices[, volumes])`.

pub mod element;

pub use self::element::DataElement;

use crate::error::{ParRecError, Result};
use crate::typedef::NiftiType;
use ndarray::{Array, ArrayD, IxDyn, ShapeBuilder};

/// Raw (unscaled) samples of a source image, in the type they were
/// stored with.
#[derive(Debug, Clone, PartialEq)]
pub enum RawVolume {
    /// 8 bit samples.
    Uint8(ArrayD<u8>),
    /// 16 bit samples.
    Uint16(ArrayD<u16>),
}

impl RawVolume {
    /// The NIfTI data type matching the stored samples.
    pub fn data_type(&self) -> NiftiType {
        match self {
            RawVolume::Uint8(_) => u8::DATA_TYPE,
            RawVolume::Uint16(_) => u16::DATA_TYPE,
        }
    }

    /// The shape of the volume.
    pub fn shape(&self) -> &[usize] {
        match self {
            RawVolume::Uint8(a) => a.shape(),
            RawVolume::Uint16(a) => a.shape(),
        }
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    /// Whether the volume holds no samples at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all samples as `f64`, in Fortran order.
    pub fn iter_f64(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        // the transposed view iterates the original array in column major order
        match self {
            RawVolume::Uint8(a) => Box::new(a.t().into_iter().map(|v| f64::from(*v))),
            RawVolume::Uint16(a) => Box::new(a.t().into_iter().map(|v| f64::from(*v))),
        }
    }
}

/// Build an array from samples laid out in Fortran order.
pub fn fortran_array<T>(shape: &[usize], data: Vec<T>) -> Result<ArrayD<T>> {
    Array::from_shape_vec(IxDyn(shape).f(), data)
        .map_err(|e| ParRecError::Format(format!("inconsistent sample count: {}", e)))
}

/// Minimum and maximum over a sequence of values, `None` if it is empty.
pub fn min_max<I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    values.into_iter().fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fortran_iteration_order() {
        let data: Vec<u16> = (0..12).collect();
        let arr = fortran_array(&[2, 3, 2], data).unwrap();
        assert_eq!(arr[[1, 0, 0]], 1);
        assert_eq!(arr[[0, 1, 0]], 2);
        assert_eq!(arr[[0, 0, 1]], 6);
        let volume = RawVolume::Uint16(arr);
        let flat: Vec<f64> = volume.iter_f64().collect();
        assert_eq!(flat, (0..12).map(f64::from).collect::<Vec<_>>());
        assert_eq!(volume.data_type(), NiftiType::Uint16);
        assert_eq!(volume.len(), 12);
    }

    #[test]
    fn bad_sample_count() {
        assert!(fortran_array(&[2, 2, 2], vec![0u8; 7]).is_err());
    }

    #[test]
    fn min_max_values() {
        assert_eq!(min_max(vec![3.0, -1.0, 7.5]), Some((-1.0, 7.5)));
        assert_eq!(min_max(Vec::new()), None);
    }
}
