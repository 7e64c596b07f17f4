//! Reading of PAR/REC image pairs.
//!
//! The PAR file is a text header describing every stored slice, the REC
//! file holds the raw little endian samples of those slices, one after
//! the other, each with x varying fastest.

pub mod geometry;
pub mod header;

pub use self::geometry::{Origin, SliceOrientation};
pub use self::header::{DiffusionTable, GeneralInfo, ImageDefinition, ParRecHeader, ParVersion};

use crate::error::{ParRecError, Result};
use crate::util::{is_par_file, to_rec_file};
use crate::volume::{fortran_array, DataElement, RawVolume};
use byteordered::{ByteOrdered, Endianness};
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// A loaded PAR/REC image: the parsed header, the raw PAR text and the
/// unscaled samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ParRecImage {
    header: ParRecHeader,
    raw_header: Vec<u8>,
    data: RawVolume,
}

impl ParRecImage {
    /// Load a PAR/REC pair, given the path to its PAR file. The REC file
    /// is expected next to it, with the same name.
    ///
    /// If `permit_truncated` is set, volumes missing from the end of the
    /// header or of the REC file are dropped with a warning. Otherwise,
    /// truncation is a format error.
    pub fn load<P: AsRef<Path>>(path: P, permit_truncated: bool) -> Result<Self> {
        let path = path.as_ref();
        if !is_par_file(path) {
            return Err(ParRecError::Format(format!(
                "{} is not a PAR file",
                path.display()
            )));
        }
        let raw_header = fs::read(path)?;
        let mut header = ParRecHeader::from_reader(&raw_header[..], permit_truncated)?;

        let rec_path = to_rec_file(path);
        let rec = fs::read(&rec_path).map_err(|e| {
            ParRecError::Format(format!("cannot read {}: {}", rec_path.display(), e))
        })?;
        debug!("Reading {} bytes of samples from {}", rec.len(), rec_path.display());

        let bytes_per_slice = header.slice_len() * header.pixel_bits() as usize / 8;
        let stored = rec.len() / bytes_per_slice.max(1);
        let complete = complete_volumes(&header, stored);
        if complete < header.n_volumes() {
            if !permit_truncated || complete == 0 {
                return Err(ParRecError::Format(format!(
                    "REC file holds {} slices, the header describes {} volumes of {}",
                    stored,
                    header.n_volumes(),
                    header.n_slices()
                )));
            }
            warn!(
                "REC file is truncated, keeping {} of {} volumes",
                complete,
                header.n_volumes()
            );
            header.truncate_volumes(complete);
        }

        let data = match header.pixel_bits() {
            8 => RawVolume::Uint8(read_slices(&header, &rec)?),
            16 => RawVolume::Uint16(read_slices(&header, &rec)?),
            bits => {
                return Err(ParRecError::Format(format!(
                    "unsupported pixel size of {} bits",
                    bits
                )))
            }
        };
        Ok(ParRecImage {
            header,
            raw_header,
            data,
        })
    }

    /// The parsed PAR header.
    pub fn header(&self) -> &ParRecHeader {
        &self.header
    }

    /// The PAR file contents, byte for byte.
    pub fn raw_header(&self) -> &[u8] {
        &self.raw_header
    }

    /// The unscaled samples, shaped as `header().data_shape()`.
    pub fn data(&self) -> &RawVolume {
        &self.data
    }
}

/// Number of leading volumes whose slices all lie within the first
/// `stored` slice images of the REC file.
fn complete_volumes(header: &ParRecHeader, stored: usize) -> usize {
    header
        .image_definitions()
        .chunks(header.n_slices())
        .take_while(|volume| volume.iter().all(|d| d.rec_index < stored))
        .count()
}

fn read_slices<T>(header: &ParRecHeader, rec: &[u8]) -> Result<ndarray::ArrayD<T>>
where
    T: DataElement,
{
    let slice_len = header.slice_len();
    let slice_bytes = slice_len * std::mem::size_of::<T>();
    let mut data = Vec::with_capacity(slice_len * header.image_definitions().len());
    for definition in header.image_definitions() {
        let start = definition.rec_index * slice_bytes;
        let mut src = ByteOrdered::runtime(&rec[start..start + slice_bytes], Endianness::Little);
        for _ in 0..slice_len {
            data.push(T::read_from(&mut src)?);
        }
    }
    fortran_array(&header.data_shape(), data)
}
