//! Utility functions to write NIfTI-1 images (.nii or .nii.gz).

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use byteordered::{ByteOrdered, Endianness};
use either::Either;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{ArrayBase, Data, Dimension};

use crate::error::{ParRecError, Result};
use crate::extension::ExtensionSequence;
use crate::header::{NiftiHeader, MIN_VOX_OFFSET};
use crate::volume::DataElement;

/// A writable byte sink for an output file, either plain or gzip
/// compressed. Code writing to it does not need to know which.
pub type Sink = Either<BufWriter<File>, GzEncoder<BufWriter<File>>>;

/// Create the output file and wrap it in the appropriate sink.
///
/// Unless `overwrite` is set, the file must not exist yet, in which case
/// `ParRecError::FileExists` is returned and nothing is touched.
pub fn open_sink<P: AsRef<Path>>(path: P, compress: bool, overwrite: bool) -> Result<Sink> {
    let path = path.as_ref();
    let mut options = OpenOptions::new();
    let _ = options.write(true);
    if overwrite {
        let _ = options.create(true).truncate(true);
    } else {
        let _ = options.create_new(true);
    }
    let file = options.open(path).map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            ParRecError::FileExists(path.to_path_buf())
        } else {
            ParRecError::from(e)
        }
    })?;
    let writer = BufWriter::new(file);
    Ok(if compress {
        Either::Right(GzEncoder::new(writer, Compression::default()))
    } else {
        Either::Left(writer)
    })
}

/// Flush and close a sink, completing the gzip stream if there is one.
pub fn finish_sink(sink: Sink) -> Result<()> {
    let mut writer = match sink {
        Either::Left(writer) => writer,
        Either::Right(encoder) => encoder.finish()?,
    };
    writer.flush()?;
    Ok(())
}

/// The data offset implied by a sequence of extensions.
pub fn vox_offset(extensions: &ExtensionSequence) -> usize {
    MIN_VOX_OFFSET + extensions.bytes_on_disk()
}

/// Write the 348 bytes of a NIfTI-1 header, in the header's byte order.
pub fn write_header<W>(writer: W, header: &NiftiHeader) -> Result<()>
where
    W: Write,
{
    let mut writer = ByteOrdered::runtime(writer, header.endianness);

    writer.write_i32(header.sizeof_hdr)?;
    writer.write_all(&header.data_type)?;
    writer.write_all(&header.db_name)?;
    writer.write_i32(header.extents)?;
    writer.write_i16(header.session_error)?;
    writer.write_u8(header.regular)?;
    writer.write_u8(header.dim_info)?;
    for s in &header.dim {
        writer.write_u16(*s)?;
    }
    writer.write_f32(header.intent_p1)?;
    writer.write_f32(header.intent_p2)?;
    writer.write_f32(header.intent_p3)?;
    writer.write_i16(header.intent_code)?;
    writer.write_i16(header.datatype)?;
    writer.write_i16(header.bitpix)?;
    writer.write_i16(header.slice_start)?;
    for f in &header.pixdim {
        writer.write_f32(*f)?;
    }
    writer.write_f32(header.vox_offset)?;
    writer.write_f32(header.scl_slope)?;
    writer.write_f32(header.scl_inter)?;
    writer.write_i16(header.slice_end)?;
    writer.write_u8(header.slice_code)?;
    writer.write_u8(header.xyzt_units)?;
    writer.write_f32(header.cal_max)?;
    writer.write_f32(header.cal_min)?;
    writer.write_f32(header.slice_duration)?;
    writer.write_f32(header.toffset)?;
    writer.write_i32(header.glmax)?;
    writer.write_i32(header.glmin)?;

    // a description not fitting the field is padded or cut to 80 bytes
    let mut descrip = [0u8; 80];
    let len = header.descrip.len().min(80);
    descrip[..len].copy_from_slice(&header.descrip[..len]);
    writer.write_all(&descrip)?;
    writer.write_all(&header.aux_file)?;
    writer.write_i16(header.qform_code)?;
    writer.write_i16(header.sform_code)?;
    for f in &[
        header.quatern_b,
        header.quatern_c,
        header.quatern_d,
        header.quatern_x,
        header.quatern_y,
        header.quatern_z,
    ] {
        writer.write_f32(*f)?;
    }
    for f in header.srow_x.iter().chain(&header.srow_y).chain(&header.srow_z) {
        writer.write_f32(*f)?;
    }
    writer.write_all(&header.intent_name)?;
    writer.write_all(&header.magic)?;
    Ok(())
}

/// Write the voxel data of an array in Fortran order, with the given
/// byte order.
pub fn write_array<W, A, S, D>(writer: W, data: &ArrayBase<S, D>, endianness: Endianness) -> Result<()>
where
    W: Write,
    S: Data<Elem = A>,
    A: DataElement,
    D: Dimension,
{
    let mut writer = ByteOrdered::runtime(writer, endianness);
    // Need the transpose for fortran used in nifti file format.
    for v in data.t().iter() {
        v.write_to(&mut writer)?;
    }
    Ok(())
}

/// Write a complete single-file NIfTI-1 image: header, extender and
/// extensions, followed by the voxel data at the header's `vox_offset`.
pub fn write_nifti<W, A, S, D>(
    mut writer: W,
    header: &NiftiHeader,
    extensions: &ExtensionSequence,
    data: &ArrayBase<S, D>,
) -> Result<()>
where
    W: Write,
    S: Data<Elem = A>,
    A: DataElement,
    D: Dimension,
{
    let offset = vox_offset(extensions);
    if header.vox_offset as usize != offset {
        return Err(ParRecError::Format(format!(
            "header declares data offset {}, extensions end at {}",
            header.vox_offset, offset
        )));
    }
    if header.datatype != A::DATA_TYPE as i16 {
        return Err(ParRecError::Format(format!(
            "header declares datatype {}, data is {:?}",
            header.datatype,
            A::DATA_TYPE
        )));
    }
    write_header(&mut writer, header)?;
    extensions.write(&mut writer, header.endianness)?;
    write_array(&mut writer, data, header.endianness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::Extension;
    use crate::header::HEADER_SIZE;
    use crate::typedef::{NiftiType, NIFTI_ECODE_COMMENT};
    use crate::volume::fortran_array;
    use std::fs;
    use tempfile::tempdir;

    fn header_for(datatype: NiftiType, shape: &[usize], endianness: Endianness) -> NiftiHeader {
        let mut header = NiftiHeader {
            endianness,
            ..NiftiHeader::default()
        };
        header.set_data_type(datatype);
        header.set_shape(shape).unwrap();
        header
    }

    #[test]
    fn header_roundtrip() {
        for &endianness in &[Endianness::Little, Endianness::Big] {
            let mut header = header_for(NiftiType::Uint16, &[4, 5, 6], endianness);
            header.cal_min = -3.5;
            header.cal_max = 1200.;
            header.scl_slope = 2.25;
            header.set_description_str("roundtrip").unwrap();
            let mut bytes = Vec::new();
            write_header(&mut bytes, &header).unwrap();
            assert_eq!(bytes.len(), HEADER_SIZE);
            let read = NiftiHeader::from_reader(&bytes[..]).unwrap();
            assert_eq!(read, header);
        }
    }

    #[test]
    fn payload_follows_extensions() {
        let data = fortran_array(&[2, 2, 1], vec![1u16, 2, 3, 0x0102]).unwrap();
        let mut extensions = ExtensionSequence::default();
        extensions.push(Extension::from_str(NIFTI_ECODE_COMMENT, "a comment").unwrap());
        let mut header = header_for(NiftiType::Uint16, &[2, 2, 1], Endianness::Big);
        header.vox_offset = vox_offset(&extensions) as f32;

        let mut bytes = Vec::new();
        write_nifti(&mut bytes, &header, &extensions, &data).unwrap();
        let offset = MIN_VOX_OFFSET + 32;
        assert_eq!(bytes.len(), offset + 8);
        assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[offset..offset + 2], &[0, 1]);
        assert_eq!(&bytes[offset + 6..], &[1, 2]);
    }

    #[test]
    fn mismatched_offset_is_rejected() {
        let data = fortran_array(&[1, 1, 1], vec![0u8]).unwrap();
        let mut header = header_for(NiftiType::Uint8, &[1, 1, 1], Endianness::Little);
        header.vox_offset = 400.;
        let mut bytes = Vec::new();
        assert!(write_nifti(&mut bytes, &header, &ExtensionSequence::default(), &data).is_err());
        header.vox_offset = MIN_VOX_OFFSET as f32;
        header.set_data_type(NiftiType::Float64);
        assert!(write_nifti(&mut bytes, &header, &ExtensionSequence::default(), &data).is_err());
    }

    #[test]
    fn sink_respects_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.nii");
        fs::write(&path, b"keep").unwrap();
        match open_sink(&path, false, false) {
            Err(ParRecError::FileExists(p)) => assert_eq!(p, path),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
        assert_eq!(fs::read(&path).unwrap(), b"keep");

        let mut sink = open_sink(&path, false, true).unwrap();
        sink.write_all(b"new").unwrap();
        finish_sink(sink).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn compressed_sink() {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let dir = tempdir().unwrap();
        let path = dir.path().join("out.nii.gz");
        let mut sink = open_sink(&path, true, false).unwrap();
        sink.write_all(b"compressed payload").unwrap();
        finish_sink(sink).unwrap();

        let mut text = String::new();
        GzDecoder::new(fs::File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "compressed payload");
    }
}
