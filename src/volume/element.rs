//! This module defines the data element API, which enables the converter
//! to read samples from the source and write them to a NIfTI payload
//! with the declared byte order.
use crate::typedef::NiftiType;
use byteordered::{ByteOrdered, Endianness};
use num_traits::AsPrimitive;
use std::io::{Read, Result as IoResult, Write};

/// Trait type for characterizing a NIfTI data element, implemented for
/// primitive numeric types which are used by the crate to represent voxel
/// values.
pub trait DataElement: 'static + Sized + Copy + AsPrimitive<f64> {
    /// The `datatype` mapped to the type T
    const DATA_TYPE: NiftiType;

    /// Read a single element from the given byte source.
    fn read_from<R: Read>(src: &mut ByteOrdered<R, Endianness>) -> IoResult<Self>;

    /// Write a single element to the given byte sink.
    fn write_to<W: Write>(self, dst: &mut ByteOrdered<W, Endianness>) -> IoResult<()>;
}

impl DataElement for u8 {
    const DATA_TYPE: NiftiType = NiftiType::Uint8;
    fn read_from<R: Read>(src: &mut ByteOrdered<R, Endianness>) -> IoResult<Self> {
        src.read_u8()
    }
    fn write_to<W: Write>(self, dst: &mut ByteOrdered<W, Endianness>) -> IoResult<()> {
        dst.write_u8(self)
    }
}
impl DataElement for i16 {
    const DATA_TYPE: NiftiType = NiftiType::Int16;
    fn read_from<R: Read>(src: &mut ByteOrdered<R, Endianness>) -> IoResult<Self> {
        src.read_i16()
    }
    fn write_to<W: Write>(self, dst: &mut ByteOrdered<W, Endianness>) -> IoResult<()> {
        dst.write_i16(self)
    }
}
impl DataElement for u16 {
    const DATA_TYPE: NiftiType = NiftiType::Uint16;
    fn read_from<R: Read>(src: &mut ByteOrdered<R, Endianness>) -> IoResult<Self> {
        src.read_u16()
    }
    fn write_to<W: Write>(self, dst: &mut ByteOrdered<W, Endianness>) -> IoResult<()> {
        dst.write_u16(self)
    }
}
impl DataElement for f32 {
    const DATA_TYPE: NiftiType = NiftiType::Float32;
    fn read_from<R: Read>(src: &mut ByteOrdered<R, Endianness>) -> IoResult<Self> {
        src.read_f32()
    }
    fn write_to<W: Write>(self, dst: &mut ByteOrdered<W, Endianness>) -> IoResult<()> {
        dst.write_f32(self)
    }
}
impl DataElement for f64 {
    const DATA_TYPE: NiftiType = NiftiType::Float64;
    fn read_from<R: Read>(src: &mut ByteOrdered<R, Endianness>) -> IoResult<Self> {
        src.read_f64()
    }
    fn write_to<W: Write>(self, dst: &mut ByteOrdered<W, Endianness>) -> IoResult<()> {
        dst.write_f64(self)
    }
}
