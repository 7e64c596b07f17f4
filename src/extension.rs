//! This module contains definitions for the extension and related types.
//! Extensions are optional data frames sitting before the voxel data.
//! When present, an extender frame of 4 bytes is also present at the
//! end of the NIFTI-1 header, with the first byte set to something
//! other than 0.

use crate::error::{ParRecError, Result};
use byteordered::{ByteOrdered, Endianness};
use std::io::Write;

/// Data type for the extender code.
#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct Extender([u8; 4]);

impl Extender {
    /// Whether extensions should exist upon this extender code.
    pub fn has_extensions(&self) -> bool {
        self.0[0] != 0
    }

    /// Get the extender's bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for Extender {
    fn from(extender: [u8; 4]) -> Self {
        Extender(extender)
    }
}

/// Data type for the raw contents of an extension.
/// Users of this type have to reinterpret the data
/// to suit their needs.
#[derive(Debug, PartialEq, Clone)]
pub struct Extension {
    esize: i32,
    ecode: i32,
    edata: Vec<u8>,
}

impl Extension {
    /// Create an extension out of a code and its contents. The data is
    /// padded with zeros so that the full size (`8 + edata.len()`) is a
    /// multiple of 16, as required by the format.
    pub fn new(ecode: i32, mut edata: Vec<u8>) -> Result<Self> {
        let padded = (8 + edata.len() + 15) / 16 * 16;
        if padded > i32::MAX as usize {
            return Err(ParRecError::InvalidExtensionSize(edata.len()));
        }
        edata.resize(padded - 8, 0);
        Ok(Extension {
            esize: padded as i32,
            ecode,
            edata,
        })
    }

    /// Create a new extension out of a string, such as a comment.
    pub fn from_str(ecode: i32, edata: &str) -> Result<Self> {
        Extension::new(ecode, edata.as_bytes().to_vec())
    }

    /// Obtain the claimed extension raw size (`esize` field).
    pub fn size(&self) -> i32 {
        self.esize
    }

    /// Obtain the extension's code (`ecode` field).
    pub fn code(&self) -> i32 {
        self.ecode
    }

    /// Obtain the extension's data (`edata` field).
    pub fn data(&self) -> &[u8] {
        &self.edata
    }
}

/// Data type for aggregating the extender code and
/// all extensions.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct ExtensionSequence {
    extender: Extender,
    extensions: Vec<Extension>,
}

impl<'a> IntoIterator for &'a ExtensionSequence {
    type Item = &'a Extension;
    type IntoIter = ::std::slice::Iter<'a, Extension>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl ExtensionSequence {
    /// Append an extension, raising the extender flag.
    pub fn push(&mut self, extension: Extension) {
        self.extender = Extender::from([1, 0, 0, 0]);
        self.extensions.push(extension);
    }

    /// Obtain an iterator to the extensions.
    pub fn iter(&self) -> ::std::slice::Iter<'_, Extension> {
        self.extensions.iter()
    }

    /// Whether the sequence of extensions is empty.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Obtain the number of extensions available.
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Get the extender code from this extension sequence.
    pub fn extender(&self) -> Extender {
        self.extender
    }

    /// Total size of the extensions on disk, not counting the extender.
    pub fn bytes_on_disk(&self) -> usize {
        self.extensions.iter().map(|e| e.esize as usize).sum()
    }

    /// Write the extender code followed by every extension.
    pub fn write<W: Write>(&self, writer: W, endianness: Endianness) -> Result<()> {
        let mut writer = ByteOrdered::runtime(writer, endianness);
        writer.write_all(self.extender.as_bytes())?;
        for extension in &self.extensions {
            writer.write_i32(extension.esize)?;
            writer.write_i32(extension.ecode)?;
            writer.write_all(&extension.edata)?;
        }
        Ok(())
    }
}
