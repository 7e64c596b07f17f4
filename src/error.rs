//! Types for error handling go here.
use std::fmt;
use std::io::Error as IOError;
use std::path::PathBuf;

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    pub enum ParRecError {
        /// Invalid or inconsistent conversion settings.
        Config(msg: String) {
            display("Invalid configuration: {}", msg)
        }
        /// The output file already exists and overwriting was not permitted.
        FileExists(path: PathBuf) {
            display("Output file {} exists, use --overwrite to replace it", path.display())
        }
        /// The PAR/REC source is malformed, unsupported or truncated.
        Format(msg: String) {
            display("Invalid PAR/REC file: {}", msg)
        }
        /// The requested information does not apply to this acquisition.
        NotApplicable(what: &'static str) {
            display("Not applicable: {}", what)
        }
        /// The `descrip` field must hold at most 80 bytes.
        IncorrectDescriptionLength(len: usize) {
            display("Description length ({} bytes) is greater than 80 bytes.", len)
        }
        /// An extension's size would not fit in the `esize` field.
        InvalidExtensionSize(len: usize) {
            display("Extension of {} bytes is too large", len)
        }
        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
            display("I/O error: {}", err)
        }
    }
}

impl ParRecError {
    /// Whether this error stands for an expected absence of information
    /// rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, ParRecError::NotApplicable(_))
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, ParRecError>;

/// A failed conversion of a single input file within a batch.
#[derive(Debug)]
pub struct ConversionError {
    /// The input file which failed to convert.
    pub input: PathBuf,
    /// The underlying cause.
    pub error: ParRecError,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.input.display(), self.error)
    }
}

impl std::error::Error for ConversionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
