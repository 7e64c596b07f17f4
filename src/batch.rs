//! Conversion of a list of inputs, one failure not stopping the others.

use crate::convert::convert_file;
use crate::error::{ConversionError, ParRecError};
use crate::options::ConversionOptions;
use log::error;
use std::fmt;
use std::path::Path;

/// Convert every input in order, collecting one error per failed input.
pub fn run<I, P>(inputs: I, options: &ConversionOptions) -> Vec<ConversionError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    inputs
        .into_iter()
        .filter_map(|input| {
            let input = input.as_ref();
            convert_file(input, options).err().map(|e| {
                error!("Conversion of {} failed: {}", input.display(), e);
                ConversionError {
                    input: input.to_path_buf(),
                    error: e,
                }
            })
        })
        .collect()
}

/// The failures of a batch, reported together.
#[derive(Debug)]
pub struct BatchError(pub Vec<ConversionError>);

impl BatchError {
    /// Turn the errors of a batch into a result, failing if there is any.
    pub fn check(errors: Vec<ConversionError>) -> Result<(), BatchError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BatchError(errors))
        }
    }

    /// The causes of each failure.
    pub fn causes(&self) -> impl Iterator<Item = &ParRecError> {
        self.0.iter().map(|e| &e.error)
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} conversion(s) failed:", self.0.len())?;
        for e in &self.0 {
            writeln!(f, "  {}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}
