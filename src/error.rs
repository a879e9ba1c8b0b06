//! Error types shared by every stage of the archive pipeline

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Reasons separator/schema inference can fail for a file
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaInferenceError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("file is empty")]
    EmptyFile,

    #[error("no valid data lines in sample")]
    NoValidData,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("schema inference failed: {0}")]
    SchemaInference(#[from] SchemaInferenceError),

    /// A batch after the first one changed its column count. Fatal for the file.
    #[error("batch {batch} has {found} columns, expected {expected}")]
    SchemaMismatch {
        batch: usize,
        expected: usize,
        found: usize,
    },

    #[error("columnar conversion failed: {0}")]
    Conversion(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("unsupported target type: {0}")]
    UnsupportedType(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Short label for the error category, used in failure logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SchemaInference(_) => "SchemaInferenceError",
            Error::SchemaMismatch { .. } => "SchemaMismatchError",
            Error::Conversion(_) => "ConversionError",
            Error::Export(_) => "ExportError",
            Error::UnsupportedType(_) => "UnsupportedTypeError",
            Error::Decompression(_) => "DecompressionError",
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "IOError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_wraps() {
        let err: Error = SchemaInferenceError::EmptyFile.into();
        assert!(matches!(
            err,
            Error::SchemaInference(SchemaInferenceError::EmptyFile)
        ));
        assert_eq!(err.kind(), "SchemaInferenceError");
        assert_eq!(err.to_string(), "schema inference failed: file is empty");
    }

    #[test]
    fn test_mismatch_message() {
        let err = Error::SchemaMismatch {
            batch: 2,
            expected: 3,
            found: 4,
        };
        assert_eq!(err.to_string(), "batch 2 has 4 columns, expected 3");
    }

    #[test]
    fn test_io_kind() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), "IOError");
    }
}
