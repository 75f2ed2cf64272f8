//! Error types for terraf

use thiserror::Error;

/// Main error type for terraf operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Raster '{name}' is not co-registered with the stack (geotransform differs)")]
    TransformMismatch { name: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A reference site or query lies outside the available raster/point extent.
    #[error("Coverage error for {what}: {reason}")]
    Coverage { what: String, reason: String },

    /// No samples could be pooled for a required spectral index.
    #[error("Signature error for index '{index}': {reason}")]
    Signature { index: String, reason: String },

    /// Ill-conditioned or degenerate interpolation point set.
    #[error("Interpolation error: {0}")]
    Interpolation(String),

    /// Weight or threshold configuration violates its invariants.
    #[error("Configuration error: {name} ({reason})")]
    Config { name: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Config {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn coverage(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Coverage {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for terraf operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_error_names_index() {
        let err = Error::Signature {
            index: "GOSSAN".into(),
            reason: "no samples".into(),
        };
        assert!(err.to_string().contains("GOSSAN"));
    }

    #[test]
    fn test_config_helper() {
        let err = Error::config("weights", "sum is 1.1");
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("sum is 1.1"));
    }
}
