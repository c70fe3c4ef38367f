//! Error types for the kinsight crate

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`], used by callers to pick a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something the current state cannot serve (client error)
    Precondition,
    /// A computation failed on otherwise valid input (server error)
    Computation,
}

/// Error types that can occur during preprocessing, clustering and reporting
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input parameters
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Error message
        message: String,
    },

    /// Empty or invalid data
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Error message
        message: String,
    },

    /// Convergence failure
    #[error("Convergence failure: {message}")]
    ConvergenceFailure {
        /// Error message
        message: String,
    },

    /// Initialization failure
    #[error("Initialization failure: {message}")]
    InitializationFailure {
        /// Error message
        message: String,
    },

    /// Mathematical computation error
    #[error("Computation error: {message}")]
    ComputationError {
        /// Error message
        message: String,
    },

    /// Unrecognised preprocessing option
    #[error("Unknown {field} policy: '{value}'")]
    UnknownPolicy {
        /// Which option was being parsed (missing, encoding, scaling, init)
        field: &'static str,
        /// The rejected value
        value: String,
    },

    /// No dataset has been loaded into the session
    #[error("No preprocessed dataset loaded")]
    NoDataset,

    /// No model has been trained in the session
    #[error("No trained model available")]
    NoModel,

    /// Report format other than pdf or csv
    #[error("Unsupported report format '{format}', use 'pdf' or 'csv'")]
    UnsupportedFormat {
        /// The requested format
        format: String,
    },

    /// Reading or writing files failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Excel workbook could not be read
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Chart or PDF rendering failed
    #[error("Render error: {message}")]
    Render {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a new InvalidParameter error
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a new InvalidData error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new ConvergenceFailure error
    pub fn convergence_failure(message: impl Into<String>) -> Self {
        Self::ConvergenceFailure {
            message: message.into(),
        }
    }

    /// Create a new InitializationFailure error
    pub fn initialization_failure(message: impl Into<String>) -> Self {
        Self::InitializationFailure {
            message: message.into(),
        }
    }

    /// Create a new ComputationError
    pub fn computation_error(message: impl Into<String>) -> Self {
        Self::ComputationError {
            message: message.into(),
        }
    }

    /// Create a new UnknownPolicy error
    pub fn unknown_policy(field: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownPolicy {
            field,
            value: value.into(),
        }
    }

    /// Create a new UnsupportedFormat error
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a new Render error
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Classify the error as a caller precondition or a computation failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter { .. }
            | Self::UnknownPolicy { .. }
            | Self::NoDataset
            | Self::NoModel
            | Self::UnsupportedFormat { .. } => ErrorKind::Precondition,
            _ => ErrorKind::Computation,
        }
    }

    /// Whether the error should be reported as a client error
    pub fn is_precondition(&self) -> bool {
        self.kind() == ErrorKind::Precondition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::NoDataset.is_precondition());
        assert!(Error::NoModel.is_precondition());
        assert!(Error::invalid_parameter("k too large").is_precondition());
        assert!(Error::unsupported_format("xlsx").is_precondition());
        assert!(Error::unknown_policy("scaling", "robust").is_precondition());
        assert_eq!(Error::computation_error("nan").kind(), ErrorKind::Computation);
        assert_eq!(Error::invalid_data("empty").kind(), ErrorKind::Computation);
    }

    #[test]
    fn test_error_messages() {
        let err = Error::unknown_policy("missing", "interpolate");
        assert_eq!(err.to_string(), "Unknown missing policy: 'interpolate'");

        let err = Error::unsupported_format("xlsx");
        assert!(err.to_string().contains("'pdf' or 'csv'"));
    }
}
