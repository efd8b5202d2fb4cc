use std::path::PathBuf;

/// Failures raised by the ingestion and schema-synthesis engine.
///
/// Configuration and coercion failures are scoped to a single source file.
/// The pipeline skips a file on a configuration failure and, by default,
/// aborts on a coercion failure. I/O failures abort the operation that hit
/// them.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// A rule references a column or table that does not exist, or a key
    /// column was removed by exclusion.
    #[error("Configuration error for '{subject}': {message}")]
    Configuration { subject: String, message: String },

    /// A declared column type cannot parse the column's content.
    #[error(
        "Cannot coerce value '{value}' in column '{column}' of '{file}' (row {row}) to {expected}"
    )]
    TypeCoercion {
        file: String,
        column: String,
        value: String,
        expected: String,
        row: usize,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl IngestError {
    pub fn configuration(subject: impl Into<String>, message: impl Into<String>) -> Self {
        IngestError::Configuration {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures that only invalidate the current source file.
    pub fn is_file_scoped(&self) -> bool {
        matches!(
            self,
            IngestError::Configuration { .. } | IngestError::TypeCoercion { .. }
        )
    }
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_message_names_file_and_column() {
        let err = IngestError::TypeCoercion {
            file: "bandi.csv".to_string(),
            column: "importo".to_string(),
            value: "n.d.".to_string(),
            expected: "integer".to_string(),
            row: 4,
        };
        let message = err.to_string();
        assert!(message.contains("bandi.csv"));
        assert!(message.contains("importo"));
        assert!(message.contains("n.d."));
        assert!(err.is_file_scoped());
    }

    #[test]
    fn io_errors_are_not_file_scoped() {
        let err = IngestError::io(
            "missing.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!err.is_file_scoped());
    }
}
