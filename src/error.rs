use thiserror::Error;

pub type Result<T> = std::result::Result<T, KnnError>;

#[derive(Debug, Error)]
pub enum KnnError {
    #[error("format error: {0}")]
    Format(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("dimension mismatch: expected {expected} features, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("plot error: {0}")]
    Plot(String),
}

impl KnnError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<csv::Error> for KnnError {
    fn from(error: csv::Error) -> Self {
        if error.is_io_error() {
            match error.into_kind() {
                csv::ErrorKind::Io(io_error) => Self::Io(io_error),
                kind => Self::Format(format!("{kind:?}")),
            }
        } else {
            Self::Format(error.to_string())
        }
    }
}
