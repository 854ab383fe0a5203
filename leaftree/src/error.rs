use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Tree must not be empty")]
    TreeMustNotBeEmpty,

    #[error("Not found: {}", .key)]
    NotFound { key: String },

    #[error("file size {} exceeds maximum limit of {} bytes", .size, .max)]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid size {} GiB. Must be greater than 0", .0)]
    InvalidSizeCeiling(i64),

    #[error("Invalid digest length {}, expected 32", .0)]
    InvalidDigestLength(usize),

    #[error("Invalid: {}", .0)]
    Invalid(String),

    #[error("error {} {}: {}", .action, .path.display(), .source)]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),

    #[cfg(feature = "metrics")]
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),
}

impl Error {
    /// true for the distinguished "not found" condition of a store lookup or delete
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub(crate) fn not_found(key: &[u8]) -> Self {
        Error::NotFound {
            key: String::from_utf8_lossy(key).into_owned(),
        }
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
