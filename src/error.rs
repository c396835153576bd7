//! Error taxonomy shared by the reader, the encoder and the driver.

use std::io;
use std::path::{Path, PathBuf};

/// Errors raised while converting a single point-cloud file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file could not be opened, created, read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The PCD header or data section is inconsistent.
    #[error("malformed PCD file {}: {reason}", path.display())]
    MalformedInput { path: PathBuf, reason: String },

    /// A point lacks a field the record layout needs.
    #[error("cannot encode point {index}: missing field '{field}'")]
    Encoding { index: usize, field: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn malformed(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Error::MalformedInput {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Short label used in logs and the batch summary.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io { .. } => "io",
            Error::MalformedInput { .. } => "malformed-input",
            Error::Encoding { .. } => "encoding",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_file() {
        let err = Error::malformed("clouds/a.pcd", "missing DATA line");
        assert_eq!(err.to_string(), "malformed PCD file clouds/a.pcd: missing DATA line");
        assert_eq!(err.kind(), "malformed-input");

        let err = Error::io("out/a.bin", io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(err.to_string().starts_with("I/O error on out/a.bin"));
        assert_eq!(err.kind(), "io");
    }
}
