use std::path::PathBuf;

/// Failure kinds a summarization run can end in.
///
/// The kind, not the message, decides how a failure surfaces at the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// File or datalist absent or unreadable
    Io,
    /// Format id unknown or auto-detection inconclusive
    UnsupportedFormat,
    /// Malformed bytes mid-stream
    Decode,
    /// Run was cancelled while streaming
    Cancelled,
    /// A finalized summary could not be rendered
    Render,
    /// A run operation was called in the wrong state
    InvalidState,
}

impl ErrorKind {
    /// Process exit code for a run that failed with this kind.
    ///
    /// `Io` means no usable input could be located; `UnsupportedFormat` and `Decode` are
    /// initialization/decode failures.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io => 2,
            Self::UnsupportedFormat | Self::Decode => 3,
            Self::Cancelled => 130,
            Self::Render | Self::InvalidState => 1,
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("unable to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported format for {path:?}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// Decoding failed at record index `record`.
    #[error("decode error in {path:?} at record {record}: {reason}")]
    Decode {
        path: PathBuf,
        record: usize,
        reason: String,
    },

    #[error("cancelled while reading {path:?}")]
    Cancelled { path: PathBuf },

    #[error("rendering report: {0}")]
    Render(String),

    #[error("run is {state}, expected {expected}")]
    InvalidState { state: String, expected: String },
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Render(_) => ErrorKind::Render,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    pub(crate) fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode<P: Into<PathBuf>, S: Into<String>>(
        path: P,
        record: usize,
        reason: S,
    ) -> Self {
        Self::Decode {
            path: path.into(),
            record,
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::UnsupportedFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_separate_missing_input_from_decode_failure() {
        assert_eq!(ErrorKind::Io.exit_code(), 2);
        assert_eq!(ErrorKind::UnsupportedFormat.exit_code(), 3);
        assert_eq!(ErrorKind::Decode.exit_code(), 3);
        assert_ne!(ErrorKind::Cancelled.exit_code(), 0);
        assert_eq!(ErrorKind::InvalidState.exit_code(), 1);
    }

    #[test]
    fn io_error_names_path() {
        let err = Error::io(
            "datalist.mb-1",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("datalist.mb-1"), "{err}");
    }
}
