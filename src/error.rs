//! Error types.
//!
//! Everything fallible in `hidlink` returns [`Result`]. Errors fall into the classes
//! callers actually branch on:
//! - [`Error::Open`]: the device node could not be opened (bad path, device gone,
//!   access denied). Carries the path that failed.
//! - [`Error::Io`]: a `write` or `read_exact` failed, including end-of-stream before a
//!   report was complete and a sink that stopped accepting bytes mid-write.
//! - [`Error::Enumerate`]: the browser backend could not list devices.
//! - [`Error::Config`]: a configuration document could not be read or parsed.
//! - [`Error::Json`]: a device identity could not be exported or imported as JSON.
//!
//! "Capability unavailable" is deliberately *not* an error; see
//! [`Capability::UNAVAILABLE`](crate::capability::Capability::UNAVAILABLE).

use std::io;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by device handles, browsers and configuration loading.
#[derive(Error, Debug)]
pub enum Error {
    /// The OS refused to open the device node at `path`.
    #[error("could not open HID device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A report read or write failed.
    #[error("HID I/O error: {0}")]
    Io(#[from] io::Error),

    /// Device enumeration failed in the browser backend.
    #[error("HID enumeration failed: {0}")]
    Enumerate(String),

    /// A configuration document could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A device identity could not be converted to or from JSON.
    #[error("identity JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// `true` for failures raised while opening a device.
    pub fn is_open(&self) -> bool {
        matches!(self, Error::Open { .. })
    }

    /// `true` for failures raised by report I/O on an open device.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// The underlying [`io::ErrorKind`] for open and I/O failures.
    pub fn kind(&self) -> Option<io::ErrorKind> {
        match self {
            Error::Open { source, .. } => Some(source.kind()),
            Error::Io(e) => Some(e.kind()),
            _ => None,
        }
    }

    pub(crate) fn open(path: &str, source: io::Error) -> Self {
        Error::Open {
            path: path.to_owned(),
            source,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_error_names_the_path() {
        let err = Error::open(
            r"\\?\hid#vid_046d&pid_c52b",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.is_open());
        assert!(!err.is_io());
        assert_eq!(err.kind(), Some(io::ErrorKind::NotFound));
        assert!(err.to_string().contains(r"\\?\hid#vid_046d&pid_c52b"));
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn fails() -> Result<()> {
            Err(io::Error::from(io::ErrorKind::UnexpectedEof))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(err.is_io());
        assert_eq!(err.kind(), Some(io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn config_errors_have_no_io_kind() {
        let err = Error::Config("bad".into());
        assert_eq!(err.kind(), None);
    }
}
