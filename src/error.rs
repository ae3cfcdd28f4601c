use std::fmt::Display;
use std::io;
use std::path::PathBuf;

/// Pail errors.
#[derive(Debug)]
pub enum Error {
    /// An open was attempted on a handle that already has a file.
    AlreadyOpen,
    /// Aligned buffer allocation failed.
    Alloc,
    /// A data file could not be opened.
    Open { path: PathBuf, source: io::Error },
    /// A syscall failed mid-operation.
    Io { op: &'static str, source: io::Error },
    /// Fewer bytes were read than the format requires. In the middle of an
    /// index page or trailer this signals corruption, not end-of-file.
    ShortRead { expected: usize, got: usize },
    /// Format violation: bad magic, unsorted index, offsets outside the
    /// record region, and the like.
    Corruption(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { source, .. } | Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::AlreadyOpen => write!(f, "a file is already open on this handle"),
            Error::Alloc => write!(f, "aligned buffer allocation failed"),
            Error::Open { path, source } => {
                write!(f, "could not open {}: {source}", path.display())
            }
            Error::Io { op, source } => write!(f, "{op} failed: {source}"),
            Error::ShortRead { expected, got } => {
                write!(f, "short read: expected {expected} bytes, got {got}")
            }
            Error::Corruption(msg) => write!(f, "corruption: {msg}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io {
            op: "io",
            source: err,
        }
    }
}

/// Constructs an Error::Corruption from the given format string.
#[macro_export]
macro_rules! corruption {
    ($($args:tt)*) => { $crate::error::Error::Corruption(format!($($args)*)) };
}

/// A Pail Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;
