use std::fmt;

/// Error kinds surfaced by the public `Index` handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    IndexInit,
    IndexGet,
    IndexAdd,
    IndexDelete,
    IndexFlush,
    IndexSession,
    SearchQuery,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

// Convenience conversions for the load/replay path, where io and bincode
// failures are almost always an IndexInit failure. Add/delete/flush call
// sites map their own io/bincode errors explicitly instead of relying on
// `?`, since the right ErrorKind there depends on which operation failed.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::IndexInit, err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::new(ErrorKind::IndexInit, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
