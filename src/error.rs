use std::io;

/// Errors surfaced by the container operations.
///
/// Nothing is retried internally; every failure is reported to the caller
/// through one of these variants.
#[derive(Debug)]
pub enum Error {
    /// I/O failure on the container's backing file (short read or write,
    /// seek failure).
    IOError(io::Error),

    /// The file is not a usable container: bad magic, a major version newer
    /// than this library understands, or a truncated header.
    Malformed(String),

    /// No partition matched the requested type and hardware id.
    NotFound,

    /// The payload source failed while being streamed into the container.
    SourceError(io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IOError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}
