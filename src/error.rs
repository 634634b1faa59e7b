use std::error;
use std::fmt;
use std::io;

/// A specialized `Result` type for chunked encoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the chunked encoders.
#[derive(Debug)]
pub enum Error {
    /// The requested charset name is not a known encoding label.
    UnsupportedCharset(String),
    /// The stream has already been closed.
    Closed,
    /// The `offset`/`len` pair does not describe a range inside the input.
    OutOfBounds {
        /// Requested start of the range.
        offset: usize,
        /// Requested length of the range.
        len: usize,
        /// Length of the input that was passed in.
        available: usize,
    },
    /// The underlying sink failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedCharset(name) => write!(f, "unsupported charset: {:?}", name),
            Error::Closed => f.write_str("chunked stream already closed"),
            Error::OutOfBounds {
                offset,
                len,
                available,
            } => write!(
                f,
                "range {}+{} out of bounds for input of length {}",
                offset, len, available
            ),
            Error::Io(err) => write!(f, "{}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            Error::Closed => io::Error::new(io::ErrorKind::BrokenPipe, err),
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}

/// Resolves `offset`/`len` against `input`, the way slice indexing would.
pub(crate) fn checked_range<T>(input: &[T], offset: usize, len: usize) -> Result<&[T]> {
    offset
        .checked_add(len)
        .and_then(|end| input.get(offset..end))
        .ok_or(Error::OutOfBounds {
            offset,
            len,
            available: input.len(),
        })
}
