use std::error;
use std::fmt;
use std::io;
use std::result;

use csv_stream_core::{ConfigError, Malformed};

use crate::byte_record::{ByteRecord, Position};

/// A type alias for `Result<T, csv_stream::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when processing CSV data.
///
/// This error can happen when writing or reading CSV data.
///
/// Note that there are some important scenarios where an error is impossible
/// to occur. For example, if a CSV reader is used on an in-memory buffer of
/// well formed CSV data and one is reading records as raw byte strings, then
/// no error can occur.
#[derive(Debug)]
pub enum Error {
    /// An I/O error that occurred while reading or writing CSV data.
    Io(io::Error),
    /// The CSV data is malformed. Reading stops at the first such error.
    Malformed {
        /// The position just past the byte that triggered this error.
        pos: Position,
        /// What was wrong with the data.
        err: Malformed,
    },
    /// A UTF-8 decoding error that occured while reading CSV data into Rust
    /// `String`s.
    Utf8 {
        /// The position of the record in which this error occurred, if
        /// available.
        pos: Option<Position>,
        /// The corresponding UTF-8 error.
        err: Utf8Error,
    },
    /// The reader or writer configuration is invalid. This is reported
    /// before any data is read or written.
    Config(ConfigError),
}

impl Error {
    /// Returns true if this is an I/O error.
    pub fn is_io_error(&self) -> bool {
        match *self {
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Return the position for this error, if one exists.
    pub fn position(&self) -> Option<&Position> {
        match *self {
            Error::Malformed { ref pos, .. } => Some(pos),
            Error::Utf8 { ref pos, .. } => pos.as_ref(),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Error {
        Error::Config(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        io::Error::new(io::ErrorKind::Other, err)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Utf8 { ref err, .. } => Some(err),
            Error::Malformed { .. } | Error::Config(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            Error::Malformed { ref pos, ref err } => write!(
                f,
                "CSV parse error: record {} (line {}, byte {}): {}",
                pos.record(),
                pos.line(),
                pos.byte(),
                err
            ),
            Error::Utf8 { pos: None, ref err } => {
                write!(f, "CSV parse error: field {}: {}", err.field(), err)
            }
            Error::Utf8 { pos: Some(ref pos), ref err } => write!(
                f,
                "CSV parse error: record {} \
                 (line {}, byte {}, field: {}): {}",
                pos.record(),
                pos.line(),
                pos.byte(),
                err.field(),
                err
            ),
            Error::Config(ref err) => {
                write!(f, "CSV configuration error: {}", err)
            }
        }
    }
}

/// A UTF-8 validation error that occurs when attempting to convert a
/// `ByteRecord` into a `StringRecord`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FromUtf8Error {
    record: ByteRecord,
    err: Utf8Error,
}

impl FromUtf8Error {
    pub(crate) fn new(record: ByteRecord, err: Utf8Error) -> FromUtf8Error {
        FromUtf8Error { record, err }
    }

    /// Access the underlying `ByteRecord` that failed UTF-8 validation.
    pub fn into_byte_record(self) -> ByteRecord {
        self.record
    }

    /// Access the underlying UTF-8 validation error.
    pub fn utf8_error(&self) -> &Utf8Error {
        &self.err
    }
}

impl fmt::Display for FromUtf8Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl error::Error for FromUtf8Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.err)
    }
}

/// A UTF-8 validation error.
///
/// The error includes the index of the field that failed validation, and the
/// last byte at which valid UTF-8 was verified.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Utf8Error {
    /// The field index of a byte record in which UTF-8 validation failed.
    field: usize,
    /// The index into the given field up to which valid UTF-8 was verified.
    valid_up_to: usize,
}

impl Utf8Error {
    pub(crate) fn new(field: usize, valid_up_to: usize) -> Utf8Error {
        Utf8Error { field, valid_up_to }
    }

    /// The field index of a byte record in which UTF-8 validation failed.
    pub fn field(&self) -> usize {
        self.field
    }

    /// The index into the given field up to which valid UTF-8 was verified.
    pub fn valid_up_to(&self) -> usize {
        self.valid_up_to
    }
}

impl fmt::Display for Utf8Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid utf-8: invalid UTF-8 in field {} near byte index {}",
            self.field, self.valid_up_to
        )
    }
}

impl error::Error for Utf8Error {}

/// `IntoInnerError` occurs when consuming a `Writer` fails.
///
/// Consuming the `Writer` causes a flush to happen. If the flush fails, then
/// this error is returned, which contains both the original `Writer` and
/// the error that occurred.
///
/// The type parameter `W` is the unconsumed writer.
pub struct IntoInnerError<W> {
    wtr: W,
    err: io::Error,
}

impl<W> IntoInnerError<W> {
    pub(crate) fn new(wtr: W, err: io::Error) -> IntoInnerError<W> {
        IntoInnerError { wtr, err }
    }

    /// Returns the error which caused the call to `into_inner` to fail.
    ///
    /// This error was returned when attempting to flush the internal buffer.
    pub fn error(&self) -> &io::Error {
        &self.err
    }

    /// Returns the underlying writer which generated the error.
    ///
    /// The returned value can be used for error recovery, such as
    /// re-inspecting the buffer.
    pub fn into_inner(self) -> W {
        self.wtr
    }
}

impl<W: std::any::Any> error::Error for IntoInnerError<W> {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.err)
    }
}

impl<W> fmt::Display for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl<W> fmt::Debug for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}
