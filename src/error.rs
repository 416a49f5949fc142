use core::fmt;
use std::io;

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad classification of a decoding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The file violates the JPEG syntax (bad signature, wrong segment length, truncation).
    Structural,
    /// The file uses a JPEG feature this decoder does not implement.
    Unsupported,
    /// The entropy-coded data could not be decoded.
    Decode,
    /// Memory for the decoded image could not be allocated.
    Resource,
    /// Reading or writing a file failed.
    Io,
}

pub struct Error {
    repr: Repr,
}

pub(crate) enum Repr {
    Message(ErrorKind, String),
    Io(io::Error),
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            repr: Repr::Message(kind, msg.into()),
        }
    }

    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Structural, msg)
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, msg)
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        match &self.repr {
            Repr::Message(kind, _) => *kind,
            Repr::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self {
            repr: Repr::Io(value),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Message(kind, s) => write!(f, "{kind:?}: {s}"),
            Repr::Io(e) => write!(f, "Io: {e:?}"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Message(_, s) => s.fmt(f),
            Repr::Io(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.repr {
            Repr::Message(..) => None,
            Repr::Io(e) => Some(e),
        }
    }
}
