use std::fmt::Formatter;
use std::{fmt, io};

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A parser declared a length which would read past the end of the buffer.
    MalformedInput(String),
    /// A field reached the serializer or preparator with neither a computed
    /// nor an explicit value.
    UnresolvedField(String),
    /// Record MAC verification failed during decapsulation.
    Integrity,
    /// Record padding was structurally invalid during decapsulation.
    BadPadding,
    /// A connection was set up with an unusable configuration.
    Configuration(String),
    /// Unexpected transport error. Timeouts are not reported here, they are
    /// recoverable observations handled by the trace executor.
    Io(String),
    /// Error while assembling or executing a workflow trace, e.g. an action
    /// referencing an undeclared connection alias.
    Trace(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedInput(err) => write!(f, "malformed input: {}", err),
            Error::UnresolvedField(field) => {
                write!(f, "field {} has neither a computed nor an explicit value", field)
            }
            Error::Integrity => write!(f, "record MAC verification failed"),
            Error::BadPadding => write!(f, "record padding is invalid"),
            Error::Configuration(err) => write!(f, "invalid connection configuration: {}", err),
            Error::Io(err) => write!(f, "transport error: {}", err),
            Error::Trace(err) => write!(f, "workflow trace error: {}", err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
