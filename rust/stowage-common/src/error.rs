use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Signals a corrupted or unsupported stream element; decoding must not continue
    /// past it since the stream framing can no longer be trusted.
    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    /// Precondition violation of a stateful component, e.g. writing past the declared
    /// value count or adding values after `finish()`.
    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// Returns `true` if the error originates from an exhausted input stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Io { source, .. } if source.kind() == std::io::ErrorKind::UnexpectedEof
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("invalid storage format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("IO error for '{context}': {source}'")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(_: std::convert::Infallible) -> Self {
        Error::invalid_operation("conversion")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_stream_detection() {
        let eof = Error::from(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(eof.is_end_of_stream());

        let other = Error::invalid_operation("add after finish");
        assert!(!other.is_end_of_stream());
        assert_eq!(other.to_string(), "invalid operation add after finish");
    }

    #[test]
    fn test_format_error_message() {
        let err = Error::invalid_format("block header", "bits per value 127 > 64");
        assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }));
        assert_eq!(
            err.to_string(),
            "invalid storage format for 'block header': bits per value 127 > 64"
        );
    }
}
