use getset::Getters;
use std::time::Duration;
use strum_macros::Display;

/// Which collection a failed request was after.
///
/// The rendered text is stable and meant to be shown to the user as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    #[strum(to_string = "Error retrieving characters")]
    Characters,
    #[strum(to_string = "Error retrieving character's comics")]
    Comics,
}

/// Low level reason a remote call did not produce a usable body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid request URL: {0}")]
    Url(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// A failed fetch on a cache miss. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Getters)]
#[error("{kind}")]
#[get = "pub"]
pub struct Error {
    kind: ErrorKind,
    #[source]
    cause: TransportError,
}

impl Error {
    pub fn new(kind: ErrorKind, cause: TransportError) -> Self {
        Self { kind, cause }
    }

    /// User facing message for this failure.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_stable() {
        let characters = Error::new(ErrorKind::Characters, TransportError::Status(500));
        let comics = Error::new(
            ErrorKind::Comics,
            TransportError::Network("connection reset".to_string()),
        );

        assert_eq!(characters.to_string(), "Error retrieving characters");
        assert_eq!(comics.message(), "Error retrieving character's comics");
        assert_eq!(comics.cause(), &TransportError::Network("connection reset".to_string()));
    }
}
