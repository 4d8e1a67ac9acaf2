use std::fmt::Display;

/// Boxed failure reported by a store implementation.
pub type StoreFailure = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub enum Error {
    /// Builder calls made in an order the scan cannot accept.
    InvalidState(String),
    /// A literal could not be converted into its wire representation.
    Encoding(String),
    /// The store rejected or failed the request. Kept as reported.
    Store(StoreFailure),
    /// A returned row could not be turned into a model.
    Decoding(String),
}

impl Error {
    pub fn store<E>(err: E) -> Self
    where
        E: Into<StoreFailure>,
    {
        Error::Store(err.into())
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }

    pub fn is_encoding(&self) -> bool {
        matches!(self, Error::Encoding(_))
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Error::Store(_))
    }

    pub fn is_decoding(&self) -> bool {
        matches!(self, Error::Decoding(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidState(msg) => write!(f, "Invalid scan state: {}", msg),
            Error::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            Error::Store(err) => write!(f, "Store error: {}", err),
            Error::Decoding(msg) => write!(f, "Decoding error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(&**err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn store_error_keeps_source() {
        let err = Error::store(std::io::Error::other("throttled"));
        assert!(err.is_store());
        assert_eq!(err.to_string(), "Store error: throttled");

        let source = err.source().expect("store errors expose their source");
        assert!(source.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn builder_errors_have_no_source() {
        let err = Error::InvalidState("eq() must follow filter()".to_string());
        assert!(err.is_invalid_state());
        assert!(err.source().is_none());
    }
}
