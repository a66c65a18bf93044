//! Error types shared by every preftree crate.
//!
//! Address and value errors are caller input errors and are never retried.
//! Store errors wrap the low-level cause. The two partial-state errors
//! (`PartialCopy`, `DuplicateAfterMove`) are terminal: the store has been
//! left in an intermediate state the caller must inspect.

use crate::address::NodeAddress;
use crate::value::TypeTag;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed address '{address}': {message}")]
    MalformedAddress { address: String, message: String },

    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("cannot read '{text}' as {tag}")]
    ValueFormat { text: String, tag: TypeTag },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("{address} already exists")]
    Conflict { address: NodeAddress },

    #[error("store error: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("store unavailable: {message}")]
    StoreUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("copy of {source_address} into {destination} stopped partway: {cause}")]
    PartialCopy {
        source_address: NodeAddress,
        destination: NodeAddress,
        #[source]
        cause: Box<Error>,
    },

    #[error("{source_address} was copied to {destination} but could not be removed: {cause}")]
    DuplicateAfterMove {
        source_address: NodeAddress,
        destination: NodeAddress,
        #[source]
        cause: Box<Error>,
    },
}

impl Error {
    pub fn malformed(address: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MalformedAddress {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn node_not_found(address: &NodeAddress) -> Self {
        Error::NotFound {
            what: format!("node {}", address),
        }
    }

    pub fn key_not_found(address: &NodeAddress, key: &str) -> Self {
        Error::NotFound {
            what: format!("key '{}' in {}", key, address),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Error::Store {
            message: message.into(),
            source: None,
        }
    }

    pub fn store_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Error::StoreUnavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn unavailable_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::StoreUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True when the store may now hold data from a half-finished operation.
    pub fn is_partial_state(&self) -> bool {
        matches!(
            self,
            Error::PartialCopy { .. } | Error::DuplicateAfterMove { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::store_with("i/o failure", e)
    }
}
