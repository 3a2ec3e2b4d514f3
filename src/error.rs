use crate::Datatype::Residency;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdapterError>;

/// Errors surfaced by the adapter and its allocators.
///
/// Only `ResourceExhausted` is produced by the send/receive preparation
/// operations. The other variants come from constructing backing memory or
/// reference layouts.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("out of {residency} memory: failed to allocate {requested} bytes")]
    ResourceExhausted { requested: usize, residency: Residency },

    #[error("{context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}

impl AdapterError {
    pub fn exhausted(requested: usize, residency: Residency) -> Self {
        AdapterError::ResourceExhausted {
            requested,
            residency,
        }
    }

    pub fn backend(context: impl Into<String>, source: io::Error) -> Self {
        AdapterError::Backend {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_layout(message: impl Into<String>) -> Self {
        AdapterError::InvalidLayout(message.into())
    }

    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, AdapterError::ResourceExhausted { .. })
    }
}

impl From<AdapterError> for io::Error {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::ResourceExhausted { .. } => {
                io::Error::new(io::ErrorKind::OutOfMemory, err.to_string())
            }
            AdapterError::Backend { context, source } => {
                io::Error::new(source.kind(), format!("{context}: {source}"))
            }
            AdapterError::InvalidLayout(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
            }
        }
    }
}
