//! Error taxonomy for graph operations.
//!
//! Argument problems are detected before any batch is built, so an
//! `InvalidArgument`/`InvalidDomain` never leaves a partial write behind.
//! `NotFound` and `EmptyResult` are both recoverable: the first means a
//! referenced node is absent, the second that a well-formed query matched
//! nothing.

use assetgraph_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to obtain a valid domain name for {0:?}")]
    InvalidDomain(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no results: {0}")]
    EmptyResult(String),

    #[error("no facts were collected for migration")]
    NothingToMigrate,

    #[error("operation canceled")]
    Canceled,

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GraphError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound(_))
    }

    pub fn is_empty_result(&self) -> bool {
        matches!(self, GraphError::EmptyResult(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            GraphError::InvalidArgument(_) | GraphError::InvalidDomain(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

pub(crate) fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GraphError::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(())
}
