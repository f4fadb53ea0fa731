use bridge_traits::error::BridgeError;
use core_catalog::CatalogError;
use core_query::QueryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] BridgeError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl CoreError {
    /// The catalog failure behind a failed query, if any.
    pub fn catalog_error(&self) -> Option<&CatalogError> {
        match self {
            CoreError::Query(error) => error.downcast_ref::<CatalogError>(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.catalog_error().is_some_and(CatalogError::is_not_found)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
