//! Repository traits describing the catalog backing store.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::params::ProductQuery;
use crate::domain::products::{NewProduct, ProductRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
    #[error("write rejected: {message}")]
    Rejected { message: String },
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl RepoError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::Unavailable(detail.into())
    }

    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait ProductsRepo: Send + Sync {
    /// Produce one listing page for the resolved parameters.
    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>, RepoError>;
}

#[async_trait]
pub trait ProductsWriteRepo: Send + Sync {
    async fn create_product(&self, product: NewProduct) -> Result<ProductRecord, RepoError>;
}
