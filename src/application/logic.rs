//! Parameter resolution: decode the raw address, then fetch the page.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use crate::application::catalog::{CatalogError, CatalogService};
use crate::application::params::{self, ProductQuery, RawParams};
use crate::domain::products::ProductRecord;

/// Records ready to render plus the parameters that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPayload {
    pub records: Vec<ProductRecord>,
    pub query: ProductQuery,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("resolve abandoned before completion")]
    Abandoned,
}

/// The only stage of the products pipeline that awaits.
#[derive(Clone)]
pub struct LogicStage {
    catalog: Arc<CatalogService>,
}

impl LogicStage {
    pub fn new(catalog: Arc<CatalogService>) -> Self {
        Self { catalog }
    }

    /// Decode `raw` and fetch the matching page. No retry, no partial result.
    #[instrument(skip(self), fields(raw = %raw))]
    pub async fn resolve(&self, raw: &RawParams) -> Result<RenderPayload, ResolveError> {
        let query = params::decode(raw);
        let records = self.catalog.fetch(&query).await?;
        Ok(RenderPayload { records, query })
    }
}
