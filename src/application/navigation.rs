//! Re-mounts the products shell whenever the address changes.

use tokio::sync::watch;
use tracing::debug;

use crate::application::address::AddressBar;
use crate::application::logic::LogicStage;
use crate::application::params::RawParams;
use crate::application::shell::ShellStage;

/// Render host for one navigation context.
///
/// Exactly one shell is mounted at a time; replacing it drops the previous
/// one, which abandons its resolve.
pub struct Navigator {
    logic: LogicStage,
    address: watch::Receiver<RawParams>,
    shell: ShellStage,
}

impl Navigator {
    pub fn new(logic: LogicStage, address: &AddressBar) -> Self {
        let mut address = address.subscribe();
        let raw = address.borrow_and_update().clone();
        let shell = ShellStage::mount(logic.clone(), raw);
        Self {
            logic,
            address,
            shell,
        }
    }

    pub fn shell(&self) -> &ShellStage {
        &self.shell
    }

    /// Wait for the next address change and mount a fresh shell for it.
    ///
    /// Returns `None` once the address is gone.
    pub async fn next(&mut self) -> Option<&mut ShellStage> {
        self.address.changed().await.ok()?;
        let raw = self.address.borrow_and_update().clone();
        debug!(raw = %raw, "address changed, remounting shell");
        self.shell = ShellStage::mount(self.logic.clone(), raw);
        Some(&mut self.shell)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::application::catalog::CatalogService;
    use crate::application::params::{ProductQuery, QUERY_PARAM};
    use crate::application::repos::{ProductsRepo, RepoError};
    use crate::application::shell::ResolveState;
    use crate::domain::products::ProductRecord;

    struct EchoRepo;

    #[async_trait]
    impl ProductsRepo for EchoRepo {
        async fn list_products(
            &self,
            query: &ProductQuery,
        ) -> Result<Vec<ProductRecord>, RepoError> {
            Ok(vec![ProductRecord {
                id: 1,
                name: query.q.clone(),
                price: 60,
                description: String::new(),
            }])
        }
    }

    #[tokio::test]
    async fn address_change_remounts_with_new_parameters() {
        let logic = LogicStage::new(Arc::new(CatalogService::new(Arc::new(EchoRepo))));
        let address = AddressBar::default();
        let mut navigator = Navigator::new(logic, &address);

        address.set_param(QUERY_PARAM, "sofa");
        let shell = navigator.next().await.expect("address alive");
        assert_eq!(shell.raw_params().first(QUERY_PARAM), Some("sofa"));

        match shell.settled().await {
            ResolveState::Resolved(payload) => assert_eq!(payload.query.q, "sofa"),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn next_ends_when_the_address_is_dropped() {
        let logic = LogicStage::new(Arc::new(CatalogService::new(Arc::new(EchoRepo))));
        let address = AddressBar::default();
        let mut navigator = Navigator::new(logic, &address);

        drop(address);
        assert!(navigator.next().await.is_none());
    }
}
