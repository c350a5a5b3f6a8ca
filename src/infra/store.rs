//! In-memory stand-in for the catalog backing store.
//!
//! Listing pages are generated from the parameters alone; created products go
//! to an append-only log. Latency and availability are configurable so the
//! pending and failed render paths can be observed.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::application::params::ProductQuery;
use crate::application::repos::{ProductsRepo, ProductsWriteRepo, RepoError};
use crate::config::CatalogSettings;
use crate::domain::products::{MAX_PRICE, MIN_PRICE, NewProduct, PAGE_SIZE, ProductRecord};

const LISTING_DESCRIPTION: &str = "High quality product built to last.";
const PRICE_SPAN: u32 = MAX_PRICE - MIN_PRICE + 1;

pub struct InMemoryCatalogStore {
    fetch_delay: Duration,
    write_delay: Duration,
    available: AtomicBool,
    next_id: AtomicU32,
    created: Mutex<Vec<ProductRecord>>,
}

impl InMemoryCatalogStore {
    pub fn new(fetch_delay: Duration, write_delay: Duration) -> Self {
        Self {
            fetch_delay,
            write_delay,
            available: AtomicBool::new(true),
            next_id: AtomicU32::new(1),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn from_settings(settings: &CatalogSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.fetch_delay_ms),
            Duration::from_millis(settings.write_delay_ms),
        )
    }

    /// A store that answers without delay.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Toggle reachability. While unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub async fn created(&self) -> Vec<ProductRecord> {
        self.created.lock().await.clone()
    }

    fn ensure_available(&self) -> Result<(), RepoError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(RepoError::unavailable("catalog store is offline"))
        }
    }
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::from_settings(&CatalogSettings::default())
    }
}

/// Deterministic price in `[MIN_PRICE, MAX_PRICE]`.
fn listing_price(id: u32) -> u32 {
    MIN_PRICE + id.wrapping_mul(2_654_435_761).rotate_right(16) % PRICE_SPAN
}

fn listing_name(id: u32, q: &str) -> String {
    if q.is_empty() {
        format!("Product {id}")
    } else {
        format!("Product {id} ({q})")
    }
}

/// The page for `query`: exactly `PAGE_SIZE` records, or none when the
/// page's last id would not fit the id space.
pub fn listing_page(query: &ProductQuery) -> Vec<ProductRecord> {
    let Some(offset) = (query.page_number() - 1)
        .checked_mul(PAGE_SIZE)
        .filter(|offset| offset.checked_add(PAGE_SIZE).is_some())
    else {
        return Vec::new();
    };

    (1..=PAGE_SIZE)
        .map(|slot| offset + slot)
        .map(|id| ProductRecord {
            id,
            name: listing_name(id, &query.q),
            price: listing_price(id),
            description: LISTING_DESCRIPTION.to_string(),
        })
        .collect()
}

#[async_trait]
impl ProductsRepo for InMemoryCatalogStore {
    #[instrument(skip(self), fields(q = %query.q, page = query.page_number()))]
    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>, RepoError> {
        self.ensure_available()?;
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        // Reachability may change while the request is in flight.
        self.ensure_available()?;
        Ok(listing_page(query))
    }
}

#[async_trait]
impl ProductsWriteRepo for InMemoryCatalogStore {
    #[instrument(skip(self, product), fields(name = %product.name))]
    async fn create_product(&self, product: NewProduct) -> Result<ProductRecord, RepoError> {
        self.ensure_available()?;
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        self.ensure_available()?;

        let record = ProductRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: product.name,
            price: product.price,
            description: product.description,
        };
        self.created.lock().await.push(record.clone());
        debug!(product_id = record.id, "product appended to store log");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;

    fn query(q: &str, page: u32) -> ProductQuery {
        ProductQuery::new(q, NonZeroU32::new(page).expect("non-zero page"))
    }

    #[tokio::test]
    async fn first_page_holds_ids_one_to_eight() {
        let store = InMemoryCatalogStore::instant();
        let records = store.list_products(&query("", 1)).await.expect("listing");

        let ids: Vec<u32> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
        assert_eq!(records[0].name, "Product 1");
    }

    #[tokio::test]
    async fn second_page_continues_the_sequence() {
        let store = InMemoryCatalogStore::instant();
        let records = store.list_products(&query("", 2)).await.expect("listing");

        let ids: Vec<u32> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, (9..=16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn search_term_is_annotated_on_every_name() {
        let store = InMemoryCatalogStore::instant();
        let records = store
            .list_products(&query("shoes", 1))
            .await
            .expect("listing");

        assert_eq!(records.len(), 8);
        assert!(records.iter().all(|r| r.name.contains("shoes")));
        insta::assert_snapshot!(records[2].name, @"Product 3 (shoes)");
    }

    #[test]
    fn prices_are_deterministic_and_in_range() {
        for id in [1, 2, 8, 9, 1_000, u32::MAX] {
            let price = listing_price(id);
            assert!((MIN_PRICE..=MAX_PRICE).contains(&price), "price {price}");
            assert_eq!(price, listing_price(id));
        }
    }

    #[test]
    fn pages_past_the_id_space_are_empty() {
        assert!(listing_page(&query("", u32::MAX)).is_empty());

        // The offset of this page fits, but only seven of its ids would.
        assert!(listing_page(&query("", 536_870_912)).is_empty());

        let last_full = listing_page(&query("", 536_870_911));
        assert_eq!(last_full.len(), PAGE_SIZE as usize);
        assert_eq!(last_full[7].id, 4_294_967_288);
    }

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let store = InMemoryCatalogStore::instant();
        store.set_available(false);

        let err = store
            .list_products(&query("", 1))
            .await
            .expect_err("offline");
        assert!(matches!(err, RepoError::Unavailable(_)));

        let err = store
            .create_product(NewProduct {
                name: "Lamp".to_string(),
                price: 90,
                description: String::new(),
            })
            .await
            .expect_err("offline");
        assert!(matches!(err, RepoError::Unavailable(_)));
        assert!(store.created().await.is_empty());
    }

    #[tokio::test]
    async fn created_products_are_logged_in_order() {
        let store = InMemoryCatalogStore::instant();
        for name in ["Lamp", "Desk"] {
            store
                .create_product(NewProduct {
                    name: name.to_string(),
                    price: 120,
                    description: String::new(),
                })
                .await
                .expect("created");
        }

        let created = store.created().await;
        assert_eq!(created.len(), 2);
        assert_eq!((created[0].id, created[1].id), (1, 2));
        assert_eq!(created[1].name, "Desk");
    }
}
