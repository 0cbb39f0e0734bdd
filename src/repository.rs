//! Write-then-mirror repository over the record store and the search index.
//!
//! Every write lands in the [`RecordStore`] first. The resulting document is then copied to
//! the [`SearchIndex`] with a bounded number of retries. A mirror that still fails is logged
//! and left for [`Repositories::reindex`]; it never fails the write.
//!
//! Copies are versioned by the record's `updated_at`, so a mirror that arrives late cannot
//! replace a newer copy of the same record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine, Coupon, Order, ProductVariant, StatusChange, User};
use crate::search::{self, Clause, SearchError, SearchIndex, SearchQuery, ID_FIELD};
use crate::store::{RecordStore, StoreError};

const MIRROR_BACKOFF: Duration = Duration::from_millis(25);

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("cannot encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RepoError>;

/// A record whose `updated_at` advances on every store write.
pub trait Revisioned: Serialize + Sync {
    fn revised_at(&self) -> DateTime<Utc>;

    /// Mirror version: microseconds since the epoch.
    fn revision(&self) -> i64 { self.revised_at().timestamp_micros() }
}

macro_rules! revisioned {
    ($($ty:ty),*) => { $(impl Revisioned for $ty { fn revised_at(&self) -> DateTime<Utc> { self.updated_at } })* };
}

revisioned!(User, Cart, ProductVariant, Coupon, Order);

#[derive(Clone)]
pub struct Repositories {
    store: Arc<dyn RecordStore>,
    index: Arc<dyn SearchIndex>,
    mirror_retries: u32,
}

fn decode<T: DeserializeOwned>(doc: Value) -> Result<T> {
    serde_json::from_value(doc).map_err(|e| RepoError::Search(SearchError::Decode(e.to_string())))
}

impl Repositories {
    pub fn new(store: Arc<dyn RecordStore>, index: Arc<dyn SearchIndex>, mirror_retries: u32) -> Self {
        Self { store, index, mirror_retries: mirror_retries.max(1) }
    }

    pub fn store(&self) -> &dyn RecordStore { self.store.as_ref() }
    pub fn index(&self) -> &dyn SearchIndex { self.index.as_ref() }

    /// Copies `record` into the index. Returns whether the index now holds this copy or a newer one.
    pub async fn mirror<T: Revisioned>(&self, index: &str, id: &str, record: &T) -> bool {
        let doc = match serde_json::to_value(record) {
            Ok(doc) => doc,
            Err(e) => { error!(index, id, error = %e, "cannot encode document for mirroring"); return false; }
        };
        let version = record.revision();
        for attempt in 1..=self.mirror_retries {
            match self.index.index_versioned(index, id, &doc, version).await {
                Ok(true) => return true,
                Ok(false) => { debug!(index, id, version, "stale mirror skipped"); return true; }
                Err(e) if attempt < self.mirror_retries => {
                    warn!(index, id, attempt, error = %e, "mirror failed, retrying");
                    tokio::time::sleep(MIRROR_BACKOFF * 2u32.pow(attempt - 1)).await;
                }
                Err(e) => error!(index, id, attempts = attempt, error = %e, "mirror gave up; index is stale until reindex"),
            }
        }
        false
    }

    async fn unmirror(&self, index: &str, id: &str) {
        if let Err(e) = self.index.delete_document(index, id).await {
            warn!(index, id, error = %e, "cannot remove document from index");
        }
    }

    // ---- index reads ----

    pub async fn cart_for_user(&self, user_id: Uuid) -> Result<Option<Cart>> {
        let query = SearchQuery::new().filter(Clause::term("user_id", user_id.to_string())).page(0, 1);
        Ok(self.index.search(search::CARTS, &query).await?.decode()?.into_iter().next())
    }

    pub async fn variants_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ProductVariant>> {
        if ids.is_empty() { return Ok(vec![]); }
        let query = SearchQuery::new()
            .filter(Clause::terms(ID_FIELD, ids.iter().map(|id| json!(id.to_string())).collect()))
            .page(0, ids.len());
        Ok(self.index.search(search::PRODUCT_VARIANTS, &query).await?.decode()?)
    }

    pub async fn coupon(&self, code: &str) -> Result<Option<Coupon>> {
        self.index.get_document(search::COUPONS, code).await?.map(decode).transpose()
    }

    pub async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        self.index.get_document(search::ORDERS, &id.to_string()).await?.map(decode).transpose()
    }

    pub async fn search_orders(&self, query: &SearchQuery) -> Result<(u64, Vec<Order>)> {
        let hits = self.index.search(search::ORDERS, query).await?;
        let total = hits.total;
        Ok((total, hits.decode()?))
    }

    // ---- writes ----

    pub async fn insert_user(&self, user: &User) -> Result<User> {
        let user = self.store.insert_user(user).await?;
        self.mirror(search::USERS, &user.id.to_string(), &user).await;
        Ok(user)
    }

    pub async fn adjust_loyalty_points(&self, user_id: Uuid, spend: i64, earn: i64) -> Result<Option<User>> {
        let user = self.store.adjust_loyalty_points(user_id, spend, earn).await?;
        if let Some(user) = &user { self.mirror(search::USERS, &user.id.to_string(), user).await; }
        Ok(user)
    }

    pub async fn find_or_create_cart(&self, user_id: Uuid) -> Result<Cart> {
        let cart = self.store.find_or_create_cart(user_id).await?;
        self.mirror(search::CARTS, &cart.id.to_string(), &cart).await;
        Ok(cart)
    }

    pub async fn save_cart_items(&self, cart_id: Uuid, items: &[CartLine]) -> Result<Option<Cart>> {
        let cart = self.store.save_cart_items(cart_id, items).await?;
        if let Some(cart) = &cart { self.mirror(search::CARTS, &cart.id.to_string(), cart).await; }
        Ok(cart)
    }

    pub async fn delete_cart(&self, cart_id: Uuid) -> Result<bool> {
        let deleted = self.store.delete_cart(cart_id).await?;
        self.unmirror(search::CARTS, &cart_id.to_string()).await;
        Ok(deleted)
    }

    pub async fn upsert_variant(&self, variant: &ProductVariant) -> Result<ProductVariant> {
        let variant = self.store.upsert_variant(variant).await?;
        self.mirror(search::PRODUCT_VARIANTS, &variant.id.to_string(), &variant).await;
        Ok(variant)
    }

    pub async fn decrement_stock(&self, id: Uuid, n: i32) -> Result<Option<ProductVariant>> {
        let variant = self.store.decrement_stock(id, n).await?;
        if let Some(v) = &variant { self.mirror(search::PRODUCT_VARIANTS, &v.id.to_string(), v).await; }
        Ok(variant)
    }

    pub async fn increment_stock(&self, id: Uuid, n: i32) -> Result<Option<ProductVariant>> {
        let variant = self.store.increment_stock(id, n).await?;
        if let Some(v) = &variant { self.mirror(search::PRODUCT_VARIANTS, &v.id.to_string(), v).await; }
        Ok(variant)
    }

    pub async fn insert_coupon(&self, coupon: &Coupon) -> Result<Coupon> {
        let coupon = self.store.insert_coupon(coupon).await?;
        self.mirror(search::COUPONS, &coupon.code, &coupon).await;
        Ok(coupon)
    }

    pub async fn claim_coupon(&self, code: &str, order_id: Uuid) -> Result<Option<Coupon>> {
        let coupon = self.store.claim_coupon(code, order_id).await?;
        if let Some(c) = &coupon { self.mirror(search::COUPONS, &c.code, c).await; }
        Ok(coupon)
    }

    pub async fn release_coupon(&self, code: &str, order_id: Uuid) -> Result<Option<Coupon>> {
        let coupon = self.store.release_coupon(code, order_id).await?;
        if let Some(c) = &coupon { self.mirror(search::COUPONS, &c.code, c).await; }
        Ok(coupon)
    }

    /// Persists the order in the record store only. Mirroring is a separate post-commit step.
    pub async fn insert_order(&self, order: &Order) -> Result<Order> {
        Ok(self.store.insert_order(order).await?)
    }

    pub async fn transition_order(&self, id: Uuid, change: &StatusChange) -> Result<Option<Order>> {
        let order = self.store.transition_order(id, change).await?;
        // Full copy, so an order the index never received is repaired too.
        if let Some(o) = &order { self.mirror(search::ORDERS, &o.id.to_string(), o).await; }
        Ok(order)
    }

    /// Creates any missing index with its mappings. Runs on every start, ahead of the first write.
    pub async fn prepare_indices(&self) -> Result<()> {
        for index in search::ALL_INDICES { self.index.ensure_index(index).await?; }
        Ok(())
    }

    /// Rebuilds every index from the record store. Returns the number of documents written.
    pub async fn reindex(&self) -> Result<usize> {
        fn entry<T: Revisioned>(index: &'static str, id: String, record: &T) -> Result<(&'static str, String, Value, i64)> {
            Ok((index, id, serde_json::to_value(record)?, record.revision()))
        }
        for index in search::ALL_INDICES { self.index.recreate_index(index).await?; }
        let mut docs = vec![];
        for u in self.store.all_users().await? { docs.push(entry(search::USERS, u.id.to_string(), &u)?); }
        for c in self.store.all_carts().await? { docs.push(entry(search::CARTS, c.id.to_string(), &c)?); }
        for v in self.store.all_variants().await? { docs.push(entry(search::PRODUCT_VARIANTS, v.id.to_string(), &v)?); }
        for c in self.store.all_coupons().await? { docs.push(entry(search::COUPONS, c.code.clone(), &c)?); }
        for o in self.store.all_orders().await? { docs.push(entry(search::ORDERS, o.id.to_string(), &o)?); }
        let written = docs.len();
        for chunk in docs.chunks(64) {
            try_join_all(chunk.iter().map(|(index, id, doc, version)| self.index.index_versioned(index, id, doc, *version))).await?;
        }
        info!(documents = written, "search index rebuilt from record store");
        Ok(written)
    }
}
