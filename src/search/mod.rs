//! Search index: the read replica every listing and checkout lookup is served from.
//!
//! Documents are plain JSON. [`SearchQuery`] is a small boolean query model that the
//! Elasticsearch client renders to the query DSL and the in-memory index evaluates directly.

use async_trait::async_trait;
use serde_json::{json, Value};

pub mod elasticsearch;
pub mod memory;

pub use elasticsearch::ElasticsearchIndex;
pub use memory::MemorySearchIndex;

pub const USERS: &str = "users";
pub const CARTS: &str = "carts";
pub const PRODUCT_VARIANTS: &str = "product_variants";
/// Coupon documents are keyed by their code.
pub const COUPONS: &str = "coupons";
pub const ORDERS: &str = "orders";
pub const ALL_INDICES: [&str; 5] = [USERS, CARTS, PRODUCT_VARIANTS, COUPONS, ORDERS];

/// Pseudo-field addressing the document id.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search index returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("cannot decode search response: {0}")]
    Decode(String),
    #[error("search index unavailable")]
    Unavailable,
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
    Term { field: String, value: Value },
    Terms { field: String, values: Vec<Value> },
    /// `*` and `?` glob, matched case-insensitively.
    Wildcard { field: String, pattern: String },
    /// Inclusive bounds, RFC 3339 timestamps for date fields.
    Range { field: String, gte: Option<String>, lte: Option<String> },
}

impl Clause {
    pub fn term(field: &str, value: impl Into<Value>) -> Self { Clause::Term { field: field.into(), value: value.into() } }
    pub fn terms(field: &str, values: Vec<Value>) -> Self { Clause::Terms { field: field.into(), values } }
    pub fn wildcard(field: &str, pattern: impl Into<String>) -> Self { Clause::Wildcard { field: field.into(), pattern: pattern.into() } }
    pub fn range(field: &str, gte: Option<String>, lte: Option<String>) -> Self { Clause::Range { field: field.into(), gte, lte } }

    fn to_dsl(&self) -> Value {
        match self {
            Clause::Term { field, value } => json!({ "term": { field.as_str(): { "value": value } } }),
            Clause::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),
            Clause::Wildcard { field, pattern } => json!({ "wildcard": { field.as_str(): { "value": pattern, "case_insensitive": true } } }),
            Clause::Range { field, gte, lte } => {
                let mut bounds = serde_json::Map::new();
                if let Some(gte) = gte { bounds.insert("gte".into(), json!(gte)); }
                if let Some(lte) = lte { bounds.insert("lte".into(), json!(lte)); }
                json!({ "range": { field.as_str(): bounds } })
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sort { pub field: String, pub descending: bool }

#[derive(Clone, Debug, PartialEq)]
pub struct SearchQuery {
    pub must: Vec<Clause>,
    pub filter: Vec<Clause>,
    pub from: usize,
    pub size: usize,
    pub sort: Option<Sort>,
}

impl Default for SearchQuery {
    fn default() -> Self { Self { must: vec![], filter: vec![], from: 0, size: 10, sort: None } }
}

impl SearchQuery {
    pub fn new() -> Self { Self::default() }
    pub fn must(mut self, clause: Clause) -> Self { self.must.push(clause); self }
    pub fn filter(mut self, clause: Clause) -> Self { self.filter.push(clause); self }
    pub fn page(mut self, from: usize, size: usize) -> Self { self.from = from; self.size = size; self }
    pub fn sort_by(mut self, field: &str, descending: bool) -> Self { self.sort = Some(Sort { field: field.into(), descending }); self }

    /// Renders the Elasticsearch request body.
    pub fn to_dsl(&self) -> Value {
        let query = if self.must.is_empty() && self.filter.is_empty() {
            json!({ "match_all": {} })
        } else {
            json!({ "bool": {
                "must": self.must.iter().map(Clause::to_dsl).collect::<Vec<_>>(),
                "filter": self.filter.iter().map(Clause::to_dsl).collect::<Vec<_>>(),
            } })
        };
        let mut body = json!({ "query": query, "from": self.from, "size": self.size, "track_total_hits": true });
        if let Some(sort) = &self.sort {
            let order = if sort.descending { "desc" } else { "asc" };
            body["sort"] = json!([{ sort.field.as_str(): { "order": order } }]);
        }
        body
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Hit { pub id: String, pub source: Value }

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchHits { pub total: u64, pub hits: Vec<Hit> }

impl SearchHits {
    /// Decodes every hit source, failing on the first document that does not fit `T`.
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<Vec<T>> {
        self.hits.into_iter().map(|h| serde_json::from_value(h.source).map_err(|e| SearchError::Decode(format!("{}: {e}", h.id)))).collect()
    }
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Creates or replaces the document.
    async fn index_document(&self, index: &str, id: &str, doc: &Value) -> Result<()>;
    /// Like [`index_document`](Self::index_document), unless the index already holds the
    /// document at a higher `version`. Returns false when the write was skipped as stale.
    async fn index_versioned(&self, index: &str, id: &str, doc: &Value, version: i64) -> Result<bool>;
    /// Merges `patch` into an existing document.
    async fn update_document(&self, index: &str, id: &str, patch: &Value) -> Result<()>;
    async fn delete_document(&self, index: &str, id: &str) -> Result<()>;
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>>;
    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchHits>;
    /// Drops the index if present and creates it empty.
    async fn recreate_index(&self, index: &str) -> Result<()>;
    /// Creates the index with its mappings when it does not exist. Existing documents stay.
    async fn ensure_index(&self, index: &str) -> Result<()>;
}
