//! In-memory search index evaluating [`SearchQuery`] directly.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Clause, Hit, Result, SearchError, SearchHits, SearchIndex, SearchQuery, ID_FIELD};

#[derive(Default)]
pub struct MemorySearchIndex {
    indices: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    /// Keyed by index then document id; written under the `indices` lock.
    versions: RwLock<HashMap<String, HashMap<String, i64>>>,
    unavailable: AtomicBool,
}

impl MemorySearchIndex {
    pub fn new() -> Self { Self::default() }

    /// While set, every call fails with [`SearchError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) { self.unavailable.store(unavailable, Ordering::SeqCst); }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) { Err(SearchError::Unavailable) } else { Ok(()) }
    }

    pub async fn len(&self, index: &str) -> usize {
        self.indices.read().await.get(index).map_or(0, BTreeMap::len)
    }
}

fn field(id: &str, doc: &Value, path: &str) -> Option<Value> {
    if path == ID_FIELD { return Some(Value::String(id.to_string())); }
    path.split('.').try_fold(doc, |v, key| v.get(key)).cloned()
}

fn timestamp(value: &Value) -> Option<DateTime<FixedOffset>> {
    value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

fn compare(a: &Value, b: &Value) -> Option<CmpOrdering> {
    if let (Some(x), Some(y)) = (timestamp(a), timestamp(b)) { return Some(x.cmp(&y)); }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn equals(doc_value: &Value, wanted: &Value) -> bool {
    match doc_value {
        Value::Array(items) => items.iter().any(|v| equals(v, wanted)),
        other => compare(other, wanted) == Some(CmpOrdering::Equal),
    }
}

/// Glob with `*` (any run) and `?` (one char).
fn glob(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('*', rest)) => (0..=text.len()).any(|i| glob(rest, &text[i..])),
        Some(('?', rest)) => !text.is_empty() && glob(rest, &text[1..]),
        Some((c, rest)) => text.first() == Some(c) && glob(rest, &text[1..]),
    }
}

fn matches(id: &str, doc: &Value, clause: &Clause) -> bool {
    match clause {
        Clause::Term { field: f, value } => field(id, doc, f).is_some_and(|v| equals(&v, value)),
        Clause::Terms { field: f, values } => field(id, doc, f).is_some_and(|v| values.iter().any(|w| equals(&v, w))),
        Clause::Wildcard { field: f, pattern } => field(id, doc, f).and_then(|v| v.as_str().map(str::to_lowercase)).is_some_and(|text| {
            let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
            glob(&pattern, &text.chars().collect::<Vec<_>>())
        }),
        Clause::Range { field: f, gte, lte } => field(id, doc, f).is_some_and(|v| {
            let above = gte.as_ref().map_or(true, |b| matches!(compare(&v, &Value::String(b.clone())), Some(CmpOrdering::Greater | CmpOrdering::Equal)));
            let below = lte.as_ref().map_or(true, |b| matches!(compare(&v, &Value::String(b.clone())), Some(CmpOrdering::Less | CmpOrdering::Equal)));
            above && below
        }),
    }
}

/// Recursive object merge, as a partial document update does.
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => {
            for (k, v) in p {
                let nested = v.is_object() && t.get(k).is_some_and(Value::is_object);
                if !nested {
                    t.insert(k.clone(), v.clone());
                } else if let Some(existing) = t.get_mut(k) {
                    merge(existing, v);
                }
            }
        }
        (t, p) => *t = p.clone(),
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn index_document(&self, index: &str, id: &str, doc: &Value) -> Result<()> {
        self.check()?;
        self.indices.write().await.entry(index.to_string()).or_default().insert(id.to_string(), doc.clone());
        Ok(())
    }

    async fn index_versioned(&self, index: &str, id: &str, doc: &Value, version: i64) -> Result<bool> {
        self.check()?;
        let mut indices = self.indices.write().await;
        let mut versions = self.versions.write().await;
        let held = versions.entry(index.to_string()).or_default();
        if held.get(id).is_some_and(|current| *current > version) { return Ok(false); }
        held.insert(id.to_string(), version);
        indices.entry(index.to_string()).or_default().insert(id.to_string(), doc.clone());
        Ok(true)
    }

    async fn update_document(&self, index: &str, id: &str, patch: &Value) -> Result<()> {
        self.check()?;
        let mut indices = self.indices.write().await;
        let doc = indices.get_mut(index).and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| SearchError::Status { status: 404, body: format!("document {id} missing in {index}") })?;
        merge(doc, patch);
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<()> {
        self.check()?;
        let mut indices = self.indices.write().await;
        if let Some(docs) = indices.get_mut(index) { docs.remove(id); }
        if let Some(held) = self.versions.write().await.get_mut(index) { held.remove(id); }
        Ok(())
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>> {
        self.check()?;
        Ok(self.indices.read().await.get(index).and_then(|docs| docs.get(id)).cloned())
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchHits> {
        self.check()?;
        let indices = self.indices.read().await;
        let Some(docs) = indices.get(index) else { return Ok(SearchHits::default()) };
        let mut hits: Vec<Hit> = docs.iter()
            .filter(|(id, doc)| query.must.iter().chain(&query.filter).all(|c| matches(id, doc, c)))
            .map(|(id, doc)| Hit { id: id.clone(), source: doc.clone() })
            .collect();
        if let Some(sort) = &query.sort {
            hits.sort_by(|a, b| {
                let ord = match (field(&a.id, &a.source, &sort.field), field(&b.id, &b.source, &sort.field)) {
                    (Some(x), Some(y)) => compare(&x, &y).unwrap_or(CmpOrdering::Equal),
                    (Some(_), None) => CmpOrdering::Less,
                    (None, Some(_)) => CmpOrdering::Greater,
                    (None, None) => CmpOrdering::Equal,
                };
                if sort.descending { ord.reverse() } else { ord }
            });
        }
        let total = hits.len() as u64;
        Ok(SearchHits { total, hits: hits.into_iter().skip(query.from).take(query.size).collect() })
    }

    async fn recreate_index(&self, index: &str) -> Result<()> {
        self.check()?;
        let mut indices = self.indices.write().await;
        indices.insert(index.to_string(), BTreeMap::new());
        self.versions.write().await.remove(index);
        Ok(())
    }

    async fn ensure_index(&self, index: &str) -> Result<()> {
        self.check()?;
        self.indices.write().await.entry(index.to_string()).or_default();
        Ok(())
    }
}
