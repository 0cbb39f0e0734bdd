//! Elasticsearch-compatible REST client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{Hit, Result, SearchError, SearchHits, SearchIndex, SearchQuery};

#[derive(Clone)]
pub struct ElasticsearchIndex { client: Client, base_url: String }

impl ElasticsearchIndex {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String { format!("{}/{}", self.base_url, path) }

    fn create_index_request(&self, index: &str) -> Result<Request> {
        Ok(self.client.put(self.url(index)).json(&Self::mappings()).build()?)
    }

    /// External versioning: the index refuses a copy older than the one it holds.
    fn versioned_request(&self, index: &str, id: &str, doc: &Value, version: i64) -> Result<Request> {
        let path = format!("{index}/_doc/{id}?version={version}&version_type=external_gte&refresh=wait_for");
        Ok(self.client.put(self.url(&path)).json(doc).build()?)
    }

    /// Index settings: dates stay dates, every other string is an exact-match keyword.
    fn mappings() -> Value {
        json!({ "mappings": { "dynamic_templates": [
            { "timestamps": { "match": "*_at", "mapping": { "type": "date" } } },
            { "strings": { "match_mapping_type": "string", "mapping": { "type": "keyword" } } },
        ] } })
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() { return Ok(response); }
    let body = response.text().await.unwrap_or_default();
    Err(SearchError::Status { status: status.as_u16(), body })
}

#[derive(Deserialize)]
struct GetResponse { #[serde(default)] found: bool, #[serde(rename = "_source")] source: Option<Value> }

#[derive(Deserialize)]
struct SearchResponse { hits: HitsEnvelope }

#[derive(Deserialize)]
struct HitsEnvelope { total: TotalHits, hits: Vec<RawHit> }

#[derive(Deserialize)]
struct TotalHits { value: u64 }

#[derive(Deserialize)]
struct RawHit { #[serde(rename = "_id")] id: String, #[serde(rename = "_source")] source: Value }

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn index_document(&self, index: &str, id: &str, doc: &Value) -> Result<()> {
        let response = self.client.put(self.url(&format!("{index}/_doc/{id}?refresh=wait_for"))).json(doc).send().await?;
        ensure_success(response).await?;
        debug!(index, id, "document indexed");
        Ok(())
    }

    async fn index_versioned(&self, index: &str, id: &str, doc: &Value, version: i64) -> Result<bool> {
        let response = self.client.execute(self.versioned_request(index, id, doc, version)?).await?;
        if response.status() == StatusCode::CONFLICT {
            debug!(index, id, version, "newer copy already indexed");
            return Ok(false);
        }
        ensure_success(response).await?;
        Ok(true)
    }

    async fn update_document(&self, index: &str, id: &str, patch: &Value) -> Result<()> {
        let response = self.client.post(self.url(&format!("{index}/_update/{id}?refresh=wait_for"))).json(&json!({ "doc": patch })).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<()> {
        let response = self.client.delete(self.url(&format!("{index}/_doc/{id}?refresh=wait_for"))).send().await?;
        if response.status() == StatusCode::NOT_FOUND { return Ok(()); }
        ensure_success(response).await?;
        Ok(())
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>> {
        let response = self.client.get(self.url(&format!("{index}/_doc/{id}"))).send().await?;
        if response.status() == StatusCode::NOT_FOUND { return Ok(None); }
        let body: GetResponse = ensure_success(response).await?.json().await.map_err(|e| SearchError::Decode(e.to_string()))?;
        Ok(if body.found { body.source } else { None })
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchHits> {
        let response = self.client.post(self.url(&format!("{index}/_search"))).json(&query.to_dsl()).send().await?;
        let body: SearchResponse = ensure_success(response).await?.json().await.map_err(|e| SearchError::Decode(e.to_string()))?;
        Ok(SearchHits {
            total: body.hits.total.value,
            hits: body.hits.hits.into_iter().map(|h| Hit { id: h.id, source: h.source }).collect(),
        })
    }

    async fn recreate_index(&self, index: &str) -> Result<()> {
        let response = self.client.delete(self.url(index)).send().await?;
        if response.status() != StatusCode::NOT_FOUND { ensure_success(response).await?; }
        let response = self.client.execute(self.create_index_request(index)?).await?;
        ensure_success(response).await?;
        debug!(index, "index recreated");
        Ok(())
    }

    async fn ensure_index(&self, index: &str) -> Result<()> {
        let response = self.client.head(self.url(index)).send().await?;
        match response.status() {
            status if status.is_success() => return Ok(()),
            StatusCode::NOT_FOUND => {}
            _ => { ensure_success(response).await?; }
        }
        let response = self.client.execute(self.create_index_request(index)?).await?;
        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            // Another instance created it between the two calls.
            if body.contains("resource_already_exists_exception") { return Ok(()); }
            return Err(SearchError::Status { status: StatusCode::BAD_REQUEST.as_u16(), body });
        }
        ensure_success(response).await?;
        info!(index, "index created with keyword mappings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_urls_and_mappings() {
        let es = ElasticsearchIndex::new("http://localhost:9200/").unwrap();
        assert_eq!(es.url("orders/_search"), "http://localhost:9200/orders/_search");
        let templates = &ElasticsearchIndex::mappings()["mappings"]["dynamic_templates"];
        assert_eq!(templates[1]["strings"]["mapping"]["type"], "keyword");
    }
    #[test]
    fn test_create_index_request_carries_mappings() {
        let es = ElasticsearchIndex::new("http://localhost:9200").unwrap();
        let req = es.create_index_request("carts").unwrap();
        assert_eq!(req.method(), reqwest::Method::PUT);
        assert_eq!(req.url().as_str(), "http://localhost:9200/carts");
        let body: Value = serde_json::from_slice(req.body().and_then(|b| b.as_bytes()).unwrap()).unwrap();
        assert_eq!(body, ElasticsearchIndex::mappings());
    }
    #[test]
    fn test_versioned_request_uses_external_versioning() {
        let es = ElasticsearchIndex::new("http://localhost:9200").unwrap();
        let req = es.versioned_request("orders", "o1", &json!({ "status": "SHIPPING" }), 1_717_200_000_000_001).unwrap();
        assert_eq!(req.url().path(), "/orders/_doc/o1");
        let query: Vec<(String, String)> = req.url().query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        assert!(query.contains(&("version".into(), "1717200000000001".into())));
        assert!(query.contains(&("version_type".into(), "external_gte".into())));
    }
}
