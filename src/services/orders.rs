//! Order lifecycle and order queries.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::{paging, PaginatedResponse};
use crate::domain::aggregates::{Order, TransitionError};
use crate::domain::value_objects::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::repository::{RepoError, Repositories};
use crate::search::{Clause, SearchQuery, ID_FIELD};

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("order {0} was changed concurrently; reload and retry")]
    Conflict(Uuid),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Admin order search. Dates are inclusive calendar days in UTC.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub customer_name: Option<String>,
    pub order_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl OrderFilter {
    pub fn to_query(&self) -> SearchQuery {
        let (_, limit, offset) = paging(self.page, self.limit);
        let mut q = SearchQuery::new().page(offset, limit as usize).sort_by("created_at", true);
        if let Some(name) = self.customer_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            let literal: String = name.chars().filter(|c| !matches!(c, '*' | '?')).collect();
            q = q.must(Clause::wildcard("user_name", format!("*{literal}*")));
        }
        if let Some(id) = self.order_id { q = q.filter(Clause::term(ID_FIELD, id.to_string())); }
        if let Some(s) = self.status { q = q.filter(Clause::term("status", s.as_str())); }
        if let Some(s) = self.payment_status { q = q.filter(Clause::term("payment_status", s.as_str())); }
        if let Some(m) = self.payment_method { q = q.filter(Clause::term("payment_method", m.as_str())); }
        if self.from_date.is_some() || self.to_date.is_some() {
            let gte = self.from_date.map(|d| format!("{d}T00:00:00Z"));
            let lte = self.to_date.map(|d| format!("{d}T23:59:59.999Z"));
            q = q.filter(Clause::range("created_at", gte, lte));
        }
        q
    }
}

pub struct OrderService { repos: Repositories }

impl OrderService {
    pub fn new(repos: Repositories) -> Self { Self { repos } }

    /// Moves an order along the transition table. The record store applies the change only if
    /// the order is still in the state it was read in.
    pub async fn update_status(&self, id: Uuid, to: OrderStatus) -> Result<Order, OrderError> {
        let order = self.repos.store().order_by_id(id).await.map_err(RepoError::from)?.ok_or(OrderError::NotFound(id))?;
        let change = order.plan_transition(to, Utc::now())?;
        let updated = self.repos.transition_order(id, &change).await?.ok_or(OrderError::Conflict(id))?;
        info!(order_id = %id, from = %change.from, to = %change.to, payment_status = %updated.payment_status, "order status changed");
        Ok(updated)
    }

    /// Newest first. Index failures degrade to an empty page.
    pub async fn list(&self, page: Option<u32>, limit: Option<u32>) -> PaginatedResponse<Order> {
        self.search(&OrderFilter { page, limit, ..Default::default() }).await
    }

    pub async fn search(&self, filter: &OrderFilter) -> PaginatedResponse<Order> {
        let (page, limit, _) = paging(filter.page, filter.limit);
        self.page(&filter.to_query(), page, limit).await
    }

    /// The customer's own orders, stripped of internal fields.
    pub async fn orders_of(&self, user_id: Uuid, page: Option<u32>, limit: Option<u32>) -> PaginatedResponse<Order> {
        let (page, limit, offset) = paging(page, limit);
        let q = SearchQuery::new().filter(Clause::term("user_id", json!(user_id.to_string()))).page(offset, limit as usize).sort_by("created_at", true);
        let mut result = self.page(&q, page, limit).await;
        result.data = result.data.into_iter().map(Order::for_customer).collect();
        result
    }

    /// Reads the index and falls back to the record store for orders not mirrored yet.
    pub async fn get(&self, id: Uuid) -> Result<Order, OrderError> {
        match self.repos.order(id).await {
            Ok(Some(order)) => return Ok(order),
            Ok(None) => {}
            Err(e) => warn!(order_id = %id, error = %e, "order lookup in index failed, using record store"),
        }
        self.repos.store().order_by_id(id).await.map_err(RepoError::from)?.ok_or(OrderError::NotFound(id))
    }

    async fn page(&self, query: &SearchQuery, page: u32, limit: u32) -> PaginatedResponse<Order> {
        match self.repos.search_orders(query).await {
            Ok((total, data)) => PaginatedResponse { data, total, page, limit },
            Err(e) => {
                warn!(error = %e, "order listing failed, returning empty page");
                PaginatedResponse::empty(page, limit)
            }
        }
    }
}
