use crate::errors::{Error, Result};
use crate::metrics::{STORE_FAILURES_TOTAL, STORE_LATENCY_SECONDS};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lt,
}

impl FilterOp {
    fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
        }
    }
}

/// Per-resource query vocabulary understood by every store backend:
/// equality/range filters plus order, limit and offset.
#[derive(Debug, Clone, Default)]
pub struct StoreQuery {
    pub filters: Vec<(String, FilterOp, String)>,
    pub order_by: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl StoreQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), FilterOp::Eq, value.to_string()));
        self
    }

    pub fn gte(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), FilterOp::Gte, value.to_string()));
        self
    }

    pub fn lt(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), FilterOp::Lt, value.to_string()));
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order_by = Some(column.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// PostgREST-style query string pairs (`id=eq.5`, `order=id.asc`, ...).
    fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 3);
        for (column, op, value) in &self.filters {
            pairs.push((column.clone(), format!("{}.{}", op.as_str(), value)));
        }
        if let Some(column) = &self.order_by {
            pairs.push(("order".to_string(), format!("{}.asc", column)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        pairs
    }
}

/// Row-level access to the remote relational store. Object-safe so the
/// REST client can be swapped for an in-memory store in tests.
#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, table: &str, query: StoreQuery) -> Result<Vec<Value>>;
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>>;
    async fn update(&self, table: &str, query: StoreQuery, patch: Value) -> Result<Vec<Value>>;
    async fn delete(&self, table: &str, query: StoreQuery) -> Result<Vec<Value>>;
}

/// REST client for a PostgREST-compatible store (Supabase). One bearer-
/// authenticated HTTPS round trip per call, bounded by a client timeout.
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    async fn run(&self, request: reqwest::RequestBuilder) -> Result<Vec<Value>> {
        let start = Instant::now();
        let response = request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                STORE_FAILURES_TOTAL.inc();
                Error::from(e)
            })?;
        STORE_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            STORE_FAILURES_TOTAL.inc();
            // Full detail stays server-side; callers get an opaque kind.
            error!("Store request failed with {}: {}", status, body);
            return Err(Error::Store(format!("store returned {}", status)));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        let value: Value = response.json().await?;
        debug!("Store response: {} row(s)", value.as_array().map_or(1, |a| a.len()));
        match value {
            Value::Array(rows) => Ok(rows),
            row => Ok(vec![row]),
        }
    }
}

#[async_trait]
impl Store for RestStore {
    async fn select(&self, table: &str, query: StoreQuery) -> Result<Vec<Value>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&query.to_pairs());
        self.run(request).await
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&Value::Array(rows));
        self.run(request).await
    }

    async fn update(&self, table: &str, query: StoreQuery, patch: Value) -> Result<Vec<Value>> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&query.to_pairs())
            .header("Prefer", "return=representation")
            .json(&patch);
        self.run(request).await
    }

    async fn delete(&self, table: &str, query: StoreQuery) -> Result<Vec<Value>> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&query.to_pairs())
            .header("Prefer", "return=representation");
        self.run(request).await
    }
}
