//! In-memory [`Store`] backend for tests and local development. Implements
//! the same filter/order/limit/offset subset the REST client speaks, with
//! store-assigned ids and creation timestamps.

use crate::errors::{Error, Result};
use crate::store::{FilterOp, Store, StoreQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct MemStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut HashMap<String, Table>) -> T) -> Result<T> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| Error::Store("memstore lock poisoned".to_string()))?;
        Ok(f(&mut tables))
    }

    /// Number of rows currently held in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.with_tables(|tables| tables.get(table).map_or(0, |t| t.rows.len()))
            .unwrap_or(0)
    }
}

fn matches(row: &Value, column: &str, op: FilterOp, value: &str) -> bool {
    let Some(field) = row.get(column) else {
        return false;
    };
    let Some(ordering) = compare_to_filter(field, value) else {
        return false;
    };
    match op {
        FilterOp::Eq => ordering == Ordering::Equal,
        FilterOp::Gte => ordering != Ordering::Less,
        FilterOp::Lt => ordering == Ordering::Less,
    }
}

/// Compare a row field against a filter literal: numerically when both
/// sides are numbers, chronologically when both parse as RFC 3339,
/// lexically otherwise.
fn compare_to_filter(field: &Value, literal: &str) -> Option<Ordering> {
    if let Some(n) = field.as_f64() {
        let other: f64 = literal.parse().ok()?;
        return n.partial_cmp(&other);
    }
    let s = field.as_str()?;
    if let (Ok(a), Ok(b)) = (
        DateTime::parse_from_rfc3339(s),
        DateTime::parse_from_rfc3339(literal),
    ) {
        return Some(a.cmp(&b));
    }
    Some(s.cmp(literal))
}

fn compare_fields(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return x.cmp(y);
    }
    Ordering::Equal
}

fn apply(rows: &[Value], query: &StoreQuery) -> Vec<Value> {
    let mut out: Vec<Value> = rows
        .iter()
        .filter(|row| {
            query
                .filters
                .iter()
                .all(|(column, op, value)| matches(row, column, *op, value))
        })
        .cloned()
        .collect();
    if let Some(column) = &query.order_by {
        out.sort_by(|a, b| {
            compare_fields(
                a.get(column).unwrap_or(&Value::Null),
                b.get(column).unwrap_or(&Value::Null),
            )
        });
    }
    let offset = query.offset.unwrap_or(0).min(out.len());
    let mut out = out.split_off(offset);
    if let Some(limit) = query.limit {
        out.truncate(limit);
    }
    out
}

#[async_trait]
impl Store for MemStore {
    async fn select(&self, table: &str, query: StoreQuery) -> Result<Vec<Value>> {
        self.with_tables(|tables| {
            tables
                .get(table)
                .map_or_else(Vec::new, |t| apply(&t.rows, &query))
        })
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        self.with_tables(|tables| {
            let t = tables.entry(table.to_string()).or_default();
            let mut inserted = Vec::with_capacity(rows.len());
            for mut row in rows {
                match row.get("id").and_then(Value::as_i64) {
                    Some(id) => t.next_id = t.next_id.max(id),
                    None => {
                        t.next_id += 1;
                        row["id"] = Value::from(t.next_id);
                    }
                }
                if row.get("created_at").is_none() {
                    row["created_at"] = Value::from(Utc::now().to_rfc3339());
                }
                t.rows.push(row.clone());
                inserted.push(row);
            }
            inserted
        })
    }

    async fn update(&self, table: &str, query: StoreQuery, patch: Value) -> Result<Vec<Value>> {
        self.with_tables(|tables| {
            let Some(t) = tables.get_mut(table) else {
                return Vec::new();
            };
            let mut updated = Vec::new();
            for row in t.rows.iter_mut() {
                let hit = query
                    .filters
                    .iter()
                    .all(|(column, op, value)| matches(row, column, *op, value));
                if !hit {
                    continue;
                }
                if let Some(fields) = patch.as_object() {
                    for (key, value) in fields {
                        row[key.as_str()] = value.clone();
                    }
                }
                updated.push(row.clone());
            }
            updated
        })
    }

    async fn delete(&self, table: &str, query: StoreQuery) -> Result<Vec<Value>> {
        self.with_tables(|tables| {
            let Some(t) = tables.get_mut(table) else {
                return Vec::new();
            };
            let mut removed = Vec::new();
            t.rows.retain(|row| {
                let hit = query
                    .filters
                    .iter()
                    .all(|(column, op, value)| matches(row, column, *op, value));
                if hit {
                    removed.push(row.clone());
                }
                !hit
            });
            removed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assigns_ids_and_created_at() {
        tokio_test::block_on(async {
            let store = MemStore::new();
            let rows = store
                .insert("t", vec![json!({"a": 1}), json!({"a": 2})])
                .await
                .unwrap();
            assert_eq!(rows[0]["id"], 1);
            assert_eq!(rows[1]["id"], 2);
            assert!(rows[0]["created_at"].is_string());
        });
    }

    #[test]
    fn filters_order_limit_offset() {
        tokio_test::block_on(async {
            let store = MemStore::new();
            let rows: Vec<Value> = (0..15).map(|i| json!({"v": 14 - i})).collect();
            store.insert("t", rows).await.unwrap();

            let page = store
                .select("t", StoreQuery::new().order_asc("v").limit(10))
                .await
                .unwrap();
            assert_eq!(page.len(), 10);
            assert_eq!(page[0]["v"], 0);

            let rest = store
                .select("t", StoreQuery::new().order_asc("v").limit(10).offset(10))
                .await
                .unwrap();
            assert_eq!(rest.len(), 5);
            assert_eq!(rest[0]["v"], 10);

            let hits = store
                .select("t", StoreQuery::new().eq("v", 7))
                .await
                .unwrap();
            assert_eq!(hits.len(), 1);
        });
    }

    #[test]
    fn timestamp_range_filters_compare_chronologically() {
        tokio_test::block_on(async {
            let store = MemStore::new();
            store
                .insert(
                    "t",
                    vec![
                        json!({"ts": "2026-08-29T05:00:00+00:00"}),
                        // Same instant, different offset spelling.
                        json!({"ts": "2026-08-29T07:00:00+02:00"}),
                        json!({"ts": "2026-08-30T01:00:00+00:00"}),
                    ],
                )
                .await
                .unwrap();

            let today = store
                .select(
                    "t",
                    StoreQuery::new()
                        .gte("ts", "2026-08-29T00:00:00+00:00")
                        .lt("ts", "2026-08-30T00:00:00+00:00"),
                )
                .await
                .unwrap();
            assert_eq!(today.len(), 2);
        });
    }

    #[test]
    fn update_and_delete_report_affected_rows() {
        tokio_test::block_on(async {
            let store = MemStore::new();
            store.insert("t", vec![json!({"a": 1})]).await.unwrap();

            let updated = store
                .update("t", StoreQuery::new().eq("id", 1), json!({"a": 9}))
                .await
                .unwrap();
            assert_eq!(updated.len(), 1);
            assert_eq!(updated[0]["a"], 9);

            let missed = store
                .update("t", StoreQuery::new().eq("id", 99), json!({"a": 9}))
                .await
                .unwrap();
            assert!(missed.is_empty());

            let removed = store
                .delete("t", StoreQuery::new().eq("id", 1))
                .await
                .unwrap();
            assert_eq!(removed.len(), 1);
            assert_eq!(store.row_count("t"), 0);

            let gone = store
                .delete("t", StoreQuery::new().eq("id", 1))
                .await
                .unwrap();
            assert!(gone.is_empty());
        });
    }
}
