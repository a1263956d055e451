use crate::devices::DeviceResolver;
use crate::errors::{Error, Result};
use crate::model::{NewTelemetryRecord, TelemetryRecord, TELEMETRY_TABLE};
use crate::store::{Store, StoreQuery};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// CRUD surface over the telemetry table. Every operation is one or two
/// independent store round trips; there is no transactionality across
/// device resolution and the following write.
#[derive(Clone)]
pub struct TelemetryRepo {
    store: Arc<dyn Store>,
    resolver: DeviceResolver,
}

impl TelemetryRepo {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let resolver = DeviceResolver::new(store.clone());
        Self { store, resolver }
    }

    pub async fn list(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<TelemetryRecord>> {
        let limit = match limit {
            None => DEFAULT_LIMIT,
            Some(l) if l >= 0 => (l as usize).min(MAX_LIMIT),
            Some(_) => {
                return Err(Error::InvalidArgument(
                    "limit must be non-negative".to_string(),
                ))
            }
        };
        let offset = match offset {
            None => 0,
            Some(o) if o >= 0 => o as usize,
            Some(_) => {
                return Err(Error::InvalidArgument(
                    "offset must be non-negative".to_string(),
                ))
            }
        };

        let rows = self
            .store
            .select(
                TELEMETRY_TABLE,
                StoreQuery::new().order_asc("id").limit(limit).offset(offset),
            )
            .await?;
        debug!("Listed {} telemetry record(s)", rows.len());
        rows.into_iter().map(parse_record).collect()
    }

    pub async fn get(&self, id: i64) -> Result<TelemetryRecord> {
        check_id(id)?;
        let rows = self
            .store
            .select(TELEMETRY_TABLE, StoreQuery::new().eq("id", id).limit(1))
            .await?;
        rows.into_iter().next().map_or(Err(Error::NotFound), parse_record)
    }

    /// Resolves the device name, then inserts one row. A store failure
    /// after a successful resolution leaves no partial artifact; the
    /// lookup result is simply discarded.
    pub async fn create(&self, record: NewTelemetryRecord) -> Result<TelemetryRecord> {
        let device = self.resolver.resolve(&record.azure_device_id).await?;
        let row = record.into_row(device.id);
        let rows = self.store.insert(TELEMETRY_TABLE, vec![row]).await?;
        rows.into_iter()
            .next()
            .map_or(Err(Error::Store("insert returned no rows".to_string())), parse_record)
    }

    /// Full-field replace of everything except `id` and `created_at`. The
    /// device reference is re-resolved exactly like on create.
    pub async fn update(&self, id: i64, record: NewTelemetryRecord) -> Result<TelemetryRecord> {
        check_id(id)?;
        let device = self.resolver.resolve(&record.azure_device_id).await?;
        let patch = record.into_row(device.id);
        let rows = self
            .store
            .update(TELEMETRY_TABLE, StoreQuery::new().eq("id", id), patch)
            .await?;
        rows.into_iter().next().map_or(Err(Error::NotFound), parse_record)
    }

    /// Deleting an id that is already absent reports `NotFound`.
    pub async fn delete(&self, id: i64) -> Result<()> {
        check_id(id)?;
        let removed = self
            .store
            .delete(TELEMETRY_TABLE, StoreQuery::new().eq("id", id))
            .await?;
        if removed.is_empty() {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}

fn check_id(id: i64) -> Result<()> {
    if id <= 0 {
        return Err(Error::InvalidArgument(
            "id must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

fn parse_record(row: serde_json::Value) -> Result<TelemetryRecord> {
    serde_json::from_value(row).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memstore::MemStore;
    use crate::model::DEVICES_TABLE;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    fn new_record(name: &str) -> NewTelemetryRecord {
        NewTelemetryRecord {
            azure_device_id: name.to_string(),
            round_count: 10,
            slim_count: 3,
            round_void_count: 4.2,
            slim_void_count: 1.75,
            enqueued_at: Utc.with_ymd_and_hms(2026, 8, 29, 9, 30, 0).unwrap(),
            raw_payload: Some(json!({"schemaVersion": 1})),
        }
    }

    async fn repo_with_devices(names: &[&str]) -> (TelemetryRepo, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        let rows = names.iter().map(|n| json!({"azure_device_id": n})).collect();
        store.insert(DEVICES_TABLE, rows).await.unwrap();
        (TelemetryRepo::new(store.clone()), store)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (repo, _) = repo_with_devices(&["pool-sensor-1"]).await;

        let created = repo.create(new_record("pool-sensor-1")).await.unwrap();
        assert_eq!(created.device_id, 1);

        let fetched = repo.get(created.id).await.unwrap();
        assert_eq!(fetched.azure_device_id, "pool-sensor-1");
        assert_eq!(fetched.round_count, 10);
        assert_eq!(fetched.round_void_count, 4.2);
        assert_eq!(fetched.enqueued_at, created.enqueued_at);
        assert_eq!(fetched.raw_payload, Some(json!({"schemaVersion": 1})));
    }

    #[tokio::test]
    async fn create_with_unknown_device_inserts_nothing() {
        let (repo, store) = repo_with_devices(&["pool-sensor-1"]).await;

        let err = repo.create(new_record("does-not-exist-999")).await.unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));
        assert_eq!(store.row_count(TELEMETRY_TABLE), 0);
    }

    #[tokio::test]
    async fn list_pages_in_id_order() {
        let (repo, _) = repo_with_devices(&["d"]).await;
        for _ in 0..15 {
            repo.create(new_record("d")).await.unwrap();
        }

        let first = repo.list(Some(10), Some(0)).await.unwrap();
        assert_eq!(first.len(), 10);
        let ids: Vec<i64> = first.iter().map(|r| r.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);

        let rest = repo.list(Some(10), Some(10)).await.unwrap();
        assert_eq!(rest.len(), 5);
        assert!(rest[0].id > first[9].id);
    }

    #[tokio::test]
    async fn list_rejects_negative_arguments() {
        let (repo, _) = repo_with_devices(&[]).await;
        assert!(matches!(
            repo.list(Some(-1), None).await.unwrap_err(),
            Error::InvalidArgument(_)
        ));
        assert!(matches!(
            repo.list(None, Some(-5)).await.unwrap_err(),
            Error::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn get_checks_id_and_absence() {
        let (repo, _) = repo_with_devices(&[]).await;
        assert!(matches!(repo.get(0).await.unwrap_err(), Error::InvalidArgument(_)));
        assert!(matches!(repo.get(12345).await.unwrap_err(), Error::NotFound));
    }

    #[tokio::test]
    async fn update_replaces_all_fields_but_keeps_created_at() {
        let (repo, _) = repo_with_devices(&["a", "b"]).await;
        let created = repo.create(new_record("a")).await.unwrap();

        let mut replacement = new_record("b");
        replacement.round_count = 99;
        replacement.raw_payload = None;
        let updated = repo.update(created.id, replacement).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.device_id, 2);
        assert_eq!(updated.round_count, 99);
        // Full replace: the replacement carries no payload, so the stored
        // one must not survive.
        assert_eq!(updated.raw_payload, None);
        let fetched = repo.get(created.id).await.unwrap();
        assert_eq!(fetched.raw_payload, None);
    }

    #[tokio::test]
    async fn update_of_absent_id_mutates_nothing() {
        let (repo, store) = repo_with_devices(&["a"]).await;
        let created = repo.create(new_record("a")).await.unwrap();

        let err = repo.update(created.id + 100, new_record("a")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound));

        let unchanged = repo.get(created.id).await.unwrap();
        assert_eq!(unchanged.round_count, created.round_count);
        assert_eq!(store.row_count(TELEMETRY_TABLE), 1);
    }

    #[tokio::test]
    async fn delete_is_not_found_the_second_time() {
        let (repo, _) = repo_with_devices(&["a"]).await;
        let created = repo.create(new_record("a")).await.unwrap();

        repo.delete(created.id).await.unwrap();
        assert!(matches!(repo.delete(created.id).await.unwrap_err(), Error::NotFound));
        assert!(matches!(repo.get(created.id).await.unwrap_err(), Error::NotFound));
    }

    /// Store that resolves devices fine but fails every telemetry write.
    struct InsertFails(MemStore);

    #[async_trait]
    impl Store for InsertFails {
        async fn select(&self, table: &str, query: StoreQuery) -> Result<Vec<Value>> {
            self.0.select(table, query).await
        }
        async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
            if table == TELEMETRY_TABLE {
                return Err(Error::Store("insert rejected".to_string()));
            }
            self.0.insert(table, rows).await
        }
        async fn update(&self, table: &str, query: StoreQuery, patch: Value) -> Result<Vec<Value>> {
            self.0.update(table, query, patch).await
        }
        async fn delete(&self, table: &str, query: StoreQuery) -> Result<Vec<Value>> {
            self.0.delete(table, query).await
        }
    }

    #[tokio::test]
    async fn resolution_success_then_insert_failure_is_a_store_error() {
        let inner = MemStore::new();
        inner
            .insert(DEVICES_TABLE, vec![json!({"azure_device_id": "a"})])
            .await
            .unwrap();
        let repo = TelemetryRepo::new(Arc::new(InsertFails(inner)));

        let err = repo.create(new_record("a")).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }
}
