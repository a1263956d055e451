use crate::errors::{Error, Result};
use crate::model::{Device, DEVICES_TABLE};
use crate::store::{Store, StoreQuery};
use std::sync::Arc;

/// Resolves external device names to internal device records. One point
/// lookup per call; nothing is cached, every write pays one extra store
/// round trip.
#[derive(Clone)]
pub struct DeviceResolver {
    store: Arc<dyn Store>,
}

impl DeviceResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Exact-match lookup by unique name. More than one match is a store
    /// integrity fault and is reported distinctly from not-found.
    pub async fn resolve(&self, azure_device_id: &str) -> Result<Device> {
        let rows = self
            .store
            .select(
                DEVICES_TABLE,
                StoreQuery::new().eq("azure_device_id", azure_device_id),
            )
            .await?;

        match rows.len() {
            0 => Err(Error::DeviceNotFound(azure_device_id.to_string())),
            1 => {
                let device: Device = serde_json::from_value(rows[0].clone())?;
                Ok(device)
            }
            n => Err(Error::AmbiguousDevice {
                name: azure_device_id.to_string(),
                matches: n,
            }),
        }
    }

    /// Full device listing, used by the batch routines to pick targets.
    pub async fn all(&self) -> Result<Vec<Device>> {
        let rows = self
            .store
            .select(DEVICES_TABLE, StoreQuery::new().order_asc("id"))
            .await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(Error::from))
            .collect()
    }
}
