//! Batch synthetic-data routines: historical seeding for demo/test
//! environments and the daily gap-filler that keeps reporting dashboards
//! free of empty days.

use crate::devices::DeviceResolver;
use crate::errors::{Error, Result};
use crate::model::{round2, Device, NewTelemetryRecord, TELEMETRY_TABLE};
use crate::store::{Store, StoreQuery};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

/// Rows per bulk-insert round trip.
pub const CHUNK_SIZE: usize = 200;
pub const DEFAULT_MONTHS: u32 = 6;
pub const DEFAULT_PER_DAY: u32 = 1;

/// Outcome of a seeding run. Partial seeding is an accepted result: a
/// failed chunk is logged and skipped, later chunks still run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub attempted: usize,
    pub inserted: usize,
    pub failed_chunks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    AlreadyPresent,
    Inserted,
}

/// Seeds one synthetic record batch per day from `months * 30` days back
/// through today (inclusive), `per_day` records per day, devices drawn at
/// random from the current device set.
///
/// A month is approximated as exactly 30 days, as the original seeding
/// horizon was defined; the drift against calendar months is documented
/// behavior.
pub async fn seed(store: Arc<dyn Store>, months: u32, per_day: u32) -> Result<SeedReport> {
    let devices = DeviceResolver::new(store.clone()).all().await?;
    if devices.is_empty() {
        return Err(Error::NoDevicesAvailable);
    }
    info!("Found {} device(s) in store", devices.len());

    let rows = synth_rows(&devices, Utc::now(), months, per_day);
    let attempted = rows.len();
    info!(
        "Seeding {} record(s) across {} month(s), {} per day",
        attempted, months, per_day
    );

    let mut inserted = 0;
    let mut failed_chunks = 0;
    for (index, chunk) in rows.chunks(CHUNK_SIZE).enumerate() {
        match store.insert(TELEMETRY_TABLE, chunk.to_vec()).await {
            Ok(_) => {
                inserted += chunk.len();
                info!("Inserted {}/{}", inserted, attempted);
            }
            Err(e) => {
                failed_chunks += 1;
                error!(
                    "Failed to insert chunk starting at {}: {}",
                    index * CHUNK_SIZE,
                    e
                );
            }
        }
    }

    Ok(SeedReport {
        attempted,
        inserted,
        failed_chunks,
    })
}

/// Guarantees at least one record whose `enqueued_at` falls inside the
/// current UTC day `[start, start + 24h)`. Check-then-insert is not
/// atomic; concurrent invocations can double-insert, which is accepted
/// for cron-style single invocation.
pub async fn ensure_today(store: Arc<dyn Store>) -> Result<EnsureOutcome> {
    let day_start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    let day_end = day_start + Duration::days(1);

    let existing = store
        .select(
            TELEMETRY_TABLE,
            StoreQuery::new()
                .gte("enqueued_at", day_start.to_rfc3339())
                .lt("enqueued_at", day_end.to_rfc3339())
                .limit(1),
        )
        .await?;
    if !existing.is_empty() {
        info!("A record for today (UTC) already exists, nothing to do");
        return Ok(EnsureOutcome::AlreadyPresent);
    }

    let devices = DeviceResolver::new(store.clone()).all().await?;
    if devices.is_empty() {
        return Err(Error::NoDevicesAvailable);
    }

    let row = {
        let mut rng = rand::thread_rng();
        let device = &devices[rng.gen_range(0..devices.len())];
        let at = day_start + Duration::seconds(rng.gen_range(0..86400));
        synth_record(&mut rng, device, at)
    };
    store.insert(TELEMETRY_TABLE, vec![row]).await?;
    info!("Inserted one record for today");
    Ok(EnsureOutcome::Inserted)
}

fn synth_rows(devices: &[Device], now: DateTime<Utc>, months: u32, per_day: u32) -> Vec<Value> {
    let mut rng = rand::thread_rng();
    let start = (now - Duration::days(i64::from(months) * 30)).date_naive();
    let end = now.date_naive();

    let mut rows = Vec::new();
    let mut day = start;
    while day <= end {
        let midnight = day.and_time(NaiveTime::MIN).and_utc();
        for _ in 0..per_day {
            let device = &devices[rng.gen_range(0..devices.len())];
            let at = midnight + Duration::seconds(rng.gen_range(0..86400));
            rows.push(synth_record(&mut rng, device, at));
        }
        let Some(next) = day.succ_opt() else { break };
        day = next;
    }
    rows
}

/// One synthetic measurement: counters in [0, 100], void volumes in
/// [0, 20] mL at 2 places, with a raw payload echoing the measurement the
/// way real ingestion preserves the device envelope.
fn synth_record(rng: &mut impl Rng, device: &Device, at: DateTime<Utc>) -> Value {
    let round_count = rng.gen_range(0..=100);
    let slim_count = rng.gen_range(0..=100);
    let round_void_count = round2(rng.gen_range(0.0..20.0));
    let slim_void_count = round2(rng.gen_range(0.0..20.0));

    let raw_payload = json!({
        "round_count": round_count,
        "slim_count": slim_count,
        "round_void_count": round_void_count,
        "slim_void_count": slim_void_count,
        "timestamp": at.to_rfc3339(),
    });

    NewTelemetryRecord {
        azure_device_id: device.azure_device_id.clone(),
        round_count,
        slim_count,
        round_void_count,
        slim_void_count,
        enqueued_at: at,
        raw_payload: Some(raw_payload),
    }
    .into_row(device.id)
}
