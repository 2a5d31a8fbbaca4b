use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::aggregate::latest_per_device;
use crate::errors::Result;
use crate::metrics::STORE_FAILURES_TOTAL;
use crate::model::{Reading, StoredReading};

/// Append-only persistence for readings.
///
/// Readings are never updated or deleted; `find_all` and `find_latest` order
/// by the compact timestamp, newest first.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Appends all readings at once; either every reading lands or none does.
    async fn insert_batch(&self, batch: &[Reading]) -> Result<()>;

    async fn find_all(&self) -> Result<Vec<StoredReading>>;

    async fn find_latest(&self, device_id: &str) -> Result<Option<StoredReading>>;

    /// Most recent reading of every device id, newest first.
    async fn find_latest_per_device(&self) -> Result<Vec<StoredReading>> {
        Ok(latest_per_device(self.find_all().await?))
    }

    async fn count(&self) -> Result<i64>;
}

pub async fn make_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

const SELECT_READINGS: &str = r#"
    SELECT id, device_id, power, switch_state, light, time_or_temp,
           current_amps, battery, extra, ts
    FROM readings
"#;

// Same tie-break as `aggregate::latest_per_device`: timestamp, then id.
const SELECT_LATEST_PER_DEVICE: &str = r#"
    SELECT DISTINCT ON (device_id)
           id, device_id, power, switch_state, light, time_or_temp,
           current_amps, battery, extra, ts
    FROM readings
    ORDER BY device_id, ts DESC, id DESC
"#;

pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert_batch(&self, batch: &[Reading]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let device_ids: Vec<&str> = batch.iter().map(|r| r.device_id.as_str()).collect();
        let powers: Vec<i64> = batch.iter().map(|r| r.power).collect();
        let switches: Vec<i64> = batch.iter().map(|r| r.switch_state).collect();
        let lights: Vec<f64> = batch.iter().map(|r| r.light).collect();
        let times_or_temps: Vec<Option<&str>> =
            batch.iter().map(|r| r.time_or_temp.as_deref()).collect();
        let currents: Vec<f64> = batch.iter().map(|r| r.current).collect();
        let batteries: Vec<f64> = batch.iter().map(|r| r.battery).collect();
        let extras: Vec<Option<&str>> = batch.iter().map(|r| r.extra.as_deref()).collect();
        let timestamps: Vec<&str> = batch.iter().map(|r| r.timestamp.as_str()).collect();

        let query = r#"
            INSERT INTO readings (
                device_id, power, switch_state, light, time_or_temp,
                current_amps, battery, extra, ts
            )
            SELECT * FROM UNNEST(
                $1::text[], $2::int8[], $3::int8[], $4::float8[], $5::text[],
                $6::float8[], $7::float8[], $8::text[], $9::text[]
            )
            "#;

        sqlx::query(query)
            .bind(&device_ids)
            .bind(&powers)
            .bind(&switches)
            .bind(&lights)
            .bind(&times_or_temps)
            .bind(&currents)
            .bind(&batteries)
            .bind(&extras)
            .bind(&timestamps)
            .execute(&self.pool)
            .await
            .inspect_err(|_| STORE_FAILURES_TOTAL.inc())?;

        debug!("Inserted {} readings", batch.len());
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<StoredReading>> {
        let query = format!("{SELECT_READINGS} ORDER BY ts DESC, id DESC");
        let readings = sqlx::query_as::<_, StoredReading>(&query)
            .fetch_all(&self.pool)
            .await
            .inspect_err(|_| STORE_FAILURES_TOTAL.inc())?;
        Ok(readings)
    }

    async fn find_latest(&self, device_id: &str) -> Result<Option<StoredReading>> {
        let query =
            format!("{SELECT_READINGS} WHERE device_id = $1 ORDER BY ts DESC, id DESC LIMIT 1");
        let reading = sqlx::query_as::<_, StoredReading>(&query)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|_| STORE_FAILURES_TOTAL.inc())?;
        Ok(reading)
    }

    async fn find_latest_per_device(&self) -> Result<Vec<StoredReading>> {
        let readings = sqlx::query_as::<_, StoredReading>(SELECT_LATEST_PER_DEVICE)
            .fetch_all(&self.pool)
            .await
            .inspect_err(|_| STORE_FAILURES_TOTAL.inc())?;
        Ok(latest_per_device(readings))
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM readings")
            .fetch_one(&self.pool)
            .await
            .inspect_err(|_| STORE_FAILURES_TOTAL.inc())?;
        Ok(count)
    }
}

/// Process-local store, used for development runs without Postgres.
#[derive(Default)]
pub struct MemoryReadingStore {
    rows: RwLock<Vec<StoredReading>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(a: &StoredReading, b: &StoredReading) -> std::cmp::Ordering {
    b.reading
        .timestamp
        .cmp(&a.reading.timestamp)
        .then(b.id.cmp(&a.id))
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn insert_batch(&self, batch: &[Reading]) -> Result<()> {
        let mut rows = self.rows.write().await;
        let next_id = rows.len() as i64 + 1;
        rows.extend(batch.iter().cloned().enumerate().map(|(offset, reading)| {
            StoredReading {
                id: next_id + offset as i64,
                reading,
            }
        }));
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<StoredReading>> {
        let mut readings = self.rows.read().await.clone();
        readings.sort_by(newest_first);
        Ok(readings)
    }

    async fn find_latest(&self, device_id: &str) -> Result<Option<StoredReading>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|stored| stored.reading.device_id == device_id)
            .min_by(|a, b| newest_first(a, b))
            .cloned())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.rows.read().await.len() as i64)
    }
}
