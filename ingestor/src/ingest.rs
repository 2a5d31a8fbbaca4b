use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::db::ReadingStore;
use crate::errors::{Error, Result};
use crate::metrics::{
    INGEST_LATENCY_SECONDS, INGEST_TICKS_TOTAL, LAST_BATCH_SIZE, MALFORMED_PAYLOADS_TOTAL,
    READINGS_STORED_TOTAL, SKIPPED_TICKS_TOTAL, UPSTREAM_FAILURES_TOTAL,
};
use crate::model::Reading;
use crate::normalize::normalize;
use crate::seed::seed_if_empty;
use crate::upstream::TelemetrySource;

/// Why a tick stored nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UpstreamUnavailable,
    MalformedPayload,
    StoreUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Stored(usize),
    Skipped(SkipReason),
}

pub struct Ingestor {
    source: Arc<dyn TelemetrySource>,
    store: Arc<dyn ReadingStore>,
}

impl Ingestor {
    pub fn new(source: Arc<dyn TelemetrySource>, store: Arc<dyn ReadingStore>) -> Self {
        Self { source, store }
    }

    /// One fetch-normalize-store cycle. Errors are logged here and reported as
    /// a skipped tick; nothing is written unless the whole payload was usable.
    pub async fn tick(&self) -> TickOutcome {
        INGEST_TICKS_TOTAL.inc();
        let start = Instant::now();

        let outcome = match self.fetch_readings().await {
            Ok(readings) => match self.store.insert_batch(&readings).await {
                Ok(()) => TickOutcome::Stored(readings.len()),
                Err(e) => {
                    error!("Failed to store {} readings: {}", readings.len(), e);
                    TickOutcome::Skipped(SkipReason::StoreUnavailable)
                }
            },
            Err(e @ (Error::UnexpectedPayload(_) | Error::Json(_))) => {
                MALFORMED_PAYLOADS_TOTAL.inc();
                error!("Invalid data format from telemetry endpoint: {}", e);
                TickOutcome::Skipped(SkipReason::MalformedPayload)
            }
            Err(e) => {
                UPSTREAM_FAILURES_TOTAL.inc();
                error!("Error fetching data from telemetry endpoint: {}", e);
                TickOutcome::Skipped(SkipReason::UpstreamUnavailable)
            }
        };

        let elapsed = start.elapsed().as_secs_f64();
        match outcome {
            TickOutcome::Stored(count) => {
                INGEST_LATENCY_SECONDS.observe(elapsed);
                READINGS_STORED_TOTAL.inc_by(count as f64);
                LAST_BATCH_SIZE.set(count as f64);
                info!("Stored {} device records in {:.3}s", count, elapsed);
            }
            TickOutcome::Skipped(reason) => {
                SKIPPED_TICKS_TOTAL.inc();
                debug!("Tick skipped after {:.3}s: {:?}", elapsed, reason);
            }
        }

        outcome
    }

    async fn fetch_readings(&self) -> Result<Vec<Reading>> {
        let payload = self.source.fetch().await?;
        let received_at = Utc::now();

        Ok(payload
            .into_readings()?
            .iter()
            .map(|raw| normalize(raw, received_at))
            .collect())
    }

    /// Seeds an empty store, then ticks every `period` until the task is
    /// dropped. Ticks run one at a time; a tick that overruns the period
    /// causes the missed ticks to be skipped rather than queued.
    pub async fn run(self, period: Duration, seed_on_empty: bool) {
        info!("Starting ingestion loop with period={:?}", period);

        if seed_on_empty {
            if let Err(e) = seed_if_empty(self.store.as_ref()).await {
                warn!("Bootstrap seeding failed: {}", e);
            }
        }

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryReadingStore;
    use crate::model::StoredReading;
    use crate::upstream::UpstreamPayload;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource(serde_json::Value);

    #[async_trait]
    impl TelemetrySource for FixedSource {
        async fn fetch(&self) -> Result<UpstreamPayload> {
            Ok(UpstreamPayload::classify(self.0.clone()))
        }
    }

    struct DownSource;

    #[async_trait]
    impl TelemetrySource for DownSource {
        async fn fetch(&self) -> Result<UpstreamPayload> {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
        }
    }

    struct HtmlSource;

    #[async_trait]
    impl TelemetrySource for HtmlSource {
        async fn fetch(&self) -> Result<UpstreamPayload> {
            let value = serde_json::from_str("<html>502 Bad Gateway</html>")?;
            Ok(UpstreamPayload::classify(value))
        }
    }

    /// Memory store whose first `outages` calls fail as if the pool were exhausted.
    struct FlakyStore {
        inner: MemoryReadingStore,
        outages: AtomicUsize,
    }

    impl FlakyStore {
        fn down_for(outages: usize) -> Self {
            Self {
                inner: MemoryReadingStore::new(),
                outages: AtomicUsize::new(outages),
            }
        }

        fn check(&self) -> Result<()> {
            let down = self
                .outages
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if down {
                Err(Error::Database(sqlx::Error::PoolTimedOut))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ReadingStore for FlakyStore {
        async fn insert_batch(&self, batch: &[Reading]) -> Result<()> {
            self.check()?;
            self.inner.insert_batch(batch).await
        }

        async fn find_all(&self) -> Result<Vec<StoredReading>> {
            self.check()?;
            self.inner.find_all().await
        }

        async fn find_latest(&self, device_id: &str) -> Result<Option<StoredReading>> {
            self.check()?;
            self.inner.find_latest(device_id).await
        }

        async fn count(&self) -> Result<i64> {
            self.check()?;
            self.inner.count().await
        }
    }

    fn ingestor(source: impl TelemetrySource + 'static) -> (Ingestor, Arc<MemoryReadingStore>) {
        let store = Arc::new(MemoryReadingStore::new());
        (Ingestor::new(Arc::new(source), store.clone()), store)
    }

    #[test]
    fn test_tick_appends_every_record() {
        tokio_test::block_on(async {
            let (ingestor, store) = ingestor(FixedSource(json!([
                {"dId": "DEV001", "p": 1, "l": 1},
                {"dId": "DEV001", "p": 1, "l": 1},
                {"dId": "DEV002"}
            ])));

            assert_eq!(ingestor.tick().await, TickOutcome::Stored(3));
            assert_eq!(ingestor.tick().await, TickOutcome::Stored(3));
            assert_eq!(store.count().await.unwrap(), 6);

            let all = store.find_all().await.unwrap();
            assert!(all.iter().all(|s| s.reading.timestamp.len() == 14));
        });
    }

    #[test]
    fn test_malformed_payload_writes_nothing() {
        tokio_test::block_on(async {
            let (ingestor, store) = ingestor(FixedSource(json!({"alerts": []})));

            assert_eq!(
                ingestor.tick().await,
                TickOutcome::Skipped(SkipReason::MalformedPayload)
            );
            assert_eq!(store.count().await.unwrap(), 0);
        });
    }

    #[test]
    fn test_upstream_failure_is_skipped() {
        tokio_test::block_on(async {
            let (ingestor, store) = ingestor(DownSource);

            assert_eq!(
                ingestor.tick().await,
                TickOutcome::Skipped(SkipReason::UpstreamUnavailable)
            );
            assert_eq!(store.count().await.unwrap(), 0);
        });
    }

    #[test]
    fn test_unparseable_body_is_malformed() {
        tokio_test::block_on(async {
            let (ingestor, store) = ingestor(HtmlSource);

            assert_eq!(
                ingestor.tick().await,
                TickOutcome::Skipped(SkipReason::MalformedPayload)
            );
            assert_eq!(store.count().await.unwrap(), 0);
        });
    }

    #[test]
    fn test_store_failure_is_skipped() {
        tokio_test::block_on(async {
            let store = Arc::new(FlakyStore::down_for(1));
            let ingestor = Ingestor::new(
                Arc::new(FixedSource(json!([{"dId": "DEV001", "p": 1}]))),
                store.clone(),
            );

            assert_eq!(
                ingestor.tick().await,
                TickOutcome::Skipped(SkipReason::StoreUnavailable)
            );
            assert_eq!(ingestor.tick().await, TickOutcome::Stored(1));
            assert_eq!(store.count().await.unwrap(), 1);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_failed_seed_and_tick() {
        // Seeding fails on `count`, then the immediate tick fails on insert.
        let store = Arc::new(FlakyStore::down_for(2));
        let ingestor = Ingestor::new(
            Arc::new(FixedSource(json!([{"dId": "DEV001", "p": 1}]))),
            store.clone(),
        );

        let handle = tokio::spawn(ingestor.run(Duration::from_secs(60), true));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!handle.is_finished());
        handle.abort();

        // No bootstrap data; only the tick at 60s landed.
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_seeds_then_ticks() {
        let store = Arc::new(MemoryReadingStore::new());
        let ingestor = Ingestor::new(
            Arc::new(FixedSource(json!([{"dId": "DEV001", "p": 1}]))),
            store.clone(),
        );

        let handle = tokio::spawn(ingestor.run(Duration::from_secs(60), true));
        tokio::time::sleep(Duration::from_secs(61)).await;
        handle.abort();

        // 26 bootstrap readings, then the immediate tick and one more.
        assert_eq!(store.count().await.unwrap(), 28);
    }
}
