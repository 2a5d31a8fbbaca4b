use chrono::Utc;
use tracing::info;

use crate::db::ReadingStore;
use crate::errors::Result;
use crate::model::Reading;
use crate::normalize::normalize;
use crate::upstream::UpstreamPayload;

/// Historical readings loaded into an empty store, in the keyed
/// `{"<id>": {...}}` layout the hub exports.
const BOOTSTRAP_JSON: &str = include_str!("../seed/bootstrap.json");

pub fn bootstrap_readings() -> Result<Vec<Reading>> {
    let value = serde_json::from_str(BOOTSTRAP_JSON)?;
    let received_at = Utc::now();

    Ok(UpstreamPayload::classify(value)
        .into_readings()?
        .iter()
        .map(|raw| normalize(raw, received_at))
        .collect())
}

/// Seeds the store when it holds no readings. Returns how many were inserted.
pub async fn seed_if_empty(store: &dyn ReadingStore) -> Result<usize> {
    let count = store.count().await?;
    if count > 0 {
        info!("Found {} existing readings, skipping bootstrap", count);
        return Ok(0);
    }

    info!("No readings stored, loading bootstrap data");
    let readings = bootstrap_readings()?;
    store.insert_batch(&readings).await?;
    info!("Seeded store with {} bootstrap readings", readings.len());

    Ok(readings.len())
}
