use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{Reading, StoredReading};

/// Fleet-wide counts for the status pie chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardStatus {
    pub online: usize,
    pub offline: usize,
    pub power_off: usize,
}

impl BoardStatus {
    pub fn total(&self) -> usize {
        self.online + self.offline + self.power_off
    }
}

/// Aggregated view of the fleet at query time.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetSnapshot {
    /// Latest reading per device, newest first.
    pub latest: Vec<StoredReading>,
    pub board_status: BoardStatus,
    pub uptime_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Online,
    Offline,
    PowerOff,
}

/// Ordering of two readings of the same device. Timestamp decides, the
/// record id breaks ties so the reduction does not depend on input order.
fn recency(a: &StoredReading, b: &StoredReading) -> Ordering {
    a.reading
        .timestamp
        .cmp(&b.reading.timestamp)
        .then(a.id.cmp(&b.id))
}

/// Keeps the most recent reading of every device id (case-sensitive),
/// sorted by timestamp descending with ties broken by device id.
pub fn latest_per_device<I>(readings: I) -> Vec<StoredReading>
where
    I: IntoIterator<Item = StoredReading>,
{
    let mut best: HashMap<String, StoredReading> = HashMap::new();

    for candidate in readings {
        match best.get_mut(&candidate.reading.device_id) {
            Some(current) => {
                if recency(&candidate, current) == Ordering::Greater {
                    *current = candidate;
                }
            }
            None => {
                best.insert(candidate.reading.device_id.clone(), candidate);
            }
        }
    }

    let mut latest: Vec<StoredReading> = best.into_values().collect();
    latest.sort_by(|a, b| {
        b.reading
            .timestamp
            .cmp(&a.reading.timestamp)
            .then_with(|| a.reading.device_id.cmp(&b.reading.device_id))
    });
    latest
}

// Dashboard bucketing. Deliberately not shared with `status::classify`.
fn bucket(reading: &Reading) -> Bucket {
    let powered = reading.power != 0;
    let lit = reading.light != 0.0;

    match (powered, lit) {
        (true, true) => Bucket::Online,
        (true, false) => Bucket::Offline,
        (false, _) => Bucket::PowerOff,
    }
}

pub fn count_statuses<'a, I>(readings: I) -> BoardStatus
where
    I: IntoIterator<Item = &'a Reading>,
{
    readings
        .into_iter()
        .fold(BoardStatus::default(), |mut counts, reading| {
            match bucket(reading) {
                Bucket::Online => counts.online += 1,
                Bucket::Offline => counts.offline += 1,
                Bucket::PowerOff => counts.power_off += 1,
            }
            counts
        })
}

/// Share of online boards as a percentage with one decimal, `0` when the
/// fleet is empty.
pub fn uptime_percentage(status: &BoardStatus) -> f64 {
    let total = status.total();
    if total == 0 {
        return 0.0;
    }
    let ratio = status.online as f64 / total as f64 * 100.0;
    (ratio * 10.0).round() / 10.0
}

pub fn snapshot<I>(readings: I) -> FleetSnapshot
where
    I: IntoIterator<Item = StoredReading>,
{
    let latest = latest_per_device(readings);
    let board_status = count_statuses(latest.iter().map(|stored| &stored.reading));
    let uptime_percentage = uptime_percentage(&board_status);

    FleetSnapshot {
        latest,
        board_status,
        uptime_percentage,
    }
}
