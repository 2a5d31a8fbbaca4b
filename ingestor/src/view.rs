//! The boards table as the dashboard shows it: one row per board with
//! human-readable flags and an explicit sort direction.

use serde::{Deserialize, Serialize};

use crate::model::{display_timestamp, StoredReading, TimeOrTemp};
use crate::status::{classify, Status};

/// Known installation sites. Boards not listed here show as `Unknown`.
const LOCATIONS: &[(&str, &str)] = &[
    ("DEV001", "Colombo"),
    ("DEV002", "Kandy"),
    ("DEV003", "Galle"),
    ("DEV004", "Jaffna"),
    ("DEV005", "Batticaloa"),
    ("DEV006", "Trincomalee"),
    ("DEV007", "Anuradhapura"),
    ("DEV008", "Kurunegala"),
    ("DEV009", "Badulla"),
    ("DEV010", "Ratnapura"),
    ("DEV00002", "Matara"),
    ("LBC0001", "Negombo"),
    ("dev002", "Kegalle"),
];

pub const UNKNOWN_LOCATION: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRow {
    pub id: String,
    pub location: String,
    pub status: Status,
    pub last_update: String,
    pub power: OnOff,
    pub switch: OnOff,
    pub light: OnOff,
    pub temperature: String,
    pub current: f64,
    pub battery: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    fn from_flag(on: bool) -> Self {
        if on {
            OnOff::On
        } else {
            OnOff::Off
        }
    }
}

/// Sort direction for the boards table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn is_ascending(self) -> bool {
        self == Order::Asc
    }
}

pub fn location_for(device_id: &str) -> &'static str {
    LOCATIONS
        .iter()
        .find(|(id, _)| *id == device_id)
        .map(|(_, location)| *location)
        .unwrap_or(UNKNOWN_LOCATION)
}

fn temperature_display(time_or_temp: Option<TimeOrTemp<'_>>) -> String {
    match time_or_temp {
        Some(TimeOrTemp::Clock(clock)) => clock.to_string(),
        Some(TimeOrTemp::Temperature(temp)) => format!("{temp}°C"),
        None => "-".to_string(),
    }
}

pub fn board_row(stored: &StoredReading) -> BoardRow {
    let reading = &stored.reading;

    BoardRow {
        id: reading.device_id.clone(),
        location: location_for(&reading.device_id).to_string(),
        status: classify(reading),
        last_update: display_timestamp(&reading.timestamp),
        power: OnOff::from_flag(reading.power != 0),
        switch: OnOff::from_flag(reading.switch_state != 0),
        light: OnOff::from_flag(reading.light != 0.0),
        temperature: temperature_display(reading.time_or_temp()),
        current: reading.current,
        battery: reading.battery,
    }
}

/// Orders rows by board id in the requested direction.
pub fn sort_boards(rows: &mut [BoardRow], ascending: bool) {
    if ascending {
        rows.sort_by(|a, b| a.id.cmp(&b.id));
    } else {
        rows.sort_by(|a, b| b.id.cmp(&a.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, RawReading};
    use chrono::Utc;
    use serde_json::json;

    fn stored(raw: serde_json::Value) -> StoredReading {
        let raw: RawReading = serde_json::from_value(raw).unwrap();
        StoredReading {
            id: 1,
            reading: normalize(&raw, Utc::now()),
        }
    }

    #[test]
    fn test_board_row_from_reading() {
        let row = board_row(&stored(json!({
            "dId": "LBC0001", "p": 1, "s": 0, "l": 682, "t": "11:12:27",
            "i": 29, "b": 1, "timestamp": "20250725111240"
        })));

        assert_eq!(row.location, "Negombo");
        assert_eq!(row.status, Status::On);
        assert_eq!(row.last_update, "2025-07-25 11:12:40");
        assert_eq!(row.power, OnOff::On);
        assert_eq!(row.switch, OnOff::Off);
        assert_eq!(row.light, OnOff::On);
        assert_eq!(row.temperature, "11:12:27");
        assert_eq!(row.current, 29.0);
    }

    #[test]
    fn test_unknown_location_and_temperature() {
        let row = board_row(&stored(json!({"dId": "NEW01", "t": 28, "timestamp": "20250801"})));
        assert_eq!(row.location, UNKNOWN_LOCATION);
        assert_eq!(row.temperature, "28°C");
        assert_eq!(row.last_update, "20250801");
        assert_eq!(row.status, Status::Out);
    }

    #[test]
    fn test_location_lookup_is_case_sensitive() {
        assert_eq!(location_for("DEV002"), "Kandy");
        assert_eq!(location_for("dev002"), "Kegalle");
    }

    #[test]
    fn test_sort_direction_is_explicit() {
        let mut rows: Vec<BoardRow> = ["DEV003", "DEV001", "LBC0001"]
            .iter()
            .map(|id| board_row(&stored(json!({"dId": id}))))
            .collect();

        sort_boards(&mut rows, true);
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["DEV001", "DEV003", "LBC0001"]);

        // Same direction twice gives the same order.
        sort_boards(&mut rows, true);
        assert_eq!(rows[0].id, "DEV001");

        sort_boards(&mut rows, false);
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["LBC0001", "DEV003", "DEV001"]);
    }

    #[test]
    fn test_row_wire_format() {
        let row = board_row(&stored(json!({
            "dId": "DEV001",
            "p": 1,
            "timestamp": "20250713111901"
        })));
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["lastUpdate"], "2025-07-13 11:19:01");
        assert_eq!(json["power"], "ON");
        assert_eq!(json["light"], "OFF");
        assert_eq!(json["status"], "off");
    }
}
