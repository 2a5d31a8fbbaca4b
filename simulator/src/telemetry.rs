use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

/// A raw board record as the hub reports it. Fields a board did not send are
/// left out of the JSON entirely.
#[derive(Debug, Clone, Serialize)]
pub struct RawBoard {
    #[serde(rename = "dId")]
    pub device_id: String,
    #[serde(rename = "p", skip_serializing_if = "Option::is_none")]
    pub power: Option<u8>,
    #[serde(rename = "s", skip_serializing_if = "Option::is_none")]
    pub switch_state: Option<u8>,
    #[serde(rename = "l", skip_serializing_if = "Option::is_none")]
    pub light: Option<u32>,
    #[serde(rename = "t", skip_serializing_if = "Option::is_none")]
    pub time_or_temp: Option<String>,
    #[serde(rename = "i", skip_serializing_if = "Option::is_none")]
    pub current: Option<u32>,
    #[serde(rename = "b", skip_serializing_if = "Option::is_none")]
    pub battery: Option<u8>,
    #[serde(rename = "e", skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

/// Generates one record for `device_id`. Light controllers (`LBC*`) report
/// a clock time and light level; plain boards only report flags and some
/// omit fields altogether.
pub fn generate_board(rng: &mut impl Rng, device_id: &str, now: DateTime<Utc>) -> RawBoard {
    let powered = rng.gen_bool(0.85);
    let lit = powered && rng.gen_bool(0.7);
    let sparse = rng.gen_bool(0.1);

    if device_id.starts_with("LBC") {
        RawBoard {
            device_id: device_id.to_string(),
            power: Some(u8::from(powered)),
            switch_state: Some(0),
            light: lit.then(|| rng.gen_range(500..2500)),
            time_or_temp: Some(now.format("%H:%M:%S").to_string()),
            current: lit.then(|| rng.gen_range(10..40)),
            battery: Some(rng.gen_range(0..=1)),
            extra: None,
        }
    } else {
        RawBoard {
            device_id: device_id.to_string(),
            power: (!sparse).then_some(u8::from(powered)),
            switch_state: Some(u8::from(lit)),
            light: lit.then_some(1),
            time_or_temp: rng.gen_bool(0.3).then(|| rng.gen_range(22..35).to_string()),
            current: None,
            battery: (!sparse).then(|| rng.gen_range(20..=100)),
            extra: sparse.then(|| "qwe".to_string()),
        }
    }
}

pub fn device_ids(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            if i % 5 == 4 {
                format!("LBC{:04}", i / 5 + 1)
            } else {
                format!("DEV{:03}", i + 1)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_device_ids_mix_kinds() {
        let ids = device_ids(10);
        assert_eq!(ids[0], "DEV001");
        assert_eq!(ids[4], "LBC0001");
        assert_eq!(ids[9], "LBC0002");
    }

    #[test]
    fn test_light_controller_reports_clock() {
        let mut rng = StdRng::seed_from_u64(7);
        let board = generate_board(&mut rng, "LBC0001", Utc::now());
        let time = board.time_or_temp.unwrap();
        assert!(time.contains(':'));
    }

    #[test]
    fn test_unpowered_board_is_dark() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let board = generate_board(&mut rng, "DEV001", Utc::now());
            if board.power == Some(0) {
                assert!(board.light.is_none());
            }
        }
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let board = RawBoard {
            device_id: "DEV00002".to_string(),
            power: None,
            switch_state: Some(1),
            light: None,
            time_or_temp: None,
            current: None,
            battery: None,
            extra: Some("qwe".to_string()),
        };
        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(json, serde_json::json!({"dId": "DEV00002", "s": 1, "e": "qwe"}));
    }
}
