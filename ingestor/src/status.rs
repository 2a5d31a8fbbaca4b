use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::Reading;

/// Per-board status shown in the boards table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Powered, light on.
    On,
    /// Powered, light off.
    Off,
    /// No power.
    Out,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::On => "on",
            Status::Off => "off",
            Status::Out => "out",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives a board's status. Loss of power dominates the light reading.
pub fn classify(reading: &Reading) -> Status {
    if reading.power == 0 {
        Status::Out
    } else if reading.light != 0.0 {
        Status::On
    } else {
        Status::Off
    }
}
