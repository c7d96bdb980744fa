//! Gear position lookup used by the Silver transform.

use std::fmt;

/// Numeric gear position stored in the Silver layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GearPosition {
    Unknown = -1,
    Park = 0,
    Reverse = 1,
    Neutral = 2,
    Drive = 3,
    Low = 4,
    Gear5 = 5,
    Gear6 = 6,
}

impl GearPosition {
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Map a raw gear string. Unrecognized values become [`GearPosition::Unknown`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "P" | "0" | "PARK" => GearPosition::Park,
            "R" | "1" | "REVERSE" => GearPosition::Reverse,
            "N" | "2" | "NEUTRAL" => GearPosition::Neutral,
            "D" | "3" | "DRIVE" => GearPosition::Drive,
            "L" | "4" | "LOW" => GearPosition::Low,
            "5" => GearPosition::Gear5,
            "6" => GearPosition::Gear6,
            _ => GearPosition::Unknown,
        }
    }
}

impl fmt::Display for GearPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GearPosition::Unknown => "UNKNOWN",
            GearPosition::Park => "PARK",
            GearPosition::Reverse => "REVERSE",
            GearPosition::Neutral => "NEUTRAL",
            GearPosition::Drive => "DRIVE",
            GearPosition::Low => "LOW",
            GearPosition::Gear5 => "GEAR_5",
            GearPosition::Gear6 => "GEAR_6",
        };
        f.write_str(name)
    }
}

/// Null in, null out; everything else maps to a gear code.
pub fn map_gear_position(raw: Option<&str>) -> Option<i64> {
    raw.map(|s| GearPosition::parse(s).code())
}
