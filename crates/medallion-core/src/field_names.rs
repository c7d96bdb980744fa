//! Column names shared by the Bronze and Silver layers.
//!
//! Upstream messages use camelCase for some fields; those names are kept as-is
//! in every layer so queries can address them with quoted identifiers.

pub const VIN: &str = "vin";
pub const MANUFACTURER: &str = "manufacturer";
pub const YEAR: &str = "year";
pub const MODEL: &str = "model";
pub const GEAR_POSITION: &str = "gearPosition";
pub const VELOCITY: &str = "velocity";
pub const FRONT_LEFT_DOOR_STATE: &str = "frontLeftDoorState";
pub const WIPERS_STATE: &str = "wipersState";
pub const DRIVER_SEATBELT_STATE: &str = "driverSeatbeltState";
pub const TIMESTAMP: &str = "timestamp";
pub const SPEED: &str = "speed";
pub const RPM: &str = "rpm";
pub const FUEL_LEVEL: &str = "fuel_level";
pub const ENGINE_TEMP: &str = "engine_temp";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const ALTITUDE: &str = "altitude";

// Derived partition columns
pub const DATE: &str = "date";
pub const HOUR: &str = "hour";
