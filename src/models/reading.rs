use crate::error::{Result, SowcastError};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Default device reporting interval in minutes
pub const DEFAULT_CONFIG_INTERVAL: i64 = 30;

/// A point location in WGS84 (SRID 4326)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub id: i64,
    pub parcel_id: i64,
    pub device_code: i64,
    pub config_interval: i64,
    pub location: Option<Coordinate>,
}

/// A stored sensor observation. Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub sensor_id: i64,
    pub temperature: f64,
    pub moisture: f64,
    pub battery: Option<f64>,
    pub status: Option<i32>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReading {
    pub sensor_id: i64,
    pub temperature: f64,
    pub moisture: f64,
    pub battery: Option<f64>,
    pub status: Option<i32>,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// How a device identifies itself when reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorRef {
    Id(i64),
    DeviceCode(i64),
}

/// Measurement as reported on the wire by field devices.
///
/// Temperature and moisture arrive as integer tenths (`215` is 21.5), date as
/// `YYYY-MM-DD` and time as `HH:MM`.
#[derive(Debug, Clone)]
pub struct RawMeasurement {
    pub sensor: SensorRef,
    pub temperature_tenths: i64,
    pub moisture_tenths: i64,
    pub battery: Option<f64>,
    pub status: Option<i32>,
    pub date: String,
    pub time: String,
}

impl RawMeasurement {
    pub fn into_reading(self, sensor_id: i64) -> Result<NewReading> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|e| {
            SowcastError::InvalidData(format!("bad observation date '{}': {}", self.date, e))
        })?;
        let time = NaiveTime::parse_from_str(&self.time, "%H:%M").map_err(|e| {
            SowcastError::InvalidData(format!("bad observation time '{}': {}", self.time, e))
        })?;

        Ok(NewReading {
            sensor_id,
            temperature: self.temperature_tenths as f64 / 10.0,
            moisture: self.moisture_tenths as f64 / 10.0,
            battery: self.battery,
            status: self.status,
            date,
            time,
        })
    }
}
