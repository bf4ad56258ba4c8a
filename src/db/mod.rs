pub mod connection;
pub mod migrations;
pub mod queries;

#[cfg(test)]
pub mod fixtures;

pub use connection::Database;

use crate::error::Result;
use crate::models::{Alert, CropProfile, NewAlert, NewReading, Parcel, Reading, Sensor, User};
use async_trait::async_trait;

/// Relational lookups and writes the alerting engine depends on
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_reading(&self, reading: &NewReading) -> Result<i64>;
    async fn get_reading(&self, id: i64) -> Result<Option<Reading>>;

    async fn get_sensor(&self, id: i64) -> Result<Option<Sensor>>;
    async fn get_sensor_by_code(&self, device_code: i64) -> Result<Option<Sensor>>;

    async fn get_parcel(&self, id: i64) -> Result<Option<Parcel>>;
    /// Sets `sow_complete`. The flag only ever goes from false to true.
    async fn mark_sown(&self, parcel_id: i64) -> Result<()>;

    async fn get_crop(&self, id: i64) -> Result<Option<CropProfile>>;
    async fn get_user(&self, id: i64) -> Result<Option<User>>;

    async fn insert_alert(&self, alert: &NewAlert) -> Result<i64>;
    async fn latest_alert(&self, parcel_id: i64) -> Result<Option<Alert>>;
    async fn list_alerts(&self, parcel_id: i64, active_only: bool) -> Result<Vec<Alert>>;
    async fn set_alert_active(&self, alert_id: i64, active: bool) -> Result<()>;

    /// Cheap round trip used by the `check` command
    async fn ping(&self) -> Result<()>;
}
