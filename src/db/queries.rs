use crate::db::{Database, Store};
use crate::error::{Result, SowcastError};
use crate::models::{
    Alert, Coordinate, CropProfile, NewAlert, NewReading, Parcel, Reading, Sensor, User,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Row};
use tracing::warn;

// Reading Queries

impl Database {
    pub fn insert_reading_row(&self, reading: &NewReading) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO sensor_data
                    (sensor_id, temperature, moisture, battery, status, date, time, server_time_date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    reading.sensor_id,
                    reading.temperature,
                    reading.moisture,
                    reading.battery,
                    reading.status,
                    reading.date.format("%Y-%m-%d").to_string(),
                    reading.time.format("%H:%M:%S").to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_reading_row(&self, id: i64) -> Result<Option<Reading>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM sensor_data WHERE id = ?1",
                [id],
                row_to_reading,
            )
            .optional()
            .map_err(Into::into)
        })
    }
}

fn row_to_reading(row: &Row) -> rusqlite::Result<Reading> {
    let date_str: String = row.get("date")?;
    let time_str: String = row.get("time")?;
    let received_str: String = row.get("server_time_date")?;

    Ok(Reading {
        id: row.get("id")?,
        sensor_id: row.get("sensor_id")?,
        temperature: row.get("temperature")?,
        moisture: row.get("moisture")?,
        battery: row.get("battery")?,
        status: row.get("status")?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| conversion_err(0, e))?,
        time: NaiveTime::parse_from_str(&time_str, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&time_str, "%H:%M"))
            .map_err(|e| conversion_err(0, e))?,
        received_at: parse_timestamp(&received_str).unwrap_or_else(|| {
            warn!(value = %received_str, "Unparseable server_time_date, using now");
            Utc::now()
        }),
    })
}

// Sensor Queries

impl Database {
    pub fn get_sensor_row(&self, id: i64) -> Result<Option<Sensor>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM sensors WHERE id = ?1", [id], row_to_sensor)
                .optional()
                .map_err(Into::into)
        })
    }

    pub fn get_sensor_by_code_row(&self, device_code: i64) -> Result<Option<Sensor>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM sensors WHERE sensor_id = ?1",
                [device_code],
                row_to_sensor,
            )
            .optional()
            .map_err(Into::into)
        })
    }
}

fn row_to_sensor(row: &Row) -> rusqlite::Result<Sensor> {
    let latitude: Option<f64> = row.get("latitude")?;
    let longitude: Option<f64> = row.get("longitude")?;

    let location = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
        _ => None,
    };

    Ok(Sensor {
        id: row.get("id")?,
        parcel_id: row.get("parcel_id")?,
        device_code: row.get("sensor_id")?,
        config_interval: row.get("config")?,
        location,
    })
}

// Parcel, Crop and User Queries

impl Database {
    pub fn get_parcel_row(&self, id: i64) -> Result<Option<Parcel>> {
        let row = self.with_conn(|conn| {
            conn.query_row("SELECT * FROM parcels WHERE id = ?1", [id], |row| {
                Ok((
                    row.get::<_, i64>("id")?,
                    row.get::<_, i64>("owner_id")?,
                    row.get::<_, Option<i64>>("crop_id")?,
                    row.get::<_, String>("name")?,
                    row.get::<_, bool>("sow_complete")?,
                    row.get::<_, Option<String>>("boundary_wkt")?,
                ))
            })
            .optional()
            .map_err(Into::into)
        })?;

        let Some((id, owner_id, crop_id, name, sow_complete, boundary)) = row else {
            return Ok(None);
        };
        let crop_id = crop_id
            .ok_or_else(|| SowcastError::InvalidData(format!("parcel {} has no crop", id)))?;

        Ok(Some(Parcel {
            id,
            owner_id,
            crop_id,
            name,
            sow_complete,
            boundary,
        }))
    }

    /// One-way transition; there is no query that clears the flag
    pub fn mark_sown_row(&self, parcel_id: i64) -> Result<()> {
        let updated = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE parcels SET sow_complete = 1 WHERE id = ?1",
                [parcel_id],
            )?)
        })?;
        if updated == 0 {
            return Err(SowcastError::NotFound(format!("parcel {}", parcel_id)));
        }
        Ok(())
    }

    pub fn get_crop_row(&self, id: i64) -> Result<Option<CropProfile>> {
        let row = self.with_conn(|conn| {
            conn.query_row("SELECT * FROM crops WHERE id = ?1", [id], row_to_crop_row)
                .optional()
                .map_err(Into::into)
        })?;
        row.map(CropProfile::try_from).transpose()
    }

    pub fn get_user_row(&self, id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM users WHERE id = ?1", [id], |row| {
                Ok(User {
                    id: row.get("id")?,
                    email: row.get("email")?,
                    phone: row.get("phone")?,
                    email_alert: row.get("email_alert")?,
                    sms_alert: row.get("sms_alert")?,
                    first_name: row.get("first_name")?,
                    last_name: row.get("last_name")?,
                })
            })
            .optional()
            .map_err(Into::into)
        })
    }
}

/// Largest rain horizon whose hour key fits in `u32`
const MAX_RAIN_DAYS: u32 = u32::MAX / 24;

/// Crop columns are nullable in the store; the engine needs all of them
pub(crate) struct CropRow {
    pub id: i64,
    pub name: String,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub moist_min: Option<f64>,
    pub moist_max: Option<f64>,
    pub season_start: Option<DateTime<Utc>>,
    pub season_end: Option<DateTime<Utc>>,
    pub rain: Option<f64>,
}

fn row_to_crop_row(row: &Row) -> rusqlite::Result<CropRow> {
    let season_start: Option<String> = row.get("season_start")?;
    let season_end: Option<String> = row.get("season_end")?;

    Ok(CropRow {
        id: row.get("id")?,
        name: row.get("name")?,
        temp_min: row.get("temp_min")?,
        temp_max: row.get("temp_max")?,
        moist_min: row.get("moist_min")?,
        moist_max: row.get("moist_max")?,
        season_start: season_start.as_deref().and_then(parse_timestamp),
        season_end: season_end.as_deref().and_then(parse_timestamp),
        rain: row.get("rain")?,
    })
}

impl TryFrom<CropRow> for CropProfile {
    type Error = SowcastError;

    fn try_from(row: CropRow) -> Result<Self> {
        let missing =
            |field: &str| SowcastError::InvalidData(format!("crop {} has no {}", row.id, field));

        let rain = row.rain.ok_or_else(|| missing("rain"))?.round();
        if !rain.is_finite() || rain < 0.0 || rain > MAX_RAIN_DAYS as f64 {
            return Err(SowcastError::InvalidData(format!(
                "crop {} has invalid rain horizon {}",
                row.id, rain
            )));
        }

        Ok(CropProfile {
            id: row.id,
            temp_min: row.temp_min.ok_or_else(|| missing("temp_min"))?,
            temp_max: row.temp_max.ok_or_else(|| missing("temp_max"))?,
            moist_min: row.moist_min.ok_or_else(|| missing("moist_min"))?,
            moist_max: row.moist_max.ok_or_else(|| missing("moist_max"))?,
            season_start: row.season_start.ok_or_else(|| missing("season_start"))?,
            season_end: row.season_end.ok_or_else(|| missing("season_end"))?,
            rain: rain as u32,
            name: row.name,
        })
    }
}

// Alert Queries

impl Database {
    pub fn insert_alert_row(&self, alert: &NewAlert) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO alerts (parcel_id, text, is_active, date) VALUES (?1, ?2, ?3, ?4)",
                params![
                    alert.parcel_id,
                    alert.text,
                    alert.is_active,
                    alert.created_at.to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn latest_alert_row(&self, parcel_id: i64) -> Result<Option<Alert>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM alerts WHERE parcel_id = ?1 ORDER BY id DESC LIMIT 1",
                [parcel_id],
                row_to_alert,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn list_alert_rows(&self, parcel_id: i64, active_only: bool) -> Result<Vec<Alert>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT * FROM alerts
                WHERE parcel_id = ?1 AND (?2 = 0 OR is_active = 1)
                ORDER BY id DESC
                "#,
            )?;
            let alerts = stmt
                .query_map(params![parcel_id, active_only], row_to_alert)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(alerts)
        })
    }

    pub fn set_alert_active_row(&self, alert_id: i64, active: bool) -> Result<()> {
        let updated = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE alerts SET is_active = ?1 WHERE id = ?2",
                params![active, alert_id],
            )?)
        })?;
        if updated == 0 {
            return Err(SowcastError::NotFound(format!("alert {}", alert_id)));
        }
        Ok(())
    }
}

fn row_to_alert(row: &Row) -> rusqlite::Result<Alert> {
    let date_str: String = row.get("date")?;

    Ok(Alert {
        id: row.get("id")?,
        parcel_id: row.get("parcel_id")?,
        text: row.get("text")?,
        is_active: row.get("is_active")?,
        created_at: parse_timestamp(&date_str).unwrap_or_else(|| {
            warn!(value = %date_str, "Unparseable alert date, using now");
            Utc::now()
        }),
    })
}

#[async_trait]
impl Store for Database {
    async fn insert_reading(&self, reading: &NewReading) -> Result<i64> {
        self.insert_reading_row(reading)
    }

    async fn get_reading(&self, id: i64) -> Result<Option<Reading>> {
        self.get_reading_row(id)
    }

    async fn get_sensor(&self, id: i64) -> Result<Option<Sensor>> {
        self.get_sensor_row(id)
    }

    async fn get_sensor_by_code(&self, device_code: i64) -> Result<Option<Sensor>> {
        self.get_sensor_by_code_row(device_code)
    }

    async fn get_parcel(&self, id: i64) -> Result<Option<Parcel>> {
        self.get_parcel_row(id)
    }

    async fn mark_sown(&self, parcel_id: i64) -> Result<()> {
        self.mark_sown_row(parcel_id)
    }

    async fn get_crop(&self, id: i64) -> Result<Option<CropProfile>> {
        self.get_crop_row(id)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.get_user_row(id)
    }

    async fn insert_alert(&self, alert: &NewAlert) -> Result<i64> {
        self.insert_alert_row(alert)
    }

    async fn latest_alert(&self, parcel_id: i64) -> Result<Option<Alert>> {
        self.latest_alert_row(parcel_id)
    }

    async fn list_alerts(&self, parcel_id: i64, active_only: bool) -> Result<Vec<Alert>> {
        self.list_alert_rows(parcel_id, active_only)
    }

    async fn set_alert_active(&self, alert_id: i64, active: bool) -> Result<()> {
        self.set_alert_active_row(alert_id, active)
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }
}

/// Accepts RFC 3339 and SQLite's `datetime('now')` format
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn conversion_err<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
