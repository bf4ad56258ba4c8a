use crate::config::PostgresConfig;
use crate::db::queries::CropRow;
use crate::db::Store;
use crate::error::{Result, SowcastError};
use crate::models::{
    Alert, Coordinate, CropProfile, NewAlert, NewReading, Parcel, Reading, Sensor, User,
    DEFAULT_CONFIG_INTERVAL,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

/// Store backed by the PostGIS database the parcels live in.
///
/// Geometry stays in the database: sensor points are read with `ST_X`/`ST_Y`
/// and parcel boundaries as WKT.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await?;

        tracing::info!(host = %config.host, database = %config.database, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    fn row_to_reading(row: &PgRow) -> Result<Reading> {
        Ok(Reading {
            id: row.try_get::<i32, _>("id")? as i64,
            sensor_id: row.try_get::<i32, _>("sensor_id")? as i64,
            temperature: row.try_get("temperature")?,
            moisture: row.try_get("moisture")?,
            battery: row.try_get("battery")?,
            status: row.try_get("status")?,
            date: row.try_get::<NaiveDate, _>("date")?,
            time: row.try_get::<NaiveTime, _>("time")?,
            received_at: row.try_get::<DateTime<Utc>, _>("server_time_date")?,
        })
    }

    fn row_to_sensor(row: &PgRow) -> Result<Sensor> {
        let lon: Option<f64> = row.try_get("lon")?;
        let lat: Option<f64> = row.try_get("lat")?;

        Ok(Sensor {
            id: row.try_get::<i32, _>("id")? as i64,
            parcel_id: row.try_get::<i32, _>("parcel_id")? as i64,
            device_code: row.try_get::<i32, _>("sensor_id")? as i64,
            config_interval: row
                .try_get::<Option<i32>, _>("config")?
                .map(i64::from)
                .unwrap_or(DEFAULT_CONFIG_INTERVAL),
            location: match (lat, lon) {
                (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
                _ => None,
            },
        })
    }

    fn row_to_alert(row: &PgRow) -> Result<Alert> {
        Ok(Alert {
            id: row.try_get::<i32, _>("id")? as i64,
            parcel_id: row.try_get::<i32, _>("parcel_id")? as i64,
            text: row.try_get("text")?,
            is_active: row.try_get::<Option<bool>, _>("is_active")?.unwrap_or(true),
            created_at: row.try_get("date")?,
        })
    }

    async fn fetch_sensor(&self, column: &str, value: i64) -> Result<Option<Sensor>> {
        let sql = format!(
            r#"
            SELECT id, parcel_id, sensor_id, config,
                   ST_X(location) AS lon, ST_Y(location) AS lat
            FROM sensors
            WHERE {} = $1
            "#,
            column
        );
        let row = sqlx::query(&sql)
            .bind(to_i32(value)?)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_sensor).transpose()
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_reading(&self, reading: &NewReading) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO sensor_data (sensor_id, temperature, moisture, battery, status, date, time)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(to_i32(reading.sensor_id)?)
        .bind(reading.temperature)
        .bind(reading.moisture)
        .bind(reading.battery)
        .bind(reading.status)
        .bind(reading.date)
        .bind(reading.time)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<i32, _>("id")? as i64)
    }

    async fn get_reading(&self, id: i64) -> Result<Option<Reading>> {
        let row = sqlx::query(
            r#"
            SELECT id, sensor_id, temperature, moisture, battery, status, date, time, server_time_date
            FROM sensor_data
            WHERE id = $1
            "#,
        )
        .bind(to_i32(id)?)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_reading).transpose()
    }

    async fn get_sensor(&self, id: i64) -> Result<Option<Sensor>> {
        self.fetch_sensor("id", id).await
    }

    async fn get_sensor_by_code(&self, device_code: i64) -> Result<Option<Sensor>> {
        self.fetch_sensor("sensor_id", device_code).await
    }

    async fn get_parcel(&self, id: i64) -> Result<Option<Parcel>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, crop_id, name, sow_complete, ST_AsText(location) AS boundary
            FROM parcels
            WHERE id = $1
            "#,
        )
        .bind(to_i32(id)?)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id = row.try_get::<i32, _>("id")? as i64;
        let crop_id = row
            .try_get::<Option<i32>, _>("crop_id")?
            .ok_or_else(|| SowcastError::InvalidData(format!("parcel {} has no crop", id)))?;

        Ok(Some(Parcel {
            id,
            owner_id: row.try_get::<i32, _>("owner_id")? as i64,
            crop_id: crop_id as i64,
            name: row
                .try_get::<Option<String>, _>("name")?
                .unwrap_or_default(),
            sow_complete: row
                .try_get::<Option<bool>, _>("sow_complete")?
                .unwrap_or(false),
            boundary: row.try_get("boundary")?,
        }))
    }

    async fn mark_sown(&self, parcel_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE parcels SET sow_complete = TRUE WHERE id = $1")
            .bind(to_i32(parcel_id)?)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SowcastError::NotFound(format!("parcel {}", parcel_id)));
        }
        Ok(())
    }

    async fn get_crop(&self, id: i64) -> Result<Option<CropProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, temp_min, temp_max, moist_min, moist_max,
                   season_start, season_end, rain
            FROM crops
            WHERE id = $1
            "#,
        )
        .bind(to_i32(id)?)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let crop = CropRow {
            id: row.try_get::<i32, _>("id")? as i64,
            name: row
                .try_get::<Option<String>, _>("name")?
                .unwrap_or_default(),
            temp_min: row.try_get("temp_min")?,
            temp_max: row.try_get("temp_max")?,
            moist_min: row.try_get("moist_min")?,
            moist_max: row.try_get("moist_max")?,
            season_start: row.try_get("season_start")?,
            season_end: row.try_get("season_end")?,
            rain: row.try_get("rain")?,
        };

        CropProfile::try_from(crop).map(Some)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, phone, email_alert, sms_alert, first_name, last_name
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(to_i32(id)?)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(User {
            id: row.try_get::<i32, _>("id")? as i64,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            email_alert: row
                .try_get::<Option<bool>, _>("email_alert")?
                .unwrap_or(false),
            sms_alert: row
                .try_get::<Option<bool>, _>("sms_alert")?
                .unwrap_or(false),
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
        }))
    }

    async fn insert_alert(&self, alert: &NewAlert) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO alerts (parcel_id, text, is_active, date) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(to_i32(alert.parcel_id)?)
        .bind(&alert.text)
        .bind(alert.is_active)
        .bind(alert.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<i32, _>("id")? as i64)
    }

    async fn latest_alert(&self, parcel_id: i64) -> Result<Option<Alert>> {
        let row = sqlx::query(
            r#"
            SELECT id, parcel_id, text, is_active, date
            FROM alerts
            WHERE parcel_id = $1
            ORDER BY date DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(to_i32(parcel_id)?)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_alert).transpose()
    }

    async fn list_alerts(&self, parcel_id: i64, active_only: bool) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, parcel_id, text, is_active, date
            FROM alerts
            WHERE parcel_id = $1 AND (NOT $2 OR is_active)
            ORDER BY date DESC, id DESC
            "#,
        )
        .bind(to_i32(parcel_id)?)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        let alerts = rows
            .iter()
            .filter_map(|row| Self::row_to_alert(row).ok())
            .collect();
        Ok(alerts)
    }

    async fn set_alert_active(&self, alert_id: i64, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE alerts SET is_active = $1 WHERE id = $2")
            .bind(active)
            .bind(to_i32(alert_id)?)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SowcastError::NotFound(format!("alert {}", alert_id)));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

/// Primary keys in the PostGIS schema are 32-bit
fn to_i32(value: i64) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| SowcastError::InvalidData(format!("id {} out of range", value)))
}
