//! Seed rows for tests. Creating users, parcels and crops is not part of the
//! engine, so the fixtures write straight to the tables.

use crate::db::Database;
use crate::models::Coordinate;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::params;

pub struct ParcelFixture {
    pub email: String,
    pub device_code: i64,
    pub location: Option<Coordinate>,
    pub sow_complete: bool,
    pub email_alert: bool,
    pub sms_alert: bool,
    pub phone: Option<i64>,
    pub season_start: DateTime<Utc>,
    pub season_end: DateTime<Utc>,
    pub rain_days: f64,
}

impl Default for ParcelFixture {
    fn default() -> Self {
        Self {
            email: "farmer@example.com".into(),
            device_code: 1001,
            location: Some(Coordinate::new(44.27, 17.19)),
            sow_complete: false,
            email_alert: true,
            sms_alert: true,
            phone: Some(38761123456),
            season_start: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
            season_end: Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap(),
            rain_days: 1.0,
        }
    }
}

pub struct Seeded {
    pub user_id: i64,
    pub crop_id: i64,
    pub parcel_id: i64,
    pub sensor_id: i64,
}

pub fn seed(db: &Database, fixture: &ParcelFixture) -> Seeded {
    db.with_conn(|conn| {
        conn.execute(
            r#"
            INSERT INTO users (email, phone, email_alert, sms_alert, first_name)
            VALUES (?1, ?2, ?3, ?4, 'Test')
            "#,
            params![
                fixture.email,
                fixture.phone,
                fixture.email_alert,
                fixture.sms_alert,
            ],
        )?;
        let user_id = conn.last_insert_rowid();

        conn.execute(
            r#"
            INSERT INTO crops
                (name, temp_min, temp_max, moist_min, moist_max, season_start, season_end, rain)
            VALUES ('Corn', 18.0, 28.0, 30.0, 50.0, ?1, ?2, ?3)
            "#,
            params![
                fixture.season_start.to_rfc3339(),
                fixture.season_end.to_rfc3339(),
                fixture.rain_days,
            ],
        )?;
        let crop_id = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO parcels (owner_id, crop_id, name, sow_complete) VALUES (?1, ?2, 'North field', ?3)",
            params![user_id, crop_id, fixture.sow_complete],
        )?;
        let parcel_id = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO sensors (parcel_id, sensor_id, latitude, longitude) VALUES (?1, ?2, ?3, ?4)",
            params![
                parcel_id,
                fixture.device_code,
                fixture.location.map(|c| c.latitude),
                fixture.location.map(|c| c.longitude),
            ],
        )?;
        let sensor_id = conn.last_insert_rowid();

        Ok(Seeded {
            user_id,
            crop_id,
            parcel_id,
            sensor_id,
        })
    })
    .expect("seed fixture rows")
}
