use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcel {
    pub id: i64,
    pub owner_id: i64,
    pub crop_id: i64,
    pub name: String,
    pub sow_complete: bool,
    /// Boundary polygon as WKT, passed through from the store untouched
    pub boundary: Option<String>,
}

/// Agronomic thresholds for a crop. Read-only for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropProfile {
    pub id: i64,
    pub name: String,
    pub temp_min: f64,
    pub temp_max: f64,
    pub moist_min: f64,
    pub moist_max: f64,
    pub season_start: DateTime<Utc>,
    pub season_end: DateTime<Utc>,
    /// Days of rain history relevant to the crop; indexes the forecast aggregate
    pub rain: u32,
}

impl CropProfile {
    /// Half-open `[start, end)` at calendar-date granularity
    pub fn in_season(&self, today: NaiveDate) -> bool {
        today >= self.season_start.date_naive() && today < self.season_end.date_naive()
    }

    pub fn temperature_in_range(&self, temperature: f64) -> bool {
        temperature > self.temp_min && temperature < self.temp_max
    }

    pub fn moisture_in_range(&self, moisture: f64) -> bool {
        moisture > self.moist_min && moisture < self.moist_max
    }

    /// Hour-offset key addressing the aggregate, `None` past `u32` hours
    pub fn forecast_key(&self) -> Option<u32> {
        self.rain.checked_mul(24)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Digits only, country code included, without the leading `+`
    pub phone: Option<i64>,
    pub email_alert: bool,
    pub sms_alert: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl User {
    pub fn sms_target(&self) -> Option<String> {
        if !self.sms_alert {
            return None;
        }
        self.phone.map(|p| format!("+{}", p))
    }

    pub fn email_target(&self) -> Option<&str> {
        if self.email_alert && !self.email.is_empty() {
            Some(&self.email)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn crop() -> CropProfile {
        CropProfile {
            id: 1,
            name: "Corn".into(),
            temp_min: 18.0,
            temp_max: 28.0,
            moist_min: 30.0,
            moist_max: 50.0,
            season_start: Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap(),
            season_end: Utc.with_ymd_and_hms(2024, 5, 15, 8, 0, 0).unwrap(),
            rain: 2,
        }
    }

    #[test]
    fn season_window_is_half_open_by_date() {
        let c = crop();
        // Start day counts even though the timestamp is midday
        assert!(c.in_season(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));
        assert!(c.in_season(NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()));
        assert!(!c.in_season(NaiveDate::from_ymd_opt(2024, 5, 15).unwrap()));
        assert!(!c.in_season(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));
    }

    #[test]
    fn bounds_are_exclusive() {
        let c = crop();
        assert!(!c.temperature_in_range(18.0));
        assert!(!c.temperature_in_range(28.0));
        assert!(c.temperature_in_range(18.1));
        assert!(!c.moisture_in_range(30.0));
        assert!(!c.moisture_in_range(50.0));
        assert!(c.moisture_in_range(40.0));
    }

    #[test]
    fn forecast_key_is_hours() {
        assert_eq!(crop().forecast_key(), Some(48));
    }

    #[test]
    fn oversized_rain_horizon_has_no_key() {
        let mut c = crop();
        c.rain = u32::MAX / 24 + 1;
        assert_eq!(c.forecast_key(), None);
        c.rain = u32::MAX / 24;
        assert!(c.forecast_key().is_some());
    }

    #[test]
    fn user_targets_respect_opt_in() {
        let mut user = User {
            id: 1,
            email: "farmer@example.com".into(),
            phone: Some(38761123456),
            email_alert: false,
            sms_alert: true,
            first_name: None,
            last_name: None,
        };
        assert_eq!(user.sms_target().as_deref(), Some("+38761123456"));
        assert!(user.email_target().is_none());

        user.sms_alert = false;
        user.email_alert = true;
        assert!(user.sms_target().is_none());
        assert_eq!(user.email_target(), Some("farmer@example.com"));

        user.sms_alert = true;
        user.phone = None;
        assert!(user.sms_target().is_none());
    }
}
