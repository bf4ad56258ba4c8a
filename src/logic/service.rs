use super::aggregator::ForecastAggregator;
use super::emitter::{AlertEmitter, Delivery, EmitOutcome};
use super::evaluator::ConditionEvaluator;
use crate::config::Config;
use crate::datasources::OpenWeatherMapClient;
use crate::db::Store;
use crate::error::{Result, SowcastError};
use crate::models::{AlertTier, Decision, NoActionReason, RawMeasurement, SensorRef};
use crate::notify::{EmailNotifier, Notifier, TwilioSmsNotifier};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Acknowledgement sent to a device whose reading could not be stored
pub const NACK: &str = "$0&$0&#";

/// Acknowledgement carrying the device's reporting interval in minutes
pub fn ack(config_interval: i64) -> String {
    format!("$1&${}&#", config_interval)
}

/// What happened to a single reading
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    NoAction(NoActionReason),
    Alerted {
        alert_id: i64,
        tier: AlertTier,
        deliveries: Vec<Delivery>,
    },
    Suppressed {
        previous_alert_id: i64,
    },
}

impl EvaluationOutcome {
    pub fn summary(&self) -> String {
        match self {
            EvaluationOutcome::NoAction(reason) => format!("no action: {}", reason),
            EvaluationOutcome::Alerted {
                alert_id,
                tier,
                deliveries,
            } => {
                let delivered = deliveries.iter().filter(|d| d.delivered()).count();
                format!(
                    "alert {} ({}), delivered on {}/{} channels",
                    alert_id,
                    tier,
                    delivered,
                    deliveries.len()
                )
            }
            EvaluationOutcome::Suppressed { previous_alert_id } => {
                format!("suppressed, alert {} already covers it", previous_alert_id)
            }
        }
    }
}

/// Entry point for new readings: stores them, evaluates them and alerts the
/// parcel owner when a sowing window opens.
///
/// Evaluations for the same parcel must not run concurrently; with the
/// `none` dedup policy two overlapping runs can both alert.
pub struct AlertService {
    store: Arc<dyn Store>,
    evaluator: ConditionEvaluator,
    emitter: AlertEmitter,
}

impl AlertService {
    pub fn new(store: Arc<dyn Store>, evaluator: ConditionEvaluator, emitter: AlertEmitter) -> Self {
        Self {
            store,
            evaluator,
            emitter,
        }
    }

    /// Wire the OpenWeatherMap provider and whichever notifiers are configured
    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Result<Self> {
        let provider = OpenWeatherMapClient::new(
            config.openweathermap.clone(),
            config.forecast.timeout(),
            config.forecast.retry.clone(),
        )?;
        let aggregator = ForecastAggregator::new(Arc::new(provider), &config.forecast);

        let sms: Option<Arc<dyn Notifier>> = match &config.twilio {
            Some(twilio) => Some(Arc::new(TwilioSmsNotifier::new(
                twilio.clone(),
                config.alerts.notify_retry.clone(),
            )?)),
            None => {
                tracing::info!("Twilio not configured - SMS alerts disabled");
                None
            }
        };

        let email: Option<Arc<dyn Notifier>> = match &config.email {
            Some(email) => Some(Arc::new(EmailNotifier::new(
                email.clone(),
                config.alerts.notify_retry.clone(),
            )?)),
            None => {
                tracing::info!("SMTP not configured - email alerts disabled");
                None
            }
        };

        let emitter = AlertEmitter::new(store.clone(), sms, email, config.alerts.clone());
        Ok(Self::new(store, ConditionEvaluator::new(aggregator), emitter))
    }

    pub async fn evaluate_and_maybe_alert(&self, reading_id: i64) -> Result<EvaluationOutcome> {
        self.evaluate_at(reading_id, Utc::now()).await
    }

    /// Same as `evaluate_and_maybe_alert` at an explicit instant. The season
    /// check uses the UTC calendar date, like the stored season bounds.
    pub async fn evaluate_at(&self, reading_id: i64, now: DateTime<Utc>) -> Result<EvaluationOutcome> {
        let today = now.date_naive();
        let reading = self
            .store
            .get_reading(reading_id)
            .await?
            .ok_or_else(|| SowcastError::NotFound(format!("reading {}", reading_id)))?;
        let sensor = self
            .store
            .get_sensor(reading.sensor_id)
            .await?
            .ok_or_else(|| SowcastError::NotFound(format!("sensor {}", reading.sensor_id)))?;
        let parcel = self
            .store
            .get_parcel(sensor.parcel_id)
            .await?
            .ok_or_else(|| SowcastError::NotFound(format!("parcel {}", sensor.parcel_id)))?;
        let crop = self
            .store
            .get_crop(parcel.crop_id)
            .await?
            .ok_or_else(|| SowcastError::NotFound(format!("crop {}", parcel.crop_id)))?;

        let decision = self
            .evaluator
            .evaluate(&reading, &sensor, &parcel, &crop, today)
            .await;

        let alert = match decision {
            Decision::NoAction(reason) => return Ok(EvaluationOutcome::NoAction(reason)),
            Decision::Alert(alert) => alert,
        };

        let owner = self
            .store
            .get_user(parcel.owner_id)
            .await?
            .ok_or_else(|| SowcastError::NotFound(format!("user {}", parcel.owner_id)))?;

        let outcome = match self.emitter.emit(&alert, &owner).await? {
            EmitOutcome::Created {
                alert_id,
                deliveries,
            } => EvaluationOutcome::Alerted {
                alert_id,
                tier: alert.tier,
                deliveries,
            },
            EmitOutcome::Suppressed { previous_alert_id } => {
                EvaluationOutcome::Suppressed { previous_alert_id }
            }
        };
        Ok(outcome)
    }

    /// Store a device measurement and evaluate it. Returns the acknowledgement
    /// frame for the device; evaluation problems never change it.
    pub async fn ingest(&self, raw: RawMeasurement) -> String {
        let (reading_id, config_interval) = match self.store_measurement(raw).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Rejected measurement: {}", e);
                return NACK.to_string();
            }
        };

        match self.evaluate_and_maybe_alert(reading_id).await {
            Ok(outcome) => tracing::info!(reading_id, "Evaluated: {}", outcome.summary()),
            Err(e) => tracing::error!(reading_id, "Evaluation failed: {}", e),
        }

        ack(config_interval)
    }

    async fn store_measurement(&self, raw: RawMeasurement) -> Result<(i64, i64)> {
        let sensor = match raw.sensor {
            SensorRef::Id(id) => self.store.get_sensor(id).await?,
            SensorRef::DeviceCode(code) => self.store.get_sensor_by_code(code).await?,
        }
        .ok_or_else(|| SowcastError::NotFound(format!("sensor {:?}", raw.sensor)))?;

        let reading = raw.into_reading(sensor.id)?;
        let reading_id = self.store.insert_reading(&reading).await?;
        tracing::debug!(reading_id, sensor_id = sensor.id, "Stored reading");

        Ok((reading_id, sensor.config_interval))
    }
}
