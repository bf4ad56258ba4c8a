use super::aggregator::ForecastAggregator;
use crate::error::SowcastError;
use crate::models::{
    AlertDecision, AlertMessages, AlertTier, Coordinate, CropProfile, Decision,
    ForecastAggregate, NoActionReason, Parcel, Reading, Sensor,
};
use chrono::NaiveDate;

/// Rain probability below which sowing is advised outright
pub const LOW_RISK_RAIN_PROB: f64 = 0.3;

/// Rain probability below which sowing is advised if heavy rain is unlikely
pub const MODERATE_RISK_RAIN_PROB: f64 = 0.5;

/// Heavy-rain share that disqualifies a moderate-risk day
pub const MODERATE_RISK_HEAVY_PROB: f64 = 0.3;

/// First matching tier wins; `None` means no advisory.
///
/// Light rain alone does not disqualify a day, but a meaningful share of heavy
/// samples does.
pub fn select_tier(rain_prob: f64, heavy_rain_prob: f64) -> Option<AlertTier> {
    if rain_prob < LOW_RISK_RAIN_PROB {
        Some(AlertTier::LowRisk)
    } else if rain_prob < MODERATE_RISK_RAIN_PROB && heavy_rain_prob < MODERATE_RISK_HEAVY_PROB {
        Some(AlertTier::ModerateRisk)
    } else {
        None
    }
}

/// Decides whether a reading puts its parcel in a favorable sowing window
pub struct ConditionEvaluator {
    aggregator: ForecastAggregator,
}

impl ConditionEvaluator {
    pub fn new(aggregator: ForecastAggregator) -> Self {
        Self { aggregator }
    }

    /// Checks that need no forecast. Returns the location to forecast for.
    pub fn check_crop_conditions(
        reading: &Reading,
        sensor: &Sensor,
        parcel: &Parcel,
        crop: &CropProfile,
        today: NaiveDate,
    ) -> Result<Coordinate, NoActionReason> {
        if parcel.sow_complete {
            return Err(NoActionReason::SowComplete);
        }

        if !crop.in_season(today) {
            return Err(NoActionReason::OutOfSeason);
        }

        if !crop.temperature_in_range(reading.temperature)
            || !crop.moisture_in_range(reading.moisture)
        {
            return Err(NoActionReason::ConditionsOutOfRange);
        }

        sensor
            .location
            .filter(Coordinate::is_valid)
            .ok_or(NoActionReason::NoLocation)
    }

    /// Tier selection against the crop's day of the aggregate
    pub fn decide(parcel: &Parcel, crop: &CropProfile, aggregate: &ForecastAggregate) -> Decision {
        let key = crop.forecast_key();
        let Some(outlook) = key.and_then(|key| aggregate.get(key)) else {
            tracing::debug!(
                parcel_id = parcel.id,
                rain_days = crop.rain,
                days = aggregate.len(),
                "Crop rain horizon not covered by forecast"
            );
            return Decision::NoAction(NoActionReason::ForecastUnusable);
        };

        match select_tier(outlook.rain_prob, outlook.heavy_rain_prob) {
            Some(tier) => Decision::Alert(AlertDecision {
                parcel_id: parcel.id,
                tier,
                rain_prob: outlook.rain_prob,
                heavy_rain_prob: outlook.heavy_rain_prob,
                messages: AlertMessages::for_tier(tier, &parcel.name, outlook.heavy_rain_prob),
                season_start: crop.season_start,
            }),
            None => Decision::NoAction(NoActionReason::RainTooLikely),
        }
    }

    pub async fn evaluate(
        &self,
        reading: &Reading,
        sensor: &Sensor,
        parcel: &Parcel,
        crop: &CropProfile,
        today: NaiveDate,
    ) -> Decision {
        let location = match Self::check_crop_conditions(reading, sensor, parcel, crop, today) {
            Ok(location) => location,
            Err(reason) => {
                tracing::debug!(reading_id = reading.id, parcel_id = parcel.id, %reason, "No action");
                return Decision::NoAction(reason);
            }
        };

        let aggregate = match self.aggregator.aggregate(location).await {
            Ok(aggregate) => aggregate,
            Err(SowcastError::ForecastUnusable(msg)) => {
                tracing::info!(parcel_id = parcel.id, "Skipping alert: {}", msg);
                return Decision::NoAction(NoActionReason::ForecastUnusable);
            }
            Err(e) => {
                tracing::warn!(parcel_id = parcel.id, "Skipping alert, forecast failed: {}", e);
                return Decision::NoAction(NoActionReason::ForecastUnavailable);
            }
        };

        let decision = Self::decide(parcel, crop, &aggregate);
        match &decision {
            Decision::Alert(d) => tracing::info!(
                parcel_id = parcel.id,
                tier = %d.tier,
                rain_prob = d.rain_prob,
                heavy_rain_prob = d.heavy_rain_prob,
                "Sowing window open"
            ),
            Decision::NoAction(reason) => {
                tracing::debug!(parcel_id = parcel.id, %reason, "No action")
            }
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastConfig;
    use crate::logic::fakes::FakeForecast;
    use crate::models::{ForecastSample, RainOutlook};
    use chrono::{NaiveTime, TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn reading(temperature: f64, moisture: f64) -> Reading {
        Reading {
            id: 1,
            sensor_id: 1,
            temperature,
            moisture,
            battery: Some(3.8),
            status: None,
            date: NaiveDate::from_ymd_opt(2024, 4, 12).unwrap(),
            time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            received_at: Utc::now(),
        }
    }

    fn sensor() -> Sensor {
        Sensor {
            id: 1,
            parcel_id: 1,
            device_code: 1001,
            config_interval: 30,
            location: Some(Coordinate::new(44.27, 17.19)),
        }
    }

    fn parcel(sow_complete: bool) -> Parcel {
        Parcel {
            id: 7,
            owner_id: 1,
            crop_id: 1,
            name: "North field".into(),
            sow_complete,
            boundary: None,
        }
    }

    fn crop() -> CropProfile {
        CropProfile {
            id: 1,
            name: "Corn".into(),
            temp_min: 18.0,
            temp_max: 28.0,
            moist_min: 30.0,
            moist_max: 50.0,
            season_start: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
            season_end: Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap(),
            rain: 1,
        }
    }

    fn in_season() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 12).unwrap()
    }

    fn aggregate_with(rain_prob: f64, heavy_rain_prob: f64) -> ForecastAggregate {
        let mut days = BTreeMap::new();
        days.insert(
            24,
            RainOutlook {
                rain_prob,
                heavy_rain_prob,
            },
        );
        ForecastAggregate {
            days,
            today_rain_mm: 0.0,
        }
    }

    fn evaluator(provider: FakeForecast) -> (ConditionEvaluator, Arc<FakeForecast>) {
        let provider = Arc::new(provider);
        let config = ForecastConfig {
            timeout_secs: 5,
            ..Default::default()
        };
        let aggregator = ForecastAggregator::new(provider.clone(), &config);
        (ConditionEvaluator::new(aggregator), provider)
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(select_tier(0.0, 0.9), Some(AlertTier::LowRisk));
        assert_eq!(select_tier(0.29, 0.5), Some(AlertTier::LowRisk));
        assert_eq!(select_tier(0.3, 0.0), Some(AlertTier::ModerateRisk));
        assert_eq!(select_tier(0.49, 0.29), Some(AlertTier::ModerateRisk));
        assert_eq!(select_tier(0.49, 0.3), None);
        assert_eq!(select_tier(0.5, 0.0), None);
        assert_eq!(select_tier(0.6, 0.0), None);
    }

    #[test]
    fn tier_selection_is_total_and_deterministic() {
        for r in 0..=20 {
            for h in 0..=20 {
                let rain = r as f64 / 20.0;
                let heavy = h as f64 / 20.0;
                let expected = if rain < 0.3 {
                    Some(AlertTier::LowRisk)
                } else if rain < 0.5 && heavy < 0.3 {
                    Some(AlertTier::ModerateRisk)
                } else {
                    None
                };
                assert_eq!(select_tier(rain, heavy), expected);
                assert_eq!(select_tier(rain, heavy), select_tier(rain, heavy));
            }
        }
    }

    #[test]
    fn sow_complete_short_circuits_everything() {
        // Even with out-of-range readings and no location, the flag wins
        let mut s = sensor();
        s.location = None;
        let result = ConditionEvaluator::check_crop_conditions(
            &reading(0.0, 0.0),
            &s,
            &parcel(true),
            &crop(),
            in_season(),
        );
        assert_eq!(result, Err(NoActionReason::SowComplete));
    }

    #[test]
    fn outside_season_is_no_action() {
        let before = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let end_day = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        for day in [before, end_day] {
            let result = ConditionEvaluator::check_crop_conditions(
                &reading(22.0, 40.0),
                &sensor(),
                &parcel(false),
                &crop(),
                day,
            );
            assert_eq!(result, Err(NoActionReason::OutOfSeason));
        }
    }

    #[test]
    fn threshold_equality_is_no_action() {
        for (t, m) in [(18.0, 40.0), (28.0, 40.0), (22.0, 30.0), (22.0, 50.0)] {
            let result = ConditionEvaluator::check_crop_conditions(
                &reading(t, m),
                &sensor(),
                &parcel(false),
                &crop(),
                in_season(),
            );
            assert_eq!(result, Err(NoActionReason::ConditionsOutOfRange), "{t} {m}");
        }
    }

    #[test]
    fn missing_location_is_no_action() {
        let mut s = sensor();
        s.location = None;
        let result = ConditionEvaluator::check_crop_conditions(
            &reading(22.0, 40.0),
            &s,
            &parcel(false),
            &crop(),
            in_season(),
        );
        assert_eq!(result, Err(NoActionReason::NoLocation));
    }

    #[test]
    fn low_risk_decision() {
        let decision = ConditionEvaluator::decide(&parcel(false), &crop(), &aggregate_with(0.2, 0.0));
        let Decision::Alert(alert) = decision else {
            panic!("expected alert");
        };
        assert_eq!(alert.tier, AlertTier::LowRisk);
        assert_eq!(alert.parcel_id, 7);
        assert!(alert.messages.english.contains("favorable"));
    }

    #[test]
    fn moderate_risk_decision_embeds_heavy_percent() {
        let decision =
            ConditionEvaluator::decide(&parcel(false), &crop(), &aggregate_with(0.45, 0.1));
        let Decision::Alert(alert) = decision else {
            panic!("expected alert");
        };
        assert_eq!(alert.tier, AlertTier::ModerateRisk);
        assert!(alert.messages.english.contains("10%"));
        assert!(alert.messages.local.contains("10%"));
    }

    #[test]
    fn rainy_decision_is_no_action() {
        let decision = ConditionEvaluator::decide(&parcel(false), &crop(), &aggregate_with(0.6, 0.0));
        assert!(matches!(
            decision,
            Decision::NoAction(NoActionReason::RainTooLikely)
        ));
    }

    #[test]
    fn uncovered_horizon_is_unusable() {
        let mut c = crop();
        c.rain = 5;
        let decision = ConditionEvaluator::decide(&parcel(false), &c, &aggregate_with(0.1, 0.0));
        assert!(matches!(
            decision,
            Decision::NoAction(NoActionReason::ForecastUnusable)
        ));
    }

    #[test]
    fn overflowing_horizon_is_unusable() {
        let mut c = crop();
        c.rain = u32::MAX;
        let decision = ConditionEvaluator::decide(&parcel(false), &c, &aggregate_with(0.1, 0.0));
        assert!(matches!(
            decision,
            Decision::NoAction(NoActionReason::ForecastUnusable)
        ));
    }

    #[tokio::test]
    async fn favorable_reading_fetches_forecast_and_alerts() {
        let (evaluator, provider) = evaluator(FakeForecast::uniform(0.2, 24));
        let decision = evaluator
            .evaluate(&reading(22.0, 40.0), &sensor(), &parcel(false), &crop(), in_season())
            .await;
        assert!(decision.is_alert());
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn gated_reading_never_calls_provider() {
        let (evaluator, provider) = evaluator(FakeForecast::uniform(0.2, 24));
        let decision = evaluator
            .evaluate(&reading(22.0, 40.0), &sensor(), &parcel(true), &crop(), in_season())
            .await;
        assert!(matches!(
            decision,
            Decision::NoAction(NoActionReason::SowComplete)
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn heavy_rain_today_blocks_otherwise_favorable_reading() {
        let (evaluator, _) = evaluator(FakeForecast::uniform(0.1, 24).with_today_rain(4.0));
        let decision = evaluator
            .evaluate(&reading(22.0, 40.0), &sensor(), &parcel(false), &crop(), in_season())
            .await;
        assert!(matches!(
            decision,
            Decision::NoAction(NoActionReason::ForecastUnusable)
        ));
    }

    #[tokio::test]
    async fn provider_timeout_is_no_action() {
        let provider = Arc::new(FakeForecast::uniform(0.1, 24).delayed(Duration::from_secs(5)));
        let config = ForecastConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let evaluator = ConditionEvaluator::new(ForecastAggregator::new(provider, &config));
        let decision = evaluator
            .evaluate(&reading(22.0, 40.0), &sensor(), &parcel(false), &crop(), in_season())
            .await;
        assert!(matches!(
            decision,
            Decision::NoAction(NoActionReason::ForecastUnavailable)
        ));
    }

    #[tokio::test]
    async fn heavy_share_from_samples_drives_moderate_tier() {
        // Day one: mean 0.45 with two heavy samples -> heavy 0.25, still moderate
        let mut samples = vec![ForecastSample::new(0.9, None); 2];
        samples.extend(vec![ForecastSample::new(0.3, None); 6]);
        samples.extend(vec![ForecastSample::new(0.1, None); 16]);
        let (evaluator, _) = evaluator(FakeForecast::from_samples(samples));

        let decision = evaluator
            .evaluate(&reading(22.0, 40.0), &sensor(), &parcel(false), &crop(), in_season())
            .await;
        let Decision::Alert(alert) = decision else {
            panic!("expected alert");
        };
        assert_eq!(alert.tier, AlertTier::ModerateRisk);
        assert!(alert.messages.english.contains("25%"));
    }
}
