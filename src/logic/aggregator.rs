use crate::config::ForecastConfig;
use crate::datasources::ForecastProvider;
use crate::error::{Result, SowcastError};
use crate::models::{
    today_rain, Coordinate, ForecastAggregate, HEAVY_RAIN_THRESHOLD_MM, SAMPLES_PER_DAY,
};
use std::sync::Arc;
use std::time::Duration;

/// Turns raw 3-hour forecast samples into a per-day rain outlook
pub struct ForecastAggregator {
    provider: Arc<dyn ForecastProvider>,
    sample_count: usize,
    timeout: Duration,
}

impl ForecastAggregator {
    pub fn new(provider: Arc<dyn ForecastProvider>, config: &ForecastConfig) -> Self {
        Self {
            provider,
            sample_count: config.sample_count,
            timeout: config.overall_timeout(),
        }
    }

    /// Fetch and aggregate the outlook for a location.
    ///
    /// The multi-day fetch and today's-rainfall fetch run concurrently under a
    /// single timeout. Fails with `ForecastUnavailable` on provider errors or
    /// timeout, and `ForecastUnusable` when today's mean 3h rainfall reaches
    /// the heavy-rain threshold.
    pub async fn aggregate(&self, location: Coordinate) -> Result<ForecastAggregate> {
        let fetches = async {
            tokio::join!(
                self.provider.fetch_samples(location, self.sample_count),
                self.provider.fetch_samples(location, SAMPLES_PER_DAY),
            )
        };

        let (outlook, today) = tokio::time::timeout(self.timeout, fetches)
            .await
            .map_err(|_| {
                SowcastError::ForecastUnavailable(format!(
                    "forecast for {} timed out after {}s",
                    location,
                    self.timeout.as_secs_f64()
                ))
            })?;
        let outlook = outlook?;
        let today = today?;

        if outlook.is_empty() {
            return Err(SowcastError::ForecastUnavailable(format!(
                "provider returned no samples for {}",
                location
            )));
        }

        let today_rain_mm = today_rain(&today);
        if today_rain_mm >= HEAVY_RAIN_THRESHOLD_MM {
            return Err(SowcastError::ForecastUnusable(format!(
                "heavy rain today at {} ({:.2} mm mean per 3h)",
                location, today_rain_mm
            )));
        }

        let aggregate = ForecastAggregate::from_samples(&outlook, today_rain_mm);
        tracing::debug!(
            %location,
            samples = outlook.len(),
            days = aggregate.len(),
            today_rain_mm,
            "Aggregated forecast"
        );
        Ok(aggregate)
    }
}
