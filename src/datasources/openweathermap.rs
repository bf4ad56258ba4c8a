use super::ForecastProvider;
use crate::config::OpenWeatherMapConfig;
use crate::error::{Result, SowcastError};
use crate::models::{Coordinate, ForecastSample};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub struct OpenWeatherMapClient {
    client: reqwest::Client,
    config: OpenWeatherMapConfig,
    retry: RetryPolicy,
}

// OpenWeatherMap API response structures
#[derive(Debug, Deserialize)]
struct OwmForecastResponse {
    list: Vec<OwmForecastItem>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastItem {
    #[serde(default)]
    pop: f64, // probability of precipitation
    #[serde(default)]
    rain: Option<OwmPrecipitation>,
}

#[derive(Debug, Deserialize)]
struct OwmPrecipitation {
    #[serde(rename = "3h", default)]
    three_hour: Option<f64>,
}

impl OpenWeatherMapClient {
    pub fn new(config: OpenWeatherMapConfig, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    async fn fetch_once(&self, location: Coordinate, count: usize) -> Result<Vec<ForecastSample>> {
        let url = format!("{}/forecast", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("appid", self.config.api_key.clone()),
                ("cnt", count.to_string()),
            ])
            .send()
            .await
            .map_err(|e| SowcastError::ForecastUnavailable(format!("OpenWeatherMap: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SowcastError::ForecastUnavailable(format!(
                "OpenWeatherMap returned {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SowcastError::ForecastUnavailable(format!("OpenWeatherMap: {}", e)))?;

        parse_samples(&body)
    }

    /// Test connection to OpenWeatherMap API
    pub async fn test_connection(&self, location: Coordinate) -> Result<bool> {
        let url = format!("{}/weather", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("appid", self.config.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| SowcastError::ForecastUnavailable(format!("OpenWeatherMap: {}", e)))?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl ForecastProvider for OpenWeatherMapClient {
    async fn fetch_samples(&self, location: Coordinate, count: usize) -> Result<Vec<ForecastSample>> {
        let samples = self
            .retry
            .run("openweathermap", || self.fetch_once(location, count))
            .await?;

        tracing::debug!(%location, requested = count, received = samples.len(), "Fetched forecast");
        Ok(samples)
    }
}

fn parse_samples(body: &str) -> Result<Vec<ForecastSample>> {
    let response: OwmForecastResponse = serde_json::from_str(body).map_err(|e| {
        SowcastError::ForecastUnavailable(format!(
            "Failed to parse OpenWeatherMap response: {}",
            e
        ))
    })?;

    Ok(response
        .list
        .into_iter()
        .map(|item| {
            ForecastSample::new(item.pop, item.rain.and_then(|r| r.three_hour))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pop_and_optional_rain() {
        let body = r#"{
            "cod": "200",
            "cnt": 3,
            "list": [
                {"dt": 1712890800, "pop": 0.12, "main": {"temp": 285.1}},
                {"dt": 1712901600, "pop": 0.86, "rain": {"3h": 1.75}},
                {"dt": 1712912400, "rain": {}}
            ],
            "city": {"name": "Banja Luka"}
        }"#;

        let samples = parse_samples(body).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], ForecastSample::new(0.12, None));
        assert_eq!(samples[1], ForecastSample::new(0.86, Some(1.75)));
        // Missing pop defaults to zero, empty rain block means no rainfall figure
        assert_eq!(samples[2], ForecastSample::new(0.0, None));
    }

    #[test]
    fn malformed_body_is_unavailable() {
        let err = parse_samples(r#"{"message": "Invalid API key"}"#).unwrap_err();
        assert!(matches!(err, SowcastError::ForecastUnavailable(_)));
    }

    #[test]
    fn client_creation() {
        let config = OpenWeatherMapConfig {
            api_key: "test_key".to_string(),
            base_url: "http://localhost:9".to_string(),
        };
        let client =
            OpenWeatherMapClient::new(config, Duration::from_secs(1), RetryPolicy::default())
                .unwrap();
        assert_eq!(client.retry.max_attempts, 1);
    }

    #[tokio::test]
    async fn unreachable_provider_is_unavailable() {
        let config = OpenWeatherMapConfig {
            api_key: "test_key".to_string(),
            // Discard port; nothing listens there
            base_url: "http://127.0.0.1:9".to_string(),
        };
        let client =
            OpenWeatherMapClient::new(config, Duration::from_secs(2), RetryPolicy::default())
                .unwrap();
        let err = client
            .fetch_samples(Coordinate::new(44.27, 17.19), 8)
            .await
            .unwrap_err();
        assert!(matches!(err, SowcastError::ForecastUnavailable(_)));
    }
}
