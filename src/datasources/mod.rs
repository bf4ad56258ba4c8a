pub mod openweathermap;
pub mod postgres;

pub use openweathermap::OpenWeatherMapClient;
pub use postgres::PostgresStore;

use crate::error::Result;
use crate::models::{Coordinate, ForecastSample};
use async_trait::async_trait;

/// Point forecast source returning ordered 3-hour samples
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn fetch_samples(&self, location: Coordinate, count: usize)
        -> Result<Vec<ForecastSample>>;
}
