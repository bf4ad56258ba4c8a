use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Samples per calendar day in the 3-hour forecast
pub const SAMPLES_PER_DAY: usize = 8;

/// A sample counts as heavy rain above this probability
pub const HEAVY_RAIN_PROBABILITY: f64 = 0.8;

/// Accumulated 3h rainfall mean (mm) at which today's forecast is unusable
pub const HEAVY_RAIN_THRESHOLD_MM: f64 = 3.0;

/// A single 3-hour forecast point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub precipitation_prob: f64, // 0.0-1.0
    pub rain_3h_mm: Option<f64>, // absent when the provider reports no rain block
}

impl ForecastSample {
    pub fn new(precipitation_prob: f64, rain_3h_mm: Option<f64>) -> Self {
        Self {
            precipitation_prob,
            rain_3h_mm,
        }
    }
}

/// Per-day precipitation statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainOutlook {
    pub rain_prob: f64,
    pub heavy_rain_prob: f64,
}

/// Daily rain outlook keyed by hour offset (24, 48, 72, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastAggregate {
    pub days: BTreeMap<u32, RainOutlook>,
    pub today_rain_mm: f64,
}

impl ForecastAggregate {
    /// Bucket ordered samples into days of 8.
    ///
    /// A trailing partial day keeps its own mean probability, but the heavy-rain
    /// share is always divided by 8, so a short last day under-reports heavy rain.
    pub fn from_samples(samples: &[ForecastSample], today_rain_mm: f64) -> Self {
        let days = samples
            .chunks(SAMPLES_PER_DAY)
            .enumerate()
            .map(|(i, chunk)| {
                let key = (i as u32 + 1) * 24;
                let rain_prob =
                    chunk.iter().map(|s| s.precipitation_prob).sum::<f64>() / chunk.len() as f64;
                let heavy = chunk
                    .iter()
                    .filter(|s| s.precipitation_prob > HEAVY_RAIN_PROBABILITY)
                    .count();
                let heavy_rain_prob = heavy as f64 / SAMPLES_PER_DAY as f64;
                (
                    key,
                    RainOutlook {
                        rain_prob,
                        heavy_rain_prob,
                    },
                )
            })
            .collect();

        Self {
            days,
            today_rain_mm,
        }
    }

    pub fn get(&self, hour_key: u32) -> Option<&RainOutlook> {
        self.days.get(&hour_key)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Mean 3h rainfall over the first day of samples.
///
/// Entries without a rain block are skipped rather than counted as zero, but
/// the divisor stays 8.
pub fn today_rain(samples: &[ForecastSample]) -> f64 {
    samples
        .iter()
        .take(SAMPLES_PER_DAY)
        .filter_map(|s| s.rain_3h_mm)
        .sum::<f64>()
        / SAMPLES_PER_DAY as f64
}
