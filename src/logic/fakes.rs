//! In-process stand-ins for the forecast provider and notification channels.

use crate::datasources::ForecastProvider;
use crate::error::{Result, SowcastError};
use crate::models::{Coordinate, ForecastSample};
use crate::notify::{Channel, Notifier, OutgoingMessage};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub struct FakeForecast {
    samples: Vec<ForecastSample>,
    delay: Option<Duration>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeForecast {
    /// Same probability for every sample, no rainfall figures
    pub fn uniform(pop: f64, count: usize) -> Self {
        Self::from_samples(vec![ForecastSample::new(pop, None); count])
    }

    pub fn from_samples(samples: Vec<ForecastSample>) -> Self {
        Self {
            samples,
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_today_rain(mut self, per_sample_mm: f64) -> Self {
        for sample in self.samples.iter_mut().take(8) {
            sample.rain_3h_mm = Some(per_sample_mm);
        }
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::from_samples(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastProvider for FakeForecast {
    async fn fetch_samples(&self, _location: Coordinate, count: usize) -> Result<Vec<ForecastSample>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(SowcastError::ForecastUnavailable("connection refused".into()));
        }
        Ok(self.samples.iter().take(count).copied().collect())
    }
}

pub struct RecordingNotifier {
    channel: Channel,
    fail: bool,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            fail: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(channel: Channel) -> Self {
        Self {
            fail: true,
            ..Self::new(channel)
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, recipient: &str, message: &OutgoingMessage) -> Result<()> {
        if self.fail {
            return Err(SowcastError::Notification(format!("{} gateway down", self.channel)));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.primary.clone()));
        Ok(())
    }
}
