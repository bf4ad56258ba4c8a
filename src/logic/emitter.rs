use crate::config::AlertsConfig;
use crate::db::Store;
use crate::error::{Result, SowcastError};
use crate::models::{Alert, AlertDecision, NewAlert, User};
use crate::notify::{Channel, Notifier, OutgoingMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// When a favorable decision should not produce a new alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Every favorable evaluation alerts
    #[default]
    None,
    /// At most one alert per parcel per UTC day
    PerDay,
    /// At most one alert per parcel per sowing season
    PerSeason,
}

impl DedupPolicy {
    /// Whether `previous` already covers an alert decided at `now`
    pub fn suppresses(
        &self,
        previous: &Alert,
        season_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        match self {
            DedupPolicy::None => false,
            DedupPolicy::PerDay => previous.created_at.date_naive() == now.date_naive(),
            DedupPolicy::PerSeason => previous.created_at >= season_start,
        }
    }
}

/// Per-channel result of a dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub channel: Channel,
    pub recipient: String,
    pub error: Option<String>,
}

impl Delivery {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmitOutcome {
    Created {
        alert_id: i64,
        deliveries: Vec<Delivery>,
    },
    Suppressed {
        previous_alert_id: i64,
    },
}

/// Persists favorable decisions and fans them out to the owner's channels
pub struct AlertEmitter {
    store: Arc<dyn Store>,
    sms: Option<Arc<dyn Notifier>>,
    email: Option<Arc<dyn Notifier>>,
    config: AlertsConfig,
}

impl AlertEmitter {
    pub fn new(
        store: Arc<dyn Store>,
        sms: Option<Arc<dyn Notifier>>,
        email: Option<Arc<dyn Notifier>>,
        config: AlertsConfig,
    ) -> Self {
        Self {
            store,
            sms,
            email,
            config,
        }
    }

    pub async fn emit(&self, decision: &AlertDecision, owner: &User) -> Result<EmitOutcome> {
        let now = Utc::now();

        if self.config.dedup != DedupPolicy::None {
            let previous = self
                .store
                .latest_alert(decision.parcel_id)
                .await
                .map_err(|e| SowcastError::Persistence(e.to_string()))?;
            if let Some(previous) = previous {
                if self.config.dedup.suppresses(&previous, decision.season_start, now) {
                    tracing::info!(
                        parcel_id = decision.parcel_id,
                        previous_alert_id = previous.id,
                        policy = ?self.config.dedup,
                        "Alert suppressed"
                    );
                    return Ok(EmitOutcome::Suppressed {
                        previous_alert_id: previous.id,
                    });
                }
            }
        }

        let message =
            OutgoingMessage::from_decision(decision, self.config.language, &self.config.email_subject);

        let alert = NewAlert {
            created_at: now,
            ..NewAlert::new(decision.parcel_id, message.primary.clone())
        };
        let alert_id = self.store.insert_alert(&alert).await.map_err(|e| match e {
            SowcastError::Persistence(msg) => SowcastError::Persistence(msg),
            other => SowcastError::Persistence(other.to_string()),
        })?;
        tracing::info!(
            alert_id,
            parcel_id = decision.parcel_id,
            tier = %decision.tier,
            "Alert stored"
        );

        let (sms, email) = tokio::join!(
            deliver(self.sms.as_deref(), owner.sms_target(), &message),
            deliver(
                self.email.as_deref(),
                owner.email_target().map(str::to_string),
                &message
            ),
        );
        let deliveries = sms.into_iter().chain(email).collect();

        Ok(EmitOutcome::Created {
            alert_id,
            deliveries,
        })
    }
}

/// Sends on one channel if it is configured and the owner opted in
async fn deliver(
    notifier: Option<&dyn Notifier>,
    recipient: Option<String>,
    message: &OutgoingMessage,
) -> Option<Delivery> {
    let notifier = notifier?;
    let recipient = recipient?;

    let error = match notifier.send(&recipient, message).await {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(channel = %notifier.channel(), to = %recipient, "Delivery failed: {}", e);
            Some(e.to_string())
        }
    };

    Some(Delivery {
        channel: notifier.channel(),
        recipient,
        error,
    })
}
