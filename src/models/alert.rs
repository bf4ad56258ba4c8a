use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk classification that selects the advisory text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertTier {
    LowRisk,
    ModerateRisk,
}

impl AlertTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTier::LowRisk => "low-risk",
            AlertTier::ModerateRisk => "moderate-risk",
        }
    }
}

impl std::fmt::Display for AlertTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Sr,
}

/// Both language variants of one advisory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessages {
    pub english: String,
    pub local: String,
}

impl AlertMessages {
    pub fn for_tier(tier: AlertTier, parcel_name: &str, heavy_rain_prob: f64) -> Self {
        match tier {
            AlertTier::LowRisk => Self {
                english: format!(
                    "Conditions on parcel {} are favorable for sowing. Soil temperature and \
                     moisture are within the crop's range and rain is unlikely.",
                    parcel_name
                ),
                local: format!(
                    "Uslovi na parceli {} su povoljni za sjetvu. Temperatura i vlažnost \
                     zemljišta su u granicama za kulturu, a kiša nije vjerovatna.",
                    parcel_name
                ),
            },
            AlertTier::ModerateRisk => {
                let heavy_percent = (heavy_rain_prob * 100.0).round();
                Self {
                    english: format!(
                        "Conditions on parcel {} are suitable for sowing. Moderate chance of \
                         rain, probability of heavy rain is {:.0}%.",
                        parcel_name, heavy_percent
                    ),
                    local: format!(
                        "Uslovi na parceli {} su pogodni za sjetvu. Umjerena mogućnost kiše, \
                         vjerovatnoća jake kiše je {:.0}%.",
                        parcel_name, heavy_percent
                    ),
                }
            }
        }
    }

    pub fn primary(&self, language: Language) -> &str {
        match language {
            Language::En => &self.english,
            Language::Sr => &self.local,
        }
    }
}

/// Outcome of a favorable evaluation, ready to be emitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDecision {
    pub parcel_id: i64,
    pub tier: AlertTier,
    pub rain_prob: f64,
    pub heavy_rain_prob: f64,
    pub messages: AlertMessages,
    pub season_start: DateTime<Utc>,
}

/// Why an evaluation ended without an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoActionReason {
    SowComplete,
    OutOfSeason,
    ConditionsOutOfRange,
    NoLocation,
    ForecastUnavailable,
    ForecastUnusable,
    RainTooLikely,
}

impl NoActionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoActionReason::SowComplete => "sowing already complete",
            NoActionReason::OutOfSeason => "outside sowing season",
            NoActionReason::ConditionsOutOfRange => "soil conditions out of range",
            NoActionReason::NoLocation => "sensor has no location",
            NoActionReason::ForecastUnavailable => "forecast unavailable",
            NoActionReason::ForecastUnusable => "forecast unusable",
            NoActionReason::RainTooLikely => "rain too likely",
        }
    }
}

impl std::fmt::Display for NoActionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum Decision {
    NoAction(NoActionReason),
    Alert(AlertDecision),
}

impl Decision {
    pub fn is_alert(&self) -> bool {
        matches!(self, Decision::Alert(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub parcel_id: i64,
    pub text: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub parcel_id: i64,
    pub text: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl NewAlert {
    pub fn new(parcel_id: i64, text: impl Into<String>) -> Self {
        Self {
            parcel_id,
            text: text.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderate_message_embeds_rounded_heavy_percent() {
        let messages = AlertMessages::for_tier(AlertTier::ModerateRisk, "North field", 0.1);
        assert!(messages.english.contains("10%"));
        assert!(messages.local.contains("10%"));

        let messages = AlertMessages::for_tier(AlertTier::ModerateRisk, "North field", 0.125);
        assert!(messages.english.contains("13%"));
    }

    #[test]
    fn low_risk_message_names_parcel() {
        let messages = AlertMessages::for_tier(AlertTier::LowRisk, "Klekovaca 2", 0.0);
        assert!(messages.english.contains("Klekovaca 2"));
        assert!(messages.local.contains("sjetvu"));
        assert!(!messages.english.contains('%'));
    }

    #[test]
    fn primary_follows_language() {
        let messages = AlertMessages::for_tier(AlertTier::LowRisk, "P", 0.0);
        assert_eq!(messages.primary(Language::En), messages.english);
        assert_eq!(messages.primary(Language::Sr), messages.local);
    }

    #[test]
    fn new_alert_is_active() {
        let alert = NewAlert::new(4, "text");
        assert!(alert.is_active);
        assert_eq!(alert.parcel_id, 4);
    }
}
