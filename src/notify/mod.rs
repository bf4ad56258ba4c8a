pub mod email;
pub mod sms;

pub use email::EmailNotifier;
pub use sms::TwilioSmsNotifier;

use crate::error::Result;
use crate::models::{AlertDecision, Language};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Channel {
    Sms,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Email => "email",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a channel needs to render an advisory
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub subject: String,
    pub primary: String,
    pub english: String,
    pub local: String,
}

impl OutgoingMessage {
    pub fn from_decision(decision: &AlertDecision, language: Language, subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            primary: decision.messages.primary(language).to_string(),
            english: decision.messages.english.clone(),
            local: decision.messages.local.clone(),
        }
    }
}

/// Single-attempt delivery to one recipient. Retries, if any, live in the
/// implementation's own policy.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, recipient: &str, message: &OutgoingMessage) -> Result<()>;
}
