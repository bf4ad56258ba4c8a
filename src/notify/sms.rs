use super::{Channel, Notifier, OutgoingMessage};
use crate::config::TwilioConfig;
use crate::error::{Result, SowcastError};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::time::Duration;

/// SMS delivery through the Twilio Messages REST API
pub struct TwilioSmsNotifier {
    client: reqwest::Client,
    config: TwilioConfig,
    retry: RetryPolicy,
}

impl TwilioSmsNotifier {
    pub fn new(config: TwilioConfig, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.config.base_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    async fn send_once(&self, to: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", to),
                ("From", self.config.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|e| SowcastError::Notification(format!("Twilio: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SowcastError::Notification(format!(
                "Twilio returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TwilioSmsNotifier {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, recipient: &str, message: &OutgoingMessage) -> Result<()> {
        self.retry
            .run("twilio", || self.send_once(recipient, &message.primary))
            .await?;
        tracing::info!(to = recipient, "SMS alert sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_url_includes_account() {
        let notifier = TwilioSmsNotifier::new(
            TwilioConfig {
                account_sid: "AC42".into(),
                auth_token: "tok".into(),
                from_number: "+15550001111".into(),
                base_url: "https://api.twilio.com/2010-04-01/".into(),
            },
            RetryPolicy::default(),
        )
        .unwrap();

        assert_eq!(
            notifier.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC42/Messages.json"
        );
        assert_eq!(notifier.channel(), Channel::Sms);
    }
}
