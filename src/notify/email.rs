use super::{Channel, Notifier, OutgoingMessage};
use crate::config::EmailConfig;
use crate::error::{Result, SowcastError};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Email delivery over SMTP submission with STARTTLS
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: EmailConfig,
    retry: RetryPolicy,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig, retry: RetryPolicy) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| SowcastError::Config(format!("SMTP host {}: {}", config.smtp_host, e)))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(15)))
            .build();

        Ok(Self {
            transport,
            config,
            retry,
        })
    }

    async fn send_once(&self, email: &Message) -> Result<()> {
        self.transport
            .send(email.clone())
            .await
            .map_err(|e| SowcastError::Notification(format!("SMTP: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, recipient: &str, message: &OutgoingMessage) -> Result<()> {
        let email = build_message(&self.config, recipient, message)?;

        self.retry.run("smtp", || self.send_once(&email)).await?;
        tracing::info!(to = recipient, "Email alert sent");
        Ok(())
    }
}

/// Plain-text message carrying both language variants
pub fn build_message(
    config: &EmailConfig,
    recipient: &str,
    message: &OutgoingMessage,
) -> Result<Message> {
    let from: Mailbox = config
        .sender
        .parse()
        .map_err(|e| SowcastError::Config(format!("bad sender '{}': {}", config.sender, e)))?;
    let to: Mailbox = recipient
        .parse()
        .map_err(|e| SowcastError::Notification(format!("bad recipient '{}': {}", recipient, e)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(compose_body(&message.english, &message.local, &config.signature))
        .map_err(|e| SowcastError::Notification(format!("building email: {}", e)))
}

/// Plain-text bilingual body: English section, divider, local section
pub fn compose_body(english: &str, local: &str, signature: &str) -> String {
    format!(
        "Hello.\n\n\
         This is an automated alert sent from our server. Please do not reply to this message.\n\n\
         You received the following alert:\n\n\
         {english}\n\n\
         Regards,\n\
         {signature} Team\n\n\
         ---------------------------------------------------------------------\n\n\
         Pozdrav.\n\n\
         Ovo je automatizovana poruka i nemojte odgovarati na nju.\n\n\
         Dobili ste sljedeće obavještenje:\n\n\
         {local}\n\n\
         Srdačan pozdrav,\n\
         {signature} Tim\n"
    )
}
