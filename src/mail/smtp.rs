use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{MailTransport, RelayError};
use crate::config::{Config, SmtpTls};
use crate::error::Result;
use crate::models::{ComposedMessage, FailureReason};

/// SMTP relay. A transport is built per attempt and dropped afterwards,
/// so every send runs in its own connect/auth/QUIT session.
pub struct SmtpRelay {
    host: String,
    port: u16,
    tls: SmtpTls,
    credentials: Option<Credentials>,
    from: Mailbox,
    timeout: Duration,
}

impl SmtpRelay {
    pub fn new(config: &Config) -> Result<Self> {
        let address: Address = config.mail_from.parse()?;
        let credentials = match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(password)) => Some(Credentials::new(user.clone(), password.clone())),
            _ => {
                tracing::warn!("SMTP credentials missing, every delivery will fail");
                None
            }
        };

        Ok(Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            tls: config.smtp_tls,
            credentials,
            from: Mailbox::new(config.mail_from_name.clone(), address),
            timeout: config.relay_timeout(),
        })
    }

    fn build_transport(
        &self,
        credentials: Credentials,
    ) -> std::result::Result<AsyncSmtpTransport<Tokio1Executor>, RelayError> {
        let builder = match self.tls {
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
                .map_err(|e| RelayError::new(classify(&e), e.to_string()))?,
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
                .map_err(|e| RelayError::new(classify(&e), e.to_string()))?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host),
        };

        Ok(builder
            .port(self.port)
            .timeout(Some(self.timeout))
            .credentials(credentials)
            .build())
    }

    fn build_message(&self, message: &ComposedMessage) -> std::result::Result<Message, RelayError> {
        let to: Mailbox = message.to.parse().map_err(|e| {
            RelayError::new(
                FailureReason::InvalidRecipient,
                format!("invalid recipient '{}': {}", message.to, e),
            )
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())
            .map_err(|e| {
                RelayError::new(FailureReason::Unknown, format!("failed to build email: {}", e))
            })
    }
}

#[async_trait]
impl MailTransport for SmtpRelay {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, message: &ComposedMessage) -> std::result::Result<(), RelayError> {
        let credentials = self.credentials.clone().ok_or_else(|| {
            RelayError::new(FailureReason::AuthFailure, "SMTP credentials are not configured")
        })?;

        let email = self.build_message(message)?;
        let transport = self.build_transport(credentials)?;

        transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| RelayError::new(classify(&e), e.to_string()))
    }
}

/// Map an SMTP error onto the delivery failure taxonomy
fn classify(err: &lettre::transport::smtp::Error) -> FailureReason {
    let code = err
        .status()
        .and_then(|code| code.to_string().parse::<u16>().ok());

    match code {
        Some(code) => classify_code(code),
        None => {
            let text = err.to_string().to_lowercase();
            if text.contains("authentication") || text.contains("credentials") {
                FailureReason::AuthFailure
            } else if err.is_client() {
                FailureReason::Unknown
            } else {
                // No reply code: connection refused, timeout, TLS or I/O failure
                FailureReason::TransientNetworkError
            }
        }
    }
}

fn classify_code(code: u16) -> FailureReason {
    match code {
        // 538: encryption required for the requested auth mechanism (RFC 4954)
        530 | 534 | 535 | 538 => FailureReason::AuthFailure,
        501 | 550 | 551 | 553 => FailureReason::InvalidRecipient,
        400..=499 => FailureReason::TransientNetworkError,
        _ => FailureReason::Unknown,
    }
}
