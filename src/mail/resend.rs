use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{MailTransport, RelayError};
use crate::config::Config;
use crate::error::Result;
use crate::models::{ComposedMessage, FailureReason};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Resend HTTP API relay, an alternative to SMTP for hosts that block port 587
#[derive(Clone)]
pub struct ResendRelay {
    client: Client,
    api_key: Option<String>,
    from: String,
}

impl ResendRelay {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.relay_timeout()).build()?;

        let from = match &config.mail_from_name {
            Some(name) => format!("{} <{}>", name, config.mail_from),
            None => config.mail_from.clone(),
        };

        if config.resend_api_key.is_none() {
            tracing::warn!("RESEND_API_KEY missing, every delivery will fail");
        }

        Ok(Self {
            client,
            api_key: config.resend_api_key.clone(),
            from,
        })
    }
}

#[async_trait]
impl MailTransport for ResendRelay {
    fn name(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, message: &ComposedMessage) -> std::result::Result<(), RelayError> {
        #[derive(Serialize)]
        struct Payload<'a> {
            from: &'a str,
            to: [&'a str; 1],
            subject: &'a str,
            html: &'a str,
        }

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RelayError::new(FailureReason::AuthFailure, "RESEND_API_KEY is not configured")
        })?;

        let payload = Payload {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html_body,
        };

        let res = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() || e.is_connect() {
                    FailureReason::TransientNetworkError
                } else {
                    FailureReason::Unknown
                };
                RelayError::new(reason, format!("Mail send failed: {}", e))
            })?;

        let status = res.status().as_u16();
        match classify_status(status) {
            None => Ok(()),
            Some(reason) => {
                let body = res.text().await.unwrap_or_default();
                Err(RelayError::new(
                    reason,
                    format!("Resend API error {}: {}", status, body),
                ))
            }
        }
    }
}

/// `None` for success statuses
fn classify_status(status: u16) -> Option<FailureReason> {
    match status {
        200..=299 => None,
        401 | 403 => Some(FailureReason::AuthFailure),
        422 => Some(FailureReason::InvalidRecipient),
        408 | 429 | 500..=599 => Some(FailureReason::TransientNetworkError),
        _ => Some(FailureReason::Unknown),
    }
}
