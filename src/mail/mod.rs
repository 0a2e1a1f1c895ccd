pub mod resend;
pub mod smtp;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{Config, TransportKind};
use crate::error::Result;
use crate::models::{ComposedMessage, DeliveryOutcome, FailureReason};

pub use resend::ResendRelay;
pub use smtp::SmtpRelay;

/// Classified failure of a single relay attempt
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}: {detail}")]
pub struct RelayError {
    pub reason: FailureReason,
    pub detail: String,
}

impl RelayError {
    pub fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// One authenticated relay session per call to `send`.
#[async_trait]
pub trait MailTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &ComposedMessage) -> std::result::Result<(), RelayError>;
}

/// Build the relay selected by `MAIL_TRANSPORT`
pub fn transport_from_config(config: &Config) -> Result<Arc<dyn MailTransport>> {
    let transport: Arc<dyn MailTransport> = match config.transport {
        TransportKind::Smtp => Arc::new(SmtpRelay::new(config)?),
        TransportKind::Resend => Arc::new(ResendRelay::new(config)?),
    };
    Ok(transport)
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.delivery_max_attempts.max(1),
            base_backoff: Duration::from_millis(config.delivery_backoff_ms),
            max_backoff: Duration::from_secs(5),
        }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Delivery client: sends a composed message through the relay, retrying
/// transient network failures only.
#[derive(Clone)]
pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    policy: RetryPolicy,
}

impl Mailer {
    pub fn new(transport: Arc<dyn MailTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub async fn deliver(&self, message: &ComposedMessage) -> DeliveryOutcome {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match self.transport.send(message).await {
                Ok(()) => {
                    tracing::info!(
                        to = %message.to,
                        subject = %message.subject,
                        attempt,
                        relay = self.transport.name(),
                        "Email sent"
                    );
                    return DeliveryOutcome::Sent;
                }
                Err(err) => err,
            };

            if err.reason.is_retryable() && attempt < self.policy.max_attempts {
                let delay = self.policy.backoff(attempt);
                tracing::warn!(
                    to = %message.to,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient relay failure, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            match err.reason {
                FailureReason::AuthFailure => tracing::error!(
                    relay = self.transport.name(),
                    error = %err,
                    "Mail relay rejected credentials, check relay configuration"
                ),
                _ => tracing::error!(
                    to = %message.to,
                    attempt,
                    error = %err,
                    "Email delivery failed"
                ),
            }
            return DeliveryOutcome::Failed(err.reason);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Scripted transport: pops one result per attempt, succeeds when empty.
    pub struct MockTransport {
        script: Mutex<VecDeque<FailureReason>>,
        attempts: AtomicU32,
        sent: Mutex<Vec<ComposedMessage>>,
        delay: Duration,
        slow: Option<(String, Duration)>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::failing(&[])
        }

        pub fn failing(reasons: &[FailureReason]) -> Self {
            Self {
                script: Mutex::new(reasons.iter().copied().collect()),
                attempts: AtomicU32::new(0),
                sent: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                slow: None,
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Only messages addressed to `to` are delayed
        pub fn with_slow_recipient(mut self, to: &str, delay: Duration) -> Self {
            self.slow = Some((to.to_string(), delay));
            self
        }

        pub fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }

        pub fn sent(&self) -> Vec<ComposedMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailTransport for MockTransport {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn send(&self, message: &ComposedMessage) -> std::result::Result<(), RelayError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some((to, delay)) = &self.slow {
                if *to == message.to {
                    tokio::time::sleep(*delay).await;
                }
            }

            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(reason) => Err(RelayError::new(reason, "scripted failure")),
                None => {
                    self.sent.lock().unwrap().push(message.clone());
                    Ok(())
                }
            }
        }
    }
}
