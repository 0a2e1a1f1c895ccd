//! Dispatch orchestration for both triggers.
//!
//! Each trigger runs resolve -> compose -> deliver. Resolution and template
//! failures are answered synchronously before any network call. Delivery runs
//! on its own task; the caller waits at most `response_bound` for it, after
//! which the task keeps going detached and the caller gets `Pending`.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use crate::composer::{Branding, EmailComposer};
use crate::config::Config;
use crate::mail::{MailTransport, Mailer, RetryPolicy};
use crate::models::{DeliveryOutcome, DispatchStatus, EmailIntent, FailureReason, Recipient, TemplateId};
use crate::payload::{Payload, END_OF_CALL_REPORT};
use crate::resolver::{RecipientResolver, Resolution};
use crate::templates::{TemplateError, TemplateStore};

const SUMMARY_PATHS: &[&[&str]] = &[
    &["message", "analysis", "summary"],
    &["message", "summary"],
    &["analysis", "summary"],
    &["summary"],
];

/// Stateless between triggers; shared behind an `Arc`.
pub struct Dispatcher {
    resolver: RecipientResolver,
    composer: EmailComposer,
    mailer: Mailer,
    response_bound: Duration,
}

impl Dispatcher {
    pub fn new(
        resolver: RecipientResolver,
        composer: EmailComposer,
        mailer: Mailer,
        response_bound: Duration,
    ) -> Self {
        Self {
            resolver,
            composer,
            mailer,
            response_bound,
        }
    }

    pub fn from_config(
        config: &Config,
        transport: Arc<dyn MailTransport>,
    ) -> Result<Self, TemplateError> {
        let templates = Arc::new(TemplateStore::new()?);

        Ok(Self::new(
            RecipientResolver::new(config.recipient_sources.clone()),
            EmailComposer::new(templates, Branding::from_config(config)),
            Mailer::new(transport, RetryPolicy::from_config(config)),
            config.dispatch_timeout(),
        ))
    }

    /// Mid-call tool request: INFO email built from the declared parameters.
    pub async fn handle_mid_call(&self, payload: &Payload) -> DispatchStatus {
        let span = tracing::info_span!("dispatch", dispatch_id = %Uuid::new_v4(), trigger = "mid_call");

        async {
            let (args, tool_call_id) = payload.mid_call_arguments();

            // Wrapped tool calls also carry the call context around the arguments
            let resolution = match self.resolver.resolve(&args) {
                Resolution::NotFound if tool_call_id.is_some() => {
                    match self.resolver.resolve(payload) {
                        // A name given in the arguments still beats the envelope's
                        Resolution::Found { mut recipient, source } => {
                            if let Some(name) = self.resolver.name(&args) {
                                recipient.name = Some(name);
                            }
                            Resolution::Found { recipient, source }
                        }
                        Resolution::NotFound => Resolution::NotFound,
                    }
                }
                resolution => resolution,
            };

            let Resolution::Found { recipient, source } = resolution else {
                tracing::warn!("No recipient email in mid-call request");
                return DispatchStatus::NoRecipient;
            };
            tracing::info!(to = %recipient.email, %source, "Mid-call email requested");

            let intent = EmailIntent::new(TemplateId::Info).with_var("topic", args.str_at(&["topic"]));
            self.dispatch(intent, recipient).await
        }
        .instrument(span)
        .await
    }

    /// Post-call report: FOLLOWUP email with the call summary.
    pub async fn handle_post_call(&self, payload: &Payload) -> DispatchStatus {
        let span = tracing::info_span!("dispatch", dispatch_id = %Uuid::new_v4(), trigger = "post_call");

        async {
            let event_type = payload.message_type().unwrap_or("unknown");
            if event_type != END_OF_CALL_REPORT {
                tracing::debug!(event_type, "Ignoring webhook event");
                return DispatchStatus::Ignored {
                    event_type: event_type.to_string(),
                };
            }

            let Resolution::Found { recipient, source } = self.resolver.resolve(payload) else {
                tracing::warn!("No recipient email in end-of-call report");
                return DispatchStatus::NoRecipient;
            };
            tracing::info!(to = %recipient.email, %source, "Follow-up email for ended call");

            let intent = EmailIntent::new(TemplateId::Followup)
                .with_var("summary", payload.first_str(SUMMARY_PATHS));
            self.dispatch(intent, recipient).await
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, intent: EmailIntent, recipient: Recipient) -> DispatchStatus {
        let message = match self.composer.compose(&intent, &recipient) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, template = %intent.template_id, "Email composition failed");
                return DispatchStatus::TemplateError {
                    detail: e.to_string(),
                };
            }
        };

        let to = message.to.clone();
        let mailer = self.mailer.clone();
        let delivery = tokio::spawn(
            async move { mailer.deliver(&message).await }.instrument(tracing::Span::current()),
        );

        // Dropping the JoinHandle on timeout detaches the task without cancelling it
        match tokio::time::timeout(self.response_bound, delivery).await {
            Ok(Ok(DeliveryOutcome::Sent)) => DispatchStatus::Sent { to },
            Ok(Ok(DeliveryOutcome::Failed(reason))) => DispatchStatus::DeliveryFailed { reason },
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Delivery task panicked");
                DispatchStatus::DeliveryFailed {
                    reason: FailureReason::Unknown,
                }
            }
            Err(_) => {
                tracing::info!(
                    to = %to,
                    bound_ms = self.response_bound.as_millis() as u64,
                    "Delivery still in flight, answering caller"
                );
                DispatchStatus::Pending { to }
            }
        }
    }
}
