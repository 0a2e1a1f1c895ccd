use std::fmt;

/// Why a delivery did not go through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    InvalidRecipient,
    AuthFailure,
    TransientNetworkError,
    TemplateError,
    Unknown,
}

impl FailureReason {
    /// Only network-level failures can heal within a request's lifetime
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureReason::TransientNetworkError)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::InvalidRecipient => "invalid recipient",
            FailureReason::AuthFailure => "relay authentication failure",
            FailureReason::TransientNetworkError => "transient network error",
            FailureReason::TemplateError => "template error",
            FailureReason::Unknown => "unknown error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed(FailureReason),
}

/// Caller-visible result of one trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Relay accepted the message within the response bound
    Sent { to: String },
    /// Bound elapsed; delivery continues in the background
    Pending { to: String },
    /// Event type this service does not act on
    Ignored { event_type: String },
    NoRecipient,
    TemplateError { detail: String },
    DeliveryFailed { reason: FailureReason },
}

impl DispatchStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            DispatchStatus::Sent { .. } | DispatchStatus::Pending { .. } | DispatchStatus::Ignored { .. }
        )
    }

    /// Short sentence the voice agent can read back verbatim
    pub fn message(&self) -> String {
        match self {
            DispatchStatus::Sent { to } => format!("I've sent that to your email at {}.", to),
            DispatchStatus::Pending { to } => {
                format!("I'm sending that to {} now, it should arrive shortly.", to)
            }
            DispatchStatus::Ignored { event_type } => format!("Ignored: {}", event_type),
            DispatchStatus::NoRecipient => {
                "I couldn't find an email address to send that to.".to_string()
            }
            DispatchStatus::TemplateError { .. } => {
                "I couldn't put that email together. Could you tell me what it should cover?"
                    .to_string()
            }
            DispatchStatus::DeliveryFailed { reason } => match reason {
                FailureReason::InvalidRecipient => {
                    "That email address was rejected. Could you spell it out for me again?"
                        .to_string()
                }
                _ => "I wasn't able to send the email right now. Please try again later."
                    .to_string(),
            },
        }
    }
}
