pub mod message;
pub mod outcome;
pub mod webhook;

pub use message::{ComposedMessage, EmailIntent, Recipient, TemplateId};
pub use outcome::{DeliveryOutcome, DispatchStatus, FailureReason};
pub use webhook::{ToolCallResult, WebhookResponse};
