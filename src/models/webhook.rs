use serde::Serialize;

use super::DispatchStatus;

/// Tool result in the shape the voice platform reads back to the agent
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    #[serde(rename = "toolCallId")]
    pub tool_call_id: String,
    pub result: String,
}

/// Response body for both webhook routes
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ToolCallResult>>,
}

impl WebhookResponse {
    pub fn from_status(status: &DispatchStatus, tool_call_id: Option<String>) -> Self {
        let message = status.message();
        let results = tool_call_id.map(|id| {
            vec![ToolCallResult {
                tool_call_id: id,
                result: message.clone(),
            }]
        });

        Self {
            success: status.is_success(),
            message,
            results,
        }
    }
}
