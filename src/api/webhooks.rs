use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::WebhookResponse;
use crate::payload::Payload;
use crate::state::AppState;

/// Voice platform webhook routes
pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/send-specific-email", post(send_specific_email))
        .route("/vapi-webhook", post(vapi_webhook))
}

fn parse_payload(body: &[u8]) -> Result<Payload> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Bad JSON: {}", e)))?;
    tracing::debug!(payload = %value, "Webhook payload received");
    Ok(Payload::new(value))
}

/// POST /send-specific-email - Mid-call tool: the caller asked for details by email
async fn send_specific_email(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookResponse>> {
    let payload = parse_payload(&body)?;
    let tool_call_id = payload.tool_call().and_then(|call| call.id);

    let status = state.dispatcher.handle_mid_call(&payload).await;

    Ok(Json(WebhookResponse::from_status(&status, tool_call_id)))
}

/// POST /vapi-webhook - Platform events; only end-of-call reports send mail
async fn vapi_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookResponse>> {
    let payload = parse_payload(&body)?;

    let status = state.dispatcher.handle_post_call(&payload).await;
    if !status.is_success() {
        tracing::warn!(message = %status.message(), "Post-call follow-up not sent");
    }

    Ok(Json(WebhookResponse::from_status(&status, None)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::api::create_router;
    use crate::config::test_config;
    use crate::dispatch::Dispatcher;
    use crate::mail::testing::MockTransport;
    use crate::state::AppState;

    fn create_test_app(transport: Arc<MockTransport>) -> axum::Router {
        let config = test_config();
        let dispatcher = Dispatcher::from_config(&config, transport).unwrap();
        create_router(AppState::new(dispatcher))
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method(axum::http::Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_send_specific_email_returns_tool_result() {
        let transport = Arc::new(MockTransport::new());
        let sut = create_test_app(transport.clone());
        let body = json!({
            "message": {
                "toolCalls": [{
                    "id": "call_42",
                    "function": {"arguments": {"user_email": "a@b.com", "user_name": "Sam", "topic": "quote"}}
                }]
            }
        });

        let response = sut
            .oneshot(post_json("/send-specific-email", body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["results"][0]["toolCallId"], "call_42");
        assert!(json["results"][0]["result"].as_str().unwrap().contains("a@b.com"));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_send_specific_email_without_email() {
        let transport = Arc::new(MockTransport::new());
        let sut = create_test_app(transport.clone());

        let response = sut
            .oneshot(post_json(
                "/send-specific-email",
                json!({"user_name": "Sam", "topic": "quote"}).to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(
            json["message"],
            "I couldn't find an email address to send that to."
        );
        assert!(json.get("results").is_none());
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn test_bad_json_is_400() {
        let sut = create_test_app(Arc::new(MockTransport::new()));

        let response = sut
            .oneshot(post_json("/vapi-webhook", "{not json".to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_vapi_webhook_ignores_non_report_events() {
        let transport = Arc::new(MockTransport::new());
        let sut = create_test_app(transport.clone());

        let response = sut
            .oneshot(post_json(
                "/vapi-webhook",
                json!({"message": {"type": "speech-update"}}).to_string(),
            ))
            .await
            .unwrap();

        let json = response_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Ignored: speech-update");
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn test_health() {
        let sut = create_test_app(Arc::new(MockTransport::new()));

        let response = sut
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
    }
}
