use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use email::{Audience, BulkEmailResult, BulkRecipient, NewsletterDispatcher, NewsletterRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::caller_from_headers;
use crate::error::ApiError;

/// Body of `POST /api/admin/newsletter/send`.
///
/// `recipients` wins over `tags`; neither means every confirmed subscriber.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNewsletterBody {
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub extra_text: Option<String>,
    #[serde(default)]
    pub recipients: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<SendNewsletterBody> for NewsletterRequest {
    fn from(body: SendNewsletterBody) -> Self {
        let audience = match body.recipients {
            Some(recipients) => {
                Audience::Recipients(recipients.into_iter().map(BulkRecipient::new).collect())
            }
            None => Audience::Tags(body.tags),
        };

        let request = NewsletterRequest::new(body.subject, body.html, audience);
        match body.extra_text {
            Some(text) => request.with_extra_text(text),
            None => request,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendNewsletterResponse {
    pub success: bool,
    pub message: String,
    pub data: BulkEmailResult,
}

/// Create the newsletter router
pub fn router(dispatcher: NewsletterDispatcher) -> Router {
    let shared = Arc::new(dispatcher);

    Router::new()
        .route("/health", get(health))
        .route("/api/admin/newsletter/send", post(send_newsletter))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn send_newsletter(
    State(dispatcher): State<Arc<NewsletterDispatcher>>,
    headers: HeaderMap,
    Json(body): Json<SendNewsletterBody>,
) -> Result<Json<SendNewsletterResponse>, ApiError> {
    let caller = caller_from_headers(&headers);
    let result = dispatcher.send(&caller, body.into()).await?;

    Ok(Json(SendNewsletterResponse {
        success: result.success,
        message: format!("Newsletter sent to {} subscribers", result.total_sent),
        data: result,
    }))
}
