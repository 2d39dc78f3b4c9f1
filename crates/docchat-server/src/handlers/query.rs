use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;
use std::convert::Infallible;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::chat::QueryParams;
use crate::state::AppState;
use crate::utils::error::ApiError;

/// `GET /api/query`: stream the answer as plain text.
///
/// Failures before the first byte map through [`ApiError`]. Later failures are
/// logged and end the body early.
pub async fn query_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    if params.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    info!(
        "Query request {}: index={}, query_len={}, has_key={}",
        request_id,
        params.index,
        params.query.len(),
        params.open_ai_key.as_deref().is_some_and(|k| !k.is_empty())
    );

    let api_key = params.open_ai_key.filter(|k| !k.trim().is_empty());
    let mut reply = state
        .conversation_manager
        .query(&params.index, &params.query, &state.settings.dialog.major, api_key)
        .await?;

    let body = async_stream::stream! {
        while let Some(item) = reply.next().await {
            match item {
                Ok(text) => yield Ok::<_, Infallible>(Bytes::from(text)),
                Err(e) => {
                    error!("Query {} aborted: {}", request_id, e);
                    break;
                }
            }
        }
        info!("Query {} finished in {}ms", request_id, start_time.elapsed().as_millis());
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
