use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::Stream;
use ingestion_pipeline::batch::control::{self, active_reprocessing_batch_id};
use ingestion_pipeline::chrome_stripper::CHROME_STRIPPER_VERSION;
use serde::Serialize;
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Serialize)]
struct ReprocessAccepted {
    batch_id: String,
    queued_documents: u32,
    estimated_duration_seconds: u64,
    status_url: String,
}

pub async fn reprocess_failed_documents(State(state): State<ApiState>) -> Result<Response, ApiError> {
    match control::reprocess_failed_documents(&state.db, CHROME_STRIPPER_VERSION).await {
        Ok(outcome) => Ok((
            StatusCode::ACCEPTED,
            Json(ReprocessAccepted {
                batch_id: outcome.batch_id,
                queued_documents: outcome.queued_count,
                estimated_duration_seconds: outcome.estimated_duration_seconds,
                status_url: outcome.status_url,
            }),
        )
            .into_response()),
        Err(err) if err.is_conflict() => {
            let active_batch_id = active_reprocessing_batch_id(&state.db).await?;
            Ok((
                StatusCode::CONFLICT,
                Json(json!({
                    "error": err.to_string(),
                    "status": "error",
                    "active_batch_id": active_batch_id,
                })),
            )
                .into_response())
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(Serialize)]
struct BatchStatusResponse {
    batch_id: String,
    status: &'static str,
    documents_queued: u32,
    documents_processing: u32,
    documents_completed: u32,
    documents_failed: u32,
    success_rate: f64,
    estimated_time_remaining_seconds: u64,
    started_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl BatchStatusResponse {
    fn from_view(batch_id: &str, view: control::BatchStatusView) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            status: view.overall_status,
            documents_queued: view.queued,
            documents_processing: view.processing,
            documents_completed: view.completed,
            documents_failed: view.failed,
            success_rate: view.success_rate,
            estimated_time_remaining_seconds: view.estimated_time_remaining_seconds,
            started_at: view.started_at,
            updated_at: view.updated_at,
        }
    }
}

pub async fn reprocessing_status(State(state): State<ApiState>, Path(batch_id): Path<String>) -> Result<Json<BatchStatusResponse>, ApiError> {
    let view = control::batch_status(&state.db, &batch_id).await?;
    Ok(Json(BatchStatusResponse::from_view(&batch_id, view)))
}

pub async fn reprocessing_status_stream(State(state): State<ApiState>, Path(batch_id): Path<String>) -> impl IntoResponse {
    let stream = build_status_stream(state, batch_id);
    let sse = Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
}

fn build_status_stream(state: ApiState, batch_id: String) -> impl Stream<Item = Result<Event, axum::Error>> {
    async_stream::stream! {
        let mut ticker = tokio::time::interval(Duration::from_secs(2));
        loop {
            ticker.tick().await;

            let view = match control::batch_status(&state.db, &batch_id).await {
                Ok(view) => view,
                Err(err) => {
                    yield Ok(Event::default().event("error").data(err.to_string()));
                    break;
                }
            };

            let terminal = matches!(view.overall_status, "completed" | "failed");
            let payload = BatchStatusResponse::from_view(&batch_id, view);
            let data = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
            yield Ok(Event::default().event("status").data(data));

            if terminal {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use common::storage::db::SurrealDbClient;
    use common::storage::types::document::{Document, SourceKind};
    use common::storage::types::StoredObject;
    use common::utils::config::AppConfig;

    use super::*;

    async fn memory_state() -> ApiState {
        let db = SurrealDbClient::memory("api_router_test", &uuid::Uuid::new_v4().to_string()).await.expect("memory db");
        db.ensure_initialized().await.expect("init schema");
        ApiState { db: Arc::new(db), config: AppConfig::default() }
    }

    #[tokio::test]
    async fn reprocess_with_nothing_failed_returns_404() {
        let state = memory_state().await;
        let response = reprocess_failed_documents(State(state)).await.expect("handler runs").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn second_reprocess_call_while_active_returns_409_with_active_batch_id() {
        let state = memory_state().await;
        let mut doc = Document::new("https://www.gov.uk/a".into(), "A".into(), "raw text".into(), SourceKind::Url);
        doc.processing_success = Some(false);
        state.db.store_item(doc).await.expect("store document");

        let first = reprocess_failed_documents(State(state.clone())).await.expect("first call runs").into_response();
        assert_eq!(first.status(), StatusCode::ACCEPTED);

        let second = reprocess_failed_documents(State(state)).await.expect("second call runs").into_response();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn status_for_unknown_batch_returns_404() {
        let state = memory_state().await;
        let err = reprocessing_status(State(state), Path("unknown-batch".to_string())).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
