use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{
    liveness::live,
    readiness::ready,
    reprocessing::{reprocess_failed_documents, reprocessing_status, reprocessing_status_stream},
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1.
///
/// Authentication for these routes is an explicit non-goal here: batch
/// control already lives behind whatever gateway/ingress terminates TLS
/// and enforces access for the deployment, per the surface boundary this
/// router sits on.
pub fn api_routes_v1<S>(_app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/reprocess-failed-documents", post(reprocess_failed_documents))
        .route("/reprocessing-status/{batch_id}", get(reprocessing_status))
        .route("/reprocessing-status/{batch_id}/stream", get(reprocessing_status_stream))
}
