use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::utils::config::get_config;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;
    let api_state = ApiState::new(&config).await?;

    let app = Router::new().nest("/api/v1", api_routes_v1(&api_state)).with_state(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request, http::StatusCode, Router};
    use common::storage::db::SurrealDbClient;
    use common::utils::config::AppConfig;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;

    async fn build_test_app() -> Router {
        let namespace = "main_smoke_test";
        let database = format!("test_db_{}", Uuid::new_v4());
        let db = Arc::new(SurrealDbClient::memory(namespace, &database).await.expect("in-memory surrealdb"));
        db.ensure_initialized().await.expect("schema init");

        let api_state = ApiState { db, config: AppConfig::default() };
        Router::new().nest("/api/v1", api_routes_v1(&api_state)).with_state(api_state)
    }

    #[tokio::test]
    async fn live_and_ready_probes_respond_ok() {
        let app = build_test_app().await;

        let live_response = app.clone().oneshot(Request::builder().uri("/api/v1/live").body(Body::empty()).expect("request")).await.expect("response");
        assert_eq!(live_response.status(), StatusCode::OK);

        let ready_response = app.oneshot(Request::builder().uri("/api/v1/ready").body(Body::empty()).expect("request")).await.expect("response");
        assert_eq!(ready_response.status(), StatusCode::OK);
    }
}
