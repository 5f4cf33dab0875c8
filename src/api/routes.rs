use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use http::HeaderName;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::observability::{get_metrics, LatencyTimer};
use crate::services::AccountService;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AccountService>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(service: Arc<AccountService>) -> Self {
        Self {
            service,
            metrics_handle: None,
        }
    }

    /// Adds metrics handle to the state.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let accounts = Router::new()
        .route("/account", post(handlers::create_account))
        .route("/account/transfer", post(handlers::transfer_funds))
        .route(
            "/account/:account_number",
            get(handlers::get_account)
                .put(handlers::update_account)
                .delete(handlers::delete_account),
        )
        .route("/accounts", get(handlers::list_accounts));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .nest("/bank-manager", accounts)
        .layer(middleware::from_fn(track_http_metrics))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

async fn track_http_metrics(request: Request, next: Next) -> Response {
    let timer = LatencyTimer::new();
    let method = request.method().clone();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    get_metrics().record_http_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        timer.elapsed_ms(),
    );
    response
}
