use crate::state::ApiState;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use stash_domain::config::ApiConfig;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

#[derive(OpenApi)]
#[openapi(info(title = "Stash", description = "Namespaced file upload and retrieval"))]
struct ApiDoc;

#[allow(unreachable_pub)]
pub fn init(state: ApiState) -> Router {
    let max_file_size = state.config.storage.max_file_size_bytes;

    let (openapi_routes, api_doc) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(stash_kernel::server::router::system_router())
        .merge(stash_uploads::api::api_router(max_file_size))
        .split_for_parts();

    let scalar_routes = Scalar::with_url("/api/docs", api_doc);

    // The retrieval catch-all only sees paths no other route claims.
    Router::new()
        .merge(openapi_routes)
        .merge(scalar_routes)
        .route("/", get(redirect_handler))
        .merge(stash_uploads::api::file_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn redirect_handler(State(config): State<ApiConfig>) -> Response {
    match HeaderValue::from_str(&config.web.redirect_to) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(_) => {
            tracing::error!(redirect_to = %config.web.redirect_to, "Invalid redirect target");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}
