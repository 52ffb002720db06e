//! HTTP surface: routes, shared state and error rendering

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use extract::ApiJson;
pub use state::AppState;

use crate::logs::record_exchange;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let chat_router = Router::new()
        .route("/message", post(handlers::chat_message))
        .route("/message/stream", post(handlers::chat_message_stream))
        .route("/services", get(handlers::chat_services))
        .route("/health", get(handlers::chat_health))
        .route("/model-info", get(handlers::chat_model_info));

    let mut router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/chat", chat_router)
        .route("/logs", get(handlers::get_logs).delete(handlers::clear_logs));

    if let Some(store) = state.log_store.clone() {
        router = router.layer(middleware::from_fn_with_state(store, record_exchange));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
