//! Route definitions and router setup
//!
//! Configures all API routes and middleware.
//!
//! Protected groups are wrapped with two route layers: the identity stage
//! (outermost, runs first) and a role stage carrying that group's
//! [`RolePolicy`].

mod achievement;
mod auth;
mod student;

use crate::auth::{authenticate, require_role, RolePolicy};
use crate::config::CorsConfig;
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, cors: &CorsConfig) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(cors);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    // Public routes
    let public = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/logros", get(achievement::list));

    // Staff account management (admin only)
    let admin = gated(
        Router::new()
            .route("/auth/verify", get(auth::verify))
            .route("/auth/users", get(auth::list_users).post(auth::create_user))
            .route(
                "/auth/users/{id}",
                put(auth::update_user).delete(auth::delete_user),
            ),
        &state,
        RolePolicy::ADMIN_ONLY,
    );

    // Achievement dashboard
    let achievements = gated(
        Router::new()
            .route("/dashboard/logros", get(achievement::list))
            .route("/dashboard/logro", post(achievement::create))
            .route(
                "/dashboard/logro/{id}",
                get(achievement::get)
                    .put(achievement::update)
                    .delete(achievement::deactivate),
            ),
        &state,
        RolePolicy::ADMIN_OR_SUBDIRECCION,
    );

    // Student dashboard
    let students = gated(
        Router::new()
            .route("/dashboard/alumnos", get(student::list))
            .route("/dashboard/alumno", post(student::create))
            .route(
                "/dashboard/alumno/{id}",
                get(student::get).put(student::update).delete(student::delete),
            ),
        &state,
        RolePolicy::ANY_STAFF,
    );

    let api = public.merge(admin).merge(achievements).merge(students);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api", api)
        // Apply middleware and state
        .layer(middleware)
        .with_state(state)
}

/// Put `routes` behind the identity stage and a role stage for `policy`
fn gated(
    routes: Router<SharedState>,
    state: &SharedState,
    policy: RolePolicy,
) -> Router<SharedState> {
    routes
        .route_layer(middleware::from_fn_with_state(policy, require_role))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
}

/// Build CORS layer from settings
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origins: Vec<_> = cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let layer = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    layer
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
