//! API route definitions

use super::handlers::{self, ApiState};
use super::{oidc_handlers, travel_handlers, user_handlers};
use crate::auth::middleware::{require_auth, require_role, RoleGuard};
use crate::store::Role;
use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
///
/// Three groups share one state:
/// - public: banner, health, registration, login, password reset, OIDC callback
/// - authenticated: the caller's own profile and travel logs
/// - admin: every user and every travel log
pub fn create_router(state: ApiState, allowed_origins: &[String]) -> Router {
    let public = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/users/register", post(user_handlers::register))
        .route("/api/users/login", post(user_handlers::login))
        .route(
            "/api/users/forgot-password",
            post(user_handlers::forgot_password),
        )
        .route(
            "/api/users/reset-password",
            post(user_handlers::reset_password),
        )
        .route("/api/auth/callback", get(oidc_handlers::oidc_callback));

    let authenticated = Router::new()
        .route(
            "/api/users/me",
            get(user_handlers::get_me).put(user_handlers::update_me),
        )
        .route("/api/travels", post(travel_handlers::add_travel))
        .route("/api/travels/me", get(travel_handlers::my_travels))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin = Router::new()
        .route("/api/users/all", get(user_handlers::list_users))
        .route(
            "/api/users/{email}",
            put(user_handlers::admin_update_user).delete(user_handlers::delete_user),
        )
        .route("/api/travels/all", get(travel_handlers::all_travels))
        .route("/api/admin/all", get(travel_handlers::admin_all_travels))
        .route_layer(from_fn_with_state(
            RoleGuard::new(state.clone(), Role::Admin),
            require_role,
        ));

    public
        .merge(authenticated)
        .merge(admin)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

/// `*` allows any origin; otherwise only the listed ones.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}
