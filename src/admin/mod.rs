//! Admin/introspection surface (§6), bound on its own listener
//! (`AdminConfig.bind_address`) separate from the proxy's main listener.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::config::AdminConfig;
use crate::http::server::GatewayState;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State available to every admin handler: the same long-lived gateway
/// subsystems the proxy path reads, plus the bearer key the middleware
/// checks requests against.
#[derive(Clone)]
pub struct AdminState {
    pub gateway: GatewayState,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(gateway: GatewayState, admin_config: AdminConfig) -> Router {
    let state = AdminState { gateway, api_key: Arc::from(admin_config.api_key.as_str()) };

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .route("/admin/breakers", get(get_breakers))
        .route("/admin/health/{backend}/force", post(force_health))
        .route("/admin/health/{backend}/clear", post(clear_health))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
