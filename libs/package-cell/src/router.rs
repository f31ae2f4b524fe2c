use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::storage::PackageStore;

pub struct PackageState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn PackageStore>,
}

impl PackageState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn PackageStore>) -> Self {
        Self { config, store }
    }
}

pub fn package_routes(state: Arc<PackageState>) -> Router {
    let protected_routes = Router::new()
        .route("/patient/packages", get(handlers::list_active_packages))
        .route("/packages/{package_id}", get(handlers::get_package))
        .route("/admin/packages", post(handlers::create_package))
        .route("/admin/packages/{child_id}", get(handlers::list_child_packages))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
