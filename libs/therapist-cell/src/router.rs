use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::storage::TherapistStore;

pub struct TherapistState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn TherapistStore>,
}

impl TherapistState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn TherapistStore>) -> Self {
        Self { config, store }
    }
}

pub fn therapist_routes(state: Arc<TherapistState>) -> Router {
    let protected_routes = Router::new()
        // Therapist portal
        .route("/therapist/update-schedule", post(handlers::update_schedule))
        .route("/therapist/update-schedule-exceptions", post(handlers::update_schedule_exceptions))
        .route("/therapist/schedule", get(handlers::get_own_schedule))

        // Directory
        .route("/therapists", get(handlers::list_therapists))
        .route("/therapists/{therapist_id}/schedule", get(handlers::get_therapist_schedule))

        // Admin
        .route("/admin/therapists", post(handlers::register_therapist))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
