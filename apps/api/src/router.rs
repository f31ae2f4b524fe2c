use std::sync::Arc;

use axum::{
    Json, Router,
    routing::get,
};
use serde_json::json;

use appointment_cell::{appointment_routes, AppointmentState};
use auth_cell::auth_routes;
use package_cell::{package_routes, PackageState};
use shared_config::AppConfig;
use therapist_cell::{therapist_routes, TherapistState};

use crate::stores::Stores;

pub fn create_router(config: Arc<AppConfig>, appointments: Arc<AppointmentState>, stores: &Stores) -> Router {
    let therapists = Arc::new(TherapistState::new(config.clone(), stores.therapists.clone()));
    let packages = Arc::new(PackageState::new(config.clone(), stores.packages.clone()));

    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .route("/health", get(health))
        .merge(auth_routes(config))
        .merge(therapist_routes(therapists))
        .merge(package_routes(packages))
        .merge(appointment_routes(appointments))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn appointment_state(config: Arc<AppConfig>, stores: &Stores) -> Arc<AppointmentState> {
    Arc::new(AppointmentState::new(
        config,
        stores.therapists.clone(),
        stores.packages.clone(),
        stores.appointments.clone(),
        stores.reports.clone(),
        stores.objects.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;

    use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

    fn app() -> (Router, Arc<AppConfig>) {
        let config = TestConfig::default().to_arc();
        let stores = Stores::in_memory();
        let state = appointment_state(config.clone(), &stores);
        (create_router(config.clone(), state, &stores), config)
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn every_cell_is_mounted() {
        let (app, config) = app();
        let token = JwtTestUtils::create_test_token(&TestUser::admin("a@example.com"), &config.supabase_jwt_secret, Some(1));

        for uri in ["/auth/me", "/therapists", "/patient/appointments", "/therapist/appointments/pending"] {
            let response = app
                .clone()
                .oneshot(
                    Request::get(uri)
                        .header("authorization", format!("Bearer {}", token))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_ne!(response.status(), StatusCode::NOT_FOUND, "{} is not routed", uri);
        }

        let response = app
            .oneshot(Request::get("/therapists").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
