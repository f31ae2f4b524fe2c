use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_models::auth::{Actor, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub storage_backend: StorageBackend,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            storage_backend: StorageBackend::Memory,
        }
    }
}

impl TestConfig {
    /// Config pointing at a wiremock server with the Supabase backend selected.
    pub fn with_supabase(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            storage_backend: StorageBackend::Supabase,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_token: String::new(),
            storage_backend: self.storage_backend,
            port: 3000,
            default_session_minutes: 60,
            slot_minutes: 30,
            auto_complete_interval_secs: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub app_metadata: Option<Value>,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
            app_metadata: None,
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            app_metadata: None,
        }
    }

    pub fn therapist(email: &str) -> Self {
        Self::new(email, "therapist")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    /// Admin account restricted by the legacy permission bitmask.
    pub fn admin_with_permissions(email: &str, permissions: u64) -> Self {
        Self {
            app_metadata: Some(json!({ "permissions": permissions })),
            ..Self::new(email, "admin")
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).expect("test users carry uuid ids")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            app_metadata: self.app_metadata.clone(),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn to_actor(&self) -> Actor {
        Actor::from_user(&self.to_user(), "test-token").expect("test users carry uuid ids")
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let mut payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });
        if let Some(meta) = &user.app_metadata {
            payload["app_metadata"] = meta.clone();
        }

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row shapes PostgREST returns for the clinic tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn therapist_response(therapist_id: &str, full_name: &str) -> Value {
        json!({
            "id": therapist_id,
            "full_name": full_name,
            "specialties": ["Speech Therapy"],
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn schedule_response(therapist_id: &str, day: &str, start: &str, end: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "therapist_id": therapist_id,
            "day_of_week": day,
            "start_time": start,
            "end_time": end
        })
    }

    pub fn appointment_response(
        therapist_id: &str,
        patient_id: &str,
        date: &str,
        start: &str,
        end: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "therapist_id": therapist_id,
            "patient_id": patient_id,
            "child_id": Uuid::new_v4(),
            "date": date,
            "start_time": start,
            "end_time": end,
            "status": status,
            "package_id": null,
            "notes": null,
            "decided_by": null,
            "completed_at": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn package_response(package_id: &str, child_id: &str, total: i32, used: i32, valid_until: &str) -> Value {
        json!({
            "id": package_id,
            "child_id": child_id,
            "patient_id": Uuid::new_v4(),
            "name": "10 Session Pack",
            "category": "speech",
            "total_sessions": total,
            "used_sessions": used,
            "valid_until": valid_until,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}
