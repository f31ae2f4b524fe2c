use std::env;
use std::str::FromStr;
use tracing::warn;

/// Where the cells keep their records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(StorageBackend::Supabase),
            "memory" | "in_memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_token: String,
    pub storage_backend: StorageBackend,
    pub port: u16,
    pub default_session_minutes: i64,
    pub slot_minutes: i64,
    pub auto_complete_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_token: env::var("SUPABASE_SERVICE_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_TOKEN not set, background completion will use the anon key");
                    String::new()
                }),
            storage_backend: StorageBackend::Memory,
            port: parse_var("PORT", 3000),
            default_session_minutes: parse_var("DEFAULT_SESSION_MINUTES", 60),
            slot_minutes: parse_var("SLOT_MINUTES", 30),
            auto_complete_interval_secs: parse_var("AUTO_COMPLETE_INTERVAL_SECS", 300),
        };

        config.storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                warn!("{}, falling back to in-memory storage", e);
                StorageBackend::Memory
            }),
            Err(_) if config.is_configured() => StorageBackend::Supabase,
            Err(_) => {
                warn!("STORAGE_BACKEND not set and Supabase not configured, using in-memory storage");
                StorageBackend::Memory
            }
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Token the background sweep presents to PostgREST.
    pub fn system_token(&self) -> &str {
        if self.supabase_service_token.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_token
        }
    }
}

fn parse_var<T: FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
