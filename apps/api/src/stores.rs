use std::sync::Arc;

use tracing::info;

use appointment_cell::{
    AppointmentStore, InMemoryAppointmentStore, InMemoryObjectStore, ObjectStore, ReportStore,
    SupabaseAppointmentStore, SupabaseObjectStore,
};
use package_cell::{InMemoryPackageStore, PackageStore, SupabasePackageStore};
use shared_config::{AppConfig, StorageBackend};
use shared_database::supabase::SupabaseClient;
use therapist_cell::{InMemoryTherapistStore, SupabaseTherapistStore, TherapistStore};

/// Every store the cells need, built for the configured backend.
#[derive(Clone)]
pub struct Stores {
    pub therapists: Arc<dyn TherapistStore>,
    pub packages: Arc<dyn PackageStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub reports: Arc<dyn ReportStore>,
    pub objects: Arc<dyn ObjectStore>,
}

impl Stores {
    pub fn for_config(config: &AppConfig) -> Self {
        match config.storage_backend {
            StorageBackend::Supabase => Self::supabase(config),
            StorageBackend::Memory => Self::in_memory(),
        }
    }

    pub fn supabase(config: &AppConfig) -> Self {
        info!("Using Supabase storage at {}", config.supabase_url);
        let client = Arc::new(SupabaseClient::new(config));
        let appointments = Arc::new(SupabaseAppointmentStore::new(client.clone()));

        Self {
            therapists: Arc::new(SupabaseTherapistStore::new(client.clone())),
            packages: Arc::new(SupabasePackageStore::new(client.clone())),
            appointments: appointments.clone(),
            reports: appointments,
            objects: Arc::new(SupabaseObjectStore::new(client)),
        }
    }

    pub fn in_memory() -> Self {
        info!("Using in-memory storage, records are lost on restart");
        let appointments = Arc::new(InMemoryAppointmentStore::new());

        Self {
            therapists: Arc::new(InMemoryTherapistStore::new()),
            packages: Arc::new(InMemoryPackageStore::new()),
            appointments: appointments.clone(),
            reports: appointments,
            objects: Arc::new(InMemoryObjectStore::new()),
        }
    }
}
