pub mod handlers;
pub mod intervals;
pub mod models;
pub mod router;
pub mod services;
pub mod storage;

pub use models::*;
pub use services::*;
pub use storage::{InMemoryTherapistStore, SupabaseTherapistStore, TherapistStore};
pub use router::{therapist_routes, TherapistState};
