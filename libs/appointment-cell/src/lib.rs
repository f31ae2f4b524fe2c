pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod storage;

pub use models::*;
pub use services::{
    AvailabilityService, BookingService, LifecycleService, ReportService, SlotLocks, SweepReport,
};
pub use storage::{
    AppointmentStore, InMemoryAppointmentStore, InMemoryObjectStore, ObjectStore, ReportStore,
    SupabaseAppointmentStore, SupabaseObjectStore,
};
pub use router::{appointment_routes, AppointmentState};
