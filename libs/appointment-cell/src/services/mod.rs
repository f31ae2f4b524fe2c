pub mod availability;
pub mod booking;
pub mod lifecycle;
pub mod locks;
pub mod reports;

pub use availability::AvailabilityService;
pub use booking::{parse_booking_time, BookingService};
pub use lifecycle::{LifecycleService, SweepReport};
pub use locks::SlotLocks;
pub use reports::ReportService;
