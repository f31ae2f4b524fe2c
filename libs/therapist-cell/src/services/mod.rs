pub mod schedule;
pub mod working_hours;

pub use schedule::ScheduleService;
pub use working_hours::{working_intervals, WorkingHoursService};
