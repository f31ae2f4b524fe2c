//! Clinic-local wall clock. Appointment dates and times are stored without a
//! zone and read against the server's local time.

use chrono::{Local, NaiveDate, NaiveDateTime};

pub fn clinic_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn clinic_today() -> NaiveDate {
    clinic_now().date()
}
