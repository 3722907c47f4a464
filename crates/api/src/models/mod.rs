//! Entities as stored in Postgres and returned as JSON.

pub mod schedule;
pub mod schedule_day;
pub mod scheduled_customer;
pub mod user;

pub use schedule::Schedule;
pub use schedule_day::ScheduleDay;
pub use scheduled_customer::ScheduledCustomer;
pub use user::User;
