use chrono::{DateTime, Utc};
use serde::Serialize;

use prime_shine_core::{DayOffset, ScheduleId, ScheduledCustomerId};

/// A customer visit booked on one day of a schedule.
///
/// `customer_id` is the accounting service's customer identifier and is
/// treated as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledCustomer {
    #[sqlx(rename = "scheduledcustomerid")]
    #[serde(rename = "scheduledCustomerID")]
    pub id: ScheduledCustomerId,
    #[sqlx(rename = "wave_customerid")]
    #[serde(rename = "waveCustomerID")]
    pub customer_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub day_offset: DayOffset,
    #[sqlx(rename = "scheduleid")]
    #[serde(rename = "scheduleID")]
    pub schedule_id: ScheduleId,
}
