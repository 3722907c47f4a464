use chrono::NaiveDate;
use serde::Serialize;

use prime_shine_core::{ScheduleId, UserId};

/// A week of work for one user, starting on `start_day`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[sqlx(rename = "scheduleid")]
    #[serde(rename = "scheduleID")]
    pub id: ScheduleId,
    #[sqlx(rename = "userid")]
    #[serde(rename = "userID")]
    pub user_id: UserId,
    pub start_day: NaiveDate,
}
