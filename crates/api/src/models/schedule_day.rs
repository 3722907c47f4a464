use serde::Serialize;

use prime_shine_core::{DayOffset, ScheduleDayId, ScheduleId};

/// One working day inside a schedule, `day_offset` days after its start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDay {
    #[sqlx(rename = "scheduledayid")]
    #[serde(rename = "scheduleDayID")]
    pub id: ScheduleDayId,
    #[sqlx(rename = "scheduleid")]
    #[serde(rename = "scheduleID")]
    pub schedule_id: ScheduleId,
    pub day_offset: DayOffset,
}
