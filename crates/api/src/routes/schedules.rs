//! Schedule routes.
//!
//! Every schedule belongs to the token's user. A schedule owned by someone
//! else is reported as not found.

use axum::{Json, extract::State};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};

use prime_shine_core::{ScheduleId, UserId};

use crate::db::{ReadExecutor, RepositoryError, RequestScope, ScheduleRepository};
use crate::error::Result;
use crate::middleware::{Payload, RequireAuth};
use crate::models::Schedule;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub start_day: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditScheduleRequest {
    #[serde(rename = "scheduleID")]
    pub schedule_id: ScheduleId,
    pub start_day: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRef {
    #[serde(rename = "scheduleID")]
    pub schedule_id: ScheduleId,
}

/// Load a schedule only if `user_id` owns it.
pub(super) async fn owned_schedule<E: ReadExecutor>(
    conn: &mut E,
    user_id: UserId,
    schedule_id: ScheduleId,
) -> Result<Schedule> {
    ScheduleRepository::new(conn)
        .find_by_id(schedule_id)
        .await?
        .filter(|schedule| schedule.user_id == user_id)
        .ok_or_else(|| RepositoryError::NotFound("schedule").into())
}

/// Whether `schedule_id` exists and belongs to `user_id`.
pub(super) async fn is_owner<E: ReadExecutor>(
    conn: &mut E,
    user_id: UserId,
    schedule_id: ScheduleId,
) -> Result<bool> {
    let schedule = ScheduleRepository::new(conn).find_by_id(schedule_id).await?;
    Ok(schedule.is_some_and(|schedule| schedule.user_id == user_id))
}

/// `POST /api/schedule/query`
pub async fn query(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<Value>> {
    let mut pool = state.pool().clone();
    let schedules = ScheduleRepository::new(&mut pool)
        .query_many(user_id)
        .await?;

    Ok(Json(json!({ "schedules": schedules })))
}

/// `POST /api/schedule/create`
pub async fn create(
    RequireAuth(user_id): RequireAuth,
    scope: RequestScope,
    Payload(body): Payload<CreateScheduleRequest>,
) -> Result<Json<Value>> {
    let schedule = scope
        .run(move |tx| {
            Box::pin(async move {
                let schedule = ScheduleRepository::new(tx)
                    .create(user_id, body.start_day)
                    .await?;
                Ok(schedule)
            })
        })
        .await?;

    Ok(Json(json!({ "schedule": schedule })))
}

/// `POST /api/schedule/edit`
pub async fn edit(
    RequireAuth(user_id): RequireAuth,
    scope: RequestScope,
    Payload(body): Payload<EditScheduleRequest>,
) -> Result<Json<Value>> {
    let schedule = scope
        .run(move |tx| {
            Box::pin(async move {
                owned_schedule(tx, user_id, body.schedule_id).await?;
                let schedule = ScheduleRepository::new(tx)
                    .edit(body.schedule_id, body.start_day)
                    .await?;
                Ok(schedule)
            })
        })
        .await?;

    Ok(Json(json!({ "schedule": schedule })))
}

/// `POST /api/schedule/delete`
///
/// Deletes the schedule with all of its days and visits.
pub async fn delete(
    RequireAuth(user_id): RequireAuth,
    scope: RequestScope,
    Payload(body): Payload<ScheduleRef>,
) -> Result<Json<Value>> {
    scope
        .run(move |tx| {
            Box::pin(async move {
                owned_schedule(tx, user_id, body.schedule_id).await?;
                ScheduleRepository::new(tx).delete(body.schedule_id).await?;
                Ok(())
            })
        })
        .await?;

    Ok(Json(json!({ "success": true })))
}
