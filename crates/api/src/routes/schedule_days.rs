//! Schedule day routes.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use prime_shine_core::{DayOffset, ScheduleDayId, ScheduleId, UserId};

use super::schedules::{ScheduleRef, is_owner, owned_schedule};
use crate::db::{ReadExecutor, RepositoryError, RequestScope, ScheduleDayRepository};
use crate::error::Result;
use crate::middleware::{Payload, RequireAuth};
use crate::models::ScheduleDay;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleDayRequest {
    #[serde(rename = "scheduleID")]
    pub schedule_id: ScheduleId,
    pub day_offset: DayOffset,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditScheduleDayRequest {
    #[serde(rename = "scheduleDayID")]
    pub schedule_day_id: ScheduleDayId,
    pub day_offset: DayOffset,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleDayRef {
    #[serde(rename = "scheduleDayID")]
    pub schedule_day_id: ScheduleDayId,
}

async fn owned_day<E: ReadExecutor>(
    conn: &mut E,
    user_id: UserId,
    id: ScheduleDayId,
) -> Result<ScheduleDay> {
    let day = ScheduleDayRepository::new(conn)
        .find_by_id(id)
        .await?
        .ok_or(RepositoryError::NotFound("schedule day"))?;
    if !is_owner(conn, user_id, day.schedule_id).await? {
        return Err(RepositoryError::NotFound("schedule day").into());
    }
    Ok(day)
}

/// `POST /api/scheduleDay/query`
pub async fn query(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    Payload(body): Payload<ScheduleRef>,
) -> Result<Json<Value>> {
    let mut pool = state.pool().clone();
    owned_schedule(&mut pool, user_id, body.schedule_id).await?;
    let days = ScheduleDayRepository::new(&mut pool)
        .query_many(body.schedule_id)
        .await?;

    Ok(Json(json!({ "scheduleDays": days })))
}

/// `POST /api/scheduleDay/create`
pub async fn create(
    RequireAuth(user_id): RequireAuth,
    scope: RequestScope,
    Payload(body): Payload<CreateScheduleDayRequest>,
) -> Result<Json<Value>> {
    let day = scope
        .run(move |tx| {
            Box::pin(async move {
                owned_schedule(tx, user_id, body.schedule_id).await?;
                let day = ScheduleDayRepository::new(tx)
                    .create(body.schedule_id, body.day_offset)
                    .await?;
                Ok(day)
            })
        })
        .await?;

    Ok(Json(json!({ "scheduleDay": day })))
}

/// `POST /api/scheduleDay/edit`
///
/// Moving a day to another offset moves its scheduled customers with it.
pub async fn edit(
    RequireAuth(user_id): RequireAuth,
    scope: RequestScope,
    Payload(body): Payload<EditScheduleDayRequest>,
) -> Result<Json<Value>> {
    let day = scope
        .run(move |tx| {
            Box::pin(async move {
                owned_day(tx, user_id, body.schedule_day_id).await?;
                let day = ScheduleDayRepository::new(tx)
                    .edit(body.schedule_day_id, body.day_offset)
                    .await?;
                Ok(day)
            })
        })
        .await?;

    Ok(Json(json!({ "scheduleDay": day })))
}

/// `POST /api/scheduleDay/delete`
pub async fn delete(
    RequireAuth(user_id): RequireAuth,
    scope: RequestScope,
    Payload(body): Payload<ScheduleDayRef>,
) -> Result<Json<Value>> {
    scope
        .run(move |tx| {
            Box::pin(async move {
                owned_day(tx, user_id, body.schedule_day_id).await?;
                ScheduleDayRepository::new(tx)
                    .delete(body.schedule_day_id)
                    .await?;
                Ok(())
            })
        })
        .await?;

    Ok(Json(json!({ "success": true })))
}
