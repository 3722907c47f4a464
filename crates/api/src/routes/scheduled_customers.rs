//! Scheduled customer (visit) routes.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use prime_shine_core::{DayOffset, ScheduleId, ScheduledCustomerId, UserId};

use super::schedules::{ScheduleRef, is_owner, owned_schedule};
use crate::db::scheduled_customers::Visit;
use crate::db::{ReadExecutor, RepositoryError, RequestScope, ScheduledCustomerRepository};
use crate::error::Result;
use crate::middleware::{Payload, RequireAuth};
use crate::models::ScheduledCustomer;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisitRequest {
    #[serde(rename = "waveCustomerID")]
    pub customer_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub day_offset: DayOffset,
    #[serde(rename = "scheduleID")]
    pub schedule_id: ScheduleId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditVisitRequest {
    #[serde(rename = "scheduledCustomerID")]
    pub scheduled_customer_id: ScheduledCustomerId,
    #[serde(rename = "waveCustomerID")]
    pub customer_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct VisitRef {
    #[serde(rename = "scheduledCustomerID")]
    pub scheduled_customer_id: ScheduledCustomerId,
}

async fn owned_visit<E: ReadExecutor>(
    conn: &mut E,
    user_id: UserId,
    id: ScheduledCustomerId,
) -> Result<ScheduledCustomer> {
    let visit = ScheduledCustomerRepository::new(conn)
        .find_by_id(id)
        .await?
        .ok_or(RepositoryError::NotFound("scheduled customer"))?;
    if !is_owner(conn, user_id, visit.schedule_id).await? {
        return Err(RepositoryError::NotFound("scheduled customer").into());
    }
    Ok(visit)
}

/// `POST /api/scheduledCustomer/query`
pub async fn query(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    Payload(body): Payload<ScheduleRef>,
) -> Result<Json<Value>> {
    let mut pool = state.pool().clone();
    owned_schedule(&mut pool, user_id, body.schedule_id).await?;
    let visits = ScheduledCustomerRepository::new(&mut pool)
        .query_many(body.schedule_id)
        .await?;

    Ok(Json(json!({ "scheduledCustomers": visits })))
}

/// `POST /api/scheduledCustomer/create`
pub async fn create(
    RequireAuth(user_id): RequireAuth,
    scope: RequestScope,
    Payload(body): Payload<CreateVisitRequest>,
) -> Result<Json<Value>> {
    let visit = scope
        .run(move |tx| {
            Box::pin(async move {
                owned_schedule(tx, user_id, body.schedule_id).await?;
                let details = Visit {
                    customer_id: body.customer_id,
                    start_time: body.start_time,
                    end_time: body.end_time,
                };
                let visit = ScheduledCustomerRepository::new(tx)
                    .create(&details, body.day_offset, body.schedule_id)
                    .await?;
                Ok(visit)
            })
        })
        .await?;

    Ok(Json(json!({ "scheduledCustomer": visit })))
}

/// `POST /api/scheduledCustomer/edit`
pub async fn edit(
    RequireAuth(user_id): RequireAuth,
    scope: RequestScope,
    Payload(body): Payload<EditVisitRequest>,
) -> Result<Json<Value>> {
    let visit = scope
        .run(move |tx| {
            Box::pin(async move {
                owned_visit(tx, user_id, body.scheduled_customer_id).await?;
                let details = Visit {
                    customer_id: body.customer_id,
                    start_time: body.start_time,
                    end_time: body.end_time,
                };
                let visit = ScheduledCustomerRepository::new(tx)
                    .edit(body.scheduled_customer_id, &details)
                    .await?;
                Ok(visit)
            })
        })
        .await?;

    Ok(Json(json!({ "scheduledCustomer": visit })))
}

/// `POST /api/scheduledCustomer/delete`
pub async fn delete(
    RequireAuth(user_id): RequireAuth,
    scope: RequestScope,
    Payload(body): Payload<VisitRef>,
) -> Result<Json<Value>> {
    scope
        .run(move |tx| {
            Box::pin(async move {
                owned_visit(tx, user_id, body.scheduled_customer_id).await?;
                ScheduledCustomerRepository::new(tx)
                    .delete(body.scheduled_customer_id)
                    .await?;
                Ok(())
            })
        })
        .await?;

    Ok(Json(json!({ "success": true })))
}
