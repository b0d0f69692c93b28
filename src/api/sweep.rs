use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

use crate::attendance::error::CoreError;
use crate::attendance::sweep::{SweepOutcome, SweepReport, sweep_absences};
use crate::config::Config;

#[derive(Deserialize, ToSchema, Default)]
pub struct SweepRequest {
    /// Evaluation instant. Defaults to wall clock; injectable for testing.
    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub now: Option<DateTime<Utc>>,
}

/// Absence sweep endpoint, intended for an external scheduler.
///
/// Exposable without side-channel auth risk: it only ever flips pending
/// records to absent, it cannot fabricate presence, and repeat calls are
/// no-ops.
#[utoipa::path(
    post,
    path = "/api/v1/attendance/sweep",
    request_body(content = SweepRequest, description = "Optional; an empty body sweeps at wall clock"),
    responses(
        (status = 200, description = "Sweep completed", body = SweepReport),
        (status = 409, description = "A sweep is already in flight", body = Object, example = json!({
            "message": "Sweep already in progress"
        })),
        (status = 503, description = "Data store unavailable, retry on next schedule", body = Object, example = json!({
            "message": "Attendance store unavailable, try again"
        }))
    ),
    tag = "Attendance"
)]
pub async fn run_sweep(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: Option<web::Json<SweepRequest>>,
) -> actix_web::Result<impl Responder> {
    let now = payload
        .and_then(|p| p.into_inner().now)
        .unwrap_or_else(Utc::now);

    match sweep_absences(
        pool.get_ref(),
        now,
        config.campus_offset,
        config.mark_missing_absent,
    )
    .await
    {
        Ok(SweepOutcome::Completed(report)) => Ok(HttpResponse::Ok().json(report)),
        Ok(SweepOutcome::AlreadyRunning) => Ok(HttpResponse::Conflict().json(json!({
            "message": "Sweep already in progress"
        }))),
        Err(CoreError::Database(e)) => {
            error!(error = %e, "absence sweep hit the store");
            Ok(HttpResponse::ServiceUnavailable().json(json!({
                "message": "Attendance store unavailable, try again"
            })))
        }
        Err(e) => {
            error!(error = %e, "absence sweep failed");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Something went wrong, contact the system admin"
            })))
        }
    }
}
