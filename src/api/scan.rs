use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

use crate::attendance::error::CoreError;
use crate::attendance::scan::{ScanOutcome, evaluate_scan};
use crate::config::Config;

#[derive(Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Resolved by the upstream authenticator; never taken from the QR code.
    #[schema(example = 42)]
    pub member_id: u64,
    /// Evaluation instant. Defaults to wall clock; injectable for testing.
    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub now: Option<DateTime<Utc>>,
}

/// Scan endpoint
#[utoipa::path(
    post,
    path = "/api/v1/scan/{token}",
    params(
        ("token" = String, Path, description = "Session token carried by the QR code")
    ),
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan evaluated; body carries the outcome", body = ScanOutcome),
        (status = 404, description = "Authenticated member unknown to the registry", body = Object, example = json!({
            "message": "Member not found"
        })),
        (status = 503, description = "Data store unavailable, retry later", body = Object, example = json!({
            "message": "Attendance store unavailable, try again"
        }))
    ),
    tag = "Attendance"
)]
pub async fn scan(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<String>,
    payload: web::Json<ScanRequest>,
) -> actix_web::Result<impl Responder> {
    let token = path.into_inner();
    let now = payload.now.unwrap_or_else(Utc::now);

    match evaluate_scan(
        pool.get_ref(),
        &token,
        payload.member_id,
        now,
        config.campus_offset,
    )
    .await
    {
        // Every policy outcome is a 200 with a tagged body; rejections are
        // answers, not HTTP failures.
        Ok(outcome) => Ok(HttpResponse::Ok().json(outcome)),
        Err(CoreError::MemberNotFound(member_id)) => {
            error!(member_id, "scan arrived for a member the registry does not know");
            Ok(HttpResponse::NotFound().json(json!({
                "message": "Member not found"
            })))
        }
        Err(CoreError::Database(e)) => {
            error!(error = %e, member_id = payload.member_id, "scan evaluation hit the store");
            Ok(HttpResponse::ServiceUnavailable().json(json!({
                "message": "Attendance store unavailable, try again"
            })))
        }
    }
}
