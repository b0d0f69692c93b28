use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::model::session::Session;

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateSession {
    #[schema(example = "COS 212 Lecture 14")]
    pub title: String,
    #[schema(example = "2025-11-03", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "10:00:00", value_type = String)]
    pub end_time: NaiveTime,
    pub description: Option<String>,
    #[schema(example = 1)]
    pub department_id: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SessionQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    #[schema(format = "date", value_type = Option<String>)]
    pub date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionListResponse {
    pub data: Vec<Session>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 3)]
    pub total: i64,
}

/// Session row plus ledger tallies, for dashboard/report consumers.
#[derive(Serialize, ToSchema)]
pub struct SessionDetail {
    pub session: Session,
    #[schema(example = 31)]
    pub present: i64,
    #[schema(example = 4)]
    pub absent: i64,
    #[schema(example = 0)]
    pub pending: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct AttachQrRef {
    /// Reference to the externally rendered QR image.
    #[schema(example = "qr/sessions/7.png")]
    pub qr_ref: String,
}

fn mint_token() -> String {
    Uuid::new_v4().to_simple().to_string()
}

/// Widened before multiplying so an absurd-but-valid `page` value cannot
/// overflow. `page` is already clamped to >= 1.
fn page_offset(page: u32, per_page: u32) -> u64 {
    (u64::from(page) - 1) * u64::from(per_page)
}

/// Create Session
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    request_body = CreateSession,
    responses(
        (status = 201, description = "Session created with a freshly minted token", body = Session),
        (status = 400, description = "Window is inverted or department unknown", body = Object, example = json!({
            "message": "start_time must not be after end_time"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Sessions"
)]
pub async fn create_session(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSession>,
) -> actix_web::Result<impl Responder> {
    if payload.start_time > payload.end_time {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "start_time must not be after end_time"
        })));
    }

    let dept_exists: Option<(u64,)> = sqlx::query_as("SELECT id FROM departments WHERE id = ?")
        .bind(payload.department_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "department lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;
    if dept_exists.is_none() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Unknown department"
        })));
    }

    // Token is minted here, once, and never changes afterwards.
    let token = mint_token();

    let result = sqlx::query(
        "INSERT INTO sessions (title, date, start_time, end_time, description, department_id, token) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&payload.title)
    .bind(payload.date)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(&payload.description)
    .bind(payload.department_id)
    .bind(&token)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            let id = res.last_insert_id();
            debug!(session_id = id, "session created");
            let session = Session {
                id,
                title: payload.title.clone(),
                date: payload.date,
                start_time: payload.start_time,
                end_time: payload.end_time,
                description: payload.description.clone(),
                department_id: payload.department_id,
                token,
                qr_ref: None,
            };
            Ok(HttpResponse::Created().json(session))
        }
        Err(e) => {
            error!(error = %e, "failed to create session");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Something went wrong, contact the system admin"
            })))
        }
    }
}

/// List Sessions
#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Items per page"),
        ("department_id", Query, description = "Filter by department"),
        ("date", Query, description = "Filter by calendar date")
    ),
    responses(
        (status = 200, description = "Paginated session list", body = SessionListResponse)
    ),
    tag = "Sessions"
)]
pub async fn list_sessions(
    pool: web::Data<MySqlPool>,
    query: web::Query<SessionQuery>,
) -> actix_web::Result<impl Responder> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = page_offset(page, per_page);

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    if query.department_id.is_some() {
        conditions.push("department_id = ?");
    }
    if query.date.is_some() {
        conditions.push("date = ?");
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM sessions{where_clause}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(department_id) = query.department_id {
        count_query = count_query.bind(department_id);
    }
    if let Some(date) = query.date {
        count_query = count_query.bind(date);
    }
    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "failed to count sessions");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let list_sql = format!(
        "SELECT id, title, date, start_time, end_time, description, department_id, token, qr_ref \
         FROM sessions{where_clause} ORDER BY date DESC, start_time DESC LIMIT ? OFFSET ?"
    );
    let mut list_query = sqlx::query_as::<_, Session>(&list_sql);
    if let Some(department_id) = query.department_id {
        list_query = list_query.bind(department_id);
    }
    if let Some(date) = query.date {
        list_query = list_query.bind(date);
    }
    let data = list_query
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "failed to list sessions");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(SessionListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Get Session with ledger tallies
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    params(("id" = u64, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session with present/absent/pending counts", body = SessionDetail),
        (status = 404, description = "No such session")
    ),
    tag = "Sessions"
)]
pub async fn get_session(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    let session: Option<Session> = sqlx::query_as(
        "SELECT id, title, date, start_time, end_time, description, department_id, token, qr_ref \
         FROM sessions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, session_id = id, "failed to fetch session");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(session) = session else {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Session not found"
        })));
    };

    let (total, present, absent): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), \
                COUNT(CASE WHEN status = 'present' THEN 1 END), \
                COUNT(CASE WHEN status = 'absent' THEN 1 END) \
         FROM attendance_records WHERE session_id = ?",
    )
    .bind(id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, session_id = id, "failed to tally attendance");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(SessionDetail {
        session,
        present,
        absent,
        pending: total - present - absent,
    }))
}

/// Attach rendered QR reference
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{id}/qr-ref",
    params(("id" = u64, Path, description = "Session id")),
    request_body = AttachQrRef,
    responses(
        (status = 200, description = "Reference attached", body = Object, example = json!({
            "message": "QR reference attached"
        })),
        (status = 404, description = "No such session")
    ),
    tag = "Sessions"
)]
pub async fn attach_qr_ref(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AttachQrRef>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    // qr_ref is the only mutable session column; title/window/token never
    // change after creation.
    let result = sqlx::query("UPDATE sessions SET qr_ref = ? WHERE id = ?")
        .bind(&payload.qr_ref)
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, session_id = id, "failed to attach qr_ref");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Session not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "QR reference attached"
    })))
}
