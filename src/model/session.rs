use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A time-boxed attendance session. The token is the only thing printed into
/// the QR code; it is unguessable, unique, and immutable once issued.
/// `qr_ref` (a pointer to the externally rendered QR image) is the single
/// column that may change after creation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "title": "COS 212 Lecture 14",
        "date": "2025-11-03",
        "start_time": "09:00:00",
        "end_time": "10:00:00",
        "description": null,
        "department_id": 1,
        "token": "9f2c1f6a0b0e4d6c8a5d3b7e1f4a9c02",
        "qr_ref": null
    })
)]
pub struct Session {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "COS 212 Lecture 14")]
    pub title: String,
    #[schema(value_type = String, format = "date", example = "2025-11-03")]
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,
    #[schema(nullable = true)]
    pub description: Option<String>,
    #[schema(example = 1)]
    pub department_id: u64,
    #[schema(example = "9f2c1f6a0b0e4d6c8a5d3b7e1f4a9c02")]
    pub token: String,
    #[schema(nullable = true)]
    pub qr_ref: Option<String>,
}
