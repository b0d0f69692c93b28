use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Governs access to admin surfaces only; the ledger treats admins and
/// members identically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberRole {
    Member,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 42,
        "name": "Jane Mokoena",
        "department_id": 1,
        "role": "member"
    })
)]
pub struct Member {
    #[schema(example = 42)]
    pub id: u64,
    #[schema(example = "Jane Mokoena")]
    pub name: String,
    #[schema(example = 1)]
    pub department_id: u64,
    #[schema(example = "member")]
    pub role: MemberRole,
}
