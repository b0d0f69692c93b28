use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Resolved state of a ledger row. A row with `status = NULL` is *pending*:
/// neither a scan nor the absence sweep has decided it yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

/// One ledger row tying a member to a session. `(session_id, member_id)` is
/// unique at the database level; the scan path relies on that index, not on
/// application-side checks, to stay single-record under concurrency.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 7)]
    pub session_id: u64,
    #[schema(example = 42)]
    pub member_id: u64,
    /// Set exactly once, by the accepted scan. `present` implies non-null,
    /// `absent` implies null.
    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub time_in: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, example = "present", nullable = true)]
    pub status: Option<AttendanceStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_its_db_string() {
        assert_eq!(AttendanceStatus::Present.to_string(), "present");
        assert_eq!(AttendanceStatus::Absent.to_string(), "absent");
        assert_eq!(
            AttendanceStatus::from_str("present").unwrap(),
            AttendanceStatus::Present
        );
        assert_eq!(
            AttendanceStatus::from_str("absent").unwrap(),
            AttendanceStatus::Absent
        );
        assert!(AttendanceStatus::from_str("pending").is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AttendanceStatus::Present).unwrap(),
            "\"present\""
        );
    }
}
