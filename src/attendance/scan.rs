use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::MySqlPool;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::attendance::error::CoreError;
use crate::attendance::policy::{self, Decision};
use crate::model::{
    attendance::AttendanceRecord, department::Department, member::Member, session::Session,
};

/// What a scanner is shown about the session they scanned into. Deliberately
/// excludes the token and department internals.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSummary {
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
}

impl From<&Session> for SessionSummary {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id,
            title: s.title.clone(),
            date: s.date,
            start_time: s.start_time,
            end_time: s.end_time,
        }
    }
}

/// Every way a scan can resolve. These are results, not errors: each one is
/// an expected answer for some caller, and the set is exhaustive.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Token failed the shape check; no lookup was performed.
    InvalidToken,
    /// No session carries this token.
    SessionNotFound,
    /// Member belongs to a different department than the session.
    WrongGroup {
        #[schema(example = "Computer Science")]
        session_department: String,
        #[schema(example = "Electrical Engineering")]
        member_department: String,
    },
    /// Scanned before the window opened.
    NotStartedYet {
        session: SessionSummary,
        #[schema(value_type = String, format = "date-time")]
        opens_at: DateTime<Utc>,
    },
    /// Scanned after the window closed.
    Ended {
        session: SessionSummary,
        #[schema(value_type = String, format = "date-time")]
        closed_at: DateTime<Utc>,
    },
    /// A previous scan already recorded this member; `time_in` is the
    /// original check-in instant, unchanged.
    AlreadyPresent {
        session: SessionSummary,
        #[schema(value_type = String, format = "date-time")]
        time_in: DateTime<Utc>,
    },
    /// The ledger write went through; `time_in` is what was durably stored.
    Accepted {
        session: SessionSummary,
        #[schema(value_type = String, format = "date-time")]
        time_in: DateTime<Utc>,
    },
}

/// The single decision point for a scan attempt: at most one ledger write,
/// on the `Accepted` path only.
///
/// `now` is caller-supplied so the whole ladder is clock-injectable; the
/// HTTP layer passes wall clock. Every invocation re-reads current store
/// state; ledger rows are never cached across requests.
pub async fn evaluate_scan(
    pool: &MySqlPool,
    token: &str,
    member_id: u64,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<ScanOutcome, CoreError> {
    if !policy::token_shape_ok(token) {
        return Ok(ScanOutcome::InvalidToken);
    }

    let Some(session) = fetch_session_by_token(pool, token).await? else {
        return Ok(ScanOutcome::SessionNotFound);
    };

    let member = fetch_member(pool, member_id)
        .await?
        .ok_or(CoreError::MemberNotFound(member_id))?;

    let existing = fetch_record(pool, session.id, member.id).await?;

    match policy::decide(&session, &member, existing.as_ref(), now, tz) {
        Decision::WrongGroup => {
            let session_department = fetch_department_name(pool, session.department_id).await?;
            let member_department = fetch_department_name(pool, member.department_id).await?;
            Ok(ScanOutcome::WrongGroup {
                session_department,
                member_department,
            })
        }
        Decision::NotStartedYet { opens_at } => Ok(ScanOutcome::NotStartedYet {
            session: SessionSummary::from(&session),
            opens_at,
        }),
        Decision::Ended { closed_at } => Ok(ScanOutcome::Ended {
            session: SessionSummary::from(&session),
            closed_at,
        }),
        Decision::AlreadyPresent { time_in } => Ok(ScanOutcome::AlreadyPresent {
            session: SessionSummary::from(&session),
            time_in,
        }),
        Decision::Record => record_presence(pool, &session, &member, existing.is_some(), now).await,
    }
}

/// The accepted-scan write. Atomicity leans on the store, not on in-process
/// locks: the unique `(session_id, member_id)` index makes one of any set of
/// concurrent writers win, and every loser is re-read and reported as
/// `AlreadyPresent` with the winner's `time_in`.
async fn record_presence(
    pool: &MySqlPool,
    session: &Session,
    member: &Member,
    row_exists: bool,
    now: DateTime<Utc>,
) -> Result<ScanOutcome, CoreError> {
    let summary = SessionSummary::from(session);

    if row_exists {
        // Claim the pending row. The `time_in IS NULL` guard makes this a
        // no-op if a concurrent scan got there first.
        let res = sqlx::query(
            "UPDATE attendance_records \
             SET time_in = ?, status = 'present' \
             WHERE session_id = ? AND member_id = ? AND time_in IS NULL",
        )
        .bind(now)
        .bind(session.id)
        .bind(member.id)
        .execute(pool)
        .await?;

        if res.rows_affected() == 0 {
            return lost_race_outcome(pool, session, member, now).await;
        }
    } else {
        let res = sqlx::query(
            "INSERT INTO attendance_records (session_id, member_id, time_in, status) \
             VALUES (?, ?, ?, 'present')",
        )
        .bind(session.id)
        .bind(member.id)
        .bind(now)
        .execute(pool)
        .await;

        match res {
            Ok(_) => {}
            // Duplicate key: a concurrent scan won the insert. Recover
            // locally instead of surfacing a store error.
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some("23000") =>
            {
                warn!(
                    session_id = session.id,
                    member_id = member.id,
                    "concurrent scan lost insert race"
                );
                return lost_race_outcome(pool, session, member, now).await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!(
        session_id = session.id,
        member_id = member.id,
        time_in = %now,
        "attendance recorded"
    );

    Ok(ScanOutcome::Accepted {
        session: summary,
        time_in: now,
    })
}

/// Re-read after losing the write race and report the winner's check-in.
async fn lost_race_outcome(
    pool: &MySqlPool,
    session: &Session,
    member: &Member,
    now: DateTime<Utc>,
) -> Result<ScanOutcome, CoreError> {
    let rec = fetch_record(pool, session.id, member.id).await?;
    Ok(ScanOutcome::AlreadyPresent {
        session: SessionSummary::from(session),
        time_in: rec.and_then(|r| r.time_in).unwrap_or(now),
    })
}

async fn fetch_session_by_token(
    pool: &MySqlPool,
    token: &str,
) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        "SELECT id, title, date, start_time, end_time, description, department_id, token, qr_ref \
         FROM sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}

async fn fetch_member(pool: &MySqlPool, member_id: u64) -> Result<Option<Member>, sqlx::Error> {
    sqlx::query_as::<_, Member>("SELECT id, name, department_id, role FROM members WHERE id = ?")
        .bind(member_id)
        .fetch_optional(pool)
        .await
}

async fn fetch_record(
    pool: &MySqlPool,
    session_id: u64,
    member_id: u64,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        "SELECT id, session_id, member_id, time_in, status \
         FROM attendance_records WHERE session_id = ? AND member_id = ?",
    )
    .bind(session_id)
    .bind(member_id)
    .fetch_optional(pool)
    .await
}

async fn fetch_department_name(
    pool: &MySqlPool,
    department_id: u64,
) -> Result<String, sqlx::Error> {
    let dept: Option<Department> =
        sqlx::query_as::<_, Department>("SELECT id, name FROM departments WHERE id = ?")
            .bind(department_id)
            .fetch_optional(pool)
            .await?;
    // FKs make this lookup total in practice; the fallback label keeps a
    // torn row from failing the whole scan.
    Ok(dept
        .map(|d| d.name)
        .unwrap_or_else(|| format!("department {department_id}")))
}
