use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use sqlx::MySqlPool;
use tokio::sync::Mutex;
use tracing::info;
use utoipa::ToSchema;

use crate::attendance::error::CoreError;

/// SQL predicate for "this session's window has fully elapsed". Bound as
/// (today, today, local time-of-day). Strictly `<` on end_time: at the exact
/// end instant a scan is still accepted, so the sweep must not touch it yet.
const ENDED_SESSIONS: &str = "(s.date < ? OR (s.date = ? AND s.end_time < ?))";

/// One sweep run is in flight per process at a time. The operation is
/// idempotent and set-based either way, but single-flight keeps an
/// over-eager scheduler from stacking bulk updates on the store.
static SWEEP_GATE: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct SweptSession {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "COS 212 Lecture 14")]
    pub title: String,
    #[schema(value_type = String, format = "date", example = "2025-11-03")]
    pub date: NaiveDate,
    #[schema(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SweepReport {
    #[schema(example = 3)]
    pub sessions_considered: u64,
    /// Pending rows flipped to absent.
    #[schema(example = 12)]
    pub records_updated: u64,
    /// Absent rows synthesized for record-less members. Always 0 unless
    /// `MARK_MISSING_ABSENT` is on.
    #[schema(example = 0)]
    pub records_created: u64,
    pub sessions: Vec<SweptSession>,
}

#[derive(Debug)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep held the gate; the store was not touched.
    AlreadyRunning,
}

/// Closes out every session whose window has elapsed by flipping its still
/// pending ledger rows to absent, in one set-based statement.
///
/// Safe to call at any cadence: the `status IS NULL` filter makes a repeat
/// run with the same `now` a guaranteed no-op, and a run cut short by a
/// store outage simply completes on the next invocation.
///
/// With `mark_missing` set, members of the session's department who never
/// produced a row at all also get an absent row (see the policy note in the
/// README); by default such members are left unrecorded.
pub async fn sweep_absences(
    pool: &MySqlPool,
    now: DateTime<Utc>,
    tz: FixedOffset,
    mark_missing: bool,
) -> Result<SweepOutcome, CoreError> {
    let Ok(_gate) = SWEEP_GATE.try_lock() else {
        return Ok(SweepOutcome::AlreadyRunning);
    };

    let local = now.with_timezone(&tz);
    let today = local.date_naive();
    let time_of_day = local.time();

    let sessions: Vec<SweptSession> = sqlx::query_as(&format!(
        "SELECT s.id, s.title, s.date, s.end_time FROM sessions s \
         WHERE {ENDED_SESSIONS} ORDER BY s.date, s.end_time"
    ))
    .bind(today)
    .bind(today)
    .bind(time_of_day)
    .fetch_all(pool)
    .await?;

    if sessions.is_empty() {
        return Ok(SweepOutcome::Completed(SweepReport {
            sessions_considered: 0,
            records_updated: 0,
            records_created: 0,
            sessions,
        }));
    }

    // The time_in IS NULL guard keeps "absent implies no check-in time"
    // true even if a row was half-claimed by a racing scan.
    let records_updated = sqlx::query(&format!(
        "UPDATE attendance_records ar \
         JOIN sessions s ON s.id = ar.session_id \
         SET ar.status = 'absent' \
         WHERE ar.status IS NULL AND ar.time_in IS NULL AND {ENDED_SESSIONS}"
    ))
    .bind(today)
    .bind(today)
    .bind(time_of_day)
    .execute(pool)
    .await?
    .rows_affected();

    let records_created = if mark_missing {
        sqlx::query(&format!(
            "INSERT INTO attendance_records (session_id, member_id, time_in, status) \
             SELECT s.id, m.id, NULL, 'absent' \
             FROM sessions s \
             JOIN members m ON m.department_id = s.department_id \
             LEFT JOIN attendance_records ar \
               ON ar.session_id = s.id AND ar.member_id = m.id \
             WHERE ar.id IS NULL AND {ENDED_SESSIONS}"
        ))
        .bind(today)
        .bind(today)
        .bind(time_of_day)
        .execute(pool)
        .await?
        .rows_affected()
    } else {
        0
    };

    info!(
        sessions_considered = sessions.len(),
        records_updated,
        records_created,
        "absence sweep completed"
    );

    Ok(SweepOutcome::Completed(SweepReport {
        sessions_considered: sessions.len() as u64,
        records_updated,
        records_created,
        sessions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use chrono::TimeZone;

    /// Rust-side mirror of `ENDED_SESSIONS`, used to pin down the boundary
    /// the SQL encodes.
    fn window_elapsed(
        session_date: NaiveDate,
        end_time: NaiveTime,
        today: NaiveDate,
        time_of_day: NaiveTime,
    ) -> bool {
        session_date < today || (session_date == today && end_time < time_of_day)
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn prior_day_sessions_are_swept_regardless_of_time() {
        assert!(window_elapsed(d(2025, 11, 2), t(23, 59), d(2025, 11, 3), t(0, 0)));
    }

    #[test]
    fn same_day_sessions_sweep_only_after_end_time() {
        let today = d(2025, 11, 3);
        assert!(window_elapsed(today, t(10, 0), today, t(10, 5)));
        assert!(!window_elapsed(today, t(10, 0), today, t(9, 30)));
    }

    #[test]
    fn sweep_and_scan_never_claim_the_same_instant() {
        // At exactly end_time a scan is still accepted (inclusive bound in
        // the scan policy), so the sweep predicate must be strict here.
        let today = d(2025, 11, 3);
        assert!(!window_elapsed(today, t(10, 0), today, t(10, 0)));
    }

    #[test]
    fn future_sessions_are_never_swept() {
        assert!(!window_elapsed(d(2025, 11, 4), t(8, 0), d(2025, 11, 3), t(23, 0)));
    }

    #[test]
    fn campus_offset_decides_what_today_means() {
        // 23:30 UTC on the 3rd is already the 4th at UTC+2, so a session
        // that ended on the 3rd is sweepable.
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 23, 30, 0).unwrap();
        let local = now.with_timezone(&tz);
        assert_eq!(local.date_naive(), d(2025, 11, 4));
        assert!(window_elapsed(
            d(2025, 11, 3),
            t(23, 45),
            local.date_naive(),
            local.time()
        ));
    }

    // ---------------------------
    // Ledger transition, mirrored in memory
    // ---------------------------

    #[derive(Debug, Clone, PartialEq)]
    struct LedgerRow {
        member_id: u64,
        time_in: Option<DateTime<Utc>>,
        status: Option<AttendanceStatus>,
    }

    /// In-memory mirror of the two sweep statements over one ended
    /// session's ledger: flip rows still pending with no check-in, then
    /// (only under `mark_missing`) synthesize absent rows for roster
    /// members with no row at all. Returns (updated, created) like the
    /// report does.
    fn apply_sweep(rows: &mut Vec<LedgerRow>, roster: &[u64], mark_missing: bool) -> (u64, u64) {
        let mut updated = 0;
        for row in rows.iter_mut() {
            if row.status.is_none() && row.time_in.is_none() {
                row.status = Some(AttendanceStatus::Absent);
                updated += 1;
            }
        }

        let mut created = 0;
        if mark_missing {
            let missing: Vec<u64> = roster
                .iter()
                .copied()
                .filter(|m| !rows.iter().any(|r| r.member_id == *m))
                .collect();
            for member_id in missing {
                rows.push(LedgerRow {
                    member_id,
                    time_in: None,
                    status: Some(AttendanceStatus::Absent),
                });
                created += 1;
            }
        }

        (updated, created)
    }

    fn present_row(member_id: u64) -> LedgerRow {
        LedgerRow {
            member_id,
            time_in: Some(Utc.with_ymd_and_hms(2025, 11, 3, 9, 15, 0).unwrap()),
            status: Some(AttendanceStatus::Present),
        }
    }

    fn pending_row(member_id: u64) -> LedgerRow {
        LedgerRow {
            member_id,
            time_in: None,
            status: None,
        }
    }

    #[test]
    fn pending_rows_flip_and_present_rows_survive() {
        let mut rows = vec![present_row(1), pending_row(2)];
        let (updated, created) = apply_sweep(&mut rows, &[1, 2], false);

        assert_eq!((updated, created), (1, 0));
        assert_eq!(rows[0], present_row(1));
        assert_eq!(rows[1].status, Some(AttendanceStatus::Absent));
        // Absent never gains a check-in time.
        assert_eq!(rows[1].time_in, None);
    }

    #[test]
    fn record_less_members_stay_unknown_by_default() {
        // Member 3 never scanned and has no row; with the flag off the
        // sweep must not invent one.
        let mut rows = vec![present_row(1), pending_row(2)];
        let (updated, created) = apply_sweep(&mut rows, &[1, 2, 3], false);

        assert_eq!((updated, created), (1, 0));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn mark_missing_synthesizes_absent_rows() {
        let mut rows = vec![present_row(1), pending_row(2)];
        let (updated, created) = apply_sweep(&mut rows, &[1, 2, 3], true);

        assert_eq!((updated, created), (1, 1));
        assert_eq!(rows.len(), 3);
        let synthesized = rows.iter().find(|r| r.member_id == 3).unwrap();
        assert_eq!(synthesized.status, Some(AttendanceStatus::Absent));
        assert_eq!(synthesized.time_in, None);
    }

    #[test]
    fn sweeping_twice_changes_nothing() {
        for mark_missing in [false, true] {
            let mut rows = vec![present_row(1), pending_row(2)];
            apply_sweep(&mut rows, &[1, 2, 3], mark_missing);
            let settled = rows.clone();

            let (updated, created) = apply_sweep(&mut rows, &[1, 2, 3], mark_missing);
            assert_eq!((updated, created), (0, 0));
            assert_eq!(rows, settled);
        }
    }
}
