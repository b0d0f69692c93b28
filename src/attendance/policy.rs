use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::model::{attendance::AttendanceRecord, member::Member, session::Session};

/// Tokens shorter than this are rejected before any lookup happens, so
/// malformed scans never cost a registry query. Minted tokens are 32 chars.
pub const MIN_TOKEN_LEN: usize = 16;

pub fn token_shape_ok(token: &str) -> bool {
    token.len() >= MIN_TOKEN_LEN && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Composes a campus wall-clock date + time into a UTC instant.
///
/// All session times are wall-clock in one configured fixed offset; there is
/// deliberately no named-zone/DST arithmetic anywhere in the core.
pub fn compose_instant(date: NaiveDate, time: NaiveTime, tz: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(time);
    Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(tz.local_minus_utc()))))
}

/// The session's attendance window as UTC instants, both ends inclusive.
pub fn session_window(session: &Session, tz: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        compose_instant(session.date, session.start_time, tz),
        compose_instant(session.date, session.end_time, tz),
    )
}

/// What the evaluator should do with a scan, given everything it has read.
/// `Record` means "proceed to the ledger write"; every other variant is a
/// terminal rejection that must leave the ledger untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    WrongGroup,
    NotStartedYet { opens_at: DateTime<Utc> },
    Ended { closed_at: DateTime<Utc> },
    AlreadyPresent { time_in: DateTime<Utc> },
    Record,
}

/// The scan decision ladder, evaluated in this exact order:
/// group mismatch, not yet open, ended, already recorded, record.
///
/// The group check comes first so a member outside the session's audience
/// never learns its timing. Both window boundaries are inclusive: a scan at
/// exactly `start_time` or exactly `end_time` is accepted.
pub fn decide(
    session: &Session,
    member: &Member,
    existing: Option<&AttendanceRecord>,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Decision {
    if member.department_id != session.department_id {
        return Decision::WrongGroup;
    }

    let (opens_at, closes_at) = session_window(session, tz);
    if now < opens_at {
        return Decision::NotStartedYet { opens_at };
    }
    if now > closes_at {
        return Decision::Ended { closed_at: closes_at };
    }

    if let Some(time_in) = existing.and_then(|r| r.time_in) {
        return Decision::AlreadyPresent { time_in };
    }

    Decision::Record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use crate::model::member::MemberRole;

    fn dept_session(department_id: u64) -> Session {
        Session {
            id: 7,
            title: "COS 212 Lecture 14".into(),
            date: NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            description: None,
            department_id,
            token: "9f2c1f6a0b0e4d6c8a5d3b7e1f4a9c02".into(),
            qr_ref: None,
        }
    }

    fn member(id: u64, department_id: u64) -> Member {
        Member {
            id,
            name: "Jane Mokoena".into(),
            department_id,
            role: MemberRole::Member,
        }
    }

    fn pending_record(session_id: u64, member_id: u64) -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            session_id,
            member_id,
            time_in: None,
            status: None,
        }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn utc0() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn wrong_group_precedes_time_checks() {
        let session = dept_session(1);
        let outsider = member(9, 2);

        // Window wide open, member still rejected on group alone.
        let during = utc(2025, 11, 3, 9, 30);
        assert_eq!(
            decide(&session, &outsider, None, during, utc0()),
            Decision::WrongGroup
        );

        // Even before the window opens the outsider sees no timing info.
        let before = utc(2025, 11, 3, 8, 0);
        assert_eq!(
            decide(&session, &outsider, None, before, utc0()),
            Decision::WrongGroup
        );
    }

    #[test]
    fn scan_before_start_is_not_started_yet() {
        let session = dept_session(1);
        let m = member(9, 1);
        let at_0859 = utc(2025, 11, 3, 8, 59);
        assert_eq!(
            decide(&session, &m, None, at_0859, utc0()),
            Decision::NotStartedYet {
                opens_at: utc(2025, 11, 3, 9, 0)
            }
        );
    }

    #[test]
    fn scan_after_end_is_ended() {
        let session = dept_session(1);
        let m = member(9, 1);
        let at_1005 = utc(2025, 11, 3, 10, 5);
        assert_eq!(
            decide(&session, &m, None, at_1005, utc0()),
            Decision::Ended {
                closed_at: utc(2025, 11, 3, 10, 0)
            }
        );
    }

    #[test]
    fn window_boundaries_are_inclusive() {
        let session = dept_session(1);
        let m = member(9, 1);

        let at_start = utc(2025, 11, 3, 9, 0);
        assert_eq!(decide(&session, &m, None, at_start, utc0()), Decision::Record);

        let at_end = utc(2025, 11, 3, 10, 0);
        assert_eq!(decide(&session, &m, None, at_end, utc0()), Decision::Record);
    }

    #[test]
    fn recorded_time_in_wins_over_a_second_scan() {
        let session = dept_session(1);
        let m = member(9, 1);
        let first = utc(2025, 11, 3, 9, 15);
        let mut rec = pending_record(session.id, m.id);
        rec.time_in = Some(first);
        rec.status = Some(AttendanceStatus::Present);

        let second = utc(2025, 11, 3, 9, 20);
        assert_eq!(
            decide(&session, &m, Some(&rec), second, utc0()),
            Decision::AlreadyPresent { time_in: first }
        );
    }

    #[test]
    fn pending_record_does_not_block_the_scan() {
        // Roster imports may pre-create rows with no time_in; those must
        // still be claimable by a scan.
        let session = dept_session(1);
        let m = member(9, 1);
        let rec = pending_record(session.id, m.id);
        let during = utc(2025, 11, 3, 9, 15);
        assert_eq!(
            decide(&session, &m, Some(&rec), during, utc0()),
            Decision::Record
        );
    }

    #[test]
    fn campus_offset_shifts_the_window() {
        // 09:00 wall-clock at UTC+2 is 07:00 UTC.
        let session = dept_session(1);
        let m = member(9, 1);
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();

        let utc_0830 = utc(2025, 11, 3, 8, 30);
        assert_eq!(decide(&session, &m, None, utc_0830, tz), Decision::Record);

        let utc_0930 = utc(2025, 11, 3, 9, 30);
        assert_eq!(
            decide(&session, &m, None, utc_0930, tz),
            Decision::Ended {
                closed_at: utc(2025, 11, 3, 8, 0)
            }
        );
    }

    #[test]
    fn one_lecture_from_first_scan_to_close() {
        let session = dept_session(1);
        let m = member(9, 1);

        // 08:59: too early.
        assert!(matches!(
            decide(&session, &m, None, utc(2025, 11, 3, 8, 59), utc0()),
            Decision::NotStartedYet { .. }
        ));

        // 09:15: accepted; the evaluator writes time_in = 09:15.
        let first_scan = utc(2025, 11, 3, 9, 15);
        assert_eq!(
            decide(&session, &m, None, first_scan, utc0()),
            Decision::Record
        );
        let rec = AttendanceRecord {
            id: 1,
            session_id: session.id,
            member_id: m.id,
            time_in: Some(first_scan),
            status: Some(AttendanceStatus::Present),
        };

        // 09:20: duplicate scan answers with the 09:15 check-in, unchanged.
        assert_eq!(
            decide(&session, &m, Some(&rec), utc(2025, 11, 3, 9, 20), utc0()),
            Decision::AlreadyPresent { time_in: first_scan }
        );

        // 10:05: window closed, even for a member who never scanned.
        let late = member(10, 1);
        assert!(matches!(
            decide(&session, &late, None, utc(2025, 11, 3, 10, 5), utc0()),
            Decision::Ended { .. }
        ));
    }

    #[test]
    fn token_shape_rejects_short_or_odd_tokens() {
        assert!(!token_shape_ok(""));
        assert!(!token_shape_ok("abc123"));
        assert!(!token_shape_ok("../../etc/passwd!!"));
        assert!(token_shape_ok("9f2c1f6a0b0e4d6c8a5d3b7e1f4a9c02"));
        assert!(token_shape_ok("9f2c1f6a-0b0e-4d6c-8a5d-3b7e1f4a9c02"));
    }
}
