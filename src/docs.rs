use crate::api::scan::ScanRequest;
use crate::api::session::{
    AttachQrRef, CreateSession, SessionDetail, SessionListResponse, SessionQuery,
};
use crate::api::sweep::SweepRequest;
use crate::attendance::scan::{ScanOutcome, SessionSummary};
use crate::attendance::sweep::{SweepReport, SweptSession};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::department::Department;
use crate::model::member::{Member, MemberRole};
use crate::model::session::Session;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "University Attendance Tracker API",
        version = "1.0.0",
        description = r#"
## University Attendance Tracker

Members scan a per-session QR token to be marked present; a scheduled sweep
marks still-pending records absent once a session's window closes.

### Key operations
- **Scan** — evaluate a `(token, member, now)` scan attempt and record
  presence at most once
- **Sweep** — idempotent batch close-out for ended sessions
- **Sessions** — session registry reads, creation, and QR reference attach

### Outcome model
Scan rejections (`invalid_token`, `session_not_found`, `wrong_group`,
`not_started_yet`, `ended`, `already_present`) are structured 200 responses,
not HTTP errors; only infrastructure failures map to 5xx.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::scan::scan,
        crate::api::sweep::run_sweep,
        crate::api::session::create_session,
        crate::api::session::list_sessions,
        crate::api::session::get_session,
        crate::api::session::attach_qr_ref,
    ),
    components(
        schemas(
            ScanRequest,
            ScanOutcome,
            SessionSummary,
            SweepRequest,
            SweepReport,
            SweptSession,
            CreateSession,
            SessionQuery,
            SessionListResponse,
            SessionDetail,
            AttachQrRef,
            Session,
            Member,
            MemberRole,
            Department,
            AttendanceRecord,
            AttendanceStatus,
        )
    ),
    tags(
        (name = "Attendance", description = "Scan evaluation and absence sweep"),
        (name = "Sessions", description = "Session registry")
    )
)]
pub struct ApiDoc;
