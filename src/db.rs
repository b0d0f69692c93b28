use sqlx::MySqlPool;

pub async fn init_db(database_url: &str) -> MySqlPool {
    MySqlPool::connect(database_url)
        .await
        .expect("Failed to connect to database")
}

/// Idempotent schema bootstrap, applied at startup. Mirrors `schema.sql`.
///
/// The unique keys here are load-bearing: `uq_attendance_session_member` is
/// what makes concurrent scans single-record, and `uq_sessions_token` is
/// what makes a token an identity. The FK on attendance_records restricts
/// session deletion while ledger rows reference it.
pub async fn init_schema(pool: &MySqlPool) {
    const SCHEMA: [&str; 4] = [
        "CREATE TABLE IF NOT EXISTS departments (
            id BIGINT UNSIGNED PRIMARY KEY AUTO_INCREMENT,
            name VARCHAR(128) NOT NULL,
            UNIQUE KEY uq_departments_name (name)
        )",
        "CREATE TABLE IF NOT EXISTS members (
            id BIGINT UNSIGNED PRIMARY KEY AUTO_INCREMENT,
            name VARCHAR(128) NOT NULL,
            department_id BIGINT UNSIGNED NOT NULL,
            role VARCHAR(16) NOT NULL DEFAULT 'member',
            CONSTRAINT fk_members_department
                FOREIGN KEY (department_id) REFERENCES departments(id)
        )",
        "CREATE TABLE IF NOT EXISTS sessions (
            id BIGINT UNSIGNED PRIMARY KEY AUTO_INCREMENT,
            title VARCHAR(255) NOT NULL,
            date DATE NOT NULL,
            start_time TIME NOT NULL,
            end_time TIME NOT NULL,
            description TEXT NULL,
            department_id BIGINT UNSIGNED NOT NULL,
            token VARCHAR(64) NOT NULL,
            qr_ref VARCHAR(255) NULL,
            UNIQUE KEY uq_sessions_token (token),
            CONSTRAINT fk_sessions_department
                FOREIGN KEY (department_id) REFERENCES departments(id)
        )",
        "CREATE TABLE IF NOT EXISTS attendance_records (
            id BIGINT UNSIGNED PRIMARY KEY AUTO_INCREMENT,
            session_id BIGINT UNSIGNED NOT NULL,
            member_id BIGINT UNSIGNED NOT NULL,
            time_in TIMESTAMP NULL DEFAULT NULL,
            status VARCHAR(16) NULL DEFAULT NULL,
            UNIQUE KEY uq_attendance_session_member (session_id, member_id),
            CONSTRAINT fk_attendance_session
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE RESTRICT,
            CONSTRAINT fk_attendance_member
                FOREIGN KEY (member_id) REFERENCES members(id)
        )",
    ];

    for stmt in SCHEMA {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .expect("Failed to bootstrap schema");
    }
}
