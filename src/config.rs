use chrono::FixedOffset;
use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,

    /// The single canonical campus offset. Session dates and times are
    /// wall-clock in this offset; picking one fixed offset sidesteps DST
    /// boundary bugs entirely.
    pub campus_offset: FixedOffset,

    /// When set, the absence sweep also creates absent records for
    /// department members who never produced a record for an ended session.
    /// Off by default: no record means "unknown", not "absent".
    pub mark_missing_absent: bool,

    // Rate limiting
    pub rate_scan_per_min: u32,
    pub rate_sweep_per_min: u32,
    pub rate_registry_per_min: u32,

    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let offset_minutes: i32 = env::var("UTC_OFFSET_MINUTES")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .expect("UTC_OFFSET_MINUTES must be an integer");

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),

            campus_offset: FixedOffset::east_opt(offset_minutes * 60)
                .expect("UTC_OFFSET_MINUTES out of range"),

            mark_missing_absent: env::var("MARK_MISSING_ABSENT")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .expect("MARK_MISSING_ABSENT must be true or false"),

            rate_scan_per_min: env::var("RATE_SCAN_PER_MIN")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap(),
            rate_sweep_per_min: env::var("RATE_SWEEP_PER_MIN")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .unwrap(),
            rate_registry_per_min: env::var("RATE_REGISTRY_PER_MIN")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
        }
    }
}
