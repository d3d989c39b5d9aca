//! Line-oriented logging with a local `YYYY-MM-DD HH:MM:SS` prefix.

use chrono::{DateTime, Local, TimeZone};
use std::io::Write;

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ANNOTATION_FORMAT: &str = "%H:%M:%S";

/// Install the global logger. Defaults to `info`; `RUST_LOG` overrides.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {}",
                format_log_timestamp(&Local::now()),
                record.args()
            )
        })
        .init();
}

pub fn format_log_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(LOG_TIMESTAMP_FORMAT).to_string()
}

/// Overlay text for the current local time.
pub fn annotation_timestamp() -> String {
    Local::now().format(ANNOTATION_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn log_timestamp_is_second_precision() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_log_timestamp(&at), "2024-03-09 07:05:01");
    }

    #[test]
    fn annotation_is_time_of_day() {
        let text = annotation_timestamp();
        assert_eq!(text.len(), 8);
        assert_eq!(text.matches(':').count(), 2);
    }
}
