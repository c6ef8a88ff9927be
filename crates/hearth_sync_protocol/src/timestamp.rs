//! ISO-8601 timestamps as written into envelopes and the local index.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Returns the current time truncated to millisecond precision.
///
/// Envelopes carry millisecond timestamps; truncating here keeps a freshly
/// stamped local index comparable with the envelope written alongside it.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 timestamp, normalizing it to UTC.
pub fn parse(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_uses_millis_and_z() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format(at), "2024-03-09T07:05:01.000Z");
    }

    #[test]
    fn parse_accepts_offsets() {
        let at = parse("2024-03-09T09:05:01.250+02:00").unwrap();
        assert_eq!(format(at), "2024-03-09T07:05:01.250Z");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse("yesterday"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn now_roundtrips_exactly() {
        let at = now();
        assert_eq!(parse(&format(at)), Some(at));
    }
}
