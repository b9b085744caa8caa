//! Conversions between UTC and the server's configured local timezone.

use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// Get the current UTC offset of `canonical_timezone`, e.g. "Pacific/Auckland".
///
/// Returns `None` if the timezone name is not recognised.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// The current wall clock time at `local_offset`.
///
/// Timestamps are stored in local time so that summaries group settlements by
/// the calendar the user sees.
pub fn local_now(local_offset: UtcOffset) -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc().to_offset(local_offset);

    PrimitiveDateTime::new(now.date(), now.time())
}

#[cfg(test)]
mod timezone_tests {
    use time::{Duration, OffsetDateTime, UtcOffset};

    use super::{get_local_offset, local_now};

    #[test]
    fn resolves_canonical_timezone() {
        assert_eq!(get_local_offset("Etc/UTC"), Some(UtcOffset::UTC));
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert_eq!(get_local_offset("Not/AZone"), None);
    }

    #[test]
    fn local_now_applies_offset() {
        let offset = UtcOffset::from_hms(13, 0, 0).unwrap();
        let want = OffsetDateTime::now_utc().to_offset(offset);

        let got = local_now(offset);

        let difference = got.assume_offset(offset) - want;
        assert!(difference.abs() < Duration::seconds(1), "got {got}, want {want}");
    }
}
