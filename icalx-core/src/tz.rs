//! Resolves an `Anchor`'s `(DateTime, Option<tzid>)` pair into an absolute instant, via a
//! caller-supplied lookup (§6: "the core does not ship a tz database").

use chrono::TimeZone as _;
use chrono_tz::Tz;

use icalx_ical::properties::Anchor;
use icalx_ical::values::date_time::DateTime as IcalDateTime;

use crate::error::ValidationError;

/// `tz_lookup(name) -> TimeZone` from §6, supplied by the caller. The core never looks up a
/// zone on its own.
pub trait TimeZoneLookup {
    fn lookup(&self, tzid: &str) -> Option<Tz>;
}

impl<F> TimeZoneLookup for F
where
    F: Fn(&str) -> Option<Tz>,
{
    fn lookup(&self, tzid: &str) -> Option<Tz> {
        self(tzid)
    }
}

/// A lookup that resolves any IANA name chrono-tz knows about by string parsing, useful when
/// the caller has no richer TZID catalog (e.g. aliases, `VTIMEZONE` overrides) of their own.
pub struct ChronoTzDatabase;

impl TimeZoneLookup for ChronoTzDatabase {
    fn lookup(&self, tzid: &str) -> Option<Tz> {
        tzid.parse().ok()
    }
}

/// Resolves an anchor to a UTC unix timestamp. A `LocalDate` resolves to midnight UTC (used only
/// for sort-key purposes, never re-interpreted as a real instant). A floating `Local` value (no
/// `TZID`) resolves as if it were UTC, per the open question in §9 about floating-time fidelity.
pub fn anchor_instant(anchor: &Anchor, uid: &str, tz_lookup: &dyn TimeZoneLookup) -> Result<i64, ValidationError> {
    match &anchor.value {
        IcalDateTime::LocalDate(date) => {
            let naive = date.and_hms_opt(0, 0, 0).expect("midnight is always a valid time");
            Ok(Tz::UTC.from_utc_datetime(&naive).timestamp())
        }
        IcalDateTime::Utc(naive) => Ok(Tz::UTC.from_utc_datetime(naive).timestamp()),
        IcalDateTime::Local(naive) => match &anchor.tzid {
            Some(tzid) => {
                let tz = tz_lookup
                    .lookup(tzid)
                    .ok_or_else(|| ValidationError::UnknownTimeZone { uid: uid.to_string(), tzid: tzid.clone() })?;

                let resolved = tz
                    .from_local_datetime(naive)
                    .earliest()
                    .unwrap_or_else(|| tz.from_utc_datetime(naive));

                Ok(resolved.timestamp())
            }
            None => Ok(Tz::UTC.from_utc_datetime(naive).timestamp()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn lookup() -> impl TimeZoneLookup {
        |name: &str| name.parse::<Tz>().ok()
    }

    #[test]
    fn local_date_resolves_to_midnight_utc() {
        let anchor = Anchor { value: IcalDateTime::LocalDate(NaiveDate::from_ymd_opt(2022, 8, 29).unwrap()), tzid: None };

        assert_eq!(anchor_instant(&anchor, "uid", &lookup()).unwrap(), 1661731200);
    }

    #[test]
    fn zoned_local_resolves_via_lookup() {
        let naive = NaiveDateTime::parse_from_str("2022-08-29 09:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let anchor = Anchor { value: IcalDateTime::Local(naive), tzid: Some(String::from("Europe/London")) };

        let instant = anchor_instant(&anchor, "uid", &lookup()).unwrap();
        assert_eq!(instant, 1661760000); // 09:00 BST (UTC+1) == 08:00 UTC
    }

    #[test]
    fn unknown_tzid_is_a_validation_error() {
        let naive = NaiveDateTime::parse_from_str("2022-08-29 09:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let anchor = Anchor { value: IcalDateTime::Local(naive), tzid: Some(String::from("Not/AZone")) };

        assert_eq!(
            anchor_instant(&anchor, "uid-1", &lookup()),
            Err(ValidationError::UnknownTimeZone { uid: String::from("uid-1"), tzid: String::from("Not/AZone") })
        );
    }
}
