use chrono::prelude::TimeZone;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::combinator::{cut, map, map_res, opt};
use nom::error::context;
use nom::sequence::{pair, preceded};

use crate::grammar::latin_capital_letter_t;
use crate::values::date::{date, Date};
use crate::values::time::Time;
use crate::{impl_icalendar_entity_traits, ICalendarEntity, ParserInput, ParserResult};

/// The `VALUE=` parameter governing whether a property's value is a bare `DATE` or a
/// `DATE-TIME`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ValueType {
    DateTime,
    Date,
}

impl ICalendarEntity for ValueType {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "VALUE",
            alt((map(tag("DATE-TIME"), |_| ValueType::DateTime), map(tag("DATE"), |_| ValueType::Date))),
        )(input)
    }

    fn render_ical(&self) -> String {
        match self {
            Self::DateTime => String::from("DATE-TIME"),
            Self::Date => String::from("DATE"),
        }
    }
}

impl ValueType {
    pub fn validate_against_date_time(&self, date_time: &DateTime) -> Result<(), String> {
        match (self, date_time) {
            (ValueType::DateTime, DateTime::Utc(_)) => Ok(()),
            (ValueType::DateTime, DateTime::Local(_)) => Ok(()),
            (ValueType::Date, DateTime::LocalDate(_)) => Ok(()),
            _ => Err(String::from("VALUE incompatible with parsed DATE-TIME/DATE value")),
        }
    }
}

impl_icalendar_entity_traits!(ValueType);

/// A decoded `DATE` or `DATE-TIME` value, already disambiguated between a floating local value,
/// a UTC value (trailing `Z`), or a plain calendar date. A `TZID` parameter, if present on the
/// enclosing property, attaches a zone to a `Local` variant at the property layer (see
/// `icalx-core`'s anchor handling) rather than here, since the zone name lives outside the
/// value text itself.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum DateTime {
    LocalDate(NaiveDate),
    Local(NaiveDateTime),
    Utc(NaiveDateTime),
}

impl ICalendarEntity for DateTime {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "DATE-TIME",
            map_res(
                pair(Date::parse_ical, opt(preceded(latin_capital_letter_t, cut(Time::parse_ical)))),
                |(date, time): (Date, Option<Time>)| -> Result<Self, String> {
                    let date = NaiveDate::try_from(date)?;

                    let Some(time) = time else {
                        return Ok(Self::LocalDate(date));
                    };

                    let naive = NaiveDateTime::new(date, NaiveTime::try_from(time)?);

                    Ok(if time.is_utc { Self::Utc(naive) } else { Self::Local(naive) })
                },
            ),
        )(input)
    }

    fn render_ical(&self) -> String {
        self.serialize_ical(None)
    }
}

impl DateTime {
    /// Renders with an explicit zone: `None` means UTC for a `Utc` value and floating (no
    /// suffix, no conversion) for a `Local`/`LocalDate` value.
    pub fn serialize_ical(&self, tz: Option<&Tz>) -> String {
        match self {
            Self::LocalDate(date) => Self::serialize_date(date),
            Self::Local(date_time) => Self::serialize_local(date_time),
            Self::Utc(date_time) => match tz {
                None | Some(Tz::UTC) => Self::serialize_utc(date_time),
                Some(tz) => {
                    let utc_timestamp = Tz::UTC.from_utc_datetime(date_time).timestamp();
                    let zoned = tz.timestamp_opt(utc_timestamp, 0).unwrap().naive_local();
                    Self::serialize_local(&zoned)
                }
            },
        }
    }

    fn serialize_utc(date_time: &NaiveDateTime) -> String {
        date_time.format("%Y%m%dT%H%M%SZ").to_string()
    }

    fn serialize_local(date_time: &NaiveDateTime) -> String {
        date_time.format("%Y%m%dT%H%M%S").to_string()
    }

    fn serialize_date(date: &NaiveDate) -> String {
        date.format("%Y%m%d").to_string()
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Self::LocalDate(_) => ValueType::Date,
            Self::Local(_) | Self::Utc(_) => ValueType::DateTime,
        }
    }
}

impl_icalendar_entity_traits!(DateTime);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::assert_parser_output;

    #[test]
    fn date_time_parse_ical() {
        assert_parser_output!(
            DateTime::parse_ical("19970714 TESTING".into()),
            (" TESTING", DateTime::LocalDate(NaiveDate::from_ymd_opt(1997, 7, 14).unwrap())),
        );

        assert_parser_output!(
            DateTime::parse_ical("19980118T230000 TESTING".into()),
            (
                " TESTING",
                DateTime::Local(NaiveDateTime::new(
                    NaiveDate::from_ymd_opt(1998, 1, 18).unwrap(),
                    NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
                )),
            ),
        );

        assert_parser_output!(
            DateTime::parse_ical("19980118T230000Z TESTING".into()),
            (
                " TESTING",
                DateTime::Utc(NaiveDateTime::new(
                    NaiveDate::from_ymd_opt(1998, 1, 18).unwrap(),
                    NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
                )),
            ),
        );

        assert!(DateTime::parse_ical("1997071".into()).is_err());
        assert!(DateTime::parse_ical(":".into()).is_err());
    }

    #[test]
    fn date_time_render_ical() {
        assert_eq!(DateTime::LocalDate(NaiveDate::from_ymd_opt(1997, 7, 14).unwrap()).render_ical(), "19970714");

        assert_eq!(
            DateTime::Local(NaiveDateTime::new(
                NaiveDate::from_ymd_opt(1998, 1, 18).unwrap(),
                NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            ))
            .render_ical(),
            "19980118T230000",
        );

        assert_eq!(
            DateTime::Utc(NaiveDateTime::new(
                NaiveDate::from_ymd_opt(1998, 1, 18).unwrap(),
                NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            ))
            .render_ical(),
            "19980118T230000Z",
        );
    }

    #[test]
    fn value_type_validate_against_date_time() {
        let local_date = DateTime::LocalDate(NaiveDate::from_ymd_opt(1997, 7, 14).unwrap());
        let utc = DateTime::Utc(NaiveDateTime::new(
            NaiveDate::from_ymd_opt(1998, 1, 18).unwrap(),
            NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
        ));

        assert_eq!(ValueType::Date.validate_against_date_time(&local_date), Ok(()));
        assert!(ValueType::DateTime.validate_against_date_time(&local_date).is_err());
        assert_eq!(ValueType::DateTime.validate_against_date_time(&utc), Ok(()));
        assert!(ValueType::Date.validate_against_date_time(&utc).is_err());
    }
}
