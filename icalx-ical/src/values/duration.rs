use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::digit1;
use nom::combinator::{cut, map, map_res, opt};
use nom::error::context;
use nom::sequence::{pair, preceded, terminated, tuple};

use crate::grammar::PositiveNegative;
use crate::{impl_icalendar_entity_traits, ICalendarEntity, ParserInput, ParserResult};

const SECONDS_IN_MINUTE: i64 = 60;
const SECONDS_IN_HOUR: i64 = SECONDS_IN_MINUTE * 60;
const SECONDS_IN_DAY: i64 = SECONDS_IN_HOUR * 24;
const SECONDS_IN_WEEK: i64 = SECONDS_IN_DAY * 7;

type DurTime = (Option<i64>, Option<i64>, Option<i64>);

// dur-value = (["+"] / "-") "P" (dur-date / dur-time / dur-week)
fn dur_value(input: ParserInput) -> ParserResult<(Option<PositiveNegative>, (Option<i64>, Option<i64>, Option<DurTime>))> {
    tuple((
        opt(PositiveNegative::parse_ical),
        preceded(
            tag("P"),
            cut(context(
                "DUR-DATE / DUR-TIME / DUR-WEEK",
                alt((
                    map(dur_week, |week| (Some(week), None, None)),
                    map(dur_date, |(day, time)| (None, Some(day), time)),
                    map(dur_time, |time| (None, None, Some(time))),
                )),
            )),
        ),
    ))(input)
}

fn dur_week(input: ParserInput) -> ParserResult<i64> {
    map_res(terminated(digit1, tag("W")), |value: ParserInput| value.fragment().parse::<i64>())(input)
}

fn dur_date(input: ParserInput) -> ParserResult<(i64, Option<DurTime>)> {
    pair(dur_day, opt(dur_time))(input)
}

fn dur_day(input: ParserInput) -> ParserResult<i64> {
    map_res(terminated(digit1, tag("D")), |value: ParserInput| value.fragment().parse::<i64>())(input)
}

fn dur_time(input: ParserInput) -> ParserResult<DurTime> {
    preceded(tag("T"), cut(tuple((opt(dur_hour), opt(dur_minute), opt(dur_second)))))(input)
}

fn dur_hour(input: ParserInput) -> ParserResult<i64> {
    map_res(terminated(digit1, tag("H")), |value: ParserInput| value.fragment().parse::<i64>())(input)
}

fn dur_minute(input: ParserInput) -> ParserResult<i64> {
    map_res(terminated(digit1, tag("M")), |value: ParserInput| value.fragment().parse::<i64>())(input)
}

fn dur_second(input: ParserInput) -> ParserResult<i64> {
    map_res(terminated(digit1, tag("S")), |value: ParserInput| value.fragment().parse::<i64>())(input)
}

/// A decoded `DURATION` value, held as a signed count of seconds. RFC 5545's
/// day/week/hour/minute/second breakdown collapses into one signed magnitude since none of this
/// crate's consumers need the original calendar-unit split back.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Duration {
    pub seconds: i64,
}

impl ICalendarEntity for Duration {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "DURATION",
            map(dur_value, |(sign, (week, day, time))| {
                let mut total = 0_i64;

                if let Some(week) = week {
                    total += week * SECONDS_IN_WEEK;
                }

                if let Some(day) = day {
                    total += day * SECONDS_IN_DAY;
                }

                if let Some((hour, minute, second)) = time {
                    total += hour.unwrap_or(0) * SECONDS_IN_HOUR;
                    total += minute.unwrap_or(0) * SECONDS_IN_MINUTE;
                    total += second.unwrap_or(0);
                }

                let signum = sign.map(|s| s.signum() as i64).unwrap_or(1);

                Self { seconds: total * signum }
            }),
        )(input)
    }

    fn render_ical(&self) -> String {
        let sign = if self.seconds < 0 { "-" } else { "" };
        let mut remaining = self.seconds.unsigned_abs();

        let days = remaining / SECONDS_IN_DAY as u64;
        remaining %= SECONDS_IN_DAY as u64;
        let hours = remaining / SECONDS_IN_HOUR as u64;
        remaining %= SECONDS_IN_HOUR as u64;
        let minutes = remaining / SECONDS_IN_MINUTE as u64;
        let seconds = remaining % SECONDS_IN_MINUTE as u64;

        let mut out = format!("{sign}P");

        if days > 0 {
            out.push_str(&format!("{days}D"));
        }

        if hours > 0 || minutes > 0 || seconds > 0 {
            out.push('T');

            if hours > 0 {
                out.push_str(&format!("{hours}H"));
            }

            if minutes > 0 {
                out.push_str(&format!("{minutes}M"));
            }

            if seconds > 0 || (days == 0 && hours == 0 && minutes == 0) {
                out.push_str(&format!("{seconds}S"));
            }
        }

        out
    }
}

impl_icalendar_entity_traits!(Duration);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::assert_parser_output;

    #[test]
    fn parse_ical() {
        assert_parser_output!(Duration::parse_ical("PT25S".into()), ("", Duration { seconds: 25 }));
        assert_parser_output!(Duration::parse_ical("P15DT5H0M20S".into()), ("", Duration { seconds: 15 * 86400 + 5 * 3600 + 20 }));
        assert_parser_output!(Duration::parse_ical("-P7W".into()), ("", Duration { seconds: -7 * 604800 }));

        assert!(Duration::parse_ical("Abc".into()).is_err());
        assert!(Duration::parse_ical(":".into()).is_err());
    }

    #[test]
    fn render_ical_round_trips() {
        assert_eq!(Duration { seconds: 25 }.render_ical(), "PT25S");
        assert_eq!(Duration { seconds: -604800 }.render_ical(), "-P7D");
        assert_eq!(Duration { seconds: 0 }.render_ical(), "PT0S");
    }
}
