use nom::bytes::complete::{tag, take_while_m_n};
use nom::combinator::{map_res, opt, recognize};
use nom::error::context;
use nom::sequence::tuple;

use crate::{impl_icalendar_entity_traits, ICalendarEntity, ParserError, ParserInput, ParserResult};

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

// time = time-hour time-minute time-second [time-utc]
pub fn time(input: ParserInput) -> ParserResult<ParserInput> {
    context("TIME", recognize(tuple((time_hour, time_minute, time_second, opt(time_utc)))))(input)
}

pub fn time_hour(input: ParserInput) -> ParserResult<u32> {
    let (remaining, hour) = take_while_m_n(2, 2, is_digit)(input)?;

    match hour.fragment().parse::<u32>() {
        Ok(hour) if hour <= 23 => Ok((remaining, hour)),
        _ => Err(nom::Err::Error(ParserError::new(String::from("expected hour between 00-23"), input))),
    }
}

pub fn time_minute(input: ParserInput) -> ParserResult<u32> {
    let (remaining, minute) = take_while_m_n(2, 2, is_digit)(input)?;

    match minute.fragment().parse::<u32>() {
        Ok(minute) if minute <= 59 => Ok((remaining, minute)),
        _ => Err(nom::Err::Error(ParserError::new(String::from("expected minute between 00-59"), input))),
    }
}

/// Allows the RFC 5545 leap-second value of 60, which [`chrono`] does not represent; callers
/// clamp it to 59 when constructing a `NaiveTime`.
pub fn time_second(input: ParserInput) -> ParserResult<u32> {
    let (remaining, second) = take_while_m_n(2, 2, is_digit)(input)?;

    match second.fragment().parse::<u32>() {
        Ok(second) if second <= 60 => Ok((remaining, second)),
        _ => Err(nom::Err::Error(ParserError::new(String::from("expected second between 00-60"), input))),
    }
}

pub fn time_utc(input: ParserInput) -> ParserResult<ParserInput> {
    tag("Z")(input)
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Time {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub is_utc: bool,
}

impl ICalendarEntity for Time {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "TIME",
            map_res(
                tuple((time_hour, time_minute, time_second, opt(time_utc))),
                |(hour, minute, second, utc)| -> Result<Self, String> {
                    Ok(Self { hour, minute, second, is_utc: utc.is_some() })
                },
            ),
        )(input)
    }

    fn render_ical(&self) -> String {
        let suffix = if self.is_utc { "Z" } else { "" };
        format!("{:02}{:02}{:02}{}", self.hour, self.minute, self.second, suffix)
    }
}

impl TryFrom<Time> for chrono::NaiveTime {
    type Error = String;

    fn try_from(time: Time) -> Result<chrono::NaiveTime, Self::Error> {
        chrono::NaiveTime::from_hms_opt(time.hour, time.minute, time.second.min(59))
            .ok_or_else(|| String::from("time is invalid"))
    }
}

impl_icalendar_entity_traits!(Time);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::assert_parser_output;

    #[test]
    fn parse_ical() {
        assert_parser_output!(
            Time::parse_ical("083000 TESTING".into()),
            (" TESTING", Time { hour: 8, minute: 30, second: 0, is_utc: false }),
        );

        assert_parser_output!(
            Time::parse_ical("133000Z TESTING".into()),
            (" TESTING", Time { hour: 13, minute: 30, second: 0, is_utc: true }),
        );

        assert!(Time::parse_ical("0830".into()).is_err());
        assert!(Time::parse_ical(":".into()).is_err());
    }

    #[test]
    fn render_ical() {
        assert_eq!(Time { hour: 8, minute: 30, second: 0, is_utc: false }.render_ical(), "083000");
        assert_eq!(Time { hour: 13, minute: 30, second: 0, is_utc: true }.render_ical(), "133000Z");
    }
}
