use nom::bytes::complete::take_while_m_n;
use nom::combinator::{map_res, recognize};
use nom::error::context;
use nom::sequence::tuple;

use crate::{impl_icalendar_entity_traits, ICalendarEntity, ParserError, ParserInput, ParserResult};

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

// date = date-fullyear date-month date-mday
pub fn date(input: ParserInput) -> ParserResult<ParserInput> {
    context("DATE", recognize(date_value))(input)
}

pub fn date_value(input: ParserInput) -> ParserResult<(i32, u32, u32)> {
    tuple((date_fullyear, date_month, date_mday))(input)
}

pub fn date_fullyear(input: ParserInput) -> ParserResult<i32> {
    let (remaining, year) = take_while_m_n(4, 4, is_digit)(input)?;

    match year.fragment().parse::<i32>() {
        Ok(year) => Ok((remaining, year)),
        Err(_) => Err(nom::Err::Error(ParserError::new(String::from("invalid year"), input))),
    }
}

pub fn date_month(input: ParserInput) -> ParserResult<u32> {
    let (remaining, month) = take_while_m_n(2, 2, is_digit)(input)?;

    match month.fragment().parse::<u32>() {
        Ok(month) if (1..=12).contains(&month) => Ok((remaining, month)),
        _ => Err(nom::Err::Error(ParserError::new(String::from("expected month between 01-12"), input))),
    }
}

pub fn date_mday(input: ParserInput) -> ParserResult<u32> {
    let (remaining, mday) = take_while_m_n(2, 2, is_digit)(input)?;

    match mday.fragment().parse::<u32>() {
        Ok(mday) if (1..=31).contains(&mday) => Ok((remaining, mday)),
        _ => Err(nom::Err::Error(ParserError::new(String::from("expected day between 01-31"), input))),
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Date {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl ICalendarEntity for Date {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "DATE",
            map_res(date_value, |(year, month, day)| {
                let date = Self { year, month, day };
                date.validate().map(|_| date)
            }),
        )(input)
    }

    fn render_ical(&self) -> String {
        format!("{:04}{:02}{:02}", self.year, self.month, self.day)
    }

    fn validate(&self) -> Result<(), String> {
        if chrono::NaiveDate::from_ymd_opt(self.year, self.month, self.day).is_none() {
            Err(String::from("date is invalid"))
        } else {
            Ok(())
        }
    }
}

impl TryFrom<Date> for chrono::NaiveDate {
    type Error = String;

    fn try_from(date: Date) -> Result<chrono::NaiveDate, Self::Error> {
        chrono::NaiveDate::from_ymd_opt(date.year, date.month, date.day).ok_or_else(|| String::from("date is invalid"))
    }
}

impl From<chrono::NaiveDate> for Date {
    fn from(date: chrono::NaiveDate) -> Self {
        use chrono::Datelike;

        Self { year: date.year(), month: date.month(), day: date.day() }
    }
}

impl_icalendar_entity_traits!(Date);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::assert_parser_output;

    #[test]
    fn parse_ical() {
        assert_parser_output!(
            Date::parse_ical("19970714 TESTING".into()),
            (" TESTING", Date { year: 1997, month: 7, day: 14 }),
        );

        assert!(Date::parse_ical("Abc".into()).is_err());
        assert!(Date::parse_ical(":".into()).is_err());
    }

    #[test]
    fn render_ical() {
        assert_eq!(Date { year: 1997, month: 7, day: 14 }.render_ical(), "19970714");
    }

    #[test]
    fn validate_rejects_impossible_dates() {
        assert_eq!(Date { year: 1997, month: 2, day: 31 }.validate(), Err(String::from("date is invalid")));
    }
}
