use std::ops::Deref;

use nom::combinator::map;
use nom::multi::separated_list0;

use crate::grammar::comma;
use crate::{impl_icalendar_entity_traits, ICalendarEntity, ParserInput, ParserResult};

/// A comma-separated list of `T`, as used by every `RRULE` `BYxxx` part.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct List<T>(pub Vec<T>)
where
    T: std::fmt::Debug + Clone + ICalendarEntity + Eq + PartialEq;

impl<T> Deref for List<T>
where
    T: std::fmt::Debug + Clone + ICalendarEntity + Eq + PartialEq,
{
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> ICalendarEntity for List<T>
where
    T: std::fmt::Debug + Clone + ICalendarEntity + Eq + PartialEq,
{
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        map(separated_list0(comma, T::parse_ical), List)(input)
    }

    fn render_ical(&self) -> String {
        self.0.iter().map(ICalendarEntity::render_ical).collect::<Vec<_>>().join(",")
    }
}

impl<T> std::str::FromStr for List<T>
where
    T: std::fmt::Debug + Clone + ICalendarEntity + Eq + PartialEq,
{
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match nom::combinator::all_consuming(Self::parse_ical)(input.into()) {
            Ok((_remaining, value)) => Ok(value),
            Err(nom::Err::Error(error)) => Err(crate::convert_error(input, error)),
            Err(error) => Err(error.to_string()),
        }
    }
}

impl<T> ToString for List<T>
where
    T: std::fmt::Debug + Clone + ICalendarEntity + Eq + PartialEq,
{
    fn to_string(&self) -> String {
        self.render_ical()
    }
}

impl<T> From<Vec<T>> for List<T>
where
    T: std::fmt::Debug + Clone + ICalendarEntity + Eq + PartialEq,
{
    fn from(value: Vec<T>) -> Self {
        List(value)
    }
}

impl<T> IntoIterator for List<T>
where
    T: std::fmt::Debug + Clone + ICalendarEntity + Eq + PartialEq,
{
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::assert_parser_output;
    use crate::values::integer::Integer;

    #[test]
    fn parses_zero_one_and_many_values() {
        assert_parser_output!(List::<Integer>::parse_ical(" TESTING".into()), (" TESTING", List(vec![])));
        assert_parser_output!(List::<Integer>::parse_ical("10 TESTING".into()), (" TESTING", List(vec![Integer(10)])));
        assert_parser_output!(
            List::<Integer>::parse_ical("10,20,30 TESTING".into()),
            (" TESTING", List(vec![Integer(10), Integer(20), Integer(30)])),
        );
    }
}
