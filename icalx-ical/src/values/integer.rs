use nom::bytes::complete::take_while_m_n;
use nom::combinator::map_res;
use nom::error::context;

use crate::grammar::PositiveNegative;
use crate::{impl_icalendar_entity_traits, ICalendarEntity, ParserError, ParserInput, ParserResult};

/// A bounded signed integer, as used by `RRULE`'s `BYxxx` lists and `COUNT`/`INTERVAL`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Integer(pub i64);

impl From<u64> for Integer {
    fn from(value: u64) -> Self {
        Integer(value as i64)
    }
}

impl From<i64> for Integer {
    fn from(value: i64) -> Self {
        Integer(value)
    }
}

impl ICalendarEntity for Integer {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        Self::parse_unsigned_m_n(1, 19, i64::MIN, i64::MAX)(input)
    }

    fn render_ical(&self) -> String {
        self.0.to_string()
    }
}

impl_icalendar_entity_traits!(Integer);

impl Integer {
    /// Parses an unsigned `m`-to-`n` digit run (no sign) and range-checks the result.
    pub fn parse_unsigned_m_n(m: usize, n: usize, min: i64, max: i64) -> impl Fn(ParserInput) -> ParserResult<Integer> {
        move |input: ParserInput| {
            let (remaining, digits) = take_while_m_n(m, n, |c: char| c.is_ascii_digit())(input)?;

            let Ok(value) = digits.fragment().parse::<i64>() else {
                return Err(nom::Err::Error(ParserError::new(String::from("invalid integer"), input)));
            };

            if value < min || value > max {
                return Err(nom::Err::Error(ParserError::new(format!("expected integer between {min} and {max}"), input)));
            }

            Ok((remaining, Integer(value)))
        }
    }

    /// Parses an optionally `+`/`-` signed `m`-to-`n` digit run, then range-checks the
    /// magnitude (not the signed value) against `[min, max]` — RFC 5545's `ordwk`/`ordmoday`
    /// style ranges are always stated as unsigned magnitudes regardless of sign.
    pub fn parse_signed_m_n(m: usize, n: usize, min: i64, max: i64) -> impl Fn(ParserInput) -> ParserResult<Integer> {
        move |input: ParserInput| {
            map_res(
                nom::sequence::pair(
                    nom::combinator::opt(PositiveNegative::parse_ical),
                    take_while_m_n(m, n, |c: char| c.is_ascii_digit()),
                ),
                move |(sign, digits): (Option<PositiveNegative>, ParserInput)| -> Result<Integer, String> {
                    let magnitude = digits.fragment().parse::<i64>().map_err(|_| String::from("invalid integer"))?;

                    if magnitude < min || magnitude > max {
                        return Err(format!("expected integer between {min} and {max}"));
                    }

                    let signum = sign.map(|s| s.signum() as i64).unwrap_or(1);

                    Ok(Integer(magnitude * signum))
                },
            )(input)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::assert_parser_output;

    #[test]
    fn parse_unsigned_m_n_rejects_out_of_range() {
        assert!(Integer::parse_unsigned_m_n(1, 2, 0, 59)("60".into()).is_err());
        assert_parser_output!(Integer::parse_unsigned_m_n(1, 2, 0, 59)("30 TESTING".into()), (" TESTING", Integer(30)));
    }

    #[test]
    fn parse_signed_m_n_applies_sign_after_range_check() {
        assert_parser_output!(Integer::parse_signed_m_n(1, 2, 1, 53)("-1SU".into()), ("SU", Integer(-1)));
        assert_parser_output!(Integer::parse_signed_m_n(1, 2, 1, 53)("31MO".into()), ("MO", Integer(31)));
    }
}
