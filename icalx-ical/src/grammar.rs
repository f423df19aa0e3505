use nom::branch::alt;
use nom::bytes::complete::{tag as nom_tag, take_while, take_while1, take_while_m_n};
use nom::character::complete::char;
use nom::combinator::{map, map_res, opt, recognize, verify};
use nom::error::context;
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};

use crate::{impl_icalendar_entity_traits, ICalendarEntity, ParserError, ParserInput, ParserResult};

/// Wraps [`nom::bytes::complete::tag`] to produce a friendlier "expected '...'" error message.
pub fn tag<'a>(tag: &'a str) -> impl Fn(ParserInput) -> ParserResult<ParserInput> + 'a {
    move |input: ParserInput| match nom_tag::<&'a str, ParserInput, ParserError>(tag)(input) {
        Ok(result) => Ok(result),
        Err(nom::Err::Error(_)) => Err(nom::Err::Error(ParserError::new(format!("expected '{}'", tag), input))),
        Err(nom::Err::Failure(_)) => Err(nom::Err::Failure(ParserError::new(format!("expected '{}'", tag), input))),
        Err(nom::Err::Incomplete(needed)) => Err(nom::Err::Incomplete(needed)),
    }
}

pub fn is_htab_char(input: char) -> bool {
    input as u32 == 9
}

pub fn htab(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_htab_char)(input)
}

pub fn is_lf_char(input: char) -> bool {
    input as u32 == 10
}

pub fn lf(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_lf_char)(input)
}

pub fn is_cr_char(input: char) -> bool {
    input as u32 == 13
}

pub fn cr(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_cr_char)(input)
}

pub fn is_dquote_char(input: char) -> bool {
    input as u32 == 34
}

pub fn dquote(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_dquote_char)(input)
}

pub fn is_space_char(input: char) -> bool {
    input as u32 == 32
}

pub fn space(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_space_char)(input)
}

pub fn is_comma_char(input: char) -> bool {
    input == ','
}

pub fn comma(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_comma_char)(input)
}

pub fn is_hyphen_minus_char(input: char) -> bool {
    input == '-'
}

pub fn hyphen_minus(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_hyphen_minus_char)(input)
}

pub fn is_plus_sign_char(input: char) -> bool {
    input == '+'
}

pub fn plus_sign(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_plus_sign_char)(input)
}

pub fn is_period_char(input: char) -> bool {
    input == '.'
}

pub fn period(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_period_char)(input)
}

pub fn is_solidus_char(input: char) -> bool {
    input == '/'
}

pub fn solidus(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_solidus_char)(input)
}

pub fn is_colon_char(input: char) -> bool {
    input == ':'
}

pub fn colon(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_colon_char)(input)
}

pub fn is_semicolon_char(input: char) -> bool {
    input == ';'
}

pub fn semicolon(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_semicolon_char)(input)
}

pub fn is_backslash_char(input: char) -> bool {
    input == '\\'
}

pub fn backslash(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_backslash_char)(input)
}

pub fn latin_capital_letter_n(input: ParserInput) -> ParserResult<ParserInput> {
    tag("N")(input)
}

pub fn latin_small_letter_n(input: ParserInput) -> ParserResult<ParserInput> {
    tag("n")(input)
}

pub fn latin_capital_letter_t(input: ParserInput) -> ParserResult<ParserInput> {
    tag("T")(input)
}

pub fn latin_capital_letter_x(input: ParserInput) -> ParserResult<ParserInput> {
    tag("X")(input)
}

pub fn latin_capital_letter_z(input: ParserInput) -> ParserResult<ParserInput> {
    tag("Z")(input)
}

/// CRLF or bare LF, accepted on input; the emitter always writes CRLF on output.
pub fn crlf(input: ParserInput) -> ParserResult<ParserInput> {
    alt((recognize(pair(cr, lf)), lf))(input)
}

pub fn is_wsp_char(input: char) -> bool {
    is_space_char(input) || is_htab_char(input)
}

pub fn wsp(input: ParserInput) -> ParserResult<ParserInput> {
    take_while1(is_wsp_char)(input)
}

pub fn wsp_0(input: ParserInput) -> ParserResult<ParserInput> {
    take_while(is_wsp_char)(input)
}

pub fn is_non_us_ascii_char(input: char) -> bool {
    (input as u32) >= 0x80
}

pub fn is_control_char(input: char) -> bool {
    let code = input as u32;
    (code <= 0x08) || (code >= 0x0A && code <= 0x1F) || code == 0x7F
}

// name  = iana-token / x-name
pub fn name(input: ParserInput) -> ParserResult<ParserInput> {
    context("NAME", alt((x_name, iana_token)))(input)
}

pub fn is_iana_token_char(input: char) -> bool {
    input.is_ascii_alphanumeric() || input == '-'
}

// iana-token = 1*(ALPHA / DIGIT / "-")
pub fn iana_token(input: ParserInput) -> ParserResult<ParserInput> {
    context("iana-token", take_while1(is_iana_token_char))(input)
}

// x-name = "X-" [vendorid "-"] 1*(ALPHA / DIGIT / "-")
pub fn x_name(input: ParserInput) -> ParserResult<ParserInput> {
    context(
        "x-name",
        recognize(tuple((
            latin_capital_letter_x,
            hyphen_minus,
            opt(terminated(vendorid, hyphen_minus)),
            take_while1(is_iana_token_char),
        ))),
    )(input)
}

// vendorid = 3*(ALPHA / DIGIT)
pub fn vendorid(input: ParserInput) -> ParserResult<ParserInput> {
    context("vendorid", take_while1(|c: char| c.is_ascii_alphanumeric()))(input)
}

pub fn is_safe_char(input: char) -> bool {
    is_wsp_char(input)
        || input == '\u{21}'
        || (input >= '\u{23}' && input <= '\u{2B}')
        || (input >= '\u{2D}' && input <= '\u{39}')
        || (input >= '\u{3C}' && input <= '\u{7E}')
        || is_non_us_ascii_char(input)
}

pub fn safe_char(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_safe_char)(input)
}

pub fn is_qsafe_char(input: char) -> bool {
    is_wsp_char(input) || input == '\u{21}' || (input >= '\u{23}' && input <= '\u{7E}') || is_non_us_ascii_char(input)
}

pub fn qsafe_char(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_qsafe_char)(input)
}

pub fn is_value_char(input: char) -> bool {
    is_wsp_char(input) || (input >= '\u{21}' && input <= '\u{7E}') || is_non_us_ascii_char(input)
}

pub fn value_char(input: ParserInput) -> ParserResult<ParserInput> {
    take_while_m_n(1, 1, is_value_char)(input)
}

// quoted-string = DQUOTE *QSAFE-CHAR DQUOTE
pub fn quoted_string(input: ParserInput) -> ParserResult<ParserInput> {
    context(
        "quoted-string",
        delimited(dquote, recognize(many0(qsafe_char)), dquote),
    )(input)
}

// param-name = iana-token / x-name
pub fn param_name(input: ParserInput) -> ParserResult<ParserInput> {
    context("param-name", name)(input)
}

// paramtext = *SAFE-CHAR
pub fn paramtext(input: ParserInput) -> ParserResult<ParserInput> {
    recognize(many0(safe_char))(input)
}

// param-value = paramtext / quoted-string
pub fn param_value(input: ParserInput) -> ParserResult<ParserInput> {
    context("param-value", alt((quoted_string, paramtext)))(input)
}

// param = param-name "=" param-value *("," param-value)
pub fn param(input: ParserInput) -> ParserResult<(ParserInput, ParserInput)> {
    context(
        "param",
        pair(
            terminated(param_name, char('=')),
            recognize(separated_list1(comma, param_value)),
        ),
    )(input)
}

// value = *VALUE-CHAR
pub fn value(input: ParserInput) -> ParserResult<ParserInput> {
    recognize(many0(value_char))(input)
}

// contentline = name *(";" param) ":" value CRLF
pub fn contentline(
    input: ParserInput,
) -> ParserResult<(ParserInput, Vec<(ParserInput, Vec<ParserInput>)>, ParserInput)> {
    context(
        "contentline",
        tuple((name, many0(preceded(semicolon, param)), preceded(colon, value))),
    )(input)
}

/// `+n` / `-n`, where the sign governs the enclosing numeric part (used by `RRULE` ordinals and
/// `UTC-OFFSET`).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PositiveNegative {
    Positive,
    Negative,
}

impl ICalendarEntity for PositiveNegative {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "+/-",
            alt((
                map(plus_sign, |_| PositiveNegative::Positive),
                map(hyphen_minus, |_| PositiveNegative::Negative),
            )),
        )(input)
    }

    fn render_ical(&self) -> String {
        match self {
            Self::Positive => String::from("+"),
            Self::Negative => String::from("-"),
        }
    }
}

impl_icalendar_entity_traits!(PositiveNegative);

impl PositiveNegative {
    pub fn signum(&self) -> i32 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }

    /// Parses an optional sign followed by `m` to `n` digits into a signed integer.
    pub fn parse_i32_m_n(m: usize, n: usize) -> impl Fn(ParserInput) -> ParserResult<i32> {
        move |input: ParserInput| {
            map_res(
                pair(
                    opt(Self::parse_ical),
                    verify(take_while_m_n(m, n, |c: char| c.is_ascii_digit()), |digits: &ParserInput| {
                        !digits.fragment().is_empty()
                    }),
                ),
                |(sign, digits): (Option<PositiveNegative>, ParserInput)| {
                    digits
                        .fragment()
                        .parse::<i32>()
                        .map(|value| value * sign.map(|s| s.signum()).unwrap_or(1))
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
    fn crlf_accepts_lone_lf() {
        assert!(crlf("\n".into()).is_ok());
        assert!(crlf("\r\n".into()).is_ok());
        assert!(crlf("x".into()).is_err());
    }

    #[test]
    fn name_parses_x_name_and_iana_token() {
        assert_parser_output!(name("DTSTART;".into()), (";", "DTSTART".into()));
        assert_parser_output!(name("X-FOO;".into()), (";", "X-FOO".into()));
    }

    #[test]
    fn positive_negative_round_trips() {
        assert_eq!(PositiveNegative::Positive.render_ical(), "+");
        assert_eq!(PositiveNegative::Negative.render_ical(), "-");
    }
}
