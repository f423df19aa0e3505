use nom::bytes::complete::tag;
use nom::combinator::{cut, map, opt};
use nom::error::context;
use nom::multi::many0;
use nom::sequence::{preceded, terminated, tuple};

use crate::grammar::{colon, crlf, name, param, semicolon, value};
use crate::{impl_icalendar_entity_traits, ICalendarEntity, ParserInput, ParserResult};

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ContentLineParam(pub String, pub String);

impl<'a> From<(ParserInput<'a>, ParserInput<'a>)> for ContentLineParam {
    fn from(param: (ParserInput<'a>, ParserInput<'a>)) -> Self {
        ContentLineParam(param.0.to_string(), param.1.to_string())
    }
}

impl From<(&str, &str)> for ContentLineParam {
    fn from(param: (&str, &str)) -> Self {
        ContentLineParam(param.0.to_string(), param.1.to_string())
    }
}

impl ICalendarEntity for ContentLineParam {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        map(param, ContentLineParam::from)(input)
    }

    fn render_ical(&self) -> String {
        format!("{}={}", self.0, self.1)
    }
}

impl_icalendar_entity_traits!(ContentLineParam);

/// Parameters of one content line, in the order they were parsed (or inserted). RFC 5545
/// doesn't mandate an order, but round-tripping one is cheap and avoids gratuitous diffs.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ContentLineParams(pub Vec<ContentLineParam>);

impl From<Vec<ContentLineParam>> for ContentLineParams {
    fn from(params: Vec<ContentLineParam>) -> Self {
        ContentLineParams(params)
    }
}

impl From<Vec<(&str, &str)>> for ContentLineParams {
    fn from(params: Vec<(&str, &str)>) -> Self {
        ContentLineParams(params.into_iter().map(ContentLineParam::from).collect())
    }
}

impl ContentLineParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|param| param.0.eq_ignore_ascii_case(name)).map(|param| param.1.as_str())
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(ContentLineParam(name.into(), value.into()));
    }
}

impl ICalendarEntity for ContentLineParams {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        map(
            many0(preceded(semicolon, cut(ContentLineParam::parse_ical))),
            ContentLineParams::from,
        )(input)
    }

    fn render_ical(&self) -> String {
        let mut output = String::new();

        for param in &self.0 {
            output.push_str(format!(";{}", param.render_ical()).as_str());
        }

        output
    }
}

impl_icalendar_entity_traits!(ContentLineParams);

/// A single logical property line: name, parameters, raw (still-escaped) value text.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ContentLine(pub String, pub ContentLineParams, pub String);

impl<'a> From<(ParserInput<'a>, ContentLineParams, ParserInput<'a>)> for ContentLine {
    fn from(content_line: (ParserInput, ContentLineParams, ParserInput)) -> Self {
        ContentLine(content_line.0.to_string(), content_line.1, content_line.2.to_string())
    }
}

impl From<(&str, Vec<(&str, &str)>, &str)> for ContentLine {
    fn from(content_line: (&str, Vec<(&str, &str)>, &str)) -> Self {
        ContentLine(content_line.0.to_string(), content_line.1.into(), content_line.2.to_string())
    }
}

impl ICalendarEntity for ContentLine {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "CONTENTLINE",
            map(
                tuple((name, ContentLineParams::parse_ical, terminated(preceded(colon, value), opt(crlf)))),
                ContentLine::from,
            ),
        )(input)
    }

    fn render_ical(&self) -> String {
        format!("{}{}:{}", self.0, self.1.render_ical(), self.2)
    }
}

impl ContentLine {
    pub fn parse_ical_for_property(property_name: &'static str) -> impl FnMut(ParserInput) -> ParserResult<Self> {
        move |input: ParserInput| {
            context(
                property_name,
                context(
                    "CONTENTLINE",
                    map(
                        tuple((tag(property_name), ContentLineParams::parse_ical, terminated(preceded(colon, value), opt(crlf)))),
                        ContentLine::from,
                    ),
                ),
            )(input)
        }
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn params(&self) -> &ContentLineParams {
        &self.1
    }

    pub fn raw_value(&self) -> &str {
        &self.2
    }
}

impl_icalendar_entity_traits!(ContentLine);

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tests::assert_parser_output;

    #[test]
    fn parse_ical() {
        assert_parser_output!(
            ContentLine::parse_ical(
                r#"CATEGORIES;LANGUAGE=ENGLISH:APPOINTMENT,EDUCATION"#.into()
            ),
            (
                "",
                ContentLine::from((
                    "CATEGORIES",
                    vec![("LANGUAGE", "ENGLISH")],
                    "APPOINTMENT,EDUCATION",
                )),
            )
        );

        assert_parser_output!(
            ContentLine::parse_ical(
                r#"DTSTART;TZID=Europe/London;VALUE=DATE-TIME:20201231T183000"#.into()
            ),
            (
                "",
                ContentLine::from((
                    "DTSTART",
                    vec![("TZID", "Europe/London"), ("VALUE", "DATE-TIME")],
                    "20201231T183000",
                )),
            )
        );

        assert_parser_output!(
            ContentLine::parse_ical(r#"X-CUSTOM-PROP:Experimental property text."#.into()),
            ("", ContentLine::from(("X-CUSTOM-PROP", vec![], "Experimental property text."))),
        );
    }

    #[test]
    fn parse_ical_for_property_rejects_other_names() {
        assert!(ContentLine::parse_ical_for_property("UID")("SUMMARY:Test".into()).is_err());

        assert_parser_output!(
            ContentLine::parse_ical_for_property("UID")("UID:some-uid".into()),
            ("", ContentLine::from(("UID", vec![], "some-uid"))),
        );
    }

    #[test]
    fn render_ical_round_trips() {
        let content_line = ContentLine::from(("SUMMARY", vec![("LANGUAGE", "EN")], "Team meeting"));

        assert_eq!(content_line.render_ical(), "SUMMARY;LANGUAGE=EN:Team meeting");
    }

    #[test]
    fn content_line_params_get_is_case_insensitive() {
        let params = ContentLineParams::from(vec![("TZID", "Europe/London")]);

        assert_eq!(params.get("tzid"), Some("Europe/London"));
        assert_eq!(params.get("VALUE"), None);
    }
}
