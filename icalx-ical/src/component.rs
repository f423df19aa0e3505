//! `BEGIN:X` / `END:X` component tree parsing, built on top of [`crate::unfold`] and
//! [`crate::content_line`].

use crate::content_line::ContentLine;
use crate::unfold::unfold;
use crate::{ParseError, ParserInput};

/// One parsed `BEGIN:NAME ... END:NAME` block: its own properties in original order, plus any
/// nested child components. Unknown component and property names are preserved verbatim so a
/// round-trip through [`ParsedComponent::render_ical`] reproduces them.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedComponent {
    pub name: String,
    pub properties: Vec<ContentLine>,
    pub components: Vec<ParsedComponent>,
}

impl ParsedComponent {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&ContentLine> {
        self.properties.iter().find(|property| property.name().eq_ignore_ascii_case(name))
    }

    pub fn properties_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ContentLine> {
        self.properties.iter().filter(move |property| property.name().eq_ignore_ascii_case(name))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ParsedComponent> {
        self.components.iter().filter(move |component| component.name.eq_ignore_ascii_case(name))
    }

    pub fn render_ical(&self) -> String {
        let mut lines = Vec::new();
        self.render_into(&mut lines);
        lines.join("")
    }

    fn render_into(&self, lines: &mut Vec<String>) {
        lines.push(crate::unfold::fold_line(&format!("BEGIN:{}", self.name)));

        for property in &self.properties {
            lines.push(crate::unfold::fold_line(&property.render_ical()));
        }

        for component in &self.components {
            component.render_into(lines);
        }

        lines.push(crate::unfold::fold_line(&format!("END:{}", self.name)));
    }
}

/// Parses zero or more top-level components (typically a single `VCALENDAR`) out of raw
/// iCalendar text, unfolding first and then walking a `BEGIN`/`END` stack.
pub fn parse_components(input: &str) -> Result<Vec<ParsedComponent>, ParseError> {
    let logical_lines = unfold(input).map_err(|lex_error| ParseError::Grammar(lex_error.to_string()))?;

    let mut top_level: Vec<ParsedComponent> = Vec::new();
    let mut stack: Vec<ParsedComponent> = Vec::new();

    for line in logical_lines {
        if let Some(name) = line.strip_prefix("BEGIN:") {
            stack.push(ParsedComponent::new(name.trim()));
            continue;
        }

        if let Some(name) = line.strip_prefix("END:") {
            let name = name.trim();
            let Some(closed) = stack.pop() else {
                return Err(ParseError::UnmatchedEnd(name.to_string()));
            };

            if closed.name != name {
                return Err(ParseError::MismatchedEnd { expected: closed.name, found: name.to_string() });
            }

            match stack.last_mut() {
                Some(parent) => parent.components.push(closed),
                None => top_level.push(closed),
            }

            continue;
        }

        let Some(component) = stack.last_mut() else {
            return Err(ParseError::PropertyOutsideComponent);
        };

        let parsed_input: ParserInput = line.as_str().into();
        let (_, content_line) = ContentLine::parse_ical(parsed_input).map_err(|error| match error {
            nom::Err::Incomplete(_) => ParseError::Grammar(format!("incomplete content line: {line}")),
            nom::Err::Error(error) | nom::Err::Failure(error) => ParseError::Grammar(error.to_string()),
        })?;

        component.properties.push(content_line);
    }

    if !stack.is_empty() {
        return Err(ParseError::UnclosedComponent(stack.len()));
    }

    Ok(top_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_components_preserving_order() {
        let input = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:abc\r\nSUMMARY:Hi\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

        let components = parse_components(input).unwrap();

        assert_eq!(components.len(), 1);
        let calendar = &components[0];
        assert_eq!(calendar.name, "VCALENDAR");
        assert_eq!(calendar.property("VERSION").unwrap().raw_value(), "2.0");
        assert_eq!(calendar.components.len(), 1);
        assert_eq!(calendar.components[0].name, "VEVENT");
        assert_eq!(calendar.components[0].property("UID").unwrap().raw_value(), "abc");
    }

    #[test]
    fn rejects_mismatched_end() {
        let input = "BEGIN:VEVENT\r\nEND:VTODO\r\n";

        assert_eq!(
            parse_components(input),
            Err(ParseError::MismatchedEnd { expected: "VEVENT".to_string(), found: "VTODO".to_string() })
        );
    }

    #[test]
    fn rejects_unclosed_component() {
        let input = "BEGIN:VEVENT\r\nUID:abc\r\n";

        assert_eq!(parse_components(input), Err(ParseError::UnclosedComponent(1)));
    }

    #[test]
    fn rejects_property_outside_component() {
        let input = "UID:abc\r\n";

        assert_eq!(parse_components(input), Err(ParseError::PropertyOutsideComponent));
    }

    #[test]
    fn round_trips_unknown_components_and_properties() {
        let input = "BEGIN:VCALENDAR\r\nX-CUSTOM:value\r\nBEGIN:X-CUSTOM-COMPONENT\r\nX-FIELD:1\r\nEND:X-CUSTOM-COMPONENT\r\nEND:VCALENDAR\r\n";

        let components = parse_components(input).unwrap();
        let rendered = components[0].render_ical();

        assert!(rendered.contains("X-CUSTOM:value"));
        assert!(rendered.contains("BEGIN:X-CUSTOM-COMPONENT"));
    }
}
