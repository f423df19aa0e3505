//! Bridges a [`crate::content_line::ContentLine`] to the typed value table described by the
//! calendar's property catalog (DATE/DATE-TIME anchors, DURATION, RRULE, text). Properties this
//! table doesn't name decode to [`Property::Passive`] and survive round-trip unexamined.

use std::str::FromStr;

use crate::content_line::{ContentLine, ContentLineParams};
use crate::values::date_time::{DateTime, ValueType};
use crate::values::duration::Duration;
use crate::values::recur::Recur;
use crate::DecodeError;

/// `TZID=` attaches a zone to a floating `Local` value; a `Utc` value (trailing `Z`) and a
/// `LocalDate` value never carry one.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Anchor {
    pub value: DateTime,
    pub tzid: Option<String>,
}

impl Anchor {
    pub fn decode(content_line: &ContentLine, property: &str) -> Result<Self, DecodeError> {
        let params = content_line.params();
        let tzid = params.get("TZID").map(str::to_string);
        let declared_value_type = params.get("VALUE").map(ValueType::from_str).transpose().map_err(|_| {
            DecodeError::ValueTypeMismatch { property: property.to_string(), value: content_line.raw_value().to_string() }
        })?;

        let value = DateTime::from_str(content_line.raw_value())
            .map_err(|_| DecodeError::ValueTypeMismatch { property: property.to_string(), value: content_line.raw_value().to_string() })?;

        if tzid.is_some() && matches!(value, DateTime::Utc(_)) {
            return Err(DecodeError::ValueTzidConflict { property: property.to_string(), declared: String::from("UTC") });
        }

        if let Some(declared) = declared_value_type {
            declared
                .validate_against_date_time(&value)
                .map_err(|_| DecodeError::ValueTypeMismatch { property: property.to_string(), value: content_line.raw_value().to_string() })?;
        }

        Ok(Self { value, tzid })
    }

    pub fn encode(&self, property_name: &str) -> ContentLine {
        let mut params = ContentLineParams::default();

        if matches!(self.value, DateTime::LocalDate(_)) {
            params.push("VALUE", "DATE");
        }

        if let Some(tzid) = &self.tzid {
            params.push("TZID", tzid.clone());
        }

        ContentLine(property_name.to_string(), params, self.value.render_ical())
    }
}

/// One decoded property belonging to an item (`VEVENT`/`VTODO`) or calendar. Unknown property
/// names — `ORGANIZER`, `ATTENDEE`, `X-*`, etc. — decode to [`Property::Passive`] holding the
/// original [`ContentLine`] verbatim, in original insertion order with everything else.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Uid(String),
    DtStamp(DateTime),
    DtStart(Anchor),
    DtEnd(Anchor),
    Due(Anchor),
    Duration(Duration),
    Summary(String),
    Description(String),
    Location(String),
    Status(String),
    Sequence(u32),
    Created(DateTime),
    LastModified(DateTime),
    RecurrenceId(Anchor),
    RRule(Recur),
    RDate(Vec<Anchor>),
    ExDate(Vec<Anchor>),
    Categories(Vec<String>),
    Passive(ContentLine),
}

impl Property {
    pub fn decode(content_line: &ContentLine) -> Result<Self, DecodeError> {
        let name = content_line.name().to_ascii_uppercase();

        let property = match name.as_str() {
            "UID" => Property::Uid(unescape_text(content_line.raw_value())),
            "DTSTAMP" => Property::DtStamp(decode_utc(content_line, &name)?),
            "DTSTART" => Property::DtStart(Anchor::decode(content_line, &name)?),
            "DTEND" => Property::DtEnd(Anchor::decode(content_line, &name)?),
            "DUE" => Property::Due(Anchor::decode(content_line, &name)?),
            "DURATION" => Property::Duration(
                Duration::from_str(content_line.raw_value())
                    .map_err(|_| DecodeError::ValueTypeMismatch { property: name.clone(), value: content_line.raw_value().to_string() })?,
            ),
            "SUMMARY" => Property::Summary(unescape_text(content_line.raw_value())),
            "DESCRIPTION" => Property::Description(unescape_text(content_line.raw_value())),
            "LOCATION" => Property::Location(unescape_text(content_line.raw_value())),
            "STATUS" => Property::Status(content_line.raw_value().to_string()),
            "SEQUENCE" => Property::Sequence(
                content_line
                    .raw_value()
                    .parse::<u32>()
                    .map_err(|_| DecodeError::ValueTypeMismatch { property: name.clone(), value: content_line.raw_value().to_string() })?,
            ),
            "CREATED" => Property::Created(decode_utc(content_line, &name)?),
            "LAST-MODIFIED" => Property::LastModified(decode_utc(content_line, &name)?),
            "RECURRENCE-ID" => Property::RecurrenceId(Anchor::decode(content_line, &name)?),
            "RRULE" => Property::RRule(
                Recur::from_str(content_line.raw_value())
                    .map_err(|error| DecodeError::Grammar(error))?,
            ),
            "RDATE" => Property::RDate(decode_date_list(content_line, &name)?),
            "EXDATE" => Property::ExDate(decode_date_list(content_line, &name)?),
            "CATEGORIES" | "RESOURCES" => Property::Categories(
                content_line.raw_value().split(',').map(unescape_text).collect(),
            ),
            _ => Property::Passive(content_line.clone()),
        };

        Ok(property)
    }

    pub fn encode(&self) -> ContentLine {
        match self {
            Property::Uid(value) => ContentLine::from(("UID", vec![], escape_text(value).as_str())),
            Property::DtStamp(value) => ContentLine::from(("DTSTAMP", vec![], value.serialize_ical(None).as_str())),
            Property::DtStart(anchor) => anchor.encode("DTSTART"),
            Property::DtEnd(anchor) => anchor.encode("DTEND"),
            Property::Due(anchor) => anchor.encode("DUE"),
            Property::Duration(duration) => ContentLine::from(("DURATION", vec![], duration.render_ical().as_str())),
            Property::Summary(value) => ContentLine::from(("SUMMARY", vec![], escape_text(value).as_str())),
            Property::Description(value) => ContentLine::from(("DESCRIPTION", vec![], escape_text(value).as_str())),
            Property::Location(value) => ContentLine::from(("LOCATION", vec![], escape_text(value).as_str())),
            Property::Status(value) => ContentLine::from(("STATUS", vec![], value.as_str())),
            Property::Sequence(value) => ContentLine::from(("SEQUENCE", vec![], value.to_string().as_str())),
            Property::Created(value) => ContentLine::from(("CREATED", vec![], value.serialize_ical(None).as_str())),
            Property::LastModified(value) => ContentLine::from(("LAST-MODIFIED", vec![], value.serialize_ical(None).as_str())),
            Property::RecurrenceId(anchor) => anchor.encode("RECURRENCE-ID"),
            Property::RRule(recur) => ContentLine::from(("RRULE", vec![], recur.render_ical().as_str())),
            Property::RDate(anchors) => encode_date_list("RDATE", anchors),
            Property::ExDate(anchors) => encode_date_list("EXDATE", anchors),
            Property::Categories(values) => {
                let joined = values.iter().map(|v| escape_text(v)).collect::<Vec<_>>().join(",");
                ContentLine::from(("CATEGORIES", vec![], joined.as_str()))
            }
            Property::Passive(content_line) => content_line.clone(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Property::Uid(_) => "UID",
            Property::DtStamp(_) => "DTSTAMP",
            Property::DtStart(_) => "DTSTART",
            Property::DtEnd(_) => "DTEND",
            Property::Due(_) => "DUE",
            Property::Duration(_) => "DURATION",
            Property::Summary(_) => "SUMMARY",
            Property::Description(_) => "DESCRIPTION",
            Property::Location(_) => "LOCATION",
            Property::Status(_) => "STATUS",
            Property::Sequence(_) => "SEQUENCE",
            Property::Created(_) => "CREATED",
            Property::LastModified(_) => "LAST-MODIFIED",
            Property::RecurrenceId(_) => "RECURRENCE-ID",
            Property::RRule(_) => "RRULE",
            Property::RDate(_) => "RDATE",
            Property::ExDate(_) => "EXDATE",
            Property::Categories(_) => "CATEGORIES",
            Property::Passive(content_line) => content_line.name(),
        }
    }
}

fn decode_utc(content_line: &ContentLine, property: &str) -> Result<DateTime, DecodeError> {
    let value = DateTime::from_str(content_line.raw_value())
        .map_err(|_| DecodeError::ValueTypeMismatch { property: property.to_string(), value: content_line.raw_value().to_string() })?;

    match value {
        DateTime::Utc(_) => Ok(value),
        _ => Err(DecodeError::ValueTypeMismatch { property: property.to_string(), value: content_line.raw_value().to_string() }),
    }
}

fn decode_date_list(content_line: &ContentLine, property: &str) -> Result<Vec<Anchor>, DecodeError> {
    let tzid = content_line.params().get("TZID").map(str::to_string);

    content_line
        .raw_value()
        .split(',')
        .map(|part| {
            let value = DateTime::from_str(part)
                .map_err(|_| DecodeError::ValueTypeMismatch { property: property.to_string(), value: part.to_string() })?;

            Ok(Anchor { value, tzid: tzid.clone() })
        })
        .collect()
}

fn encode_date_list(name: &str, anchors: &[Anchor]) -> ContentLine {
    let mut params = ContentLineParams::default();

    if anchors.iter().any(|anchor| matches!(anchor.value, DateTime::LocalDate(_))) {
        params.push("VALUE", "DATE");
    }

    if let Some(tzid) = anchors.first().and_then(|anchor| anchor.tzid.clone()) {
        params.push("TZID", tzid);
    }

    let value = anchors.iter().map(|anchor| anchor.value.render_ical()).collect::<Vec<_>>().join(",");

    ContentLine(name.to_string(), params, value)
}

/// `\\` -> `\`, `\,` -> `,`, `\;` -> `;`, `\N`/`\n` -> newline.
pub fn unescape_text(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }

        match chars.next() {
            Some('\\') => output.push('\\'),
            Some(',') => output.push(','),
            Some(';') => output.push(';'),
            Some('n') | Some('N') => output.push('\n'),
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }

    output
}

pub fn escape_text(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '\\' => output.push_str("\\\\"),
            ',' => output.push_str("\\,"),
            ';' => output.push_str("\\;"),
            '\n' => output.push_str("\\n"),
            other => output.push(other),
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_and_passive_properties() {
        let uid = ContentLine::from(("UID", vec![], "19970901T130000Z-123401@example.com"));
        assert_eq!(Property::decode(&uid).unwrap(), Property::Uid(String::from("19970901T130000Z-123401@example.com")));

        let organizer = ContentLine::from(("ORGANIZER", vec![], "mailto:a@example.com"));
        assert_eq!(Property::decode(&organizer).unwrap(), Property::Passive(organizer.clone()));
    }

    #[test]
    fn decode_dtstart_rejects_tzid_with_utc_value() {
        let content_line = ContentLine::from(("DTSTART", vec![("TZID", "Europe/London")], "19970901T130000Z"));

        assert!(matches!(Property::decode(&content_line), Err(DecodeError::ValueTzidConflict { .. })));
    }

    #[test]
    fn round_trips_escaped_text() {
        let raw = r"Line one\nLine two\, with comma";
        let decoded = unescape_text(raw);

        assert_eq!(decoded, "Line one\nLine two, with comma");
        assert_eq!(escape_text(&decoded), raw);
    }

    #[test]
    fn categories_round_trip_as_comma_list() {
        let content_line = ContentLine::from(("CATEGORIES", vec![], "BUSINESS,HUMAN RESOURCES"));
        let property = Property::decode(&content_line).unwrap();

        assert_eq!(property, Property::Categories(vec![String::from("BUSINESS"), String::from("HUMAN RESOURCES")]));
        assert_eq!(property.encode().raw_value(), "BUSINESS,HUMAN RESOURCES");
    }
}
