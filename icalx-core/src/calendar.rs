//! The `VCALENDAR` root container (§3): `PRODID`/`VERSION`, ordered events and to-dos, and
//! everything else (`VTIMEZONE`, `VJOURNAL`, `VFREEBUSY`, unknown components, freestanding
//! calendar-level properties) preserved opaquely in original position for round-trip fidelity.

use icalx_ical::component::ParsedComponent;
use icalx_ical::content_line::ContentLine;

use crate::config::Config;
use crate::error::CoreError;
use crate::event::Event;
use crate::todo::ToDo;

/// Where one top-level `VCALENDAR` child sits in original order.
#[derive(Debug, Clone, Eq, PartialEq)]
enum CalendarSlot {
    Prodid,
    Version,
    Passive(usize),
    Event(usize),
    ToDo(usize),
    Component(usize),
}

/// A decoded calendar. `events`/`todos` are addressable by index for the store; `passive`
/// components (`VTIMEZONE`, `VJOURNAL`, `VFREEBUSY`, anything unrecognized) and freestanding
/// properties round-trip untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Calendar {
    pub prodid: Option<String>,
    pub version: Option<String>,
    pub events: Vec<Event>,
    pub todos: Vec<ToDo>,
    passive_properties: Vec<ContentLine>,
    passive_components: Vec<ParsedComponent>,
    slots: Vec<CalendarSlot>,
}

impl Calendar {
    pub fn new() -> Self {
        Self {
            prodid: None,
            version: None,
            events: Vec::new(),
            todos: Vec::new(),
            passive_properties: Vec::new(),
            passive_components: Vec::new(),
            slots: Vec::new(),
        }
    }

    pub fn passive_components(&self) -> &[ParsedComponent] {
        &self.passive_components
    }

    pub fn passive_properties(&self) -> &[ContentLine] {
        &self.passive_properties
    }

    /// Appends a master event, marking it present in replay order. Used by `Store::add`.
    pub(crate) fn push_event(&mut self, event: Event) {
        self.slots.push(CalendarSlot::Event(self.events.len()));
        self.events.push(event);
    }

    pub(crate) fn push_todo(&mut self, todo: ToDo) {
        self.slots.push(CalendarSlot::ToDo(self.todos.len()));
        self.todos.push(todo);
    }

    /// Appends an event without going through `Store::add`'s UID-uniqueness check or clock
    /// touch, for test fixtures that build a calendar's starting state directly.
    pub fn push_event_for_test(&mut self, event: Event) {
        self.push_event(event);
    }

    /// As [`Calendar::push_event_for_test`], for to-dos.
    pub fn push_todo_for_test(&mut self, todo: ToDo) {
        self.push_todo(todo);
    }

    pub fn encode(&self) -> ParsedComponent {
        let mut properties = Vec::new();
        let mut components = Vec::new();

        for slot in &self.slots {
            match slot {
                CalendarSlot::Prodid => {
                    if let Some(prodid) = &self.prodid {
                        let escaped = icalx_ical::properties::escape_text(prodid);
                        properties.push(ContentLine::from(("PRODID", Vec::new(), escaped.as_str())));
                    }
                }
                CalendarSlot::Version => {
                    if let Some(version) = &self.version {
                        properties.push(ContentLine::from(("VERSION", Vec::new(), version.as_str())));
                    }
                }
                CalendarSlot::Passive(index) => properties.push(self.passive_properties[*index].clone()),
                CalendarSlot::Event(index) => components.push(self.events[*index].encode()),
                CalendarSlot::ToDo(index) => components.push(self.todos[*index].encode()),
                CalendarSlot::Component(index) => components.push(self.passive_components[*index].clone()),
            }
        }

        ParsedComponent { name: String::from("VCALENDAR"), properties, components }
    }

    pub fn render_ical(&self) -> String {
        self.encode().render_ical()
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes RFC 5545 text into a `Calendar` (§6). Under `config.strict_rfc5545 = false` (the
/// default), a `VEVENT`/`VTODO` that fails domain-level validation is preserved as an opaque
/// passive component rather than failing the whole decode, per §7's policy that "decode is
/// all-or-nothing... unless `strict_rfc5545=false`"; only hard syntactic errors (lexer/parser)
/// always fail.
pub fn decode_calendar(text: &str, config: &Config) -> Result<Calendar, CoreError> {
    let mut components = icalx_ical::component::parse_components(text)?;

    let root = components
        .iter()
        .position(|component| component.name.eq_ignore_ascii_case("VCALENDAR"))
        .ok_or_else(|| CoreError::Other(String::from("input contains no VCALENDAR component")))?;

    let root = components.remove(root);

    let mut calendar = Calendar::new();

    for content_line in root.properties {
        if content_line.name().eq_ignore_ascii_case("PRODID") {
            calendar.slots.push(CalendarSlot::Prodid);
            calendar.prodid = Some(icalx_ical::properties::unescape_text(content_line.raw_value()));
        } else if content_line.name().eq_ignore_ascii_case("VERSION") {
            calendar.slots.push(CalendarSlot::Version);
            calendar.version = Some(content_line.raw_value().to_string());
        } else {
            calendar.slots.push(CalendarSlot::Passive(calendar.passive_properties.len()));
            calendar.passive_properties.push(content_line);
        }
    }

    for child in root.components {
        if child.name.eq_ignore_ascii_case("VEVENT") {
            match Event::decode(&child) {
                Ok(event) => {
                    calendar.slots.push(CalendarSlot::Event(calendar.events.len()));
                    calendar.events.push(event);
                }
                Err(error) if config.strict_rfc5545 => return Err(error),
                Err(_) => {
                    calendar.slots.push(CalendarSlot::Component(calendar.passive_components.len()));
                    calendar.passive_components.push(child);
                }
            }
        } else if child.name.eq_ignore_ascii_case("VTODO") {
            match ToDo::decode(&child) {
                Ok(todo) => {
                    calendar.slots.push(CalendarSlot::ToDo(calendar.todos.len()));
                    calendar.todos.push(todo);
                }
                Err(error) if config.strict_rfc5545 => return Err(error),
                Err(_) => {
                    calendar.slots.push(CalendarSlot::Component(calendar.passive_components.len()));
                    calendar.passive_components.push(child);
                }
            }
        } else {
            calendar.slots.push(CalendarSlot::Component(calendar.passive_components.len()));
            calendar.passive_components.push(child);
        }
    }

    Ok(calendar)
}

/// Serializes a `Calendar` back to RFC 5545 text, CRLF-terminated and line-folded at 75 octets
/// (§4.1, §6).
pub fn encode_calendar(calendar: &Calendar) -> String {
    calendar.render_ical()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_calendar_requires_vcalendar_root() {
        let result = decode_calendar("BEGIN:VEVENT\r\nEND:VEVENT\r\n", &Config::default());

        assert!(matches!(result, Err(CoreError::Other(_))));
    }

    #[test]
    fn decode_calendar_parses_prodid_version_and_event() {
        let ical = "BEGIN:VCALENDAR\r\nPRODID:-//Example//EN\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:u1@example.com\r\nDTSTAMP:19970901T130000Z\r\nDTSTART:19970903T163000Z\r\nDTEND:19970903T190000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

        let calendar = decode_calendar(ical, &Config::default()).unwrap();

        assert_eq!(calendar.prodid.as_deref(), Some("-//Example//EN"));
        assert_eq!(calendar.version.as_deref(), Some("2.0"));
        assert_eq!(calendar.events.len(), 1);
        assert_eq!(calendar.events[0].uid, "u1@example.com");
    }

    #[test]
    fn decode_calendar_preserves_unknown_components() {
        let ical = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VTIMEZONE\r\nTZID:Europe/London\r\nEND:VTIMEZONE\r\nEND:VCALENDAR\r\n";

        let calendar = decode_calendar(ical, &Config::default()).unwrap();

        assert_eq!(calendar.passive_components().len(), 1);
        assert_eq!(calendar.passive_components()[0].name, "VTIMEZONE");
    }

    #[test]
    fn non_strict_decode_preserves_an_invalid_event_as_passive() {
        let ical = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:broken@example.com\r\nDTSTAMP:19970901T130000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

        let calendar = decode_calendar(ical, &Config::default()).unwrap();

        assert!(calendar.events.is_empty());
        assert_eq!(calendar.passive_components().len(), 1);
    }

    #[test]
    fn strict_decode_rejects_an_invalid_event() {
        let ical = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:broken@example.com\r\nDTSTAMP:19970901T130000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

        let config = Config { strict_rfc5545: true, ..Config::default() };

        assert!(decode_calendar(ical, &config).is_err());
    }

    #[test]
    fn encode_round_trips_prodid_version_and_event_order() {
        let ical = "BEGIN:VCALENDAR\r\nPRODID:-//Example//EN\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:u1@example.com\r\nDTSTAMP:19970901T130000Z\r\nDTSTART:19970903T163000Z\r\nDTEND:19970903T190000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

        let calendar = decode_calendar(ical, &Config::default()).unwrap();
        let rendered = encode_calendar(&calendar);

        assert!(rendered.starts_with("BEGIN:VCALENDAR\r\nPRODID:-//Example//EN\r\nVERSION:2.0\r\n"));
        assert!(rendered.contains("BEGIN:VEVENT\r\n"));
        assert!(rendered.ends_with("END:VCALENDAR\r\n"));
    }
}
