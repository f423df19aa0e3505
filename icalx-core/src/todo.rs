//! The `VTODO` domain type (§3): unlike `Event`, `DTSTART` is optional and the end is expressed
//! as `DUE` or `DURATION` (never both, and `DURATION` requires `DTSTART` per RFC 5545).

use std::str::FromStr;

use icalx_ical::component::ParsedComponent;
use icalx_ical::content_line::ContentLine;
use icalx_ical::properties::{Anchor, Property};
use icalx_ical::values::date_time::DateTime as IcalDateTime;
use icalx_ical::values::duration::Duration as IcalDuration;
use icalx_ical::values::recur::Recur;
use icalx_ical::ICalendarEntity;

use crate::error::{CoreError, ValidationError};
use crate::item::{OrderSlot, PropertyOrder, RelatedTo};

/// Exactly one of these is ever set on a `ToDo` that has one at all (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum ToDoEnd {
    Due(Anchor),
    Duration(IcalDuration),
}

/// A `VTODO`. `dtstart` is optional (a to-do may carry only a `DUE`), unlike `Event`'s required
/// `DTSTART`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToDo {
    pub uid: String,
    pub dtstamp: IcalDateTime,
    pub dtstart: Option<Anchor>,
    pub end: Option<ToDoEnd>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub sequence: u32,
    pub created: Option<IcalDateTime>,
    pub last_modified: Option<IcalDateTime>,
    pub recurrence_id: Option<Anchor>,
    pub rrule: Option<Recur>,
    pub rdate: Vec<Anchor>,
    pub exdate: Vec<Anchor>,
    pub categories: Vec<String>,
    pub related_to: Vec<RelatedTo>,
    order: PropertyOrder,
}

impl ToDo {
    pub fn new(uid: impl Into<String>, dtstamp: IcalDateTime) -> Self {
        Self {
            uid: uid.into(),
            dtstamp,
            dtstart: None,
            end: None,
            summary: None,
            description: None,
            location: None,
            status: None,
            sequence: 0,
            created: None,
            last_modified: None,
            recurrence_id: None,
            rrule: None,
            rdate: Vec::new(),
            exdate: Vec::new(),
            categories: Vec::new(),
            related_to: Vec::new(),
            order: PropertyOrder::new(),
        }
    }

    pub fn is_master(&self) -> bool {
        self.recurrence_id.is_none()
    }

    /// A to-do only participates in the recurrence engine when it both recurs and has a
    /// `DTSTART` to anchor the expansion from (§4.5: recurrence needs a start, and RFC 5545
    /// permits a `VTODO` with neither).
    pub fn is_recurring(&self) -> bool {
        self.dtstart.is_some() && (self.rrule.is_some() || !self.rdate.is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(ToDoEnd::Duration(_)), None) = (&self.end, &self.dtstart) {
            return Err(ValidationError::MissingDtStart { uid: self.uid.clone() });
        }

        if let Some(dtstart) = &self.dtstart {
            if let Some(ToDoEnd::Due(due)) = &self.end {
                if due.value.value_type() != dtstart.value.value_type() {
                    return Err(ValidationError::DateListTypeMismatch { uid: self.uid.clone() });
                }
            }

            if let Some(recur) = &self.rrule {
                if let Some(until) = &recur.until {
                    if until.0.value_type() != dtstart.value.value_type() {
                        return Err(ValidationError::UntilTypeMismatch { uid: self.uid.clone() });
                    }
                }
            }

            for anchor in self.rdate.iter().chain(self.exdate.iter()) {
                if anchor.value.value_type() != dtstart.value.value_type() {
                    return Err(ValidationError::DateListTypeMismatch { uid: self.uid.clone() });
                }
            }
        } else if self.rrule.is_some() || !self.rdate.is_empty() {
            return Err(ValidationError::MissingDtStart { uid: self.uid.clone() });
        }

        Ok(())
    }

    /// Same `rrule` crate bridge as `Event::build_rrule_set`, only ever called once
    /// `is_recurring()` has confirmed a `DTSTART` is present.
    pub fn build_rrule_set(&self) -> Result<rrule::RRuleSet, CoreError> {
        let dtstart = self
            .dtstart
            .as_ref()
            .ok_or_else(|| CoreError::Other(format!("to-do {} has no DTSTART to expand from", self.uid)))?;

        let mut ical_parts: Vec<String> = Vec::new();
        ical_parts.push(Property::DtStart(dtstart.clone()).encode().render_ical());

        if let Some(recur) = &self.rrule {
            ical_parts.push(Property::RRule(recur.clone()).encode().render_ical());
        }

        if !self.rdate.is_empty() {
            ical_parts.push(Property::RDate(self.rdate.clone()).encode().render_ical());
        }

        if !self.exdate.is_empty() {
            ical_parts.push(Property::ExDate(self.exdate.clone()).encode().render_ical());
        }

        if self.rrule.is_none() && self.rdate.is_empty() {
            ical_parts.push(Property::RDate(vec![dtstart.clone()]).encode().render_ical());
        }

        ical_parts
            .join("\n")
            .parse::<rrule::RRuleSet>()
            .map_err(|error| CoreError::Recurrence(crate::error::RecurrenceError::Engine(error.to_string())))
    }

    pub fn decode(component: &ParsedComponent) -> Result<Self, CoreError> {
        let mut order = PropertyOrder::new();

        let mut uid: Option<String> = None;
        let mut dtstamp: Option<IcalDateTime> = None;
        let mut dtstart: Option<Anchor> = None;
        let mut end: Option<ToDoEnd> = None;
        let mut summary = None;
        let mut description = None;
        let mut location = None;
        let mut status = None;
        let mut sequence = 0u32;
        let mut created = None;
        let mut last_modified = None;
        let mut recurrence_id = None;
        let mut rrule = None;
        let mut rdate: Vec<Anchor> = Vec::new();
        let mut exdate: Vec<Anchor> = Vec::new();
        let mut categories: Vec<String> = Vec::new();

        for content_line in &component.properties {
            let property = Property::decode(content_line)?;

            match property {
                Property::Uid(value) => {
                    order.mark_typed("UID");
                    uid = Some(value);
                }
                Property::DtStamp(value) => {
                    order.mark_typed("DTSTAMP");
                    dtstamp = Some(value);
                }
                Property::DtStart(anchor) => {
                    order.mark_typed("DTSTART");
                    dtstart = Some(anchor);
                }
                Property::Due(anchor) => {
                    order.mark_typed("DUE");
                    end = Some(ToDoEnd::Due(anchor));
                }
                Property::Duration(duration) => {
                    order.mark_typed("DURATION");
                    end = Some(ToDoEnd::Duration(duration));
                }
                Property::Summary(value) => {
                    order.mark_typed("SUMMARY");
                    summary = Some(value);
                }
                Property::Description(value) => {
                    order.mark_typed("DESCRIPTION");
                    description = Some(value);
                }
                Property::Location(value) => {
                    order.mark_typed("LOCATION");
                    location = Some(value);
                }
                Property::Status(value) => {
                    order.mark_typed("STATUS");
                    status = Some(value);
                }
                Property::Sequence(value) => {
                    order.mark_typed("SEQUENCE");
                    sequence = value;
                }
                Property::Created(value) => {
                    order.mark_typed("CREATED");
                    created = Some(value);
                }
                Property::LastModified(value) => {
                    order.mark_typed("LAST-MODIFIED");
                    last_modified = Some(value);
                }
                Property::RecurrenceId(anchor) => {
                    order.mark_typed("RECURRENCE-ID");
                    recurrence_id = Some(anchor);
                }
                Property::RRule(recur) => {
                    order.mark_typed("RRULE");
                    rrule = Some(recur);
                }
                Property::RDate(mut anchors) => {
                    order.mark_typed("RDATE");
                    rdate.append(&mut anchors);
                }
                Property::ExDate(mut anchors) => {
                    order.mark_typed("EXDATE");
                    exdate.append(&mut anchors);
                }
                Property::Categories(mut values) => {
                    order.mark_typed("CATEGORIES");
                    categories.append(&mut values);
                }
                Property::DtEnd(_) => {
                    return Err(CoreError::Other(String::from("VTODO does not accept DTEND")));
                }
                Property::Passive(content_line) => {
                    order.push_passive(content_line);
                }
            }
        }

        let uid = uid.ok_or_else(|| CoreError::Other(String::from("VTODO is missing a required UID")))?;
        let dtstamp = dtstamp.ok_or_else(|| CoreError::Other(format!("to-do {uid} is missing a required DTSTAMP")))?;

        let related_to = order.related_to.clone();

        let todo = ToDo {
            uid,
            dtstamp,
            dtstart,
            end,
            summary,
            description,
            location,
            status,
            sequence,
            created,
            last_modified,
            recurrence_id,
            rrule,
            rdate,
            exdate,
            categories,
            related_to,
            order,
        };

        todo.validate()?;

        Ok(todo)
    }

    pub fn encode(&self) -> ParsedComponent {
        let mut properties = Vec::with_capacity(self.order.slots().len());

        for slot in self.order.slots() {
            match slot {
                OrderSlot::Passive(index) => properties.push(self.order.passive[*index].clone()),
                OrderSlot::Typed(name) => {
                    if let Some(content_line) = self.render_typed(name) {
                        properties.push(content_line);
                    }
                }
            }
        }

        ParsedComponent { name: String::from("VTODO"), properties, components: Vec::new() }
    }

    fn render_typed(&self, name: &str) -> Option<ContentLine> {
        match name {
            "UID" => Some(Property::Uid(self.uid.clone()).encode()),
            "DTSTAMP" => Some(Property::DtStamp(self.dtstamp.clone()).encode()),
            "DTSTART" => self.dtstart.clone().map(|anchor| Property::DtStart(anchor).encode()),
            "DUE" => match &self.end {
                Some(ToDoEnd::Due(anchor)) => Some(Property::Due(anchor.clone()).encode()),
                _ => None,
            },
            "DURATION" => match &self.end {
                Some(ToDoEnd::Duration(duration)) => Some(Property::Duration(*duration).encode()),
                _ => None,
            },
            "SUMMARY" => self.summary.clone().map(|value| Property::Summary(value).encode()),
            "DESCRIPTION" => self.description.clone().map(|value| Property::Description(value).encode()),
            "LOCATION" => self.location.clone().map(|value| Property::Location(value).encode()),
            "STATUS" => self.status.clone().map(|value| Property::Status(value).encode()),
            "SEQUENCE" => Some(Property::Sequence(self.sequence).encode()),
            "CREATED" => self.created.clone().map(|value| Property::Created(value).encode()),
            "LAST-MODIFIED" => self.last_modified.clone().map(|value| Property::LastModified(value).encode()),
            "RECURRENCE-ID" => self.recurrence_id.clone().map(|anchor| Property::RecurrenceId(anchor).encode()),
            "RRULE" => self.rrule.clone().map(|recur| Property::RRule(recur).encode()),
            "RDATE" => {
                if self.rdate.is_empty() {
                    None
                } else {
                    Some(Property::RDate(self.rdate.clone()).encode())
                }
            }
            "EXDATE" => {
                if self.exdate.is_empty() {
                    None
                } else {
                    Some(Property::ExDate(self.exdate.clone()).encode())
                }
            }
            "CATEGORIES" => {
                if self.categories.is_empty() {
                    None
                } else {
                    Some(Property::Categories(self.categories.clone()).encode())
                }
            }
            _ => None,
        }
    }

    pub(crate) fn ensure_ordered(&mut self, name: &'static str) {
        self.order.mark_typed(name);
    }

    pub(crate) fn push_passive(&mut self, content_line: ContentLine) {
        self.order.push_passive(content_line);
    }

    pub fn passive_properties(&self) -> &[ContentLine] {
        &self.order.passive
    }
}

impl FromStr for ToDo {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut components = icalx_ical::component::parse_components(&format!("BEGIN:VTODO\r\n{input}\r\nEND:VTODO\r\n"))?;

        let component = components.pop().ok_or_else(|| CoreError::Other(String::from("no VTODO parsed")))?;

        ToDo::decode(&component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(text: &str) -> IcalDateTime {
        IcalDateTime::from_str(text).unwrap()
    }

    fn anchor(text: &str) -> Anchor {
        Anchor { value: IcalDateTime::from_str(text).unwrap(), tzid: None }
    }

    #[test]
    fn decode_allows_missing_dtstart() {
        let ical = "BEGIN:VTODO\r\nUID:todo-1@example.com\r\nDTSTAMP:19980130T134500Z\r\nDUE:19980415T000000\r\nSUMMARY:Submit Income Taxes\r\nEND:VTODO\r\n";
        let component = icalx_ical::component::parse_components(ical).unwrap().remove(0);

        let todo = ToDo::decode(&component).unwrap();
        assert!(todo.dtstart.is_none());
        assert_eq!(todo.end, Some(ToDoEnd::Due(anchor("19980415T000000"))));
    }

    #[test]
    fn validate_rejects_duration_without_dtstart() {
        let mut todo = ToDo::new("todo-1", utc("19980130T134500Z"));
        todo.end = Some(ToDoEnd::Duration(IcalDuration { seconds: 3600 }));

        assert_eq!(todo.validate(), Err(ValidationError::MissingDtStart { uid: String::from("todo-1") }));
    }

    #[test]
    fn validate_rejects_rrule_without_dtstart() {
        let mut todo = ToDo::new("todo-1", utc("19980130T134500Z"));
        todo.rrule = Some(Recur::from_str("FREQ=DAILY").unwrap());

        assert_eq!(todo.validate(), Err(ValidationError::MissingDtStart { uid: String::from("todo-1") }));
    }

    #[test]
    fn is_recurring_requires_both_dtstart_and_rule() {
        let mut todo = ToDo::new("todo-1", utc("19980130T134500Z"));
        assert!(!todo.is_recurring());

        todo.dtstart = Some(anchor("19980130T134500"));
        todo.rrule = Some(Recur::from_str("FREQ=DAILY").unwrap());
        assert!(todo.is_recurring());
    }

    #[test]
    fn decode_round_trips_properties_in_order() {
        let ical = "BEGIN:VTODO\r\nUID:todo-2@example.com\r\nDTSTAMP:19980130T134500Z\r\nSUMMARY:Submit Income Taxes\r\nDUE:19980415T000000\r\nEND:VTODO\r\n";
        let component = icalx_ical::component::parse_components(ical).unwrap().remove(0);

        let todo = ToDo::decode(&component).unwrap();
        let rendered = todo.encode();

        let names: Vec<&str> = rendered.properties.iter().map(|cl| cl.name()).collect();
        assert_eq!(names, vec!["UID", "DTSTAMP", "SUMMARY", "DUE"]);
    }
}
