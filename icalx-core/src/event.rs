//! The `VEVENT` domain type (§3): a timed or all-day item carrying exactly one of `DTEND` or
//! `DURATION`, optionally endowed with a recurrence rule.

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

/// Exactly one of these is ever set on an `Event`, never both (§3, §7's `ValidationError`).
#[derive(Debug, Clone, PartialEq)]
pub enum EventEnd {
    DtEnd(Anchor),
    Duration(IcalDuration),
}

/// A `VEVENT`. `dtstart` is required; an event with `recurrence_id` set is an override belonging
/// to the series named by `uid` (§3's "Series membership").
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub uid: String,
    pub dtstamp: IcalDateTime,
    pub dtstart: Anchor,
    pub end: Option<EventEnd>,
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

impl Event {
    /// A bare master event: UID, DTSTAMP and DTSTART only. Callers populate the rest through the
    /// public fields before handing it to `Store::add`.
    pub fn new(uid: impl Into<String>, dtstamp: IcalDateTime, dtstart: Anchor) -> Self {
        Self {
            uid: uid.into(),
            dtstamp,
            dtstart,
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

    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some() || !self.rdate.is_empty()
    }

    /// Forks this master into a new, independent series: new UID, new `DTSTART`, sequence reset
    /// to zero. Used by the store's `this_and_future` edit when the split point is not the
    /// series' first instance (§4.7).
    pub(crate) fn clone_as_new_series(&self, new_uid: String, new_dtstart: Anchor) -> Self {
        let mut cloned = self.clone();
        cloned.uid = new_uid;
        cloned.dtstart = new_dtstart;
        cloned.sequence = 0;
        cloned.ensure_ordered("UID");
        cloned.ensure_ordered("DTSTART");
        cloned.ensure_ordered("SEQUENCE");
        cloned
    }

    /// Fixed duration of one occurrence, in seconds, derived from `DTEND` or `DURATION`; zero
    /// for an event with neither.
    pub fn duration_seconds(&self, uid_for_errors: &str, tz_lookup: &dyn crate::tz::TimeZoneLookup) -> Result<i64, ValidationError> {
        match &self.end {
            Some(EventEnd::Duration(duration)) => Ok(duration.seconds),
            Some(EventEnd::DtEnd(dtend)) => {
                let start = crate::tz::anchor_instant(&self.dtstart, uid_for_errors, tz_lookup)?;
                let end = crate::tz::anchor_instant(dtend, uid_for_errors, tz_lookup)?;
                Ok(end - start)
            }
            None => Ok(0),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(EventEnd::DtEnd(dtend)) = &self.end {
            if dtend.value.value_type() != self.dtstart.value.value_type() {
                return Err(ValidationError::DateListTypeMismatch { uid: self.uid.clone() });
            }
        }

        if let Some(recur) = &self.rrule {
            if let Some(until) = &recur.until {
                if until.0.value_type() != self.dtstart.value.value_type() {
                    return Err(ValidationError::UntilTypeMismatch { uid: self.uid.clone() });
                }
            }
        }

        for anchor in self.rdate.iter().chain(self.exdate.iter()) {
            if anchor.value.value_type() != self.dtstart.value.value_type() {
                return Err(ValidationError::DateListTypeMismatch { uid: self.uid.clone() });
            }
        }

        Ok(())
    }

    /// Builds the `DTSTART`/`RRULE`/`RDATE`/`EXDATE` text block the `rrule` crate parses to
    /// produce the base occurrence sequence (§4.5). Mirrors the ambient corpus' own trick of
    /// synthesizing an `RDATE` from `DTSTART` when neither `RRULE` nor `RDATE` is present, since
    /// the `rrule` crate refuses to build a set with no date-generation property at all.
    pub fn build_rrule_set(&self) -> Result<rrule::RRuleSet, CoreError> {
        let mut ical_parts: Vec<String> = Vec::new();

        ical_parts.push(Property::DtStart(self.dtstart.clone()).encode().render_ical());

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
            ical_parts.push(Property::RDate(vec![self.dtstart.clone()]).encode().render_ical());
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
        let mut end: Option<EventEnd> = None;
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
                Property::DtEnd(anchor) => {
                    order.mark_typed("DTEND");
                    end = Some(EventEnd::DtEnd(anchor));
                }
                Property::Duration(duration) => {
                    order.mark_typed("DURATION");
                    end = Some(EventEnd::Duration(duration));
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
                Property::Due(_) => {
                    return Err(CoreError::Other(String::from("VEVENT does not accept DUE")));
                }
                Property::Passive(content_line) => {
                    order.push_passive(content_line);
                }
            }
        }

        let uid = uid.ok_or_else(|| CoreError::Other(String::from("VEVENT is missing a required UID")))?;
        let dtstamp = dtstamp.ok_or_else(|| CoreError::Other(format!("event {uid} is missing a required DTSTAMP")))?;
        let dtstart = dtstart.ok_or(ValidationError::MissingDtStart { uid: uid.clone() })?;

        let related_to = order.related_to.clone();

        let event = Event {
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

        event.validate()?;

        Ok(event)
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

        ParsedComponent { name: String::from("VEVENT"), properties, components: Vec::new() }
    }

    fn render_typed(&self, name: &str) -> Option<ContentLine> {
        match name {
            "UID" => Some(Property::Uid(self.uid.clone()).encode()),
            "DTSTAMP" => Some(Property::DtStamp(self.dtstamp.clone()).encode()),
            "DTSTART" => Some(Property::DtStart(self.dtstart.clone()).encode()),
            "DTEND" => match &self.end {
                Some(EventEnd::DtEnd(anchor)) => Some(Property::DtEnd(anchor.clone()).encode()),
                _ => None,
            },
            "DURATION" => match &self.end {
                Some(EventEnd::Duration(duration)) => Some(Property::Duration(*duration).encode()),
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

    /// Marks every scheduling-significant slot as present in the replay order, for items built
    /// programmatically (not decoded) so `encode` still emits them. Called by the store after a
    /// field assignment that wasn't already tracked.
    pub(crate) fn ensure_ordered(&mut self, name: &'static str) {
        self.order.mark_typed(name);
    }

    /// Marks every currently-populated field's canonical RFC 5545 slot as present, in one call.
    /// For events built directly by a test fixture (not decoded, not routed through `Store`),
    /// so `encode` emits the fields the fixture set without the test naming each one through
    /// [`Event::ensure_ordered`] individually.
    pub fn ensure_ordered_for_test(&mut self) {
        self.order.mark_typed("UID");
        self.order.mark_typed("DTSTAMP");
        self.order.mark_typed("DTSTART");
        if self.end.is_some() {
            self.order.mark_typed(match self.end {
                Some(EventEnd::DtEnd(_)) => "DTEND",
                Some(EventEnd::Duration(_)) => "DURATION",
                None => unreachable!(),
            });
        }
        if self.summary.is_some() {
            self.order.mark_typed("SUMMARY");
        }
        if self.description.is_some() {
            self.order.mark_typed("DESCRIPTION");
        }
        if self.location.is_some() {
            self.order.mark_typed("LOCATION");
        }
        if self.status.is_some() {
            self.order.mark_typed("STATUS");
        }
        self.order.mark_typed("SEQUENCE");
        if self.created.is_some() {
            self.order.mark_typed("CREATED");
        }
        if self.last_modified.is_some() {
            self.order.mark_typed("LAST-MODIFIED");
        }
        if self.recurrence_id.is_some() {
            self.order.mark_typed("RECURRENCE-ID");
        }
        if self.rrule.is_some() {
            self.order.mark_typed("RRULE");
        }
        if !self.rdate.is_empty() {
            self.order.mark_typed("RDATE");
        }
        if !self.exdate.is_empty() {
            self.order.mark_typed("EXDATE");
        }
        if !self.categories.is_empty() {
            self.order.mark_typed("CATEGORIES");
        }
    }

    pub(crate) fn push_passive(&mut self, content_line: ContentLine) {
        self.order.push_passive(content_line);
    }

    pub fn passive_properties(&self) -> &[ContentLine] {
        &self.order.passive
    }
}

impl FromStr for Event {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut components = icalx_ical::component::parse_components(&format!("BEGIN:VEVENT\r\n{input}\r\nEND:VEVENT\r\n"))?;

        let component = components.pop().ok_or_else(|| CoreError::Other(String::from("no VEVENT parsed")))?;

        Event::decode(&component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn utc(text: &str) -> IcalDateTime {
        IcalDateTime::from_str(text).unwrap()
    }

    fn anchor(text: &str) -> Anchor {
        Anchor { value: IcalDateTime::from_str(text).unwrap(), tzid: None }
    }

    #[test]
    fn decode_requires_dtstart() {
        let ical = "BEGIN:VEVENT\r\nUID:abc\r\nDTSTAMP:20220829T090000Z\r\nEND:VEVENT\r\n";
        let component = icalx_ical::component::parse_components(ical).unwrap().remove(0);

        assert!(matches!(Event::decode(&component), Err(CoreError::Validation(ValidationError::MissingDtStart { .. }))));
    }

    #[test]
    fn decode_round_trips_unknown_properties_in_order() {
        let ical = "BEGIN:VEVENT\r\nUID:19970901T130000Z-123401@example.com\r\nDTSTAMP:19970901T130000Z\r\nDTSTART:19970903T163000Z\r\nDTEND:19970903T190000Z\r\nSUMMARY:Annual Employee Review\r\nCLASS:PRIVATE\r\nCATEGORIES:BUSINESS,HUMAN RESOURCES\r\nEND:VEVENT\r\n";
        let component = icalx_ical::component::parse_components(ical).unwrap().remove(0);

        let event = Event::decode(&component).unwrap();
        let rendered = event.encode();

        let names: Vec<&str> = rendered.properties.iter().map(|cl| cl.name()).collect();
        assert_eq!(names, vec!["UID", "DTSTAMP", "DTSTART", "DTEND", "SUMMARY", "CLASS", "CATEGORIES"]);
    }

    #[test]
    fn validate_rejects_dtend_value_type_mismatch() {
        let mut event = Event::new("uid-1", utc("20220829T090000Z"), anchor("20220829T090000"));
        event.end = Some(EventEnd::DtEnd(Anchor { value: IcalDateTime::LocalDate(NaiveDate::from_ymd_opt(2022, 8, 29).unwrap()), tzid: None }));

        assert_eq!(event.validate(), Err(ValidationError::DateListTypeMismatch { uid: String::from("uid-1") }));
    }

    #[test]
    fn build_rrule_set_synthesizes_rdate_for_non_recurring_event() {
        let event = Event::new("uid-1", utc("20220829T090000Z"), anchor("20220829T090000"));

        let rrule_set = event.build_rrule_set().unwrap();
        let occurrences: Vec<_> = (&rrule_set).into_iter().collect();

        assert_eq!(occurrences.len(), 1);
    }

    #[test]
    fn duration_seconds_from_dtend() {
        let mut event = Event::new("uid-1", utc("20220829T090000Z"), anchor("20220829T090000"));
        event.end = Some(EventEnd::DtEnd(anchor("20220829T100000")));

        let lookup = crate::tz::ChronoTzDatabase;
        assert_eq!(event.duration_seconds("uid-1", &lookup).unwrap(), 3600);
    }
}
