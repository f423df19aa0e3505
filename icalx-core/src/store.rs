//! The mutation store (§4.7): mediates edits to a `Calendar`'s series, maintaining `SEQUENCE`,
//! `DTSTAMP`, `LAST-MODIFIED`, `EXDATE` and `UNTIL` invariants across the three edit/delete modes.

use std::collections::HashSet;
use std::ops::Bound;

use chrono::TimeZone as _;
use chrono_tz::Tz;

use icalx_ical::properties::Anchor;
use icalx_ical::values::date_time::{DateTime as IcalDateTime, ValueType};
use icalx_ical::values::recur::{Recur, UntilParam};

use crate::calendar::Calendar;
use crate::clock::Clock;
use crate::error::{CoreError, StoreError, ValidationError};
use crate::event::{Event, EventEnd};
use crate::todo::ToDo;
use crate::tz::TimeZoneLookup;

/// Which instances of a series an edit or delete applies to (§4.7).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EditMode {
    This,
    ThisAndFuture,
    All,
}

pub type DeleteMode = EditMode;

/// A patch applied to an event by [`Store::edit`]. Every field is "set if `Some`, leave
/// unchanged if `None`" — there is no way to clear a field back to absent through an edit,
/// matching the scenarios this store is exercised against (§8 S4/S5).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditChanges {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub dtstart: Option<Anchor>,
    pub end: Option<EventEnd>,
    pub rrule: Option<Recur>,
    /// Required when a `this_and_future` edit on a non-first instance needs to fork the tail
    /// into a new series (§4.7: "clone the master into a new series with a *new UID*"); the
    /// store has no UID-generation facility of its own.
    pub new_uid: Option<String>,
}

impl EditChanges {
    /// §4.7's scheduling-significant field list, used to decide whether `SEQUENCE` increments.
    fn is_scheduling_significant(&self) -> bool {
        self.summary.is_some() || self.location.is_some() || self.status.is_some() || self.dtstart.is_some() || self.end.is_some() || self.rrule.is_some()
    }

    fn apply_to(&self, event: &mut Event) {
        if let Some(summary) = &self.summary {
            event.summary = Some(summary.clone());
            event.ensure_ordered("SUMMARY");
        }
        if let Some(description) = &self.description {
            event.description = Some(description.clone());
            event.ensure_ordered("DESCRIPTION");
        }
        if let Some(location) = &self.location {
            event.location = Some(location.clone());
            event.ensure_ordered("LOCATION");
        }
        if let Some(status) = &self.status {
            event.status = Some(status.clone());
            event.ensure_ordered("STATUS");
        }
        if let Some(dtstart) = &self.dtstart {
            event.dtstart = dtstart.clone();
            event.ensure_ordered("DTSTART");
        }
        if let Some(end) = &self.end {
            event.end = Some(end.clone());
            event.ensure_ordered(match end {
                EventEnd::DtEnd(_) => "DTEND",
                EventEnd::Duration(_) => "DURATION",
            });
        }
        if let Some(rrule) = &self.rrule {
            event.rrule = Some(rrule.clone());
            event.ensure_ordered("RRULE");
        }
    }
}

/// Wraps a `Calendar` and mediates every mutation through it, per §4.7.
pub struct Store<'a> {
    calendar: &'a mut Calendar,
    clock: &'a dyn Clock,
    tz_lookup: &'a dyn TimeZoneLookup,
}

impl<'a> Store<'a> {
    pub fn new(calendar: &'a mut Calendar, clock: &'a dyn Clock, tz_lookup: &'a dyn TimeZoneLookup) -> Self {
        Self { calendar, clock, tz_lookup }
    }

    pub fn calendar(&self) -> &Calendar {
        self.calendar
    }

    fn now_utc(&self) -> IcalDateTime {
        IcalDateTime::Utc(self.clock.now())
    }

    fn touch(&self, event: &mut Event) {
        event.dtstamp = self.now_utc();
        event.last_modified = Some(self.now_utc());
        event.ensure_ordered("DTSTAMP");
        event.ensure_ordered("LAST-MODIFIED");
    }

    /// Appends a master event; masters must have a UID no other master already uses.
    pub fn add(&mut self, mut event: Event) -> Result<(), CoreError> {
        if event.is_master() && self.calendar.events.iter().any(|existing| existing.is_master() && existing.uid == event.uid) {
            return Err(CoreError::Store(StoreError::DuplicateUid(event.uid.clone())));
        }

        event.validate()?;
        self.touch(&mut event);
        self.calendar.push_event(event);

        Ok(())
    }

    pub fn add_todo(&mut self, mut todo: ToDo) -> Result<(), CoreError> {
        if todo.is_master() && self.calendar.todos.iter().any(|existing| existing.is_master() && existing.uid == todo.uid) {
            return Err(CoreError::Store(StoreError::DuplicateUid(todo.uid.clone())));
        }

        todo.validate()?;
        todo.dtstamp = self.now_utc();
        todo.last_modified = Some(self.now_utc());
        todo.ensure_ordered("DTSTAMP");
        todo.ensure_ordered("LAST-MODIFIED");
        self.calendar.push_todo(todo);

        Ok(())
    }

    fn master_index(&self, uid: &str) -> Option<usize> {
        self.calendar.events.iter().position(|event| event.uid == uid && event.is_master())
    }

    fn override_index(&self, uid: &str, recurrence_id: i64) -> Result<Option<usize>, CoreError> {
        let master_dtstart = self.master_index(uid).map(|index| self.calendar.events[index].dtstart.clone());

        for (index, event) in self.calendar.events.iter().enumerate() {
            if event.uid != uid {
                continue;
            }
            let Some(event_recurrence_id) = &event.recurrence_id else { continue };

            let instant = match &master_dtstart {
                Some(dtstart) => crate::timeline::recurrence_instant(event_recurrence_id, dtstart, uid, self.tz_lookup)?,
                None => crate::tz::anchor_instant(event_recurrence_id, uid, self.tz_lookup).map_err(CoreError::Validation)?,
            };

            if instant == recurrence_id {
                return Ok(Some(index));
            }
        }

        Ok(None)
    }

    /// Deletes one instance, the tail of a series, or an entire series, per §4.7.
    pub fn delete(&mut self, uid: &str, recurrence_id: Option<i64>, mode: DeleteMode) -> Result<(), CoreError> {
        match mode {
            DeleteMode::All => {
                self.calendar.events.retain(|event| event.uid != uid);
                self.cascade_delete_children(uid);
                Ok(())
            }
            DeleteMode::This => match recurrence_id {
                None => {
                    let index = self.master_index(uid).ok_or_else(|| CoreError::Store(StoreError::TargetNotFound { uid: uid.to_string(), recurrence_id: None }))?;

                    if self.calendar.events[index].is_recurring() {
                        return Err(CoreError::Store(StoreError::ModeIncompatibleWithItem { uid: uid.to_string(), mode: "this (no recurrence-id, recurring master)" }));
                    }

                    self.calendar.events.remove(index);
                    self.cascade_delete_children(uid);
                    Ok(())
                }
                Some(instant) => {
                    let master_index = self.master_index(uid).ok_or_else(|| CoreError::Store(StoreError::TargetNotFound { uid: uid.to_string(), recurrence_id: Some(instant) }))?;

                    let master_dtstart = self.calendar.events[master_index].dtstart.clone();
                    let exdate_anchor = anchor_from_instant(instant, &master_dtstart, self.tz_lookup)?;
                    self.calendar.events[master_index].exdate.push(exdate_anchor);
                    self.calendar.events[master_index].ensure_ordered("EXDATE");
                    self.touch_index(master_index);

                    prune_overrides_from(self.calendar, uid, (Bound::Included(instant), Bound::Included(instant)), self.tz_lookup)?;

                    Ok(())
                }
            },
            DeleteMode::ThisAndFuture => {
                let instant = recurrence_id.ok_or_else(|| CoreError::Store(StoreError::TargetNotFound { uid: uid.to_string(), recurrence_id: None }))?;
                let master_index = self.master_index(uid).ok_or_else(|| CoreError::Store(StoreError::TargetNotFound { uid: uid.to_string(), recurrence_id: Some(instant) }))?;

                let master_dtstart_instant = crate::tz::anchor_instant(&self.calendar.events[master_index].dtstart, uid, self.tz_lookup).map_err(CoreError::Validation)?;

                if instant == master_dtstart_instant {
                    self.calendar.events.retain(|event| event.uid != uid);
                    self.cascade_delete_children(uid);
                } else {
                    let all_day = self.calendar.events[master_index].dtstart.value.value_type() == ValueType::Date;
                    let boundary = if all_day { instant - 86_400 } else { instant - 1 };
                    let value_type = self.calendar.events[master_index].dtstart.value.value_type();

                    if let Some(rrule) = self.calendar.events[master_index].rrule.as_mut() {
                        rrule.until = Some(UntilParam(until_value(boundary, value_type)));
                        rrule.count = None;
                    }
                    self.calendar.events[master_index].ensure_ordered("RRULE");
                    self.touch_index(master_index);

                    prune_overrides_from(self.calendar, uid, (Bound::Included(instant), Bound::Unbounded), self.tz_lookup)?;
                }

                Ok(())
            }
        }
    }

    /// Edits one instance, the tail of a series (possibly forking a new series), or the whole
    /// series in place, per §4.7.
    pub fn edit(&mut self, uid: &str, recurrence_id: Option<i64>, changes: EditChanges, mode: EditMode) -> Result<(), CoreError> {
        match mode {
            EditMode::This => {
                let instant = recurrence_id.ok_or_else(|| CoreError::Store(StoreError::TargetNotFound { uid: uid.to_string(), recurrence_id: None }))?;
                self.edit_this(uid, instant, changes)
            }
            EditMode::All => self.edit_all(uid, changes),
            EditMode::ThisAndFuture => match recurrence_id {
                None => self.edit_all(uid, changes),
                Some(instant) => self.edit_this_and_future(uid, instant, changes),
            },
        }
    }

    fn edit_this(&mut self, uid: &str, instant: i64, changes: EditChanges) -> Result<(), CoreError> {
        let master_index = self.master_index(uid).ok_or_else(|| CoreError::Store(StoreError::TargetNotFound { uid: uid.to_string(), recurrence_id: Some(instant) }))?;
        let master_dtstart = self.calendar.events[master_index].dtstart.clone();

        if !self.calendar.events[master_index].is_recurring() {
            return Err(CoreError::Store(StoreError::ModeIncompatibleWithItem { uid: uid.to_string(), mode: "this (non-recurring master)" }));
        }

        let scheduling_significant = changes.is_scheduling_significant();

        let existing_index = self.override_index(uid, instant)?;

        let mut override_event = match existing_index {
            Some(index) => self.calendar.events.remove(index),
            None => {
                let recurrence_id_anchor = anchor_from_instant(instant, &master_dtstart, self.tz_lookup)?;
                let mut event = Event::new(uid, self.now_utc(), recurrence_id_anchor.clone());
                event.recurrence_id = Some(recurrence_id_anchor);
                event.end = self.calendar.events[master_index].end.clone();
                event.summary = self.calendar.events[master_index].summary.clone();
                event.description = self.calendar.events[master_index].description.clone();
                event.location = self.calendar.events[master_index].location.clone();
                event.status = self.calendar.events[master_index].status.clone();
                event.ensure_ordered("UID");
                event.ensure_ordered("DTSTAMP");
                event.ensure_ordered("DTSTART");
                event.ensure_ordered("RECURRENCE-ID");
                event
            }
        };

        changes.apply_to(&mut override_event);
        override_event.validate()?;

        self.touch(&mut override_event);
        if scheduling_significant {
            override_event.sequence += 1;
            override_event.ensure_ordered("SEQUENCE");
        }

        self.calendar.push_event(override_event);

        Ok(())
    }

    fn edit_all(&mut self, uid: &str, changes: EditChanges) -> Result<(), CoreError> {
        let master_index = self.master_index(uid).ok_or_else(|| CoreError::Store(StoreError::TargetNotFound { uid: uid.to_string(), recurrence_id: None }))?;

        let scheduling_significant = changes.is_scheduling_significant();
        let rule_changed = changes.rrule.is_some() || changes.dtstart.is_some();

        changes.apply_to(&mut self.calendar.events[master_index]);
        self.calendar.events[master_index].validate()?;
        self.touch_index(master_index);

        if scheduling_significant {
            self.calendar.events[master_index].sequence += 1;
            self.calendar.events[master_index].ensure_ordered("SEQUENCE");
        }

        if rule_changed {
            self.drop_overrides_outside_expansion(uid)?;
        }

        Ok(())
    }

    fn edit_this_and_future(&mut self, uid: &str, instant: i64, changes: EditChanges) -> Result<(), CoreError> {
        let master_index = self.master_index(uid).ok_or_else(|| CoreError::Store(StoreError::TargetNotFound { uid: uid.to_string(), recurrence_id: Some(instant) }))?;
        let master_dtstart_instant = crate::tz::anchor_instant(&self.calendar.events[master_index].dtstart, uid, self.tz_lookup).map_err(CoreError::Validation)?;

        if instant == master_dtstart_instant {
            return self.edit_all(uid, changes);
        }

        let new_uid = changes.new_uid.clone().ok_or_else(|| CoreError::Other(String::from("this_and_future edit on a non-first instance requires EditChanges::new_uid")))?;

        let all_day = self.calendar.events[master_index].dtstart.value.value_type() == ValueType::Date;
        let boundary = if all_day { instant - 86_400 } else { instant - 1 };
        let value_type = self.calendar.events[master_index].dtstart.value.value_type();

        let new_dtstart = changes.dtstart.clone().unwrap_or_else(|| anchor_from_instant(instant, &self.calendar.events[master_index].dtstart, self.tz_lookup).expect("instant derived from this series' own anchor shape"));

        // Clone before truncating the master's RRULE below, so the forked tail inherits the
        // original (unbounded) rule rather than the UNTIL boundary meant for the master only.
        let mut new_series = self.calendar.events[master_index].clone_as_new_series(new_uid.clone(), new_dtstart);
        changes.apply_to(&mut new_series);
        new_series.validate()?;
        self.touch(&mut new_series);

        if let Some(rrule) = self.calendar.events[master_index].rrule.as_mut() {
            rrule.until = Some(UntilParam(until_value(boundary, value_type)));
            rrule.count = None;
        }
        self.calendar.events[master_index].ensure_ordered("RRULE");
        self.touch_index(master_index);

        let migrated = prune_overrides_from(self.calendar, uid, (Bound::Included(instant), Bound::Unbounded), self.tz_lookup)?;

        self.calendar.push_event(new_series);

        for mut override_event in migrated {
            override_event.uid = new_uid.clone();
            override_event.ensure_ordered("UID");
            self.calendar.push_event(override_event);
        }

        Ok(())
    }

    fn drop_overrides_outside_expansion(&mut self, uid: &str) -> Result<(), CoreError> {
        let Some(master_index) = self.master_index(uid) else { return Ok(()) };
        let master = &self.calendar.events[master_index];

        if !master.is_recurring() {
            return Ok(());
        }

        let rrule_set = master.build_rrule_set()?;
        let candidates: HashSet<i64> = crate::occurrence::expand_occurrences(master.rrule.as_ref(), &rrule_set, 100_000, None).map_err(CoreError::Recurrence)?.into_iter().collect();
        let master_dtstart = master.dtstart.clone();

        let mut keep = Vec::with_capacity(self.calendar.events.len());
        for event in self.calendar.events.drain(..) {
            if event.uid == uid && event.recurrence_id.is_some() {
                let recurrence_id = event.recurrence_id.as_ref().unwrap();
                let instant = crate::timeline::recurrence_instant(recurrence_id, &master_dtstart, uid, self.tz_lookup)?;

                if !candidates.contains(&instant) {
                    continue;
                }
            }
            keep.push(event);
        }
        self.calendar.events = keep;

        Ok(())
    }

    fn cascade_delete_children(&mut self, parent_uid: &str) {
        let mut visited = HashSet::new();
        let mut queue = vec![parent_uid.to_string()];

        while let Some(uid) = queue.pop() {
            if !visited.insert(uid.clone()) {
                continue;
            }

            let child_uids: Vec<String> =
                self.calendar.todos.iter().filter(|todo| todo.related_to.iter().any(|related| related.is_parent() && related.uid == uid)).map(|todo| todo.uid.clone()).collect();

            for child_uid in &child_uids {
                self.calendar.todos.retain(|todo| &todo.uid != child_uid);
                queue.push(child_uid.clone());
            }
        }
    }

    fn touch_index(&mut self, index: usize) {
        let now = self.now_utc();
        self.calendar.events[index].dtstamp = now.clone();
        self.calendar.events[index].last_modified = Some(now);
        self.calendar.events[index].ensure_ordered("DTSTAMP");
        self.calendar.events[index].ensure_ordered("LAST-MODIFIED");
    }
}

/// Converts a unix instant back into an `Anchor` matching `reference`'s shape (date, floating
/// local, or zoned local) — the inverse of [`crate::tz::anchor_instant`], needed to turn a
/// timeline instant back into an `EXDATE`/`RECURRENCE-ID` value.
fn anchor_from_instant(instant: i64, reference: &Anchor, tz_lookup: &dyn TimeZoneLookup) -> Result<Anchor, CoreError> {
    match &reference.value {
        IcalDateTime::LocalDate(_) => {
            let naive = Tz::UTC.timestamp_opt(instant, 0).unwrap().naive_utc();
            Ok(Anchor { value: IcalDateTime::LocalDate(naive.date()), tzid: None })
        }
        IcalDateTime::Utc(_) => {
            let naive = Tz::UTC.timestamp_opt(instant, 0).unwrap().naive_utc();
            Ok(Anchor { value: IcalDateTime::Utc(naive), tzid: None })
        }
        IcalDateTime::Local(_) => match &reference.tzid {
            Some(tzid) => {
                let tz = tz_lookup.lookup(tzid).ok_or_else(|| CoreError::Validation(ValidationError::UnknownTimeZone { uid: String::new(), tzid: tzid.clone() }))?;
                let naive = tz.timestamp_opt(instant, 0).unwrap().naive_local();
                Ok(Anchor { value: IcalDateTime::Local(naive), tzid: Some(tzid.clone()) })
            }
            None => {
                let naive = Tz::UTC.timestamp_opt(instant, 0).unwrap().naive_utc();
                Ok(Anchor { value: IcalDateTime::Local(naive), tzid: None })
            }
        },
    }
}

fn until_value(instant: i64, dtstart_value_type: ValueType) -> IcalDateTime {
    let naive = Tz::UTC.timestamp_opt(instant, 0).unwrap().naive_utc();

    match dtstart_value_type {
        ValueType::Date => IcalDateTime::LocalDate(naive.date()),
        ValueType::DateTime => IcalDateTime::Utc(naive),
    }
}

/// Removes and returns every override sharing `uid` whose resolved `RECURRENCE-ID` falls within
/// `range`. Generalizes the corpus' own `prune_event_overrides` (there, a method keyed on one
/// event's own `BTreeMap<i64, EventOccurrenceOverride>`) to the flat `Calendar.events` list this
/// crate keeps masters and overrides interleaved in.
pub fn prune_overrides_from(calendar: &mut Calendar, uid: &str, range: (Bound<i64>, Bound<i64>), tz_lookup: &dyn TimeZoneLookup) -> Result<Vec<Event>, CoreError> {
    let master_dtstart = calendar.events.iter().find(|event| event.uid == uid && event.is_master()).map(|event| event.dtstart.clone());

    let mut pruned = Vec::new();
    let mut keep = Vec::with_capacity(calendar.events.len());

    for event in calendar.events.drain(..) {
        if event.uid != uid || event.recurrence_id.is_none() {
            keep.push(event);
            continue;
        }

        let recurrence_id = event.recurrence_id.clone().unwrap();
        let instant = match &master_dtstart {
            Some(dtstart) => crate::timeline::recurrence_instant(&recurrence_id, dtstart, uid, tz_lookup)?,
            None => crate::tz::anchor_instant(&recurrence_id, uid, tz_lookup).map_err(CoreError::Validation)?,
        };

        if range_contains(&range, instant) {
            pruned.push(event);
        } else {
            keep.push(event);
        }
    }

    calendar.events = keep;

    Ok(pruned)
}

fn range_contains(range: &(Bound<i64>, Bound<i64>), value: i64) -> bool {
    let lower_ok = match range.0 {
        Bound::Included(bound) => value >= bound,
        Bound::Excluded(bound) => value > bound,
        Bound::Unbounded => true,
    };

    let upper_ok = match range.1 {
        Bound::Included(bound) => value <= bound,
        Bound::Excluded(bound) => value < bound,
        Bound::Unbounded => true,
    };

    lower_ok && upper_ok
}
