//! The timeline merger (§4.6): merges every recurring master's bounded occurrence sequence with
//! every non-recurring event's single instant into one globally ordered sequence, substituting
//! overrides for their `RECURRENCE-ID` candidate and clipping to a caller-supplied range.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use icalx_ical::properties::Anchor;
use icalx_ical::values::date_time::ValueType;

use crate::calendar::Calendar;
use crate::error::CoreError;
use crate::event::Event;
use crate::tz::TimeZoneLookup;
use crate::Config;

/// One timeline entry: a concrete occurrence of an event, either generated directly from the
/// master's rule or substituted from an override at that `RECURRENCE-ID`.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub uid: String,
    pub recurrence_id: Option<i64>,
    pub start: i64,
    pub end: i64,
    pub all_day: bool,
}

/// A materialized, range-clippable view produced by [`Calendar::timeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    occurrences: Vec<Occurrence>,
}

impl Timeline {
    pub fn all(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// Occurrences intersecting `[range_start, range_end)`.
    pub fn overlapping(&self, range_start: i64, range_end: i64) -> Vec<&Occurrence> {
        self.occurrences.iter().filter(|occurrence| occurrence.start < range_end && occurrence.end > range_start).collect()
    }

    /// Occurrences intersecting the caller-supplied day window `[day_start, day_end)`; the core
    /// has no tz database of its own (§6) so it cannot compute calendar-day boundaries itself.
    pub fn on(&self, day_start: i64, day_end: i64) -> Vec<&Occurrence> {
        self.overlapping(day_start, day_end)
    }

    pub fn starting_at(&self, instant: i64) -> Vec<&Occurrence> {
        self.occurrences.iter().filter(|occurrence| occurrence.start == instant).collect()
    }
}

impl Calendar {
    /// Builds the merged, `config.max_expansions`-bounded timeline over every master event,
    /// with overrides substituted and an optional `[start, end)` clip applied.
    pub fn timeline(&self, tz_lookup: &dyn TimeZoneLookup, config: &Config, range: Option<(i64, i64)>) -> Result<Timeline, CoreError> {
        let until_bound = range.map(|(_, end)| end);
        let mut occurrences = build_timeline(self, tz_lookup, config, until_bound)?;

        if let Some((start, end)) = range {
            occurrences.retain(|occurrence| occurrence.start < end && occurrence.end > start);
        }

        Ok(Timeline { occurrences })
    }
}

/// Re-expresses a bare local `RECURRENCE-ID` (no `TZID` of its own) in the master's zone before
/// resolving it to an instant — the open-question decision in §9/DESIGN.md.
pub(crate) fn recurrence_instant(recurrence_id: &Anchor, master_dtstart: &Anchor, uid: &str, tz_lookup: &dyn TimeZoneLookup) -> Result<i64, CoreError> {
    let mut anchor = recurrence_id.clone();

    if anchor.tzid.is_none() {
        anchor.tzid = master_dtstart.tzid.clone();
    }

    crate::tz::anchor_instant(&anchor, uid, tz_lookup).map_err(CoreError::Validation)
}

fn is_all_day(event: &Event) -> bool {
    event.dtstart.value.value_type() == ValueType::Date
}

struct Source {
    uid: String,
    insertion_index: usize,
    candidates: Vec<i64>,
    cursor: usize,
    is_recurring: bool,
}

type HeapKey = (i64, u8, String, usize, usize);

fn build_timeline(calendar: &Calendar, tz_lookup: &dyn TimeZoneLookup, config: &Config, until_bound: Option<i64>) -> Result<Vec<Occurrence>, CoreError> {
    let masters_by_uid: HashMap<&str, &Event> = calendar.events.iter().filter(|event| event.is_master()).map(|event| (event.uid.as_str(), event)).collect();

    let mut overrides_by_uid: HashMap<&str, BTreeMap<i64, &Event>> = HashMap::new();

    for event in &calendar.events {
        if let Some(recurrence_id) = &event.recurrence_id {
            let instant = match masters_by_uid.get(event.uid.as_str()) {
                Some(master) => recurrence_instant(recurrence_id, &master.dtstart, &event.uid, tz_lookup)?,
                None => crate::tz::anchor_instant(recurrence_id, &event.uid, tz_lookup).map_err(CoreError::Validation)?,
            };

            overrides_by_uid.entry(event.uid.as_str()).or_default().insert(instant, event);
        }
    }

    let mut sources = Vec::new();

    for (insertion_index, event) in calendar.events.iter().enumerate() {
        if !event.is_master() {
            continue;
        }

        let rrule_set = event.build_rrule_set()?;
        let candidates = crate::occurrence::expand_occurrences(event.rrule.as_ref(), &rrule_set, config.max_expansions, until_bound)
            .map_err(CoreError::Recurrence)?;
        let is_recurring = event.rrule.is_some() || !event.rdate.is_empty();

        sources.push(Source { uid: event.uid.clone(), insertion_index, candidates, cursor: 0, is_recurring });
    }

    let mut heap: BinaryHeap<Reverse<HeapKey>> = BinaryHeap::new();

    for (source_index, source) in sources.iter().enumerate() {
        if let Some(&first) = source.candidates.first() {
            let event = masters_by_uid[source.uid.as_str()];
            heap.push(Reverse((first, u8::from(!is_all_day(event)), source.uid.clone(), source.insertion_index, source_index)));
        }
    }

    let mut occurrences = Vec::new();

    while let Some(Reverse((start, _rank, uid, _insertion_index, source_index))) = heap.pop() {
        let event = masters_by_uid[uid.as_str()];
        let recurrence_id = if sources[source_index].is_recurring { Some(start) } else { None };

        let occurrence = match overrides_by_uid.get(uid.as_str()).and_then(|tree| tree.get(&start)) {
            Some(override_event) => {
                let override_start = crate::tz::anchor_instant(&override_event.dtstart, &uid, tz_lookup).map_err(CoreError::Validation)?;
                let duration = override_event.duration_seconds(&uid, tz_lookup).map_err(CoreError::Validation)?;

                Occurrence { uid: uid.clone(), recurrence_id, start: override_start, end: override_start + duration, all_day: is_all_day(override_event) }
            }
            None => {
                let duration = event.duration_seconds(&uid, tz_lookup).map_err(CoreError::Validation)?;

                Occurrence { uid: uid.clone(), recurrence_id, start, end: start + duration, all_day: is_all_day(event) }
            }
        };

        occurrences.push(occurrence);

        let source = &mut sources[source_index];
        source.cursor += 1;

        if let Some(&next) = source.candidates.get(source.cursor) {
            heap.push(Reverse((next, u8::from(!is_all_day(event)), uid.clone(), source.insertion_index, source_index)));
        }
    }

    Ok(occurrences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tz::ChronoTzDatabase;
    use icalx_ical::values::date_time::DateTime as IcalDateTime;
    use std::str::FromStr;

    fn anchor_naive(text: &str) -> Anchor {
        Anchor { value: IcalDateTime::from_str(text).unwrap(), tzid: None }
    }

    #[test]
    fn s2_weekly_expansion_yields_five_mondays() {
        let mut calendar = Calendar::new();
        let mut event = Event::new("mock-uid-1", IcalDateTime::from_str("20220829T090000Z").unwrap(), anchor_naive("20220829T090000"));
        event.summary = Some(String::from("Monday meeting"));
        event.rrule = Some(icalx_ical::values::recur::Recur::from_str("FREQ=WEEKLY;BYDAY=MO").unwrap());
        event.ensure_ordered("RRULE");
        calendar.push_event(event);

        let tz_lookup = ChronoTzDatabase;
        let config = Config::default();

        let range_start = crate::tz::anchor_instant(&anchor_naive("20220829T000000"), "range", &tz_lookup).unwrap();
        let range_end = crate::tz::anchor_instant(&anchor_naive("20220930T000000"), "range", &tz_lookup).unwrap();

        let timeline = calendar.timeline(&tz_lookup, &config, Some((range_start, range_end))).unwrap();

        assert_eq!(timeline.all().len(), 5);
        assert!(timeline.all().windows(2).all(|pair| pair[0].start < pair[1].start));
    }

    #[test]
    fn s6_all_day_sorts_before_timed_at_the_same_instant() {
        let mut calendar = Calendar::new();

        let timed = Event::new("timed-event", IcalDateTime::from_str("20220829T000000Z").unwrap(), anchor_naive("20220829T000000"));
        let mut all_day = Event::new("allday-event", IcalDateTime::from_str("20220829T000000Z").unwrap(), Anchor { value: IcalDateTime::LocalDate(chrono::NaiveDate::from_ymd_opt(2022, 8, 29).unwrap()), tzid: None });
        all_day.ensure_ordered("DTSTART");

        calendar.push_event(timed);
        calendar.push_event(all_day);

        let tz_lookup = ChronoTzDatabase;
        let config = Config::default();

        let timeline = calendar.timeline(&tz_lookup, &config, None).unwrap();
        let occurrences = timeline.all();

        assert_eq!(occurrences.len(), 2);
        assert!(occurrences[0].all_day);
        assert_eq!(occurrences[0].uid, "allday-event");
        assert!(!occurrences[1].all_day);
        assert_eq!(occurrences[1].uid, "timed-event");
    }
}
