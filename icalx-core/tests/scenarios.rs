use std::str::FromStr;

use chrono::{NaiveDate, TimeZone};
use chrono_tz::Tz;

use icalx_core::{decode_calendar, encode_calendar, ChronoTzDatabase, Config, DeleteMode, EditChanges, EditMode, Event, FixedClock, Store};
use icalx_ical::properties::Anchor;
use icalx_ical::values::date_time::DateTime as IcalDateTime;
use icalx_ical::values::recur::Recur;

fn anchor_local(text: &str) -> Anchor {
    Anchor { value: IcalDateTime::from_str(text).unwrap(), tzid: None }
}

fn utc(text: &str) -> IcalDateTime {
    IcalDateTime::from_str(text).unwrap()
}

fn instant(text: &str) -> i64 {
    let tz_lookup = ChronoTzDatabase;
    icalx_core::tz::anchor_instant(&anchor_local(text), "range", &tz_lookup).unwrap()
}

fn fixed_clock_at(text: &str) -> FixedClock {
    match utc(text) {
        IcalDateTime::Utc(naive) => FixedClock(naive),
        _ => panic!("expected a UTC timestamp"),
    }
}

#[test]
fn s1_parse_and_re_emit_preserves_order_and_fields() {
    let ical = "BEGIN:VCALENDAR\r\nPRODID:-//Example//EN\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:19970901T130000Z-123401@example.com\r\nDTSTAMP:19970901T130000Z\r\nDTSTART:19970903T163000Z\r\nDTEND:19970903T190000Z\r\nSUMMARY:Annual Employee Review\r\nCLASS:PRIVATE\r\nCATEGORIES:BUSINESS,HUMAN RESOURCES\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    let calendar = decode_calendar(ical, &Config::default()).unwrap();
    assert_eq!(calendar.events.len(), 1);
    assert_eq!(calendar.events[0].uid, "19970901T130000Z-123401@example.com");
    assert_eq!(calendar.events[0].summary.as_deref(), Some("Annual Employee Review"));
    assert_eq!(calendar.events[0].categories, vec!["BUSINESS", "HUMAN RESOURCES"]);

    let rendered = encode_calendar(&calendar);
    let event_body = rendered.split("BEGIN:VEVENT\r\n").nth(1).unwrap().split("END:VEVENT").next().unwrap();
    let names: Vec<&str> = event_body.lines().filter_map(|line| line.split_once(':').or_else(|| line.split_once(';')).map(|(name, _)| name)).collect();

    assert_eq!(names, vec!["UID", "DTSTAMP", "DTSTART", "DTEND", "SUMMARY", "CLASS", "CATEGORIES"]);
    assert!(rendered.starts_with("BEGIN:VCALENDAR\r\n"));
    assert!(rendered.ends_with("END:VCALENDAR\r\n"));
}

fn monday_meeting_calendar() -> icalx_core::Calendar {
    let mut calendar = icalx_core::Calendar::new();

    let mut event = Event::new("mock-uid-1", utc("20220829T090000Z"), anchor_local("20220829T090000"));
    event.summary = Some(String::from("Monday meeting"));
    event.rrule = Some(Recur::from_str("FREQ=WEEKLY;BYDAY=MO").unwrap());
    event.ensure_ordered_for_test();

    calendar.push_event_for_test(event);
    calendar
}

#[test]
fn s2_weekly_expansion_yields_five_ordered_monday_occurrences() {
    let calendar = monday_meeting_calendar();
    let tz_lookup = ChronoTzDatabase;
    let config = Config::default();

    let range = (instant("20220829T000000"), instant("20220930T000000"));
    let timeline = calendar.timeline(&tz_lookup, &config, Some(range)).unwrap();

    let starts: Vec<i64> = timeline.all().iter().map(|occurrence| occurrence.start).collect();
    let expected = vec![
        instant("20220829T090000"),
        instant("20220905T090000"),
        instant("20220912T090000"),
        instant("20220919T090000"),
        instant("20220926T090000"),
    ];

    assert_eq!(starts, expected);
    assert!(timeline.all().iter().all(|occurrence| occurrence.recurrence_id == Some(occurrence.start)));
}

#[test]
fn s3_delete_this_instance_appends_exdate_and_drops_from_timeline() {
    let mut calendar = monday_meeting_calendar();
    let clock = fixed_clock_at("20220905T120000Z");
    let tz_lookup = ChronoTzDatabase;
    let config = Config::default();

    let target = instant("20220905T090000");

    {
        let mut store = Store::new(&mut calendar, &clock, &tz_lookup);
        store.delete("mock-uid-1", Some(target), DeleteMode::This).unwrap();
    }

    assert_eq!(calendar.events[0].exdate.len(), 1);

    let range = (instant("20220829T000000"), instant("20220930T000000"));
    let timeline = calendar.timeline(&tz_lookup, &config, Some(range)).unwrap();

    assert_eq!(timeline.all().len(), 4);
    assert!(timeline.all().iter().all(|occurrence| occurrence.start != target));
}

#[test]
fn s4_edit_this_and_future_from_a_non_first_instance_forks_a_new_series() {
    let mut calendar = monday_meeting_calendar();
    let clock = fixed_clock_at("20220905T120000Z");
    let tz_lookup = ChronoTzDatabase;
    let config = Config::default();

    let split_point = instant("20220905T090000");

    {
        let mut store = Store::new(&mut calendar, &clock, &tz_lookup);
        let changes = EditChanges { summary: Some(String::from("Team meeting")), new_uid: Some(String::from("mock-uid-2")), ..Default::default() };
        store.edit("mock-uid-1", Some(split_point), changes, EditMode::ThisAndFuture).unwrap();
    }

    let original = calendar.events.iter().find(|event| event.uid == "mock-uid-1").unwrap();
    let forked = calendar.events.iter().find(|event| event.uid == "mock-uid-2").unwrap();

    assert_eq!(forked.summary.as_deref(), Some("Team meeting"));
    assert_eq!(forked.dtstart, anchor_local("20220905T090000"));

    let until = original.rrule.as_ref().unwrap().until.as_ref().unwrap();
    let boundary = split_point - 1;
    let expected_until = IcalDateTime::Utc(Tz::UTC.timestamp_opt(boundary, 0).unwrap().naive_utc());
    assert_eq!(until.0, expected_until);

    let range = (instant("20220829T000000"), instant("20220930T000000"));
    let timeline = calendar.timeline(&tz_lookup, &config, Some(range)).unwrap();

    let mut by_uid: Vec<(String, i64)> = timeline.all().iter().map(|occurrence| (occurrence.uid.clone(), occurrence.start)).collect();
    by_uid.sort_by_key(|(_, start)| *start);

    assert_eq!(
        by_uid,
        vec![
            (String::from("mock-uid-1"), instant("20220829T090000")),
            (String::from("mock-uid-2"), instant("20220905T090000")),
            (String::from("mock-uid-2"), instant("20220912T090000")),
            (String::from("mock-uid-2"), instant("20220919T090000")),
            (String::from("mock-uid-2"), instant("20220926T090000")),
        ]
    );
}

#[test]
fn s5_converting_a_single_event_to_recurring_expands_three_occurrences() {
    let mut calendar = icalx_core::Calendar::new();
    let mut event = Event::new("mock-uid-1", utc("20220829T090000Z"), anchor_local("20220829T090000"));
    event.ensure_ordered_for_test();
    calendar.push_event_for_test(event);

    let clock = fixed_clock_at("20220829T090000Z");
    let tz_lookup = ChronoTzDatabase;
    let config = Config::default();

    {
        let mut store = Store::new(&mut calendar, &clock, &tz_lookup);
        let changes = EditChanges { rrule: Some(Recur::from_str("FREQ=DAILY;COUNT=3").unwrap()), ..Default::default() };
        store.edit("mock-uid-1", None, changes, EditMode::All).unwrap();
    }

    let timeline = calendar.timeline(&tz_lookup, &config, None).unwrap();
    let starts: Vec<i64> = timeline.all().iter().map(|occurrence| occurrence.start).collect();

    assert_eq!(starts, vec![instant("20220829T090000"), instant("20220830T090000"), instant("20220831T090000")]);
    assert!(timeline.all().iter().all(|occurrence| occurrence.recurrence_id.is_some()));
}

#[test]
fn s6_all_day_event_sorts_before_a_timed_event_at_the_same_instant() {
    let mut calendar = icalx_core::Calendar::new();

    let mut timed = Event::new("timed-event", utc("20220829T000000Z"), anchor_local("20220829T000000"));
    timed.ensure_ordered_for_test();

    let mut all_day = Event::new("allday-event", utc("20220829T000000Z"), Anchor { value: IcalDateTime::LocalDate(NaiveDate::from_ymd_opt(2022, 8, 29).unwrap()), tzid: None });
    all_day.ensure_ordered_for_test();

    calendar.push_event_for_test(timed);
    calendar.push_event_for_test(all_day);

    let tz_lookup = ChronoTzDatabase;
    let config = Config::default();
    let timeline = calendar.timeline(&tz_lookup, &config, None).unwrap();

    assert_eq!(timeline.all()[0].uid, "allday-event");
    assert_eq!(timeline.all()[1].uid, "timed-event");
}
