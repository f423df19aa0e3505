//! The per-event occurrence iterator (§4.5). Base-sequence generation, `RDATE` union and
//! `EXDATE` filtering are delegated wholesale to the `rrule` crate via the ical-text bridge in
//! `Event::build_rrule_set`/`ToDo::build_rrule_set`; this module adds the FREQ/rule-part support
//! gate this engine promises on top of that (§4.4: construction only validates shape, not
//! expandability) and the `max_expansions` safety valve (§6) that bounds an otherwise-unbounded
//! expansion.

use icalx_ical::values::recur::{Frequency, Recur};

use crate::error::RecurrenceError;

/// Checks a recurrence rule against the subset of FREQ/rule-part combinations this engine
/// actually expands, per §4.4/§4.5. Called at expansion time, never at decode or construction.
pub fn check_expansion_supported(recur: &Recur) -> Result<(), RecurrenceError> {
    let freq_param = recur.freq.as_ref().expect("RRULE decode enforces FREQ is present");
    let freq = freq_param.0;
    let freq_name = || freq_param.render_ical();

    if !freq.is_expansion_supported() {
        return Err(RecurrenceError::UnsupportedFrequency { freq: freq_name() });
    }

    for (present, part) in [
        (recur.bysecond.is_some(), "BYSECOND"),
        (recur.byminute.is_some(), "BYMINUTE"),
        (recur.byhour.is_some(), "BYHOUR"),
        (recur.byyearday.is_some(), "BYYEARDAY"),
        (recur.byweekno.is_some(), "BYWEEKNO"),
        (recur.bysetpos.is_some(), "BYSETPOS"),
    ] {
        if present {
            return Err(RecurrenceError::UnsupportedRulePart { freq: freq_name(), part });
        }
    }

    match freq {
        Frequency::Daily if recur.byday.is_some() => {
            Err(RecurrenceError::UnsupportedRulePart { freq: freq_name(), part: "BYDAY" })
        }
        Frequency::Daily if recur.bymonthday.is_some() => {
            Err(RecurrenceError::UnsupportedRulePart { freq: freq_name(), part: "BYMONTHDAY" })
        }
        Frequency::Weekly if recur.bymonthday.is_some() => {
            Err(RecurrenceError::UnsupportedRulePart { freq: freq_name(), part: "BYMONTHDAY" })
        }
        Frequency::Daily | Frequency::Weekly | Frequency::Monthly => Ok(()),
        _ => unreachable!("gated above by is_expansion_supported"),
    }
}

/// Materializes up to `max_expansions` occurrence instants from an already-built `RRuleSet`,
/// optionally stopping once a value exceeds `until_bound`. `rrule` is the item's own decoded
/// rule, checked once via `check_expansion_supported` before any values are drawn; pass `None`
/// for a non-recurring item's single-element set.
///
/// The `rrule` crate's iterator is itself unbounded when the rule carries neither `COUNT` nor
/// `UNTIL`, so `max_expansions` is enforced unconditionally rather than only as a fallback.
pub fn expand_occurrences(
    rrule: Option<&Recur>,
    rrule_set: &rrule::RRuleSet,
    max_expansions: u32,
    until_bound: Option<i64>,
) -> Result<Vec<i64>, RecurrenceError> {
    if let Some(recur) = rrule {
        check_expansion_supported(recur)?;
    }

    let mut occurrences = Vec::new();

    for occurrence in rrule_set {
        if occurrences.len() as u32 >= max_expansions {
            break;
        }

        let instant = occurrence.timestamp();

        if let Some(bound) = until_bound {
            if instant > bound {
                break;
            }
        }

        occurrences.push(instant);
    }

    Ok(occurrences)
}
