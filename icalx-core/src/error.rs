use thiserror::Error;

use icalx_ical::{DecodeError, ParseError};

/// One `DTEND`/`DUE`/`DURATION` or `RRULE`/`RECURRENCE-ID` shape violation caught while
/// building or mutating a domain item, per §7's `ValidationError` kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("event {uid} has both DTEND and DURATION set")]
    BothDtEndAndDuration { uid: String },

    #[error("item {uid} is missing a required DTSTART")]
    MissingDtStart { uid: String },

    #[error("item {uid} end ({end}) is not strictly after its start ({start})")]
    EndNotAfterStart { uid: String, start: i64, end: i64 },

    #[error("item {uid} RECURRENCE-ID does not match any candidate in its master's expansion")]
    RecurrenceIdWithoutMaster { uid: String },

    #[error("item {uid} UNTIL value type does not match its DTSTART value type")]
    UntilTypeMismatch { uid: String },

    #[error("item {uid} RDATE/EXDATE entry does not match its DTSTART value type")]
    DateListTypeMismatch { uid: String },

    #[error("unknown time zone {tzid:?} referenced by item {uid}")]
    UnknownTimeZone { uid: String, tzid: String },
}

/// Raised when an occurrence iterator is asked to expand a rule this engine cannot expand, per
/// §7's `RecurrenceError` kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecurrenceError {
    #[error("FREQ={freq} is not supported for expansion (only DAILY, WEEKLY and MONTHLY are)")]
    UnsupportedFrequency { freq: String },

    #[error("rule part {part} in combination with FREQ={freq} is not supported for expansion")]
    UnsupportedRulePart { freq: String, part: &'static str },

    #[error("unbounded expansion requested with no COUNT, UNTIL, range or max_expansions bound")]
    UnboundedExpansion,

    #[error("recurrence rule rejected by the expansion engine: {0}")]
    Engine(String),
}

/// UID collisions, missing edit/delete targets, and mode/shape mismatches, per §7's
/// `StoreError` kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("a master item with UID {0} already exists")]
    DuplicateUid(String),

    #[error("no item found for UID {uid} and RECURRENCE-ID {recurrence_id:?}")]
    TargetNotFound { uid: String, recurrence_id: Option<i64> },

    #[error("{mode} is not valid for a non-recurring item (UID {uid})")]
    ModeIncompatibleWithItem { uid: String, mode: &'static str },

    #[error("cannot edit an override at recurrence-id {0} to a value outside its master's expansion")]
    OverrideOutsideExpansion(i64),
}

/// The single error surface `icalx-core` returns from every fallible public entry point,
/// composing the codec crate's errors with the core's own kinds via `#[from]`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Other(String),
}
