//! Recurrence model, occurrence iterator, timeline merger and mutation store (§2's rows 4-7)
//! built on top of [`icalx_ical`]'s content-line codec.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod item;
pub mod occurrence;
pub mod store;
pub mod timeline;
pub mod todo;
pub mod tz;

pub use calendar::{decode_calendar, encode_calendar, Calendar};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{CoreError, RecurrenceError, StoreError, ValidationError};
pub use event::{Event, EventEnd};
pub use item::RelatedTo;
pub use store::{DeleteMode, EditChanges, EditMode, Store};
pub use timeline::{Occurrence, Timeline};
pub use todo::{ToDo, ToDoEnd};
pub use tz::{ChronoTzDatabase, TimeZoneLookup};
