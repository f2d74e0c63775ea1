mod parser;
mod schedule;

pub use schedule::RecurrenceSpec;

pub(crate) use schedule::Recurrence;
