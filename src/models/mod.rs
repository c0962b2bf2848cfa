//! Core data models for lookups and publications.

mod publication;
mod query;

pub use publication::{Extracted, PubDate, PublicationRecord, PublicationSet};
pub use query::{
    format_date, open_ended, parse_date, plan, DateFormatError, DateWindow, QuerySpec,
    DATE_FORMAT, OPEN_ENDED_YEAR,
};
