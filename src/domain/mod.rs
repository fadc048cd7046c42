//! Domain layer: post records and the fields derived from them.

pub mod dates;
pub mod error;
pub mod posts;
pub mod reading_time;
pub mod rich_text;
