//! Shared helpers.

mod timestamps;

pub use timestamps::{format_iso, iso_timestamp, now_utc};
