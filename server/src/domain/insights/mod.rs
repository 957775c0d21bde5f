//! Aggregation queries over the events table
//!
//! - `identity` - resolved person expression shared by all user counts
//! - `types` - filters and trend granularity
//! - `events` - event listing, count rollup, trend and top-events builders

mod events;
pub mod identity;
mod types;

pub use events::{build_event_counts, build_event_trend, build_list_events, build_top_events};
pub use identity::{RESOLVED_PERSON_ID, resolved_person_id_expr, resolved_person_id_select};
pub use types::{EventQueryFilter, Granularity};
