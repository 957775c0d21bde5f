//! Shared data types returned by the data layer

mod insights;

pub use insights::{
    CohortMember, EventCounts, EventRecord, MaterializedCohort, TopEvent, TrendPoint,
    parse_properties,
};
