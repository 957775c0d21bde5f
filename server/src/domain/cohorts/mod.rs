//! Cohort definitions and their compilation to SQL
//!
//! - `types` - condition tree model
//! - `parser` - JSON definition parsing with size and depth limits
//! - `property` - property comparisons and the property-name allow-list
//! - `leaf` - per-kind leaf compilers
//! - `regularity` - "performed regularly" subqueries
//! - `compiler` - recursive tree compiler and top-level cohort statements

mod compiler;
mod leaf;
mod parser;
mod property;
mod regularity;
mod types;

pub use compiler::{
    CohortCompiler, CohortMaterialization, compile_cohort_materialization, compile_cohort_query,
};
pub use parser::{parse_definition, parse_definition_value};
pub use property::{
    PROPERTY_NAME_PATTERN, PropertyAllowList, PropertyOperator, PropertySource,
    compile_property_discovery,
};
pub use types::{
    CohortCondition, Condition, ConditionGroup, CountOperator, EventCondition, EventFilter,
    FirstTimeEventCondition, GroupKind, PerformedRegularlyCondition, PeriodType,
    PersonPropertyCondition,
};
