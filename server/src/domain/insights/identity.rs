//! Identity resolution
//!
//! Every event row carries the `person_id` stamped at ingestion. When an
//! anonymous distinct id is later identified, an entry in the
//! `person_overrides_dict` dictionary redirects it to the canonical person.
//! Counting "users" therefore goes through the dictionary first and falls back
//! to the stamped column, without rewriting stored rows and without a JOIN.

/// Alias of the resolved person column in every query that selects it
pub const RESOLVED_PERSON_ID: &str = "resolved_person_id";

/// Resolved person id for the current `events` row.
///
/// Must match [`crate::core::constants::PERSON_OVERRIDES_DICT`].
const RESOLVED_PERSON_ID_EXPR: &str = "coalesce(dictGetOrNull('person_overrides_dict', 'person_id', (project_id, distinct_id)), person_id)";

/// The resolved person expression, without alias
pub fn resolved_person_id_expr() -> &'static str {
    RESOLVED_PERSON_ID_EXPR
}

/// `<expr> AS resolved_person_id`, for select lists
pub fn resolved_person_id_select() -> String {
    format!("{} AS {}", RESOLVED_PERSON_ID_EXPR, RESOLVED_PERSON_ID)
}

/// Approximate distinct count of resolved persons
pub fn unique_users_expr() -> String {
    format!("uniq({})", RESOLVED_PERSON_ID_EXPR)
}
