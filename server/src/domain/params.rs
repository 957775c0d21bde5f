//! Parameter binding for one compilation pass
//!
//! ClickHouse server-side parameters use `{name:Type}` placeholders in the SQL
//! text and travel separately as `param_<name>` values. [`BuildContext`] hands
//! out collision-free placeholder names and collects the matching values, so
//! no literal supplied by a caller is ever interpolated into SQL text.
//!
//! A context lives for exactly one compilation: it is created, mutated in place
//! while the tree is walked, then consumed by [`BuildContext::finish`]. Names
//! come from a counter inside the context, so reusing a context across
//! requests would collide names and silently mix up bindings.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use super::error::CompileError;
use crate::utils::time::to_datetime64_text;

/// Fixed parameter name for the project scope
pub const PROJECT_ID_PARAM: &str = "project_id";

/// Fixed parameter name for the "as of" upper bound
pub const DATE_TO_PARAM: &str = "coh_date_to";

/// Upper bound used when no `date_to` is set
const NOW_EXPR: &str = "now64(3)";

/// A value bound to a named query parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    String(String),
    UInt32(u32),
    Int64(i64),
    Float64(f64),
    /// UUID in canonical text form
    Uuid(String),
    /// Timestamp in `DateTime64(3)` text form
    DateTime64(String),
}

impl QueryValue {
    /// ClickHouse type used in the `{name:Type}` placeholder
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "String",
            Self::UInt32(_) => "UInt32",
            Self::Int64(_) => "Int64",
            Self::Float64(_) => "Float64",
            Self::Uuid(_) => "UUID",
            Self::DateTime64(_) => "DateTime64(3)",
        }
    }
}

/// Compiled SQL plus the values for its named parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: BTreeMap<String, QueryValue>,
}

impl CompiledQuery {
    /// Look up a bound value by parameter name
    pub fn param(&self, name: &str) -> Option<&QueryValue> {
        self.params.get(name)
    }
}

/// Compilation-scoped binder state
#[derive(Debug)]
pub struct BuildContext {
    project_id_param: String,
    query_params: BTreeMap<String, QueryValue>,
    counter: usize,
    date_to: Option<String>,
}

impl BuildContext {
    /// Start a compilation scoped to one project.
    ///
    /// The project id is validated as a UUID and bound once under
    /// [`PROJECT_ID_PARAM`].
    pub fn new(project_id: &str) -> Result<Self, CompileError> {
        let uuid = Uuid::parse_str(project_id.trim())
            .map_err(|_| CompileError::InvalidProjectId(project_id.to_string()))?;

        let mut ctx = Self {
            project_id_param: String::new(),
            query_params: BTreeMap::new(),
            counter: 0,
            date_to: None,
        };
        ctx.project_id_param =
            ctx.bind_named(PROJECT_ID_PARAM, QueryValue::Uuid(uuid.to_string()));
        Ok(ctx)
    }

    /// Evaluate time windows as of `date_to` instead of wall-clock time
    pub fn with_date_to(mut self, date_to: &str) -> Result<Self, CompileError> {
        let normalized = to_datetime64_text(date_to)
            .ok_or_else(|| CompileError::InvalidTimestamp(date_to.to_string()))?;
        self.bind_named(DATE_TO_PARAM, QueryValue::DateTime64(normalized.clone()));
        self.date_to = Some(normalized);
        Ok(self)
    }

    /// Bind a value under a fresh `<prefix>_<n>` name and return its placeholder
    pub fn bind(&mut self, prefix: &str, value: QueryValue) -> String {
        let name = format!("{}_{}", prefix, self.counter);
        self.counter += 1;
        self.bind_named(&name, value)
    }

    /// Bind a value under a fixed name and return its placeholder.
    ///
    /// Used for names that are unique per query by construction (`project_id`,
    /// `limit`, `from`); a second binding under the same name replaces the first.
    pub fn bind_named(&mut self, name: &str, value: QueryValue) -> String {
        let placeholder = format!("{{{}:{}}}", name, value.type_name());
        self.query_params.insert(name.to_string(), value);
        placeholder
    }

    /// Placeholder for the project scope, e.g. `{project_id:UUID}`
    pub fn project_id_param(&self) -> &str {
        &self.project_id_param
    }

    /// Upper time bound shared by every windowed predicate
    pub fn upper_bound(&self) -> String {
        match self.date_to {
            Some(_) => format!("{{{}:DateTime64(3)}}", DATE_TO_PARAM),
            None => NOW_EXPR.to_string(),
        }
    }

    pub fn date_to(&self) -> Option<&str> {
        self.date_to.as_deref()
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn params(&self) -> &BTreeMap<String, QueryValue> {
        &self.query_params
    }

    /// Consume the context, pairing the final SQL with its bindings
    pub fn finish(self, sql: String) -> CompiledQuery {
        tracing::trace!(sql = %sql, params = self.query_params.len(), "Compiled query");
        CompiledQuery {
            sql,
            params: self.query_params,
        }
    }
}
