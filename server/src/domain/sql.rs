//! SQL clause builders
//!
//! Queries are assembled from lists of fragments and joined once at the end.
//! Fragments that carry values get them through [`BuildContext`], so every
//! user-controllable literal shows up here only as a `{name:Type}` placeholder.
//!
//! Table names, column names and SQL functions passed to these builders are
//! compile-time constants or values validated against an allow-list.

use super::params::{BuildContext, QueryValue};

/// Collects WHERE/HAVING predicates joined with AND
#[derive(Debug, Default, Clone)]
pub struct ConditionBuilder {
    conditions: Vec<String>,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `column = {param}` with a freshly bound value
    pub fn add_eq(&mut self, ctx: &mut BuildContext, column: &str, prefix: &str, value: QueryValue) {
        let placeholder = ctx.bind(prefix, value);
        self.conditions.push(format!("{} = {}", column, placeholder));
    }

    /// Add `column = {name:Type}` under a fixed parameter name
    pub fn add_eq_named(
        &mut self,
        ctx: &mut BuildContext,
        column: &str,
        name: &str,
        value: QueryValue,
    ) {
        let placeholder = ctx.bind_named(name, value);
        self.conditions.push(format!("{} = {}", column, placeholder));
    }

    /// Add a predicate that has already been compiled against the same context
    ///
    /// The fragment must not contain user input outside of bound placeholders.
    pub fn add_raw(&mut self, condition: impl Into<String>) {
        self.conditions.push(condition.into());
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Join the predicates (without the WHERE keyword)
    pub fn build(&self) -> String {
        self.conditions.join(" AND ")
    }
}

/// Single-level SELECT statement builder
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    distinct: bool,
    columns: Vec<String>,
    from: String,
    filters: ConditionBuilder,
    group_by: Vec<String>,
    having: ConditionBuilder,
    order_by: Vec<String>,
    limit: Option<String>,
    offset: Option<String>,
}

impl SelectBuilder {
    /// Start a SELECT over `from` (e.g. `events FINAL`)
    pub fn from(from: impl Into<String>) -> Self {
        Self {
            distinct: false,
            columns: Vec::new(),
            from: from.into(),
            filters: ConditionBuilder::new(),
            group_by: Vec::new(),
            having: ConditionBuilder::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn column(mut self, expr: impl Into<String>) -> Self {
        self.columns.push(expr.into());
        self
    }

    pub fn column_as(mut self, expr: impl Into<String>, alias: &str) -> Self {
        self.columns.push(format!("{} AS {}", expr.into(), alias));
        self
    }

    /// Mutable access to the WHERE predicates
    pub fn filters(&mut self) -> &mut ConditionBuilder {
        &mut self.filters
    }

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    /// Mutable access to the HAVING predicates
    pub fn having(&mut self) -> &mut ConditionBuilder {
        &mut self.having
    }

    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    /// LIMIT with an already-bound placeholder
    pub fn limit(mut self, placeholder: impl Into<String>) -> Self {
        self.limit = Some(placeholder.into());
        self
    }

    /// OFFSET with an already-bound placeholder
    pub fn offset(mut self, placeholder: impl Into<String>) -> Self {
        self.offset = Some(placeholder.into());
        self
    }

    /// Render the statement as a single line
    pub fn build(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.from);

        if !self.filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filters.build());
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.having.build());
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(ref limit) = self.limit {
            sql.push_str(" LIMIT ");
            sql.push_str(limit);
        }
        if let Some(ref offset) = self.offset {
            sql.push_str(" OFFSET ");
            sql.push_str(offset);
        }
        sql
    }
}
