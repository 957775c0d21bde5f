//! Condition tree compiler
//!
//! Walks a cohort definition depth-first, compiling each leaf through its
//! kind-specific compiler and joining members with the group's operator.
//! Every multi-member group is parenthesized, so nesting AND inside OR (and
//! the reverse) keeps its meaning without relying on SQL precedence.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::constants::{
    COHORT_MEMBERS_TABLE, EVENTS_TABLE_FINAL, MAX_CONDITION_DEPTH,
};
use crate::domain::error::CompileError;
use crate::domain::insights::identity::{RESOLVED_PERSON_ID, resolved_person_id_expr};
use crate::domain::params::{BuildContext, CompiledQuery, PROJECT_ID_PARAM, QueryValue};
use crate::domain::sql::SelectBuilder;

use super::leaf::{compile_cohort, compile_event, compile_first_time_event, compile_person_property};
use super::property::PropertyAllowList;
use super::regularity::compile_performed_regularly;
use super::types::{Condition, ConditionGroup};

/// Compiles condition trees against one property allow-list
#[derive(Debug, Clone, Copy)]
pub struct CohortCompiler<'a> {
    properties: &'a PropertyAllowList,
}

impl<'a> CohortCompiler<'a> {
    pub fn new(properties: &'a PropertyAllowList) -> Self {
        Self { properties }
    }

    /// Compile a tree to a boolean SQL fragment, binding values into `ctx`
    pub fn compile(&self, condition: &Condition, ctx: &mut BuildContext) -> Result<String, CompileError> {
        self.compile_node(condition, ctx, 0)
    }

    /// Compile a group to a boolean SQL fragment
    pub fn compile_group(
        &self,
        group: &ConditionGroup,
        ctx: &mut BuildContext,
    ) -> Result<String, CompileError> {
        self.compile_group_at(group, ctx, 0)
    }

    fn compile_node(
        &self,
        condition: &Condition,
        ctx: &mut BuildContext,
        depth: usize,
    ) -> Result<String, CompileError> {
        match condition {
            Condition::Group(group) => self.compile_group_at(group, ctx, depth),
            Condition::Event(c) => compile_event(c, ctx, self.properties),
            Condition::PersonProperty(c) => compile_person_property(c, ctx, self.properties),
            Condition::FirstTimeEvent(c) => compile_first_time_event(c, ctx),
            Condition::PerformedRegularly(c) => {
                compile_performed_regularly(c, ctx, self.properties)
            }
            Condition::Cohort(c) => compile_cohort(c, ctx),
        }
    }

    fn compile_group_at(
        &self,
        group: &ConditionGroup,
        ctx: &mut BuildContext,
        depth: usize,
    ) -> Result<String, CompileError> {
        if depth >= MAX_CONDITION_DEPTH {
            return Err(CompileError::TooDeep {
                max: MAX_CONDITION_DEPTH,
            });
        }

        if group.members.is_empty() {
            return Ok(group.kind.empty_sql().to_string());
        }

        let mut parts = Vec::with_capacity(group.members.len());
        for member in &group.members {
            parts.push(self.compile_node(member, ctx, depth + 1)?);
        }

        if parts.len() == 1 {
            return Ok(parts.remove(0));
        }
        Ok(format!("({})", parts.join(group.kind.sql_operator())))
    }
}

/// Query listing the members of a cohort definition.
///
/// Takes the context by value: one context per compiled statement.
pub fn compile_cohort_query(
    definition: &ConditionGroup,
    mut ctx: BuildContext,
    properties: &PropertyAllowList,
) -> Result<CompiledQuery, CompileError> {
    let predicate = CohortCompiler::new(properties).compile_group(definition, &mut ctx)?;

    let mut query = SelectBuilder::from(EVENTS_TABLE_FINAL)
        .distinct()
        .column("distinct_id")
        .column_as(resolved_person_id_expr(), RESOLVED_PERSON_ID)
        .order_by("distinct_id");
    let project = ctx.project_id_param().to_string();
    query.filters().add_raw(format!("project_id = {}", project));
    query.filters().add_raw(format!("({})", predicate));

    tracing::debug!(
        members = definition.members.len(),
        params = ctx.params().len(),
        date_to = ?ctx.date_to(),
        "Compiled cohort query"
    );

    Ok(ctx.finish(query.build()))
}

/// Statements that replace the stored members of a static cohort
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortMaterialization {
    /// Removes the previous members
    pub clear: CompiledQuery,
    /// Inserts the current members
    pub insert: CompiledQuery,
    /// Counts the stored members afterwards
    pub count: CompiledQuery,
}

/// Compile the statements that materialize a definition into `cohort_members`
pub fn compile_cohort_materialization(
    cohort_id: &str,
    definition: &ConditionGroup,
    mut ctx: BuildContext,
    properties: &PropertyAllowList,
) -> Result<CohortMaterialization, CompileError> {
    if cohort_id.trim().is_empty() {
        return Err(CompileError::invalid_value("cohort_id", "must not be empty"));
    }

    let predicate = CohortCompiler::new(properties).compile_group(definition, &mut ctx)?;

    let target = ctx.bind_named("cohort_id", QueryValue::String(cohort_id.to_string()));
    let mut select = SelectBuilder::from(EVENTS_TABLE_FINAL)
        .distinct()
        .column("project_id")
        .column(target.clone())
        .column("distinct_id");
    let project = ctx.project_id_param().to_string();
    select.filters().add_raw(format!("project_id = {}", project));
    select.filters().add_raw(format!("({})", predicate));

    let insert_sql = format!(
        "INSERT INTO {} (project_id, cohort_id, distinct_id) {}",
        COHORT_MEMBERS_TABLE,
        select.build()
    );

    // Cohort ids are only unique inside a project
    let scope = format!("project_id = {} AND cohort_id = {}", project, target);
    let scope_params: BTreeMap<_, _> = ctx
        .params()
        .iter()
        .filter(|(name, _)| *name == PROJECT_ID_PARAM || *name == "cohort_id")
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let clear = CompiledQuery {
        sql: format!("DELETE FROM {} WHERE {}", COHORT_MEMBERS_TABLE, scope),
        params: scope_params.clone(),
    };
    let count = CompiledQuery {
        sql: format!("SELECT count() FROM {} FINAL WHERE {}", COHORT_MEMBERS_TABLE, scope),
        params: scope_params,
    };

    Ok(CohortMaterialization {
        clear,
        insert: ctx.finish(insert_sql),
        count,
    })
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
