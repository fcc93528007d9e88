//! Query specification and its validation contract.
//!
//! # Responsibility
//! - Describe filter, sort and projection over one view.
//! - Reject queries naming properties outside the view before any backend
//!   runs.
//!
//! # Invariants
//! - A validated query only references properties of its own view.
//! - Filter and sort keys are scalar; projection keys are projectable.
//! - An empty projection means "every projectable property".

mod filter;
pub(crate) mod sql;

pub use filter::{Condition, Filter, MatchOp};

use crate::error::{ContactsError, ContactsResult};
use crate::record::Value;
use crate::schema::{DataKind, PropertyId, ViewSchema};
use std::collections::HashSet;

/// Nesting limit for filter groups.
pub const MAX_FILTER_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub property: PropertyId,
    pub ascending: bool,
}

/// Filter/sort/projection request over one view.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    view_uri: String,
    filter: Option<Filter>,
    sort: Vec<SortKey>,
    projection: Vec<PropertyId>,
    distinct: bool,
}

impl Query {
    pub fn new(view_uri: impl Into<String>) -> Self {
        Self {
            view_uri: view_uri.into(),
            filter: None,
            sort: Vec::new(),
            projection: Vec::new(),
            distinct: false,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Appends a sort key; earlier keys take precedence.
    pub fn sort_by(mut self, property: PropertyId, ascending: bool) -> Self {
        self.sort.push(SortKey {
            property,
            ascending,
        });
        self
    }

    pub fn project(mut self, properties: &[PropertyId]) -> Self {
        self.projection = properties.to_vec();
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn view_uri(&self) -> &str {
        &self.view_uri
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn projection(&self) -> &[PropertyId] {
        &self.projection
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Checks every referenced property against `schema`.
    ///
    /// # Errors
    /// - `InvalidParameter` for a foreign view, unknown or misused
    ///   properties, empty groups, or a condition whose value kind does not
    ///   fit the property.
    pub fn validate(&self, schema: &ViewSchema) -> ContactsResult<()> {
        if self.view_uri != schema.uri() {
            return Err(ContactsError::invalid(format!(
                "query for {} validated against {}",
                self.view_uri,
                schema.uri()
            )));
        }

        if let Some(filter) = &self.filter {
            validate_filter(schema, filter, 0)?;
        }

        for key in &self.sort {
            let (_, descriptor) = schema.require(key.property)?;
            if !descriptor.kind.is_scalar() {
                return Err(ContactsError::invalid(format!(
                    "cannot sort by list property {}",
                    descriptor.name
                )));
            }
        }

        let mut seen = HashSet::with_capacity(self.projection.len());
        for property in &self.projection {
            let (_, descriptor) = schema.require(*property)?;
            if !descriptor.projectable {
                return Err(ContactsError::invalid(format!(
                    "property {} cannot be projected",
                    descriptor.name
                )));
            }
            if !seen.insert(*property) {
                return Err(ContactsError::invalid(format!(
                    "property {} projected twice",
                    descriptor.name
                )));
            }
        }
        Ok(())
    }
}

fn validate_filter(schema: &ViewSchema, filter: &Filter, depth: usize) -> ContactsResult<()> {
    if depth > MAX_FILTER_DEPTH {
        return Err(ContactsError::invalid("filter nesting too deep"));
    }
    match filter {
        Filter::Condition(condition) => validate_condition(schema, condition),
        Filter::And(children) | Filter::Or(children) => {
            if children.is_empty() {
                return Err(ContactsError::invalid("empty filter group"));
            }
            children
                .iter()
                .try_for_each(|child| validate_filter(schema, child, depth + 1))
        }
    }
}

fn validate_condition(schema: &ViewSchema, condition: &Condition) -> ContactsResult<()> {
    let (_, descriptor) = schema.require(condition.property)?;
    if !descriptor.kind.is_scalar() {
        return Err(ContactsError::invalid(format!(
            "cannot filter by list property {}",
            descriptor.name
        )));
    }
    if condition.op == MatchOp::IsNull {
        return Ok(());
    }
    if condition.value.kind() != descriptor.kind {
        return Err(ContactsError::invalid(format!(
            "filter value for {} is {}, expected {}",
            descriptor.name,
            condition.value.kind(),
            descriptor.kind
        )));
    }
    if condition.op.is_text_match() {
        if descriptor.kind != DataKind::Str {
            return Err(ContactsError::invalid(format!(
                "text match on non-string property {}",
                descriptor.name
            )));
        }
        if matches!(condition.value, Value::Str(None)) {
            return Err(ContactsError::invalid(format!(
                "text match on {} needs a value",
                descriptor.name
            )));
        }
    }
    if condition.op.is_ordering() && descriptor.kind == DataKind::Bool {
        return Err(ContactsError::invalid(format!(
            "ordering comparison on bool property {}",
            descriptor.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Filter, MatchOp, Query};
    use crate::error::ContactsError;
    use crate::schema::property::{contact, number, person, updated_info, view};
    use crate::schema::SchemaRegistry;

    fn schema(uri: &str) -> std::sync::Arc<crate::schema::ViewSchema> {
        let registry = SchemaRegistry::builtin().unwrap();
        std::sync::Arc::clone(registry.schema(uri).unwrap())
    }

    #[test]
    fn valid_query_passes() {
        let query = Query::new(view::NUMBER)
            .with_filter(Filter::and(vec![
                Filter::eq(number::TYPE, number::TYPE_CELL),
                Filter::contains(number::NUMBER, "555"),
            ]))
            .sort_by(number::NUMBER, true)
            .project(&[number::ID, number::NUMBER]);
        query.validate(&schema(view::NUMBER)).unwrap();
    }

    #[test]
    fn foreign_property_is_rejected() {
        let query = Query::new(view::NUMBER).project(&[person::RINGTONE_PATH]);
        assert!(matches!(
            query.validate(&schema(view::NUMBER)),
            Err(ContactsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn mismatched_condition_value_is_rejected() {
        let query = Query::new(view::NUMBER).with_filter(Filter::eq(number::TYPE, "cell"));
        assert!(query.validate(&schema(view::NUMBER)).is_err());

        let query = Query::new(view::NUMBER).with_filter(Filter::condition(
            number::IS_DEFAULT,
            MatchOp::Greater,
            true,
        ));
        assert!(query.validate(&schema(view::NUMBER)).is_err());
    }

    #[test]
    fn list_properties_cannot_be_sorted_or_filtered() {
        let query = Query::new(view::CONTACT).sort_by(contact::NUMBERS, true);
        assert!(query.validate(&schema(view::CONTACT)).is_err());
    }

    #[test]
    fn empty_groups_and_filter_only_projection_are_rejected() {
        let query = Query::new(view::NUMBER).with_filter(Filter::or(Vec::new()));
        assert!(query.validate(&schema(view::NUMBER)).is_err());

        let query = Query::new(view::UPDATED_INFO).project(&[updated_info::VIEW_URI]);
        assert!(query.validate(&schema(view::UPDATED_INFO)).is_err());
    }
}
