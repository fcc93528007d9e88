//! Translation of validated queries into SQLite statements.
//!
//! # Invariants
//! - Every user value is bound as a parameter, never spliced into SQL.
//! - Result order is total: the source's key column is always the last
//!   sort term, or every selected column for a DISTINCT projection without
//!   it, so pagination never reorders rows of an unchanged store.
//! - `limit == 0` means unbounded (`LIMIT -1`).

use super::{Condition, Filter, MatchOp, Query};
use crate::error::{ContactsError, ContactsResult};
use crate::record::{Record, Value};
use crate::schema::{DataKind, PropertyId, ViewSchema};
use rusqlite::types::Value as SqlValue;
use rusqlite::Row;

/// Property-to-column mapping of one readable source (table or SQL view).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnMap {
    pub source: &'static str,
    pub key_column: &'static str,
    pub columns: &'static [(PropertyId, &'static str)],
}

impl ColumnMap {
    pub(crate) fn column(&self, property: PropertyId) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|(candidate, _)| *candidate == property)
            .map(|(_, column)| *column)
    }

    fn require(&self, property: PropertyId) -> ContactsResult<&'static str> {
        self.column(property).ok_or_else(|| {
            ContactsError::invalid(format!(
                "property {property} is not queryable on {}",
                self.source
            ))
        })
    }
}

/// Backend-specific restriction ANDed with the query filter.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    pub clause: String,
    pub binds: Vec<SqlValue>,
}

/// Compiled SELECT plus the record slots each result column fills.
#[derive(Debug)]
pub(crate) struct SelectPlan {
    pub sql: String,
    pub binds: Vec<SqlValue>,
    pub slots: Vec<(usize, DataKind)>,
    pub key_index: Option<usize>,
    pub projection: Vec<PropertyId>,
}

pub(crate) fn build_select(
    map: &ColumnMap,
    schema: &ViewSchema,
    query: Option<&Query>,
    scope: Option<&Scope>,
    offset: usize,
    limit: usize,
) -> ContactsResult<SelectPlan> {
    let projection = query.map(|query| query.projection()).unwrap_or_default();
    let mut slots = Vec::new();
    let mut columns = Vec::new();
    for (index, descriptor) in schema.descriptors().iter().enumerate() {
        if !descriptor.projectable || !descriptor.kind.is_scalar() {
            continue;
        }
        if !projection.is_empty() && !projection.contains(&descriptor.id) {
            continue;
        }
        columns.push(map.require(descriptor.id)?);
        slots.push((index, descriptor.kind));
    }
    let distinct = query.is_some_and(Query::is_distinct);
    // Non-distinct rows carry the key as a hidden trailing column so
    // backends can load children even when the projection omits the id.
    let key_index = if distinct {
        None
    } else {
        columns.push(map.key_column);
        Some(columns.len() - 1)
    };
    if columns.is_empty() {
        columns.push(map.key_column);
    }

    let mut sql = format!(
        "SELECT {}{} FROM {}",
        if distinct { "DISTINCT " } else { "" },
        columns.join(", "),
        map.source
    );
    let mut binds = Vec::new();
    push_where(&mut sql, &mut binds, map, query, scope)?;

    let mut order = Vec::new();
    for key in query.map(Query::sort_keys).unwrap_or_default() {
        let column = map.require(key.property)?;
        order.push(format!(
            "{column} {}",
            if key.ascending { "ASC" } else { "DESC" }
        ));
    }
    if !distinct || columns.contains(&map.key_column) {
        order.push(format!("{} ASC", map.key_column));
    } else {
        // DISTINCT rows are unique over the selected columns.
        order.extend(columns.iter().map(|column| format!("{column} ASC")));
    }
    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
    }

    sql.push_str(" LIMIT ? OFFSET ?");
    binds.push(SqlValue::Integer(if limit == 0 {
        -1
    } else {
        i64::try_from(limit).unwrap_or(i64::MAX)
    }));
    binds.push(SqlValue::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));

    Ok(SelectPlan {
        sql,
        binds,
        slots,
        key_index,
        projection: projection.to_vec(),
    })
}

pub(crate) fn build_count(
    map: &ColumnMap,
    query: Option<&Query>,
    scope: Option<&Scope>,
) -> ContactsResult<(String, Vec<SqlValue>)> {
    let mut sql = format!("SELECT COUNT(*) FROM {}", map.source);
    let mut binds = Vec::new();
    push_where(&mut sql, &mut binds, map, query, scope)?;
    Ok((sql, binds))
}

/// Copies one result row into `record` without touching dirty bits.
pub(crate) fn load_row(
    row: &Row<'_>,
    slots: &[(usize, DataKind)],
    record: &mut Record,
) -> ContactsResult<()> {
    for (column, (index, kind)) in slots.iter().enumerate() {
        let value = match kind {
            DataKind::Str => Value::Str(row.get::<_, Option<String>>(column)?),
            DataKind::Bool => Value::Bool(row.get::<_, Option<bool>>(column)?.unwrap_or(false)),
            DataKind::Int => Value::Int(row.get::<_, Option<i32>>(column)?.unwrap_or(0)),
            DataKind::UInt => Value::UInt(row.get::<_, Option<u32>>(column)?.unwrap_or(0)),
            DataKind::LongLong => {
                Value::LongLong(row.get::<_, Option<i64>>(column)?.unwrap_or(0))
            }
            DataKind::Double => Value::Double(row.get::<_, Option<f64>>(column)?.unwrap_or(0.0)),
            DataKind::RecordList => {
                return Err(ContactsError::Internal(
                    "record list cannot be loaded from a column".to_string(),
                ))
            }
        };
        record.load(*index, value);
    }
    Ok(())
}

pub(crate) fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Str(Some(text)) => SqlValue::Text(text.clone()),
        Value::Str(None) => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Int(number) => SqlValue::Integer(i64::from(*number)),
        Value::UInt(number) => SqlValue::Integer(i64::from(*number)),
        Value::LongLong(number) => SqlValue::Integer(*number),
        Value::Double(number) => SqlValue::Real(*number),
    }
}

fn push_where(
    sql: &mut String,
    binds: &mut Vec<SqlValue>,
    map: &ColumnMap,
    query: Option<&Query>,
    scope: Option<&Scope>,
) -> ContactsResult<()> {
    let mut clauses = Vec::new();
    if let Some(filter) = query.and_then(Query::filter) {
        clauses.push(filter_sql(map, filter, binds)?);
    }
    if let Some(scope) = scope {
        clauses.push(format!("({})", scope.clause));
        binds.extend(scope.binds.iter().cloned());
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    Ok(())
}

fn filter_sql(map: &ColumnMap, filter: &Filter, binds: &mut Vec<SqlValue>) -> ContactsResult<String> {
    match filter {
        Filter::Condition(condition) => condition_sql(map, condition, binds),
        Filter::And(children) => group_sql(map, children, " AND ", binds),
        Filter::Or(children) => group_sql(map, children, " OR ", binds),
    }
}

fn group_sql(
    map: &ColumnMap,
    children: &[Filter],
    joiner: &str,
    binds: &mut Vec<SqlValue>,
) -> ContactsResult<String> {
    let parts = children
        .iter()
        .map(|child| filter_sql(map, child, binds))
        .collect::<ContactsResult<Vec<_>>>()?;
    Ok(format!("({})", parts.join(joiner)))
}

fn condition_sql(
    map: &ColumnMap,
    condition: &Condition,
    binds: &mut Vec<SqlValue>,
) -> ContactsResult<String> {
    let column = map.require(condition.property)?;
    let null_value = matches!(condition.value, Value::Str(None));
    let sql = match condition.op {
        MatchOp::IsNull => format!("{column} IS NULL"),
        MatchOp::Equal if null_value => format!("{column} IS NULL"),
        MatchOp::NotEqual if null_value => format!("{column} IS NOT NULL"),
        MatchOp::Equal => bind(binds, condition, format!("{column} = ?")),
        MatchOp::NotEqual => bind(binds, condition, format!("{column} <> ?")),
        MatchOp::Greater => bind(binds, condition, format!("{column} > ?")),
        MatchOp::GreaterOrEqual => bind(binds, condition, format!("{column} >= ?")),
        MatchOp::Less => bind(binds, condition, format!("{column} < ?")),
        MatchOp::LessOrEqual => bind(binds, condition, format!("{column} <= ?")),
        MatchOp::Contains | MatchOp::StartsWith | MatchOp::EndsWith | MatchOp::FullString => {
            let text = condition.value.as_str().unwrap_or_default();
            let escaped = escape_like(text);
            let pattern = match condition.op {
                MatchOp::Contains => format!("%{escaped}%"),
                MatchOp::StartsWith => format!("{escaped}%"),
                MatchOp::EndsWith => format!("%{escaped}"),
                _ => escaped,
            };
            binds.push(SqlValue::Text(pattern));
            format!("{column} LIKE ? ESCAPE '\\'")
        }
    };
    Ok(sql)
}

fn bind(binds: &mut Vec<SqlValue>, condition: &Condition, sql: String) -> String {
    binds.push(to_sql_value(&condition.value));
    sql
}

pub(crate) fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{build_count, build_select, escape_like, ColumnMap};
    use crate::query::{Filter, Query};
    use crate::schema::property::{number, view};
    use crate::schema::SchemaRegistry;
    use rusqlite::types::Value as SqlValue;

    const NUMBER_COLUMNS: ColumnMap = ColumnMap {
        source: "numbers",
        key_column: "id",
        columns: &[
            (number::ID, "id"),
            (number::CONTACT_ID, "contact_id"),
            (number::IS_DEFAULT, "is_default"),
            (number::TYPE, "type"),
            (number::LABEL, "label"),
            (number::NUMBER, "number"),
            (number::NORMALIZED_NUMBER, "normalized_number"),
        ],
    };

    #[test]
    fn select_appends_key_tie_break_and_unbounded_limit() {
        let registry = SchemaRegistry::builtin().unwrap();
        let schema = registry.schema(view::NUMBER).unwrap();
        let query = Query::new(view::NUMBER)
            .with_filter(Filter::contains(number::NUMBER, "5_5"))
            .sort_by(number::TYPE, false)
            .project(&[number::ID, number::NUMBER]);

        let plan = build_select(&NUMBER_COLUMNS, schema, Some(&query), None, 3, 0).unwrap();
        assert_eq!(
            plan.sql,
            "SELECT id, number, id FROM numbers WHERE number LIKE ? ESCAPE '\\' \
             ORDER BY type DESC, id ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            plan.binds,
            vec![
                SqlValue::Text("%5\\_5%".to_string()),
                SqlValue::Integer(-1),
                SqlValue::Integer(3),
            ]
        );
        assert_eq!(plan.slots.len(), 2);
        assert_eq!(plan.key_index, Some(2));
    }

    #[test]
    fn distinct_projection_without_key_orders_by_every_column() {
        let registry = SchemaRegistry::builtin().unwrap();
        let schema = registry.schema(view::NUMBER).unwrap();
        let query = Query::new(view::NUMBER)
            .sort_by(number::TYPE, true)
            .project(&[number::TYPE, number::LABEL])
            .distinct(true);

        let plan = build_select(&NUMBER_COLUMNS, schema, Some(&query), None, 0, 10).unwrap();
        assert_eq!(
            plan.sql,
            "SELECT DISTINCT type, label FROM numbers \
             ORDER BY type ASC, type ASC, label ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(plan.key_index, None);
    }

    #[test]
    fn count_ignores_projection_and_paging() {
        let query = Query::new(view::NUMBER)
            .with_filter(Filter::eq(number::TYPE, number::TYPE_CELL))
            .project(&[number::ID]);
        let (sql, binds) = build_count(&NUMBER_COLUMNS, Some(&query), None).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM numbers WHERE type = ?");
        assert_eq!(binds, vec![SqlValue::Integer(64)]);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
