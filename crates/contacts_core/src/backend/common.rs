//! Table access helpers shared by the built-in backends.
//!
//! # Invariants
//! - Inserts write every writable scalar; updates write dirty ones only.
//! - Read-only and primary-id properties are never taken from the caller;
//!   backends pass derived columns explicitly.

use crate::error::{ContactsError, ContactsResult};
use crate::plugin::ReadContext;
use crate::query::sql::{build_count, build_select, load_row, to_sql_value, ColumnMap, Scope};
use crate::query::{Filter, Query};
use crate::record::{Record, RecordList};
use crate::schema::PropertyId;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::time::{SystemTime, UNIX_EPOCH};

/// Storage binding of one view: write table plus read mapping.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TableSpec {
    pub view_uri: &'static str,
    pub table: &'static str,
    pub key_column: &'static str,
    pub read: ColumnMap,
}

impl TableSpec {
    fn column(&self, property: PropertyId) -> ContactsResult<&'static str> {
        self.read.column(property).ok_or_else(|| {
            ContactsError::Internal(format!(
                "property {property} has no column in {}",
                self.table
            ))
        })
    }
}

/// Loads rows as records, each paired with its key when the plan has one.
pub(crate) fn fetch_rows(
    ctx: &ReadContext<'_>,
    spec: &TableSpec,
    query: Option<&Query>,
    scope: Option<&Scope>,
    offset: usize,
    limit: usize,
) -> ContactsResult<Vec<(Option<i32>, Record)>> {
    let schema = ctx.registry.schema(spec.view_uri)?;
    let plan = build_select(&spec.read, schema, query, scope, offset, limit)?;
    let mut stmt = ctx.conn.prepare(&plan.sql)?;
    let mut rows = stmt.query(params_from_iter(plan.binds.iter()))?;

    let mut loaded = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = ctx.registry.create_record(spec.view_uri)?;
        record.apply_projection(&plan.projection);
        load_row(row, &plan.slots, &mut record)?;
        let key = match plan.key_index {
            Some(index) => row.get::<_, Option<i32>>(index)?,
            None => None,
        };
        loaded.push((key, record));
    }
    Ok(loaded)
}

pub(crate) fn fetch_records(
    ctx: &ReadContext<'_>,
    spec: &TableSpec,
    query: Option<&Query>,
    scope: Option<&Scope>,
    offset: usize,
    limit: usize,
) -> ContactsResult<RecordList> {
    let mut list = RecordList::for_view(spec.view_uri);
    for (_, record) in fetch_rows(ctx, spec, query, scope, offset, limit)? {
        list.append(record)?;
    }
    Ok(list)
}

/// Loads the single row whose `key` property equals `id`.
///
/// # Errors
/// - `NoData` when no such row exists.
pub(crate) fn fetch_one(
    ctx: &ReadContext<'_>,
    spec: &TableSpec,
    key: PropertyId,
    id: i32,
) -> ContactsResult<Record> {
    let query = Query::new(spec.view_uri).with_filter(Filter::eq(key, id));
    fetch_rows(ctx, spec, Some(&query), None, 0, 1)?
        .into_iter()
        .next()
        .map(|(_, record)| record)
        .ok_or_else(|| ContactsError::no_data(format!("{} {id} not found", spec.view_uri)))
}

pub(crate) fn count_rows(
    ctx: &ReadContext<'_>,
    spec: &TableSpec,
    query: Option<&Query>,
    scope: Option<&Scope>,
) -> ContactsResult<usize> {
    let (sql, binds) = build_count(&spec.read, query, scope)?;
    let count: i64 = ctx
        .conn
        .query_row(&sql, params_from_iter(binds.iter()), |row| row.get(0))?;
    usize::try_from(count).map_err(|_| ContactsError::Internal(format!("negative count {count}")))
}

/// Column/value pairs of the writable scalars of `record`.
pub(crate) fn writable_values(
    spec: &TableSpec,
    record: &Record,
    dirty_only: bool,
) -> ContactsResult<Vec<(&'static str, SqlValue)>> {
    let mut values = Vec::new();
    for (index, descriptor) in record.schema().descriptors().iter().enumerate() {
        if descriptor.read_only || !descriptor.kind.is_scalar() {
            continue;
        }
        if dirty_only && !record.dirty_set().contains(index) {
            continue;
        }
        let value = record.value_at(index).ok_or_else(|| {
            ContactsError::Internal(format!("scalar {} holds a list", descriptor.name))
        })?;
        values.push((spec.column(descriptor.id)?, to_sql_value(&value)));
    }
    Ok(values)
}

/// Replaces or adds an explicit column value.
pub(crate) fn set_column(values: &mut Vec<(&'static str, SqlValue)>, column: &'static str, value: SqlValue) {
    match values.iter_mut().find(|(candidate, _)| *candidate == column) {
        Some(entry) => entry.1 = value,
        None => values.push((column, value)),
    }
}

pub(crate) fn insert_row(
    conn: &Connection,
    table: &str,
    values: &[(&'static str, SqlValue)],
) -> ContactsResult<i32> {
    if values.is_empty() {
        conn.execute(&format!("INSERT INTO {table} DEFAULT VALUES;"), [])?;
    } else {
        let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders});",
            columns.join(", ")
        );
        conn.execute(&sql, params_from_iter(values.iter().map(|(_, value)| value)))?;
    }
    let rowid = conn.last_insert_rowid();
    i32::try_from(rowid).map_err(|_| ContactsError::Internal(format!("row id {rowid} overflows")))
}

/// Writes `values` into row `id`; an empty set only checks existence.
///
/// # Errors
/// - `NoData` when the row does not exist.
pub(crate) fn update_row(
    conn: &Connection,
    table: &str,
    key_column: &str,
    id: i32,
    values: &[(&'static str, SqlValue)],
) -> ContactsResult<()> {
    if values.is_empty() {
        return require_row(conn, table, key_column, id);
    }
    let assignments: Vec<String> = values
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect();
    let sql = format!(
        "UPDATE {table} SET {} WHERE {key_column} = ?;",
        assignments.join(", ")
    );
    let mut binds: Vec<&SqlValue> = values.iter().map(|(_, value)| value).collect();
    let key = SqlValue::Integer(i64::from(id));
    binds.push(&key);
    let changed = conn.execute(&sql, params_from_iter(binds))?;
    if changed == 0 {
        return Err(ContactsError::no_data(format!("{table} row {id} not found")));
    }
    Ok(())
}

pub(crate) fn delete_row(conn: &Connection, table: &str, key_column: &str, id: i32) -> ContactsResult<()> {
    let changed = conn.execute(
        &format!("DELETE FROM {table} WHERE {key_column} = ?1;"),
        [id],
    )?;
    if changed == 0 {
        return Err(ContactsError::no_data(format!("{table} row {id} not found")));
    }
    Ok(())
}

pub(crate) fn require_row(conn: &Connection, table: &str, key_column: &str, id: i32) -> ContactsResult<()> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE {key_column} = ?1;"),
            [id],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(ContactsError::no_data(format!("{table} row {id} not found"))),
    }
}

/// Primary id of a persisted record, required by update-style calls.
pub(crate) fn persisted_id(record: &Record) -> ContactsResult<i32> {
    record.id().ok_or_else(|| {
        ContactsError::invalid(format!(
            "{} record has no id; insert it first",
            record.view_uri()
        ))
    })
}

pub(crate) fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
