//! Speed dial backend, keyed by the dial slot number instead of a row id.

use super::common::{
    count_rows, delete_row, fetch_one, fetch_records, require_row, update_row, writable_values,
    TableSpec,
};
use crate::error::{ContactsError, ContactsResult};
use crate::plugin::{ChangeType, ReadContext, RecordPlugin, WriteContext};
use crate::query::sql::ColumnMap;
use crate::query::Query;
use crate::record::{Record, RecordList};
use crate::schema::property::{speeddial, view};
use rusqlite::params;

const SPEC: TableSpec = TableSpec {
    view_uri: view::SPEEDDIAL,
    table: "speeddials",
    key_column: "speed_number",
    read: ColumnMap {
        source: "view_speeddial",
        key_column: "speed_number",
        columns: &[
            (speeddial::SPEEDDIAL_NUMBER, "speed_number"),
            (speeddial::NUMBER_ID, "number_id"),
            (speeddial::NUMBER, "number"),
            (speeddial::NUMBER_LABEL, "number_label"),
            (speeddial::NUMBER_TYPE, "number_type"),
            (speeddial::PERSON_ID, "person_id"),
            (speeddial::DISPLAY_NAME, "display_name"),
            (speeddial::IMAGE_THUMBNAIL_PATH, "image_thumbnail_path"),
        ],
    },
};

pub(crate) struct SpeeddialBackend;

fn slot_of(record: &Record) -> ContactsResult<i32> {
    let slot = record.get_int(speeddial::SPEEDDIAL_NUMBER)?;
    if slot <= 0 {
        return Err(ContactsError::invalid("speed dial number must be positive"));
    }
    Ok(slot)
}

fn require_number(ctx: &WriteContext<'_>, record: &Record) -> ContactsResult<i32> {
    let number_id = record.get_int(speeddial::NUMBER_ID)?;
    require_row(ctx.conn, "numbers", "id", number_id)
        .map_err(|_| ContactsError::invalid(format!("number {number_id} does not exist")))?;
    Ok(number_id)
}

impl RecordPlugin for SpeeddialBackend {
    fn view_uri(&self) -> &'static str {
        view::SPEEDDIAL
    }

    /// Assigns a number to a free slot and returns the slot.
    fn insert_record(&self, ctx: &WriteContext<'_>, record: &Record) -> ContactsResult<i32> {
        let slot = slot_of(record)?;
        let number_id = require_number(ctx, record)?;
        if require_row(ctx.conn, SPEC.table, SPEC.key_column, slot).is_ok() {
            return Err(ContactsError::invalid(format!(
                "speed dial {slot} is already assigned"
            )));
        }
        ctx.conn.execute(
            "INSERT INTO speeddials (speed_number, number_id) VALUES (?1, ?2);",
            params![slot, number_id],
        )?;
        ctx.log_change(view::SPEEDDIAL, slot, 0, ChangeType::Inserted)?;
        Ok(slot)
    }

    fn get_record(&self, ctx: &ReadContext<'_>, id: i32) -> ContactsResult<Record> {
        fetch_one(ctx, &SPEC, speeddial::SPEEDDIAL_NUMBER, id)
    }

    fn update_record(&self, ctx: &WriteContext<'_>, record: &Record) -> ContactsResult<()> {
        let slot = slot_of(record)?;
        if record.is_dirty(speeddial::NUMBER_ID)? {
            require_number(ctx, record)?;
        }
        let mut values = writable_values(&SPEC, record, true)?;
        values.retain(|(column, _)| *column != "speed_number");
        update_row(ctx.conn, SPEC.table, SPEC.key_column, slot, &values)?;
        ctx.log_change(view::SPEEDDIAL, slot, 0, ChangeType::Updated)
    }

    fn delete_record(&self, ctx: &WriteContext<'_>, id: i32) -> ContactsResult<()> {
        delete_row(ctx.conn, SPEC.table, SPEC.key_column, id)?;
        ctx.log_change(view::SPEEDDIAL, id, 0, ChangeType::Deleted)
    }

    fn replace_record(&self, ctx: &WriteContext<'_>, record: &Record, id: i32) -> ContactsResult<()> {
        let number_id = require_number(ctx, record)?;
        update_row(
            ctx.conn,
            SPEC.table,
            SPEC.key_column,
            id,
            &[("number_id", rusqlite::types::Value::Integer(i64::from(number_id)))],
        )?;
        ctx.log_change(view::SPEEDDIAL, id, 0, ChangeType::Updated)
    }

    fn get_all_records(&self, ctx: &ReadContext<'_>, offset: usize, limit: usize) -> ContactsResult<RecordList> {
        fetch_records(ctx, &SPEC, None, None, offset, limit)
    }

    fn get_records_with_query(
        &self,
        ctx: &ReadContext<'_>,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> ContactsResult<RecordList> {
        fetch_records(ctx, &SPEC, Some(query), None, offset, limit)
    }

    fn get_count(&self, ctx: &ReadContext<'_>) -> ContactsResult<usize> {
        count_rows(ctx, &SPEC, None, None)
    }

    fn get_count_with_query(&self, ctx: &ReadContext<'_>, query: &Query) -> ContactsResult<usize> {
        count_rows(ctx, &SPEC, Some(query), None)
    }
}
