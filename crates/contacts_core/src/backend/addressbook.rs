//! Address book backend.

use super::common::{
    count_rows, delete_row, fetch_one, fetch_records, insert_row, persisted_id, require_row,
    update_row, writable_values, TableSpec,
};
use crate::error::{ContactsError, ContactsResult};
use crate::plugin::{ChangeType, ReadContext, RecordPlugin, WriteContext};
use crate::query::sql::ColumnMap;
use crate::query::Query;
use crate::record::{Record, RecordList};
use crate::schema::property::{addressbook, view};

const SPEC: TableSpec = TableSpec {
    view_uri: view::ADDRESSBOOK,
    table: "addressbooks",
    key_column: "id",
    read: ColumnMap {
        source: "addressbooks",
        key_column: "id",
        columns: &[
            (addressbook::ID, "id"),
            (addressbook::NAME, "name"),
            (addressbook::ACCOUNT_ID, "account_id"),
            (addressbook::MODE, "mode"),
        ],
    },
};

pub(crate) struct AddressbookBackend;

fn require_name(record: &Record) -> ContactsResult<()> {
    match record.get_str_ref(addressbook::NAME)? {
        Some(name) if !name.trim().is_empty() => Ok(()),
        _ => Err(ContactsError::invalid("address book name is required")),
    }
}

impl RecordPlugin for AddressbookBackend {
    fn view_uri(&self) -> &'static str {
        view::ADDRESSBOOK
    }

    fn insert_record(&self, ctx: &WriteContext<'_>, record: &Record) -> ContactsResult<i32> {
        require_name(record)?;
        let values = writable_values(&SPEC, record, false)?;
        let id = insert_row(ctx.conn, SPEC.table, &values)?;
        ctx.log_change(view::ADDRESSBOOK, id, id, ChangeType::Inserted)?;
        Ok(id)
    }

    fn get_record(&self, ctx: &ReadContext<'_>, id: i32) -> ContactsResult<Record> {
        fetch_one(ctx, &SPEC, addressbook::ID, id)
    }

    fn update_record(&self, ctx: &WriteContext<'_>, record: &Record) -> ContactsResult<()> {
        let id = persisted_id(record)?;
        if record.is_dirty(addressbook::NAME)? {
            require_name(record)?;
        }
        let values = writable_values(&SPEC, record, true)?;
        update_row(ctx.conn, SPEC.table, SPEC.key_column, id, &values)?;
        ctx.log_change(view::ADDRESSBOOK, id, id, ChangeType::Updated)
    }

    /// Deletes the book, its contacts, and persons left without contacts.
    fn delete_record(&self, ctx: &WriteContext<'_>, id: i32) -> ContactsResult<()> {
        if id == addressbook::DEFAULT_ID {
            return Err(ContactsError::invalid("the default address book cannot be deleted"));
        }
        require_row(ctx.conn, SPEC.table, SPEC.key_column, id)?;

        let mut stmt = ctx
            .conn
            .prepare("SELECT id FROM contacts WHERE addressbook_id = ?1 ORDER BY id;")?;
        let contact_ids = stmt
            .query_map([id], |row| row.get::<_, i32>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        ctx.conn
            .execute("DELETE FROM contacts WHERE addressbook_id = ?1;", [id])?;
        ctx.conn.execute(
            "DELETE FROM persons WHERE id NOT IN (SELECT person_id FROM contacts);",
            [],
        )?;
        delete_row(ctx.conn, SPEC.table, SPEC.key_column, id)?;
        for contact_id in contact_ids {
            ctx.log_change(view::CONTACT, contact_id, id, ChangeType::Deleted)?;
        }
        ctx.log_change(view::ADDRESSBOOK, id, id, ChangeType::Deleted)
    }

    fn replace_record(&self, ctx: &WriteContext<'_>, record: &Record, id: i32) -> ContactsResult<()> {
        require_name(record)?;
        let values = writable_values(&SPEC, record, false)?;
        update_row(ctx.conn, SPEC.table, SPEC.key_column, id, &values)?;
        ctx.log_change(view::ADDRESSBOOK, id, id, ChangeType::Updated)
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
