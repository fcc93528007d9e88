//! Person backend: the aggregate shown to users over linked contacts.
//!
//! # Invariants
//! - Persons are created and removed only through their contacts.
//! - `display_name` mirrors the display contact's name.

use super::child::normalize_number;
use super::common::{
    count_rows, fetch_one, fetch_records, persisted_id, update_row, writable_values, TableSpec,
};
use super::contact::refresh_display_name;
use crate::error::{ContactsError, ContactsResult};
use crate::plugin::{ChangeType, ReadContext, RecordPlugin, SearchRange, WriteContext};
use crate::query::sql::{escape_like, ColumnMap, Scope};
use crate::query::Query;
use crate::record::{Record, RecordList};
use crate::schema::property::{person, view};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;

const SPEC: TableSpec = TableSpec {
    view_uri: view::PERSON,
    table: "persons",
    key_column: "id",
    read: ColumnMap {
        source: "view_person",
        key_column: "id",
        columns: &[
            (person::ID, "id"),
            (person::DISPLAY_NAME, "display_name"),
            (person::DISPLAY_CONTACT_ID, "display_contact_id"),
            (person::RINGTONE_PATH, "ringtone_path"),
            (person::IMAGE_THUMBNAIL_PATH, "image_thumbnail_path"),
            (person::VIBRATION, "vibration"),
            (person::MESSAGE_ALERT, "message_alert"),
            (person::IS_FAVORITE, "is_favorite"),
            (person::FAVORITE_PRIORITY, "favorite_priority"),
            (person::HAS_PHONENUMBER, "has_phonenumber"),
            (person::HAS_EMAIL, "has_email"),
            (person::LINK_COUNT, "link_count"),
        ],
    },
};

pub(crate) struct PersonBackend;

fn linked_contacts(conn: &Connection, person_id: i32) -> ContactsResult<Vec<(i32, i32)>> {
    let mut stmt = conn.prepare(
        "SELECT id, addressbook_id FROM contacts WHERE person_id = ?1 ORDER BY id;",
    )?;
    let rows = stmt
        .query_map([person_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Builds the keyword restriction for the requested data sections.
fn search_scope(keyword: &str, range: SearchRange) -> ContactsResult<Scope> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(ContactsError::invalid("search keyword cannot be empty"));
    }
    let pattern = format!("%{}%", escape_like(keyword));
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    if range.contains(SearchRange::NAME) {
        clauses.push(
            "display_name LIKE ? ESCAPE '\\' OR id IN (
                SELECT c.person_id FROM contacts c
                INNER JOIN names n ON n.contact_id = c.id
                WHERE n.first LIKE ? ESCAPE '\\' OR n.last LIKE ? ESCAPE '\\')"
                .to_string(),
        );
        binds.extend(std::iter::repeat(SqlValue::Text(pattern.clone())).take(3));
    }
    if range.contains(SearchRange::NUMBER) {
        let digits = normalize_number(keyword);
        if !digits.is_empty() {
            clauses.push(
                "id IN (
                    SELECT c.person_id FROM contacts c
                    INNER JOIN numbers n ON n.contact_id = c.id
                    WHERE n.normalized_number LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            binds.push(SqlValue::Text(format!("%{}%", escape_like(&digits))));
        }
    }
    if range.contains(SearchRange::DATA) {
        clauses.push(
            "id IN (
                SELECT c.person_id FROM contacts c
                INNER JOIN emails e ON e.contact_id = c.id
                WHERE e.email LIKE ? ESCAPE '\\'
                UNION
                SELECT c.person_id FROM contacts c
                INNER JOIN addresses a ON a.contact_id = c.id
                WHERE a.street LIKE ? ESCAPE '\\' OR a.locality LIKE ? ESCAPE '\\'
                   OR a.region LIKE ? ESCAPE '\\' OR a.country LIKE ? ESCAPE '\\'
                   OR a.postal_code LIKE ? ESCAPE '\\')"
                .to_string(),
        );
        binds.extend(std::iter::repeat(SqlValue::Text(pattern)).take(6));
    }

    if clauses.is_empty() {
        // A number-only search whose keyword has no dialable characters.
        clauses.push("0".to_string());
    }
    Ok(Scope {
        clause: clauses.join(" OR "),
        binds,
    })
}

impl RecordPlugin for PersonBackend {
    fn view_uri(&self) -> &'static str {
        view::PERSON
    }

    fn get_record(&self, ctx: &ReadContext<'_>, id: i32) -> ContactsResult<Record> {
        fetch_one(ctx, &SPEC, person::ID, id)
    }

    fn update_record(&self, ctx: &WriteContext<'_>, record: &Record) -> ContactsResult<()> {
        let id = persisted_id(record)?;
        let contacts = linked_contacts(ctx.conn, id)?;
        if contacts.is_empty() {
            return Err(ContactsError::no_data(format!("person {id} not found")));
        }
        let display_changed = record.is_dirty(person::DISPLAY_CONTACT_ID)?;
        if display_changed {
            let display_contact = record.get_int(person::DISPLAY_CONTACT_ID)?;
            if !contacts.iter().any(|(contact_id, _)| *contact_id == display_contact) {
                return Err(ContactsError::invalid(format!(
                    "contact {display_contact} is not linked to person {id}"
                )));
            }
        }

        let values = writable_values(&SPEC, record, true)?;
        update_row(ctx.conn, SPEC.table, SPEC.key_column, id, &values)?;
        if display_changed {
            refresh_display_name(ctx.conn, record.get_int(person::DISPLAY_CONTACT_ID)?)?;
        }
        ctx.log_change(view::PERSON, id, 0, ChangeType::Updated)
    }

    /// Deletes the person together with every linked contact.
    fn delete_record(&self, ctx: &WriteContext<'_>, id: i32) -> ContactsResult<()> {
        let contacts = linked_contacts(ctx.conn, id)?;
        let changed = ctx
            .conn
            .execute("DELETE FROM persons WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(ContactsError::no_data(format!("person {id} not found")));
        }
        for (contact_id, addressbook_id) in contacts {
            ctx.log_change(view::CONTACT, contact_id, addressbook_id, ChangeType::Deleted)?;
        }
        ctx.log_change(view::PERSON, id, 0, ChangeType::Deleted)
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

    /// Matches persons whose names, numbers or other data contain the
    /// keyword, ordered by display name.
    fn search_records(
        &self,
        ctx: &ReadContext<'_>,
        keyword: &str,
        offset: usize,
        limit: usize,
        range: SearchRange,
    ) -> ContactsResult<RecordList> {
        let scope = search_scope(keyword, range)?;
        let query = Query::new(view::PERSON).sort_by(person::DISPLAY_NAME, true);
        fetch_records(ctx, &SPEC, Some(&query), Some(&scope), offset, limit)
    }
}
