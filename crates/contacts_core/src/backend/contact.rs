//! Contact backend: the composite entity owning name/number/email/address
//! children.
//!
//! # Responsibility
//! - Persist a contact row together with its child lists.
//! - Link every contact to a person, creating one when none is given.
//! - Keep `display_name` derived from the children.
//!
//! # Invariants
//! - `display_name` is the first name row, else the first number, else the
//!   first email.
//! - Updates write dirty columns only; children detached with
//!   `remove_child` are deleted, new children inserted, dirty ones updated.
//! - A person never outlives its last contact.

use super::child::{children_of, insert_child_row, update_child_row, ChildKind};
use super::common::{
    count_rows, delete_row, fetch_one, fetch_rows, insert_row, now_epoch_secs, persisted_id,
    require_row, set_column, update_row, writable_values, TableSpec,
};
use crate::error::{ContactsError, ContactsResult};
use crate::plugin::{ChangeType, ReadContext, RecordPlugin, WriteContext};
use crate::query::sql::ColumnMap;
use crate::query::Query;
use crate::record::{PropertyState, Record, RecordList, Slot};
use crate::schema::property::{contact, view};
use crate::schema::PropertyId;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

const SPEC: TableSpec = TableSpec {
    view_uri: view::CONTACT,
    table: "contacts",
    key_column: "id",
    read: ColumnMap {
        source: "contacts",
        key_column: "id",
        columns: &[
            (contact::ID, "id"),
            (contact::PERSON_ID, "person_id"),
            (contact::ADDRESSBOOK_ID, "addressbook_id"),
            (contact::DISPLAY_NAME, "display_name"),
            (contact::RINGTONE_PATH, "ringtone_path"),
            (contact::IMAGE_THUMBNAIL_PATH, "image_thumbnail_path"),
            (contact::VIBRATION, "vibration"),
            (contact::MESSAGE_ALERT, "message_alert"),
            (contact::IS_FAVORITE, "is_favorite"),
            (contact::UID, "uid"),
            (contact::CHANGED_TIME, "changed_time"),
            (contact::CREATED_VER, "created_ver"),
            (contact::CHANGED_VER, "changed_ver"),
        ],
    },
};

const CHILD_LISTS: [(PropertyId, ChildKind); 4] = [
    (contact::NAME, ChildKind::Name),
    (contact::NUMBERS, ChildKind::Number),
    (contact::EMAILS, ChildKind::Email),
    (contact::ADDRESSES, ChildKind::Address),
];

const CHILD_TABLES: [&str; 4] = ["names", "numbers", "emails", "addresses"];

pub(crate) struct ContactBackend;

struct StoredContact {
    addressbook_id: i32,
    person_id: i32,
}

fn stored_contact(conn: &Connection, id: i32) -> ContactsResult<StoredContact> {
    conn.query_row(
        "SELECT addressbook_id, person_id FROM contacts WHERE id = ?1;",
        [id],
        |row| {
            Ok(StoredContact {
                addressbook_id: row.get(0)?,
                person_id: row.get(1)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| ContactsError::no_data(format!("contact {id} not found")))
}

/// Marks a contact changed in the current version and logs it.
///
/// # Errors
/// - `InvalidParameter` when the contact does not exist.
pub(crate) fn touch_contact(ctx: &WriteContext<'_>, contact_id: i32) -> ContactsResult<()> {
    let stored = stored_contact(ctx.conn, contact_id).map_err(|err| match err {
        ContactsError::NoData(_) => {
            ContactsError::invalid(format!("parent contact {contact_id} does not exist"))
        }
        other => other,
    })?;
    ctx.conn.execute(
        "UPDATE contacts SET changed_ver = ?1, changed_time = ?2 WHERE id = ?3;",
        params![ctx.version, now_epoch_secs(), contact_id],
    )?;
    ctx.log_change(
        view::CONTACT,
        contact_id,
        stored.addressbook_id,
        ChangeType::Updated,
    )
}

/// Re-derives the display name of a contact and of the person showing it.
pub(crate) fn refresh_display_name(conn: &Connection, contact_id: i32) -> ContactsResult<()> {
    conn.execute(
        "UPDATE contacts
         SET display_name = COALESCE(
            (SELECT NULLIF(TRIM(COALESCE(first, '') || ' ' || COALESCE(last, '')), '')
             FROM names WHERE contact_id = ?1 ORDER BY id LIMIT 1),
            (SELECT number FROM numbers
             WHERE contact_id = ?1 AND COALESCE(number, '') <> ''
             ORDER BY id LIMIT 1),
            (SELECT email FROM emails
             WHERE contact_id = ?1 AND COALESCE(email, '') <> ''
             ORDER BY id LIMIT 1)
         )
         WHERE id = ?1;",
        [contact_id],
    )?;
    conn.execute(
        "UPDATE persons
         SET display_name = (SELECT display_name FROM contacts WHERE id = ?1)
         WHERE display_contact_id = ?1;",
        [contact_id],
    )?;
    Ok(())
}

fn load_children(ctx: &ReadContext<'_>, record: &mut Record, contact_id: i32) -> ContactsResult<()> {
    for (property, kind) in CHILD_LISTS {
        if record.property_state(property)? == PropertyState::Unset {
            continue;
        }
        let (index, _) = record.schema().require(property)?;
        let children = children_of(ctx, kind, contact_id)?;
        record.set_slot(index, Slot::Children(children));
    }
    Ok(())
}

fn load_all(ctx: &ReadContext<'_>, rows: Vec<(Option<i32>, Record)>) -> ContactsResult<RecordList> {
    let mut list = RecordList::for_view(view::CONTACT);
    for (key, mut record) in rows {
        if let Some(contact_id) = key {
            load_children(ctx, &mut record, contact_id)?;
        }
        list.append(record)?;
    }
    Ok(list)
}

fn require_addressbook(conn: &Connection, addressbook_id: i32) -> ContactsResult<()> {
    require_row(conn, "addressbooks", "id", addressbook_id).map_err(|err| match err {
        ContactsError::NoData(_) => {
            ContactsError::invalid(format!("address book {addressbook_id} does not exist"))
        }
        other => other,
    })
}

fn check_single_name(record: &Record) -> ContactsResult<()> {
    if record.child_count(contact::NAME)? > 1 {
        return Err(ContactsError::invalid("a contact has at most one name"));
    }
    Ok(())
}

fn insert_person_for(conn: &Connection, record: &Record) -> ContactsResult<i32> {
    conn.execute(
        "INSERT INTO persons (ringtone_path, image_thumbnail_path, vibration, message_alert, is_favorite)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            record.get_str_ref(contact::RINGTONE_PATH)?,
            record.get_str_ref(contact::IMAGE_THUMBNAIL_PATH)?,
            record.get_str_ref(contact::VIBRATION)?,
            record.get_str_ref(contact::MESSAGE_ALERT)?,
            record.get_bool(contact::IS_FAVORITE)?,
        ],
    )?;
    let rowid = conn.last_insert_rowid();
    i32::try_from(rowid).map_err(|_| ContactsError::Internal(format!("person id {rowid} overflows")))
}

fn insert_children(conn: &Connection, record: &Record, contact_id: i32) -> ContactsResult<()> {
    for (property, kind) in CHILD_LISTS {
        for child in record.children(property)?.iter() {
            insert_child_row(conn, kind, child, contact_id)?;
        }
    }
    Ok(())
}

fn sync_children(conn: &Connection, record: &Record, contact_id: i32) -> ContactsResult<()> {
    for (property, kind) in CHILD_LISTS {
        if record.property_state(property)? == PropertyState::Unset {
            continue;
        }
        let list = record.children(property)?;
        for removed in list.removed_ids() {
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE id = ?1 AND contact_id = ?2;",
                    kind.spec().table
                ),
                [*removed, contact_id],
            )?;
        }
        for child in list.iter() {
            match child.id() {
                None => {
                    insert_child_row(conn, kind, child, contact_id)?;
                }
                Some(_) if child.has_changes() => {
                    update_child_row(conn, kind, child, contact_id)?;
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

/// Deletes a person without contacts, or repoints its display contact.
fn settle_person(ctx: &WriteContext<'_>, person_id: i32, removed_contact: i32) -> ContactsResult<()> {
    let next: Option<i32> = ctx
        .conn
        .query_row(
            "SELECT MIN(id) FROM contacts WHERE person_id = ?1;",
            [person_id],
            |row| row.get(0),
        )?;
    match next {
        None => {
            ctx.conn
                .execute("DELETE FROM persons WHERE id = ?1;", [person_id])?;
            ctx.log_change(view::PERSON, person_id, 0, ChangeType::Deleted)
        }
        Some(next_contact) => {
            let changed = ctx.conn.execute(
                "UPDATE persons SET display_contact_id = ?1
                 WHERE id = ?2 AND display_contact_id = ?3;",
                [next_contact, person_id, removed_contact],
            )?;
            if changed > 0 {
                refresh_display_name(ctx.conn, next_contact)?;
            }
            Ok(())
        }
    }
}

impl RecordPlugin for ContactBackend {
    fn view_uri(&self) -> &'static str {
        view::CONTACT
    }

    fn insert_record(&self, ctx: &WriteContext<'_>, record: &Record) -> ContactsResult<i32> {
        let addressbook_id = record.get_int(contact::ADDRESSBOOK_ID)?;
        require_addressbook(ctx.conn, addressbook_id)?;
        check_single_name(record)?;

        let linked_person = record.get_int(contact::PERSON_ID)?;
        let person_id = if linked_person > 0 {
            require_row(ctx.conn, "persons", "id", linked_person).map_err(|_| {
                ContactsError::invalid(format!("person {linked_person} does not exist"))
            })?;
            linked_person
        } else {
            insert_person_for(ctx.conn, record)?
        };

        let uid = match record.get_str_ref(contact::UID)? {
            Some(uid) if !uid.trim().is_empty() => uid.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        let mut values = writable_values(&SPEC, record, false)?;
        set_column(&mut values, "person_id", SqlValue::Integer(i64::from(person_id)));
        set_column(&mut values, "uid", SqlValue::Text(uid));
        set_column(&mut values, "changed_time", SqlValue::Integer(now_epoch_secs()));
        set_column(&mut values, "created_ver", SqlValue::Integer(ctx.version));
        set_column(&mut values, "changed_ver", SqlValue::Integer(ctx.version));
        let id = insert_row(ctx.conn, SPEC.table, &values)?;

        if linked_person <= 0 {
            ctx.conn.execute(
                "UPDATE persons SET display_contact_id = ?1 WHERE id = ?2;",
                [id, person_id],
            )?;
            ctx.log_change(view::PERSON, person_id, 0, ChangeType::Inserted)?;
        }
        insert_children(ctx.conn, record, id)?;
        refresh_display_name(ctx.conn, id)?;
        ctx.log_change(view::CONTACT, id, addressbook_id, ChangeType::Inserted)?;
        Ok(id)
    }

    fn get_record(&self, ctx: &ReadContext<'_>, id: i32) -> ContactsResult<Record> {
        let mut record = fetch_one(ctx, &SPEC, contact::ID, id)?;
        load_children(ctx, &mut record, id)?;
        Ok(record)
    }

    fn update_record(&self, ctx: &WriteContext<'_>, record: &Record) -> ContactsResult<()> {
        let id = persisted_id(record)?;
        let stored = stored_contact(ctx.conn, id)?;
        if record.is_dirty(contact::PERSON_ID)?
            && record.get_int(contact::PERSON_ID)? != stored.person_id
        {
            return Err(ContactsError::invalid(
                "a contact cannot be moved to another person by update",
            ));
        }
        let mut addressbook_id = stored.addressbook_id;
        if record.is_dirty(contact::ADDRESSBOOK_ID)? {
            addressbook_id = record.get_int(contact::ADDRESSBOOK_ID)?;
            require_addressbook(ctx.conn, addressbook_id)?;
        }

        let mut values = writable_values(&SPEC, record, true)?;
        values.retain(|(column, _)| *column != "person_id");
        set_column(&mut values, "changed_time", SqlValue::Integer(now_epoch_secs()));
        set_column(&mut values, "changed_ver", SqlValue::Integer(ctx.version));
        update_row(ctx.conn, SPEC.table, SPEC.key_column, id, &values)?;

        sync_children(ctx.conn, record, id)?;
        refresh_display_name(ctx.conn, id)?;
        ctx.log_change(view::CONTACT, id, addressbook_id, ChangeType::Updated)
    }

    fn delete_record(&self, ctx: &WriteContext<'_>, id: i32) -> ContactsResult<()> {
        let stored = stored_contact(ctx.conn, id)?;
        delete_row(ctx.conn, SPEC.table, SPEC.key_column, id)?;
        settle_person(ctx, stored.person_id, id)?;
        ctx.log_change(view::CONTACT, id, stored.addressbook_id, ChangeType::Deleted)
    }

    /// Overwrites every writable column and replaces all children. The
    /// stored person link and, when the record has none, the uid are kept.
    fn replace_record(&self, ctx: &WriteContext<'_>, record: &Record, id: i32) -> ContactsResult<()> {
        let stored = stored_contact(ctx.conn, id)?;
        let addressbook_id = record.get_int(contact::ADDRESSBOOK_ID)?;
        require_addressbook(ctx.conn, addressbook_id)?;
        check_single_name(record)?;

        let mut values = writable_values(&SPEC, record, false)?;
        set_column(
            &mut values,
            "person_id",
            SqlValue::Integer(i64::from(stored.person_id)),
        );
        if record.get_str_ref(contact::UID)?.is_none() {
            values.retain(|(column, _)| *column != "uid");
        }
        set_column(&mut values, "changed_time", SqlValue::Integer(now_epoch_secs()));
        set_column(&mut values, "changed_ver", SqlValue::Integer(ctx.version));
        update_row(ctx.conn, SPEC.table, SPEC.key_column, id, &values)?;

        for table in CHILD_TABLES {
            ctx.conn
                .execute(&format!("DELETE FROM {table} WHERE contact_id = ?1;"), [id])?;
        }
        insert_children(ctx.conn, record, id)?;
        refresh_display_name(ctx.conn, id)?;
        ctx.log_change(view::CONTACT, id, addressbook_id, ChangeType::Updated)
    }

    fn get_all_records(&self, ctx: &ReadContext<'_>, offset: usize, limit: usize) -> ContactsResult<RecordList> {
        let rows = fetch_rows(ctx, &SPEC, None, None, offset, limit)?;
        load_all(ctx, rows)
    }

    fn get_records_with_query(
        &self,
        ctx: &ReadContext<'_>,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> ContactsResult<RecordList> {
        let rows = fetch_rows(ctx, &SPEC, Some(query), None, offset, limit)?;
        load_all(ctx, rows)
    }

    fn get_count(&self, ctx: &ReadContext<'_>) -> ContactsResult<usize> {
        count_rows(ctx, &SPEC, None, None)
    }

    fn get_count_with_query(&self, ctx: &ReadContext<'_>, query: &Query) -> ContactsResult<usize> {
        count_rows(ctx, &SPEC, Some(query), None)
    }
}
