//! Backends of the contact child views: name, number, email, address.
//!
//! # Responsibility
//! - Persist child rows under an existing parent contact.
//! - Derive `normalized_number` for numbers.
//! - Keep at most one default row per contact and child kind.
//!
//! # Invariants
//! - A child row always references an existing contact.
//! - An address without content is never stored.
//! - A contact has at most one name row.

use super::common::{
    count_rows, delete_row, fetch_one, fetch_records, insert_row, persisted_id, set_column,
    update_row, writable_values, TableSpec,
};
use super::contact::touch_contact;
use crate::error::{ContactsError, ContactsResult};
use crate::plugin::{ReadContext, RecordPlugin, WriteContext};
use crate::query::sql::ColumnMap;
use crate::query::Query;
use crate::record::{Record, RecordList};
use crate::schema::property::{address, email, name, number, view};
use crate::schema::PropertyId;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};

static NUMBER_NOISE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9+*#]").expect("valid number noise regex"));

pub(crate) const NAME_SPEC: TableSpec = TableSpec {
    view_uri: view::NAME,
    table: "names",
    key_column: "id",
    read: ColumnMap {
        source: "names",
        key_column: "id",
        columns: &[
            (name::ID, "id"),
            (name::CONTACT_ID, "contact_id"),
            (name::FIRST, "first"),
            (name::LAST, "last"),
            (name::ADDITION, "addition"),
            (name::PREFIX, "prefix"),
            (name::SUFFIX, "suffix"),
        ],
    },
};

pub(crate) const NUMBER_SPEC: TableSpec = TableSpec {
    view_uri: view::NUMBER,
    table: "numbers",
    key_column: "id",
    read: ColumnMap {
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
    },
};

pub(crate) const EMAIL_SPEC: TableSpec = TableSpec {
    view_uri: view::EMAIL,
    table: "emails",
    key_column: "id",
    read: ColumnMap {
        source: "emails",
        key_column: "id",
        columns: &[
            (email::ID, "id"),
            (email::CONTACT_ID, "contact_id"),
            (email::IS_DEFAULT, "is_default"),
            (email::TYPE, "type"),
            (email::LABEL, "label"),
            (email::EMAIL, "email"),
        ],
    },
};

pub(crate) const ADDRESS_SPEC: TableSpec = TableSpec {
    view_uri: view::ADDRESS,
    table: "addresses",
    key_column: "id",
    read: ColumnMap {
        source: "addresses",
        key_column: "id",
        columns: &[
            (address::ID, "id"),
            (address::CONTACT_ID, "contact_id"),
            (address::IS_DEFAULT, "is_default"),
            (address::TYPE, "type"),
            (address::LABEL, "label"),
            (address::POBOX, "pobox"),
            (address::POSTAL_CODE, "postal_code"),
            (address::REGION, "region"),
            (address::LOCALITY, "locality"),
            (address::STREET, "street"),
            (address::EXTENDED, "extended"),
            (address::COUNTRY, "country"),
        ],
    },
};

/// Strips everything but digits and dial symbols.
pub fn normalize_number(raw: &str) -> String {
    NUMBER_NOISE_RE.replace_all(raw, "").into_owned()
}

/// Returns whether any address content field holds non-empty text.
pub fn address_has_content(record: &Record) -> ContactsResult<bool> {
    for property in address::CONTENT_FIELDS {
        if record
            .get_str_ref(property)?
            .is_some_and(|text| !text.trim().is_empty())
        {
            return Ok(true);
        }
    }
    Ok(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildKind {
    Name,
    Number,
    Email,
    Address,
}

impl ChildKind {
    pub(crate) fn spec(self) -> &'static TableSpec {
        match self {
            Self::Name => &NAME_SPEC,
            Self::Number => &NUMBER_SPEC,
            Self::Email => &EMAIL_SPEC,
            Self::Address => &ADDRESS_SPEC,
        }
    }

    fn view_uri(self) -> &'static str {
        self.spec().view_uri
    }

    fn id_property(self) -> PropertyId {
        match self {
            Self::Name => name::ID,
            Self::Number => number::ID,
            Self::Email => email::ID,
            Self::Address => address::ID,
        }
    }

    pub(crate) fn contact_property(self) -> PropertyId {
        match self {
            Self::Name => name::CONTACT_ID,
            Self::Number => number::CONTACT_ID,
            Self::Email => email::CONTACT_ID,
            Self::Address => address::CONTACT_ID,
        }
    }

    fn default_property(self) -> Option<PropertyId> {
        match self {
            Self::Name => None,
            Self::Number => Some(number::IS_DEFAULT),
            Self::Email => Some(email::IS_DEFAULT),
            Self::Address => Some(address::IS_DEFAULT),
        }
    }
}

/// Inserts one child row under `contact_id` without touching the parent.
///
/// The caller guarantees the parent exists.
pub(crate) fn insert_child_row(
    conn: &Connection,
    kind: ChildKind,
    record: &Record,
    contact_id: i32,
) -> ContactsResult<i32> {
    if kind == ChildKind::Address && !address_has_content(record)? {
        return Err(ContactsError::invalid("address has no content"));
    }
    if kind == ChildKind::Name && name_row_of(conn, contact_id)?.is_some() {
        return Err(ContactsError::invalid(format!(
            "contact {contact_id} already has a name"
        )));
    }

    let spec = kind.spec();
    let mut values = writable_values(spec, record, false)?;
    set_column(
        &mut values,
        "contact_id",
        SqlValue::Integer(i64::from(contact_id)),
    );
    if kind == ChildKind::Number {
        set_column(&mut values, "normalized_number", normalized_column(record)?);
    }
    let id = insert_row(conn, spec.table, &values)?;
    if is_default_set(kind, record)? {
        clear_sibling_defaults(conn, kind, contact_id, id)?;
    }
    Ok(id)
}

/// Writes dirty columns of a persisted child; returns `false` when an
/// address lost all content and was deleted instead.
pub(crate) fn update_child_row(
    conn: &Connection,
    kind: ChildKind,
    record: &Record,
    contact_id: i32,
) -> ContactsResult<bool> {
    let spec = kind.spec();
    let id = persisted_id(record)?;
    let stored_contact = parent_of(conn, kind, id)?;
    if stored_contact != contact_id {
        return Err(ContactsError::invalid(format!(
            "{} {id} belongs to contact {stored_contact}, not {contact_id}",
            kind.view_uri()
        )));
    }
    if kind == ChildKind::Address && !address_has_content(record)? {
        delete_row(conn, spec.table, spec.key_column, id)?;
        return Ok(false);
    }

    let mut values = writable_values(spec, record, true)?;
    values.retain(|(column, _)| *column != "contact_id");
    if kind == ChildKind::Number && record.is_dirty(number::NUMBER)? {
        set_column(&mut values, "normalized_number", normalized_column(record)?);
    }
    update_row(conn, spec.table, spec.key_column, id, &values)?;
    if is_default_set(kind, record)? {
        clear_sibling_defaults(conn, kind, contact_id, id)?;
    }
    Ok(true)
}

/// Loads the children of one contact in insertion order.
pub(crate) fn children_of(
    ctx: &ReadContext<'_>,
    kind: ChildKind,
    contact_id: i32,
) -> ContactsResult<RecordList> {
    let query = Query::new(kind.view_uri())
        .with_filter(crate::query::Filter::eq(kind.contact_property(), contact_id));
    fetch_records(ctx, kind.spec(), Some(&query), None, 0, 0)
}

fn parent_of(conn: &Connection, kind: ChildKind, id: i32) -> ContactsResult<i32> {
    let spec = kind.spec();
    conn.query_row(
        &format!("SELECT contact_id FROM {} WHERE id = ?1;", spec.table),
        [id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| ContactsError::no_data(format!("{} {id} not found", spec.view_uri)))
}

fn name_row_of(conn: &Connection, contact_id: i32) -> ContactsResult<Option<i32>> {
    Ok(conn
        .query_row(
            "SELECT id FROM names WHERE contact_id = ?1 LIMIT 1;",
            [contact_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn normalized_column(record: &Record) -> ContactsResult<SqlValue> {
    Ok(match record.get_str_ref(number::NUMBER)? {
        Some(raw) => SqlValue::Text(normalize_number(raw)),
        None => SqlValue::Null,
    })
}

fn is_default_set(kind: ChildKind, record: &Record) -> ContactsResult<bool> {
    match kind.default_property() {
        Some(property) => record.get_bool(property),
        None => Ok(false),
    }
}

fn clear_sibling_defaults(
    conn: &Connection,
    kind: ChildKind,
    contact_id: i32,
    keep_id: i32,
) -> ContactsResult<()> {
    conn.execute(
        &format!(
            "UPDATE {} SET is_default = 0 WHERE contact_id = ?1 AND id <> ?2;",
            kind.spec().table
        ),
        [contact_id, keep_id],
    )?;
    Ok(())
}

/// Standalone backend of one child view; every mutation touches the
/// parent contact.
pub(crate) struct ChildBackend {
    kind: ChildKind,
}

impl ChildBackend {
    pub(crate) const fn new(kind: ChildKind) -> Self {
        Self { kind }
    }
}

impl RecordPlugin for ChildBackend {
    fn view_uri(&self) -> &'static str {
        self.kind.view_uri()
    }

    fn insert_record(&self, ctx: &WriteContext<'_>, record: &Record) -> ContactsResult<i32> {
        let contact_id = record.get_int(self.kind.contact_property())?;
        if contact_id <= 0 {
            return Err(ContactsError::invalid(format!(
                "{} needs a parent contact id",
                self.view_uri()
            )));
        }
        // Validates the parent before any child row is written.
        touch_contact(ctx, contact_id)?;
        let id = insert_child_row(ctx.conn, self.kind, record, contact_id)?;
        super::contact::refresh_display_name(ctx.conn, contact_id)?;
        Ok(id)
    }

    fn get_record(&self, ctx: &ReadContext<'_>, id: i32) -> ContactsResult<Record> {
        fetch_one(ctx, self.kind.spec(), self.kind.id_property(), id)
    }

    fn update_record(&self, ctx: &WriteContext<'_>, record: &Record) -> ContactsResult<()> {
        let id = persisted_id(record)?;
        let contact_id = parent_of(ctx.conn, self.kind, id)?;
        if record.is_dirty(self.kind.contact_property())?
            && record.get_int(self.kind.contact_property())? != contact_id
        {
            return Err(ContactsError::invalid(format!(
                "{} cannot move to another contact",
                self.view_uri()
            )));
        }
        update_child_row(ctx.conn, self.kind, record, contact_id)?;
        touch_contact(ctx, contact_id)?;
        super::contact::refresh_display_name(ctx.conn, contact_id)
    }

    fn delete_record(&self, ctx: &WriteContext<'_>, id: i32) -> ContactsResult<()> {
        let contact_id = parent_of(ctx.conn, self.kind, id)?;
        let spec = self.kind.spec();
        delete_row(ctx.conn, spec.table, spec.key_column, id)?;
        touch_contact(ctx, contact_id)?;
        super::contact::refresh_display_name(ctx.conn, contact_id)
    }

    fn replace_record(&self, ctx: &WriteContext<'_>, record: &Record, id: i32) -> ContactsResult<()> {
        let contact_id = parent_of(ctx.conn, self.kind, id)?;
        let spec = self.kind.spec();
        if self.kind == ChildKind::Address && !address_has_content(record)? {
            return Err(ContactsError::invalid("address has no content"));
        }
        let mut values = writable_values(spec, record, false)?;
        set_column(
            &mut values,
            "contact_id",
            SqlValue::Integer(i64::from(contact_id)),
        );
        if self.kind == ChildKind::Number {
            set_column(&mut values, "normalized_number", normalized_column(record)?);
        }
        update_row(ctx.conn, spec.table, spec.key_column, id, &values)?;
        if is_default_set(self.kind, record)? {
            clear_sibling_defaults(ctx.conn, self.kind, contact_id, id)?;
        }
        touch_contact(ctx, contact_id)?;
        super::contact::refresh_display_name(ctx.conn, contact_id)
    }

    fn get_all_records(&self, ctx: &ReadContext<'_>, offset: usize, limit: usize) -> ContactsResult<RecordList> {
        fetch_records(ctx, self.kind.spec(), None, None, offset, limit)
    }

    fn get_records_with_query(
        &self,
        ctx: &ReadContext<'_>,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> ContactsResult<RecordList> {
        fetch_records(ctx, self.kind.spec(), Some(query), None, offset, limit)
    }

    fn get_count(&self, ctx: &ReadContext<'_>) -> ContactsResult<usize> {
        count_rows(ctx, self.kind.spec(), None, None)
    }

    fn get_count_with_query(&self, ctx: &ReadContext<'_>, query: &Query) -> ContactsResult<usize> {
        count_rows(ctx, self.kind.spec(), Some(query), None)
    }
}

#[cfg(test)]
mod tests {
    use super::{address_has_content, normalize_number};
    use crate::schema::property::{address, view};
    use crate::schema::SchemaRegistry;

    #[test]
    fn normalization_keeps_dial_symbols() {
        assert_eq!(normalize_number("+1 (555) 123-4567"), "+15551234567");
        assert_eq!(normalize_number("*31#"), "*31#");
        assert_eq!(normalize_number("call me"), "");
    }

    #[test]
    fn address_content_requires_any_non_blank_field() {
        let registry = SchemaRegistry::builtin().unwrap();
        let mut record = registry.create_record(view::ADDRESS).unwrap();
        assert!(!address_has_content(&record).unwrap());

        record.set_str(address::STREET, Some("  ")).unwrap();
        record.set_str(address::LABEL, Some("home")).unwrap();
        assert!(!address_has_content(&record).unwrap());

        record.set_str(address::COUNTRY, Some("NZ")).unwrap();
        assert!(address_has_content(&record).unwrap());
    }
}
