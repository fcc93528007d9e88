//! Backend plugin contract implemented once per view.
//!
//! # Responsibility
//! - Define the CRUD/query function set a view's backend provides.
//! - Carry the connection, registry and transaction version into backends.
//!
//! # Invariants
//! - Write operations run inside the caller's open transaction and never
//!   commit or roll back themselves.
//! - Backends never clear dirty bits; the service does after commit.

use crate::error::{ContactsError, ContactsResult};
use crate::query::Query;
use crate::record::{Record, RecordList};
use crate::schema::SchemaRegistry;
use rusqlite::{params, Connection};

/// Kind of mutation recorded in the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Inserted,
    Updated,
    Deleted,
}

impl ChangeType {
    pub fn code(self) -> i32 {
        match self {
            Self::Inserted => 0,
            Self::Updated => 1,
            Self::Deleted => 2,
        }
    }
}

/// Data sections a keyword search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchRange(u8);

impl SearchRange {
    pub const NAME: Self = Self(1);
    pub const NUMBER: Self = Self(1 << 1);
    pub const DATA: Self = Self(1 << 2);

    pub const fn all() -> Self {
        Self(Self::NAME.0 | Self::NUMBER.0 | Self::DATA.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Builds a range from raw bits, rejecting unknown or empty sets.
    pub fn from_bits(bits: u8) -> ContactsResult<Self> {
        if bits == 0 || bits & !Self::all().0 != 0 {
            return Err(ContactsError::invalid(format!("invalid search range {bits:#x}")));
        }
        Ok(Self(bits))
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for SearchRange {
    fn default() -> Self {
        Self::all()
    }
}

/// Read-side environment handed to backends.
#[derive(Clone, Copy)]
pub struct ReadContext<'a> {
    pub conn: &'a Connection,
    pub registry: &'a SchemaRegistry,
}

/// Write-side environment: an open transaction plus the version the
/// current mutation will commit as.
#[derive(Clone, Copy)]
pub struct WriteContext<'a> {
    pub conn: &'a Connection,
    pub registry: &'a SchemaRegistry,
    pub version: i64,
}

impl<'a> WriteContext<'a> {
    pub fn reader(&self) -> ReadContext<'a> {
        ReadContext {
            conn: self.conn,
            registry: self.registry,
        }
    }

    /// Appends one change-log row tagged with the current version.
    pub fn log_change(
        &self,
        view_uri: &str,
        record_id: i32,
        addressbook_id: i32,
        change: ChangeType,
    ) -> ContactsResult<()> {
        self.conn.execute(
            "INSERT INTO change_log (view_uri, record_id, addressbook_id, change_type, version)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![view_uri, record_id, addressbook_id, change.code(), self.version],
        )?;
        Ok(())
    }
}

fn unsupported<T>(view_uri: &str, operation: &str) -> ContactsResult<T> {
    Err(ContactsError::NotSupported(format!(
        "{operation} on {view_uri}"
    )))
}

/// CRUD/query function set of one view.
///
/// Every method defaults to `NotSupported`; backends implement the
/// operations their view allows.
pub trait RecordPlugin: Send + Sync {
    fn view_uri(&self) -> &'static str;

    /// Persists a new record and returns its assigned id.
    fn insert_record(&self, _ctx: &WriteContext<'_>, _record: &Record) -> ContactsResult<i32> {
        unsupported(self.view_uri(), "insert")
    }

    /// Loads one record by primary id; `NoData` when absent.
    fn get_record(&self, _ctx: &ReadContext<'_>, _id: i32) -> ContactsResult<Record> {
        unsupported(self.view_uri(), "get")
    }

    /// Writes the dirty properties of a persisted record.
    fn update_record(&self, _ctx: &WriteContext<'_>, _record: &Record) -> ContactsResult<()> {
        unsupported(self.view_uri(), "update")
    }

    fn delete_record(&self, _ctx: &WriteContext<'_>, _id: i32) -> ContactsResult<()> {
        unsupported(self.view_uri(), "delete")
    }

    /// Overwrites every writable property of row `id` with `record`.
    fn replace_record(
        &self,
        _ctx: &WriteContext<'_>,
        _record: &Record,
        _id: i32,
    ) -> ContactsResult<()> {
        unsupported(self.view_uri(), "replace")
    }

    fn get_all_records(
        &self,
        _ctx: &ReadContext<'_>,
        _offset: usize,
        _limit: usize,
    ) -> ContactsResult<RecordList> {
        unsupported(self.view_uri(), "get_all")
    }

    fn get_records_with_query(
        &self,
        _ctx: &ReadContext<'_>,
        _query: &Query,
        _offset: usize,
        _limit: usize,
    ) -> ContactsResult<RecordList> {
        unsupported(self.view_uri(), "query")
    }

    fn get_count(&self, _ctx: &ReadContext<'_>) -> ContactsResult<usize> {
        unsupported(self.view_uri(), "count")
    }

    fn get_count_with_query(&self, _ctx: &ReadContext<'_>, _query: &Query) -> ContactsResult<usize> {
        unsupported(self.view_uri(), "count_with_query")
    }

    fn search_records(
        &self,
        _ctx: &ReadContext<'_>,
        _keyword: &str,
        _offset: usize,
        _limit: usize,
        _range: SearchRange,
    ) -> ContactsResult<RecordList> {
        unsupported(self.view_uri(), "search")
    }
}
