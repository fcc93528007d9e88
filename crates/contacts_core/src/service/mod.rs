//! Transactional CRUD service over the registered views.
//!
//! # Responsibility
//! - Resolve a view's backend through the registry and check its
//!   permission tokens against the access policy.
//! - Run every mutating call in one IMMEDIATE transaction that bumps the
//!   global version counter exactly once.
//! - Settle persisted records (ids, dirty bits) after commit.
//!
//! # Invariants
//! - A failed call rolls back completely; batches never commit partially.
//! - Dirty bits are cleared only after a successful commit.
//! - Read calls never open a write transaction.

mod access;

pub use access::{AccessPolicy, AllowAll, TokenPolicy};

use crate::db::{open_db, open_db_in_memory};
use crate::error::{ContactsError, ContactsResult};
use crate::plugin::{ReadContext, SearchRange, WriteContext};
use crate::query::{Filter, MatchOp, Query};
use crate::record::{Record, RecordList, Value};
use crate::schema::property::{updated_info, view};
use crate::schema::{SchemaRegistry, ViewEntry};
use log::{debug, error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Result of a committed mutation together with the version it committed as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub value: T,
    pub version: i64,
}

/// Contacts CRUD facade over one store connection.
pub struct ContactsService {
    conn: Connection,
    registry: Arc<SchemaRegistry>,
    access: Box<dyn AccessPolicy>,
}

impl ContactsService {
    /// Creates a service over a migrated connection with `AllowAll` access.
    pub fn new(conn: Connection, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            conn,
            registry,
            access: Box::new(AllowAll),
        }
    }

    /// Opens the store at `path` and connects to the shared registry.
    pub fn open(path: impl AsRef<Path>) -> ContactsResult<Self> {
        let conn = open_db(path)?;
        Ok(Self::new(conn, SchemaRegistry::connect()?))
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> ContactsResult<Self> {
        let conn = open_db_in_memory()?;
        Ok(Self::new(conn, SchemaRegistry::connect()?))
    }

    /// Replaces the access policy.
    pub fn with_access_policy(mut self, access: impl AccessPolicy + 'static) -> Self {
        self.access = Box::new(access);
        self
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Creates an empty record of a registered view.
    pub fn create_record(&self, view_uri: &str) -> ContactsResult<Record> {
        self.registry.create_record(view_uri)
    }

    /// Inserts one record and returns its id.
    ///
    /// On success the id is loaded into the record's primary property and
    /// the record is marked clean.
    pub fn insert_record(&self, record: &mut Record) -> ContactsResult<Committed<i32>> {
        let entry = self.writable(record.view_uri())?;
        let committed = self.mutate("record_insert", record.view_uri(), |ctx| {
            entry.plugin.insert_record(ctx, &*record)
        })?;
        self.settle(entry, record, Some(committed.value))?;
        Ok(committed)
    }

    /// Inserts every record of `records` in one transaction.
    pub fn insert_records(&self, records: &mut RecordList) -> ContactsResult<Committed<Vec<i32>>> {
        let view_uri = batch_view(records)?;
        let entry = self.writable(&view_uri)?;
        let committed = self.mutate("records_insert", &view_uri, |ctx| {
            records
                .iter()
                .map(|record| entry.plugin.insert_record(ctx, record))
                .collect::<ContactsResult<Vec<_>>>()
        })?;
        for (record, id) in records.iter_mut().zip(&committed.value) {
            self.settle(entry, record, Some(*id))?;
        }
        Ok(committed)
    }

    /// Loads one record by id.
    ///
    /// # Errors
    /// - `NoData` when no row has `id`.
    pub fn get_record(&self, view_uri: &str, id: i32) -> ContactsResult<Record> {
        let entry = self.readable(view_uri)?;
        entry.plugin.get_record(&self.reader(), id)
    }

    /// Writes the dirty properties of a persisted record.
    pub fn update_record(&self, record: &mut Record) -> ContactsResult<i64> {
        let entry = self.writable(record.view_uri())?;
        let committed = self.mutate("record_update", record.view_uri(), |ctx| {
            entry.plugin.update_record(ctx, &*record)
        })?;
        self.settle(entry, record, None)?;
        Ok(committed.version)
    }

    pub fn update_records(&self, records: &mut RecordList) -> ContactsResult<i64> {
        let view_uri = batch_view(records)?;
        let entry = self.writable(&view_uri)?;
        let committed = self.mutate("records_update", &view_uri, |ctx| {
            records
                .iter()
                .try_for_each(|record| entry.plugin.update_record(ctx, record))
        })?;
        for record in records.iter_mut() {
            self.settle(entry, record, None)?;
        }
        Ok(committed.version)
    }

    pub fn delete_record(&self, view_uri: &str, id: i32) -> ContactsResult<i64> {
        let entry = self.writable(view_uri)?;
        let committed = self.mutate("record_delete", view_uri, |ctx| {
            entry.plugin.delete_record(ctx, id)
        })?;
        Ok(committed.version)
    }

    pub fn delete_records(&self, view_uri: &str, ids: &[i32]) -> ContactsResult<i64> {
        if ids.is_empty() {
            return Err(ContactsError::invalid("delete batch is empty"));
        }
        let entry = self.writable(view_uri)?;
        let committed = self.mutate("records_delete", view_uri, |ctx| {
            ids.iter()
                .try_for_each(|id| entry.plugin.delete_record(ctx, *id))
        })?;
        Ok(committed.version)
    }

    /// Overwrites row `id` with the content of `record`.
    pub fn replace_record(&self, record: &mut Record, id: i32) -> ContactsResult<i64> {
        let entry = self.writable(record.view_uri())?;
        let committed = self.mutate("record_replace", record.view_uri(), |ctx| {
            entry.plugin.replace_record(ctx, &*record, id)
        })?;
        self.settle(entry, record, Some(id))?;
        Ok(committed.version)
    }

    /// Replaces `ids[i]` with `records[i]`; both sides must have equal length.
    pub fn replace_records(&self, records: &mut RecordList, ids: &[i32]) -> ContactsResult<i64> {
        if records.len() != ids.len() {
            return Err(ContactsError::invalid(format!(
                "replace batch has {} records but {} ids",
                records.len(),
                ids.len()
            )));
        }
        let view_uri = batch_view(records)?;
        let entry = self.writable(&view_uri)?;
        let committed = self.mutate("records_replace", &view_uri, |ctx| {
            records
                .iter()
                .zip(ids)
                .try_for_each(|(record, id)| entry.plugin.replace_record(ctx, record, *id))
        })?;
        for (record, id) in records.iter_mut().zip(ids) {
            self.settle(entry, record, Some(*id))?;
        }
        Ok(committed.version)
    }

    /// Returns records of a view; `limit == 0` means unbounded.
    pub fn get_all_records(&self, view_uri: &str, offset: usize, limit: usize) -> ContactsResult<RecordList> {
        let entry = self.readable(view_uri)?;
        let list = entry.plugin.get_all_records(&self.reader(), offset, limit)?;
        debug!(
            "event=records_get_all module=service status=ok view={view_uri} offset={offset} limit={limit} count={}",
            list.len()
        );
        Ok(list)
    }

    /// Validates `query` against its view, then runs it.
    pub fn get_records_with_query(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> ContactsResult<RecordList> {
        let entry = self.readable(query.view_uri())?;
        query.validate(&entry.schema)?;
        let list = entry
            .plugin
            .get_records_with_query(&self.reader(), query, offset, limit)?;
        debug!(
            "event=records_query module=service status=ok view={} offset={offset} limit={limit} count={}",
            query.view_uri(),
            list.len()
        );
        Ok(list)
    }

    pub fn get_count(&self, view_uri: &str) -> ContactsResult<usize> {
        let entry = self.readable(view_uri)?;
        entry.plugin.get_count(&self.reader())
    }

    pub fn get_count_with_query(&self, query: &Query) -> ContactsResult<usize> {
        let entry = self.readable(query.view_uri())?;
        query.validate(&entry.schema)?;
        entry.plugin.get_count_with_query(&self.reader(), query)
    }

    /// Keyword search over every searchable section of a view.
    pub fn search_records(
        &self,
        view_uri: &str,
        keyword: &str,
        offset: usize,
        limit: usize,
    ) -> ContactsResult<RecordList> {
        self.search_records_with_range(view_uri, keyword, offset, limit, SearchRange::all())
    }

    pub fn search_records_with_range(
        &self,
        view_uri: &str,
        keyword: &str,
        offset: usize,
        limit: usize,
        range: SearchRange,
    ) -> ContactsResult<RecordList> {
        let entry = self.readable(view_uri)?;
        let list = entry
            .plugin
            .search_records(&self.reader(), keyword, offset, limit, range)?;
        debug!(
            "event=records_search module=service status=ok view={view_uri} range={:#x} count={}",
            range.bits(),
            list.len()
        );
        Ok(list)
    }

    /// Returns the version of the last committed mutation.
    pub fn get_current_version(&self) -> ContactsResult<i64> {
        current_version(&self.conn)
    }

    /// Lists changes of `view_uri` committed after `since_version`, oldest
    /// first, together with the current version.
    ///
    /// `addressbook_id` narrows the result to one addressbook.
    pub fn get_changes_by_version(
        &self,
        view_uri: &str,
        addressbook_id: Option<i32>,
        since_version: i64,
    ) -> ContactsResult<Committed<RecordList>> {
        self.readable(view_uri)?;
        let mut conditions = vec![
            Filter::eq(updated_info::VIEW_URI, view_uri),
            Filter::condition(updated_info::VERSION, MatchOp::Greater, since_version),
        ];
        if let Some(addressbook_id) = addressbook_id {
            conditions.push(Filter::eq(updated_info::ADDRESSBOOK_ID, addressbook_id));
        }
        let query = Query::new(view::UPDATED_INFO)
            .with_filter(Filter::and(conditions))
            .sort_by(updated_info::VERSION, true);

        let version = self.get_current_version()?;
        let changes = self.get_records_with_query(&query, 0, 0)?;
        Ok(Committed {
            value: changes,
            version,
        })
    }

    fn reader(&self) -> ReadContext<'_> {
        ReadContext {
            conn: &self.conn,
            registry: &self.registry,
        }
    }

    fn readable(&self, view_uri: &str) -> ContactsResult<&ViewEntry> {
        let entry = self.registry.lookup(view_uri)?;
        self.check(view_uri, entry.permissions.read)?;
        Ok(entry)
    }

    fn writable(&self, view_uri: &str) -> ContactsResult<&ViewEntry> {
        let entry = self.registry.lookup(view_uri)?;
        self.check(view_uri, entry.permissions.write)?;
        Ok(entry)
    }

    fn check(&self, view_uri: &str, token: &'static str) -> ContactsResult<()> {
        if self.access.allows(token) {
            return Ok(());
        }
        warn!("event=access_check module=service status=error view={view_uri} token={token}");
        Err(ContactsError::PermissionDenied(token))
    }

    /// Runs `apply` inside one IMMEDIATE transaction tagged with the next
    /// version. Any error rolls the whole transaction back.
    fn mutate<T>(
        &self,
        event: &'static str,
        view_uri: &str,
        apply: impl FnOnce(&WriteContext<'_>) -> ContactsResult<T>,
    ) -> ContactsResult<Committed<T>> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let version = bump_version(&tx)?;
        let ctx = WriteContext {
            conn: &tx,
            registry: &self.registry,
            version,
        };

        match apply(&ctx) {
            Ok(value) => {
                tx.commit()?;
                info!(
                    "event={event} module=service status=ok view={view_uri} version={version} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(Committed { value, version })
            }
            Err(err) => {
                error!(
                    "event={event} module=service status=error view={view_uri} duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code().as_i32(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Brings a committed record in line with the store.
    ///
    /// Records with child lists are reloaded so new children carry their
    /// ids; others get the id loaded and dirty bits cleared. A record whose
    /// reload fails keeps its dirty bits, since it no longer mirrors the
    /// stored row.
    fn settle(&self, entry: &ViewEntry, record: &mut Record, id: Option<i32>) -> ContactsResult<()> {
        if let (Some(id), Some(primary)) = (id, entry.schema.primary_id_property()) {
            record.load_property(primary, Value::Int(id))?;
        }
        if record.has_child_lists() {
            if let Some(id) = record.id() {
                match entry.plugin.get_record(&self.reader(), id) {
                    Ok(stored) => record.reload_from(stored),
                    Err(err) => warn!(
                        "event=record_reload module=service status=error view={} id={id} dirty=kept error={err}",
                        record.view_uri()
                    ),
                }
                return Ok(());
            }
        }
        record.clear_dirty();
        Ok(())
    }
}

fn batch_view(records: &RecordList) -> ContactsResult<String> {
    if records.is_empty() {
        return Err(ContactsError::invalid("record batch is empty"));
    }
    records
        .view_uri()
        .map(str::to_string)
        .ok_or_else(|| ContactsError::invalid("record batch has no view"))
}

fn bump_version(conn: &Connection) -> ContactsResult<i64> {
    conn.execute("UPDATE db_version SET version = version + 1;", [])?;
    current_version(conn)
}

fn current_version(conn: &Connection) -> ContactsResult<i64> {
    let version = conn.query_row("SELECT version FROM db_version;", [], |row| row.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::{ContactsService, TokenPolicy};
    use crate::db::open_db_in_memory;
    use crate::error::{ContactsError, ContactsResult};
    use crate::plugin::{ReadContext, RecordPlugin, WriteContext};
    use crate::record::Record;
    use crate::schema::property::{addressbook, contact, name, view};
    use crate::schema::{SchemaRegistry, ViewPermissions};
    use std::sync::Arc;

    /// Contact backend whose reads fail after a successful write.
    struct UnreadableContacts(Arc<dyn RecordPlugin>);

    impl RecordPlugin for UnreadableContacts {
        fn view_uri(&self) -> &'static str {
            self.0.view_uri()
        }

        fn insert_record(&self, ctx: &WriteContext<'_>, record: &Record) -> ContactsResult<i32> {
            self.0.insert_record(ctx, record)
        }

        fn get_record(&self, _ctx: &ReadContext<'_>, id: i32) -> ContactsResult<Record> {
            Err(ContactsError::no_data(format!("contact {id} is unreadable")))
        }
    }

    fn registry_with_unreadable_contacts() -> Arc<SchemaRegistry> {
        let builtin = SchemaRegistry::builtin().unwrap();
        let mut registry = SchemaRegistry::new();
        for uri in builtin.view_uris() {
            let entry = builtin.lookup(uri).unwrap();
            let plugin: Arc<dyn RecordPlugin> = if uri == view::CONTACT {
                Arc::new(UnreadableContacts(Arc::clone(&entry.plugin)))
            } else {
                Arc::clone(&entry.plugin)
            };
            registry
                .register(uri, entry.schema.descriptors(), plugin, entry.permissions)
                .unwrap();
        }
        Arc::new(registry)
    }

    fn addressbook_named(service: &ContactsService, name: &str) -> crate::record::Record {
        let mut record = service.create_record(view::ADDRESSBOOK).unwrap();
        record.set_str(addressbook::NAME, Some(name)).unwrap();
        record
    }

    #[test]
    fn insert_assigns_id_and_clears_dirty_bits() {
        let service = ContactsService::open_in_memory().unwrap();
        let mut record = addressbook_named(&service, "work");

        let committed = service.insert_record(&mut record).unwrap();
        assert_eq!(record.id(), Some(committed.value));
        assert!(!record.has_changes());
        assert_eq!(service.get_current_version().unwrap(), committed.version);
    }

    #[test]
    fn failed_mutation_keeps_version_and_dirty_bits() {
        let service = ContactsService::open_in_memory().unwrap();
        let before = service.get_current_version().unwrap();
        let mut record = service.create_record(view::ADDRESSBOOK).unwrap();
        record.set_str(addressbook::NAME, Some("")).unwrap();

        let err = service.insert_record(&mut record).unwrap_err();
        assert!(matches!(err, ContactsError::InvalidParameter(_)));
        assert!(record.is_dirty(addressbook::NAME).unwrap());
        assert_eq!(service.get_current_version().unwrap(), before);
    }

    #[test]
    fn read_only_policy_rejects_writes() {
        let service = ContactsService::open_in_memory()
            .unwrap()
            .with_access_policy(TokenPolicy::read_only());
        let mut record = addressbook_named(&service, "work");

        let err = service.insert_record(&mut record).unwrap_err();
        assert!(matches!(
            err,
            ContactsError::PermissionDenied(token) if token == ViewPermissions::CONTACT.write
        ));
        assert!(service.get_count(view::ADDRESSBOOK).is_ok());
    }

    #[test]
    fn failed_reload_after_commit_keeps_dirty_bits() {
        let service = ContactsService::new(
            open_db_in_memory().unwrap(),
            registry_with_unreadable_contacts(),
        );
        let mut record = service.create_record(view::CONTACT).unwrap();
        let mut full_name = service.create_record(view::NAME).unwrap();
        full_name.set_str(name::FIRST, Some("Ada")).unwrap();
        record.add_child(contact::NAME, full_name).unwrap();

        let committed = service.insert_record(&mut record).unwrap();
        assert_eq!(record.id(), Some(committed.value));
        assert!(record.has_changes());
        assert_eq!(service.get_current_version().unwrap(), committed.version);
        assert_eq!(service.get_count(view::CONTACT).unwrap(), 1);
    }

    #[test]
    fn empty_batches_are_rejected() {
        let service = ContactsService::open_in_memory().unwrap();
        let err = service.delete_records(view::ADDRESSBOOK, &[]).unwrap_err();
        assert!(matches!(err, ContactsError::InvalidParameter(_)));
    }
}
