//! Client side of the IPC channel: the CRUD surface over a transport.

use super::transport::IpcTransport;
use super::{decode_response, encode_request, function, get_ids, is_mutating, put_ids, put_window};
use crate::error::ContactsResult;
use crate::marshal::{
    marshal_list, marshal_query, marshal_record, unmarshal_list, unmarshal_record, MarshalReader,
    MarshalWriter,
};
use crate::plugin::SearchRange;
use crate::query::Query;
use crate::record::{Record, RecordList, Value};
use crate::schema::SchemaRegistry;
use crate::service::Committed;
use log::warn;
use std::sync::Arc;

/// Remote CRUD facade.
///
/// Mirrors `ContactsService` and remembers the version of the last
/// mutation it observed, for incremental sync through
/// `get_changes_by_version`.
pub struct IpcClient<T: IpcTransport> {
    transport: T,
    registry: Arc<SchemaRegistry>,
    last_version: Option<i64>,
}

impl<T: IpcTransport> IpcClient<T> {
    pub fn new(transport: T, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            transport,
            registry,
            last_version: None,
        }
    }

    /// Version of the newest mutation this client committed or observed.
    pub fn last_version(&self) -> Option<i64> {
        self.last_version
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Inserts one record; the record is replaced by the server's settled copy.
    ///
    /// When the server leaves the copy out, only the new id is loaded and the
    /// record keeps its dirty bits.
    pub fn insert_record(&mut self, record: &mut Record) -> ContactsResult<Committed<i32>> {
        let mut args = MarshalWriter::new();
        marshal_record(&mut args, record)?;
        let (version, reply) = self.call(function::INSERT_RECORD, args)?;
        let mut reader = MarshalReader::new(&reply);
        let id = reader.get_i32()?;
        match self.settled_record(function::INSERT_RECORD, &mut reader)? {
            Some(stored) => record.reload_from(stored),
            None => {
                if let Some(primary) = record.schema().primary_id_property() {
                    record.load_property(primary, Value::Int(id))?;
                }
            }
        }
        Ok(Committed { value: id, version })
    }

    pub fn insert_records(&mut self, records: &mut RecordList) -> ContactsResult<Committed<Vec<i32>>> {
        let mut args = MarshalWriter::new();
        marshal_list(&mut args, records)?;
        let (version, reply) = self.call(function::INSERT_RECORDS, args)?;
        let mut reader = MarshalReader::new(&reply);
        let ids = get_ids(&mut reader)?;
        if let Some(stored) = self.settled_list(function::INSERT_RECORDS, &mut reader)? {
            settle_list(records, stored);
        }
        Ok(Committed { value: ids, version })
    }

    pub fn get_record(&mut self, view_uri: &str, id: i32) -> ContactsResult<Record> {
        let mut args = MarshalWriter::new();
        args.put_str(Some(view_uri))?;
        args.put_i32(id)?;
        let (_, reply) = self.call(function::GET_RECORD, args)?;
        let mut reader = MarshalReader::new(&reply);
        let record = unmarshal_record(&mut reader, &self.registry)?;
        reader.finish()?;
        Ok(record)
    }

    pub fn update_record(&mut self, record: &mut Record) -> ContactsResult<i64> {
        let mut args = MarshalWriter::new();
        marshal_record(&mut args, record)?;
        let (version, reply) = self.call(function::UPDATE_RECORD, args)?;
        let mut reader = MarshalReader::new(&reply);
        if let Some(stored) = self.settled_record(function::UPDATE_RECORD, &mut reader)? {
            record.reload_from(stored);
        }
        Ok(version)
    }

    pub fn update_records(&mut self, records: &mut RecordList) -> ContactsResult<i64> {
        let mut args = MarshalWriter::new();
        marshal_list(&mut args, records)?;
        let (version, reply) = self.call(function::UPDATE_RECORDS, args)?;
        let mut reader = MarshalReader::new(&reply);
        if let Some(stored) = self.settled_list(function::UPDATE_RECORDS, &mut reader)? {
            settle_list(records, stored);
        }
        Ok(version)
    }

    pub fn delete_record(&mut self, view_uri: &str, id: i32) -> ContactsResult<i64> {
        let mut args = MarshalWriter::new();
        args.put_str(Some(view_uri))?;
        args.put_i32(id)?;
        let (version, _) = self.call(function::DELETE_RECORD, args)?;
        Ok(version)
    }

    pub fn delete_records(&mut self, view_uri: &str, ids: &[i32]) -> ContactsResult<i64> {
        let mut args = MarshalWriter::new();
        args.put_str(Some(view_uri))?;
        put_ids(&mut args, ids)?;
        let (version, _) = self.call(function::DELETE_RECORDS, args)?;
        Ok(version)
    }

    pub fn replace_record(&mut self, record: &mut Record, id: i32) -> ContactsResult<i64> {
        let mut args = MarshalWriter::new();
        marshal_record(&mut args, record)?;
        args.put_i32(id)?;
        let (version, reply) = self.call(function::REPLACE_RECORD, args)?;
        let mut reader = MarshalReader::new(&reply);
        if let Some(stored) = self.settled_record(function::REPLACE_RECORD, &mut reader)? {
            record.reload_from(stored);
        }
        Ok(version)
    }

    pub fn replace_records(&mut self, records: &mut RecordList, ids: &[i32]) -> ContactsResult<i64> {
        let mut args = MarshalWriter::new();
        marshal_list(&mut args, records)?;
        put_ids(&mut args, ids)?;
        let (version, reply) = self.call(function::REPLACE_RECORDS, args)?;
        let mut reader = MarshalReader::new(&reply);
        if let Some(stored) = self.settled_list(function::REPLACE_RECORDS, &mut reader)? {
            settle_list(records, stored);
        }
        Ok(version)
    }

    pub fn get_all_records(&mut self, view_uri: &str, offset: usize, limit: usize) -> ContactsResult<RecordList> {
        let mut args = MarshalWriter::new();
        args.put_str(Some(view_uri))?;
        put_window(&mut args, offset, limit)?;
        let (_, reply) = self.call(function::GET_ALL_RECORDS, args)?;
        self.read_list(&reply)
    }

    pub fn get_records_with_query(
        &mut self,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> ContactsResult<RecordList> {
        let mut args = MarshalWriter::new();
        marshal_query(&mut args, query)?;
        put_window(&mut args, offset, limit)?;
        let (_, reply) = self.call(function::GET_RECORDS_WITH_QUERY, args)?;
        self.read_list(&reply)
    }

    pub fn get_count(&mut self, view_uri: &str) -> ContactsResult<usize> {
        let mut args = MarshalWriter::new();
        args.put_str(Some(view_uri))?;
        let (_, reply) = self.call(function::GET_COUNT, args)?;
        read_count(&reply)
    }

    pub fn get_count_with_query(&mut self, query: &Query) -> ContactsResult<usize> {
        let mut args = MarshalWriter::new();
        marshal_query(&mut args, query)?;
        let (_, reply) = self.call(function::GET_COUNT_WITH_QUERY, args)?;
        read_count(&reply)
    }

    pub fn search_records(
        &mut self,
        view_uri: &str,
        keyword: &str,
        offset: usize,
        limit: usize,
    ) -> ContactsResult<RecordList> {
        let mut args = MarshalWriter::new();
        args.put_str(Some(view_uri))?;
        args.put_str(Some(keyword))?;
        put_window(&mut args, offset, limit)?;
        let (_, reply) = self.call(function::SEARCH_RECORDS, args)?;
        self.read_list(&reply)
    }

    pub fn search_records_with_range(
        &mut self,
        view_uri: &str,
        keyword: &str,
        offset: usize,
        limit: usize,
        range: SearchRange,
    ) -> ContactsResult<RecordList> {
        let mut args = MarshalWriter::new();
        args.put_str(Some(view_uri))?;
        args.put_str(Some(keyword))?;
        put_window(&mut args, offset, limit)?;
        args.put_u8(range.bits())?;
        let (_, reply) = self.call(function::SEARCH_RECORDS_WITH_RANGE, args)?;
        self.read_list(&reply)
    }

    pub fn get_current_version(&mut self) -> ContactsResult<i64> {
        let (_, reply) = self.call(function::GET_CURRENT_VERSION, MarshalWriter::new())?;
        let mut reader = MarshalReader::new(&reply);
        let version = reader.get_i64()?;
        reader.finish()?;
        self.observe(version);
        Ok(version)
    }

    /// Lists changes after `since_version`; the returned version is the
    /// server's current one.
    pub fn get_changes_by_version(
        &mut self,
        view_uri: &str,
        addressbook_id: Option<i32>,
        since_version: i64,
    ) -> ContactsResult<Committed<RecordList>> {
        let mut args = MarshalWriter::new();
        args.put_str(Some(view_uri))?;
        args.put_bool(addressbook_id.is_some())?;
        args.put_i32(addressbook_id.unwrap_or_default())?;
        args.put_i64(since_version)?;
        let (_, reply) = self.call(function::GET_CHANGES_BY_VERSION, args)?;

        let mut reader = MarshalReader::new(&reply);
        let version = reader.get_i64()?;
        let changes = unmarshal_list(&mut reader, &self.registry)?;
        reader.finish()?;
        self.observe(version);
        Ok(Committed {
            value: changes,
            version,
        })
    }

    /// Sends one call; mutating calls always yield a version.
    fn call(&mut self, name: &str, args: MarshalWriter) -> ContactsResult<(i64, Vec<u8>)> {
        let request = encode_request(name, args.as_slice())?;
        let reply = self.transport.call(&request)?;
        let (version, payload) = decode_response(&reply, is_mutating(name))?;
        if let Some(version) = version {
            self.observe(version);
        }
        Ok((version.unwrap_or_default(), payload.to_vec()))
    }

    fn observe(&mut self, version: i64) {
        self.last_version = Some(self.last_version.map_or(version, |last| last.max(version)));
    }

    /// Reads the `[settled][record]` tail of a write reply.
    fn settled_record(
        &self,
        function: &str,
        reader: &mut MarshalReader<'_>,
    ) -> ContactsResult<Option<Record>> {
        let stored = if reader.get_bool()? {
            Some(unmarshal_record(reader, &self.registry)?)
        } else {
            warn!("event=ipc_settle module=ipc status=skipped function={function}");
            None
        };
        reader.finish()?;
        Ok(stored)
    }

    fn settled_list(
        &self,
        function: &str,
        reader: &mut MarshalReader<'_>,
    ) -> ContactsResult<Option<RecordList>> {
        let stored = if reader.get_bool()? {
            Some(unmarshal_list(reader, &self.registry)?)
        } else {
            warn!("event=ipc_settle module=ipc status=skipped function={function}");
            None
        };
        reader.finish()?;
        Ok(stored)
    }

    fn read_list(&self, reply: &[u8]) -> ContactsResult<RecordList> {
        let mut reader = MarshalReader::new(reply);
        let list = unmarshal_list(&mut reader, &self.registry)?;
        reader.finish()?;
        Ok(list)
    }
}

fn read_count(reply: &[u8]) -> ContactsResult<usize> {
    let mut reader = MarshalReader::new(reply);
    let count = reader.get_u32()? as usize;
    reader.finish()?;
    Ok(count)
}

/// Copies the server's settled records onto the caller's, keeping handles.
fn settle_list(records: &mut RecordList, stored: RecordList) {
    for (record, stored) in records.iter_mut().zip(stored) {
        record.reload_from(stored);
    }
}
