//! Server side of the IPC channel: frame in, frame out.

use super::{
    decode_request, encode_response_within, error_frame, function, get_ids, get_window,
    is_mutating, put_ids, MAX_FRAME_BYTES,
};
use crate::error::{ContactsError, ContactsResult};
use crate::marshal::{
    marshal_list, marshal_record, unmarshal_list, unmarshal_query, unmarshal_record,
    MarshalReader, MarshalWriter,
};
use crate::plugin::SearchRange;
use crate::service::ContactsService;
use log::{debug, warn};
use std::time::Instant;

/// Dispatches request frames to a `ContactsService`.
///
/// Calls are served one at a time; the service's transaction boundary is
/// the only serialization point.
pub struct IpcServer {
    service: ContactsService,
    max_reply_bytes: usize,
}

/// Settled records a write call sends back.
enum Settled {
    /// The call writes no records.
    Absent,
    Records(MarshalWriter),
    /// The records could not be encoded; the write committed regardless.
    Omitted,
}

/// Successful call outcome.
struct Reply {
    /// Committed version, mutations only.
    version: Option<i64>,
    payload: MarshalWriter,
    settled: Settled,
}

impl Reply {
    fn read(payload: MarshalWriter) -> Self {
        Self {
            version: None,
            payload,
            settled: Settled::Absent,
        }
    }

    fn write(version: i64, payload: MarshalWriter, settled: Settled) -> Self {
        Self {
            version: Some(version),
            payload,
            settled,
        }
    }

    /// Encodes the reply frame, dropping settled records that would
    /// overflow it.
    fn encode(self, function: &str, max_frame_bytes: usize) -> ContactsResult<Vec<u8>> {
        let Reply {
            version,
            payload,
            settled,
        } = self;
        let records = match settled {
            Settled::Absent => {
                return encode_response_within(version, payload.as_slice(), max_frame_bytes)
            }
            Settled::Records(records) => records,
            Settled::Omitted => return encode_unsettled(version, &payload, max_frame_bytes),
        };

        let mut body = MarshalWriter::new();
        body.put_bytes(payload.as_slice())?;
        body.put_bool(true)?;
        body.put_bytes(records.as_slice())?;
        match encode_response_within(version, body.as_slice(), max_frame_bytes) {
            Ok(frame) => Ok(frame),
            Err(err) => {
                warn!(
                    "event=ipc_reply module=ipc status=degraded function={function} settled=omitted error={err}"
                );
                encode_unsettled(version, &payload, max_frame_bytes)
            }
        }
    }
}

fn encode_unsettled(
    version: Option<i64>,
    payload: &MarshalWriter,
    max_frame_bytes: usize,
) -> ContactsResult<Vec<u8>> {
    let mut body = MarshalWriter::new();
    body.put_bytes(payload.as_slice())?;
    body.put_bool(false)?;
    encode_response_within(version, body.as_slice(), max_frame_bytes)
}

/// Marshals the settled copies of committed records.
fn settled(
    function: &str,
    fill: impl FnOnce(&mut MarshalWriter) -> ContactsResult<()>,
) -> Settled {
    let mut records = MarshalWriter::new();
    match fill(&mut records) {
        Ok(()) => Settled::Records(records),
        Err(err) => {
            warn!(
                "event=ipc_reply module=ipc status=degraded function={function} settled=omitted error={err}"
            );
            Settled::Omitted
        }
    }
}

impl IpcServer {
    pub fn new(service: ContactsService) -> Self {
        Self {
            service,
            max_reply_bytes: MAX_FRAME_BYTES,
        }
    }

    /// Caps reply frames below `MAX_FRAME_BYTES`, for peers with smaller
    /// receive buffers.
    pub fn with_max_reply_bytes(mut self, max_reply_bytes: usize) -> Self {
        self.max_reply_bytes = max_reply_bytes.min(MAX_FRAME_BYTES);
        self
    }

    pub fn service(&self) -> &ContactsService {
        &self.service
    }

    /// Handles one request frame and always returns a reply frame.
    pub fn handle_frame(&self, frame: &[u8]) -> Vec<u8> {
        let started_at = Instant::now();
        let (function, payload) = match decode_request(frame) {
            Ok(request) => request,
            Err(err) => {
                warn!("event=ipc_call module=ipc status=error error_code={} error={err}", err.code().as_i32());
                return error_frame(err.code());
            }
        };

        let outcome = self
            .dispatch(&function, payload)
            .and_then(|reply| reply.encode(&function, self.max_reply_bytes));
        match outcome {
            Ok(reply) => {
                debug!(
                    "event=ipc_call module=ipc status=ok function={function} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                reply
            }
            Err(err) => {
                warn!(
                    "event=ipc_call module=ipc status=error function={function} duration_ms={} error_code={} error={err}",
                    started_at.elapsed().as_millis(),
                    err.code().as_i32()
                );
                error_frame(err.code())
            }
        }
    }

    fn dispatch(&self, name: &str, payload: &[u8]) -> ContactsResult<Reply> {
        let registry = self.service.registry();
        let mut args = MarshalReader::new(payload);
        let mut out = MarshalWriter::new();

        let reply = match name {
            function::INSERT_RECORD => {
                let mut record = unmarshal_record(&mut args, registry)?;
                args.finish()?;
                let committed = self.service.insert_record(&mut record)?;
                out.put_i32(committed.value)?;
                let copies = settled(name, |copies| marshal_record(copies, &record));
                Reply::write(committed.version, out, copies)
            }
            function::INSERT_RECORDS => {
                let mut records = unmarshal_list(&mut args, registry)?;
                args.finish()?;
                let committed = self.service.insert_records(&mut records)?;
                put_ids(&mut out, &committed.value)?;
                let copies = settled(name, |copies| marshal_list(copies, &records));
                Reply::write(committed.version, out, copies)
            }
            function::GET_RECORD => {
                let view_uri = args.get_required_str("view uri")?;
                let id = args.get_i32()?;
                args.finish()?;
                marshal_record(&mut out, &self.service.get_record(&view_uri, id)?)?;
                Reply::read(out)
            }
            function::UPDATE_RECORD => {
                let mut record = unmarshal_record(&mut args, registry)?;
                args.finish()?;
                let version = self.service.update_record(&mut record)?;
                let copies = settled(name, |copies| marshal_record(copies, &record));
                Reply::write(version, out, copies)
            }
            function::UPDATE_RECORDS => {
                let mut records = unmarshal_list(&mut args, registry)?;
                args.finish()?;
                let version = self.service.update_records(&mut records)?;
                let copies = settled(name, |copies| marshal_list(copies, &records));
                Reply::write(version, out, copies)
            }
            function::DELETE_RECORD => {
                let view_uri = args.get_required_str("view uri")?;
                let id = args.get_i32()?;
                args.finish()?;
                let version = self.service.delete_record(&view_uri, id)?;
                Reply::write(version, out, Settled::Absent)
            }
            function::DELETE_RECORDS => {
                let view_uri = args.get_required_str("view uri")?;
                let ids = get_ids(&mut args)?;
                args.finish()?;
                let version = self.service.delete_records(&view_uri, &ids)?;
                Reply::write(version, out, Settled::Absent)
            }
            function::REPLACE_RECORD => {
                let mut record = unmarshal_record(&mut args, registry)?;
                let id = args.get_i32()?;
                args.finish()?;
                let version = self.service.replace_record(&mut record, id)?;
                let copies = settled(name, |copies| marshal_record(copies, &record));
                Reply::write(version, out, copies)
            }
            function::REPLACE_RECORDS => {
                let mut records = unmarshal_list(&mut args, registry)?;
                let ids = get_ids(&mut args)?;
                args.finish()?;
                let version = self.service.replace_records(&mut records, &ids)?;
                let copies = settled(name, |copies| marshal_list(copies, &records));
                Reply::write(version, out, copies)
            }
            function::GET_ALL_RECORDS => {
                let view_uri = args.get_required_str("view uri")?;
                let (offset, limit) = get_window(&mut args)?;
                args.finish()?;
                let list = self.service.get_all_records(&view_uri, offset, limit)?;
                marshal_list(&mut out, &list)?;
                Reply::read(out)
            }
            function::GET_RECORDS_WITH_QUERY => {
                let query = unmarshal_query(&mut args)?;
                let (offset, limit) = get_window(&mut args)?;
                args.finish()?;
                let list = self.service.get_records_with_query(&query, offset, limit)?;
                marshal_list(&mut out, &list)?;
                Reply::read(out)
            }
            function::GET_COUNT => {
                let view_uri = args.get_required_str("view uri")?;
                args.finish()?;
                out.put_len(self.service.get_count(&view_uri)?)?;
                Reply::read(out)
            }
            function::GET_COUNT_WITH_QUERY => {
                let query = unmarshal_query(&mut args)?;
                args.finish()?;
                out.put_len(self.service.get_count_with_query(&query)?)?;
                Reply::read(out)
            }
            function::SEARCH_RECORDS | function::SEARCH_RECORDS_WITH_RANGE => {
                let view_uri = args.get_required_str("view uri")?;
                let keyword = args.get_required_str("keyword")?;
                let (offset, limit) = get_window(&mut args)?;
                let range = if name == function::SEARCH_RECORDS_WITH_RANGE {
                    SearchRange::from_bits(args.get_u8()?)?
                } else {
                    SearchRange::all()
                };
                args.finish()?;
                let list = self
                    .service
                    .search_records_with_range(&view_uri, &keyword, offset, limit, range)?;
                marshal_list(&mut out, &list)?;
                Reply::read(out)
            }
            function::GET_CURRENT_VERSION => {
                args.finish()?;
                out.put_i64(self.service.get_current_version()?)?;
                Reply::read(out)
            }
            function::GET_CHANGES_BY_VERSION => {
                let view_uri = args.get_required_str("view uri")?;
                let scoped = args.get_bool()?;
                let addressbook_id = args.get_i32()?;
                let addressbook_id = scoped.then_some(addressbook_id);
                let since = args.get_i64()?;
                args.finish()?;
                let changes = self
                    .service
                    .get_changes_by_version(&view_uri, addressbook_id, since)?;
                out.put_i64(changes.version)?;
                marshal_list(&mut out, &changes.value)?;
                Reply::read(out)
            }
            other => {
                return Err(ContactsError::NotSupported(format!(
                    "ipc function {other}"
                )))
            }
        };

        debug_assert_eq!(reply.version.is_some(), is_mutating(name));
        Ok(reply)
    }
}
