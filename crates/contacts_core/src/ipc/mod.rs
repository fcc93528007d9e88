//! IPC envelope, server dispatch, client and transports.
//!
//! # Responsibility
//! - Frame calls as `[u32 len][u16 protocol version][function name][payload]`.
//! - Frame replies as `[u32 len][i32 error code][i64 version][payload]`, where
//!   the version is present only for a successful mutating call.
//! - Replies of record-writing calls end with `[bool settled][records]`; the
//!   records are left out when they would overflow the frame, since the
//!   write has already committed.
//!
//! # Invariants
//! - `len` counts the bytes after the length field.
//! - A reply with a non-zero code carries nothing after the code.
//! - Peers with a different protocol version are rejected, never guessed at.

mod client;
mod server;
mod transport;

pub use client::IpcClient;
pub use server::IpcServer;
pub use transport::{IpcTransport, LoopbackTransport};
#[cfg(unix)]
pub use transport::{serve_unix_listener, serve_unix_stream, UnixSocketTransport};

use crate::error::{ContactsError, ContactsResult, ErrorCode};
use crate::marshal::{MarshalReader, MarshalWriter};
use bytes::BufMut;

/// Wire protocol revision. Bump on any change to a payload layout.
pub const PROTOCOL_VERSION: u16 = 1;

/// Largest frame either side accepts.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const LEN_BYTES: usize = 4;

/// Function names carried in request frames.
pub mod function {
    pub const INSERT_RECORD: &str = "insert_record";
    pub const INSERT_RECORDS: &str = "insert_records";
    pub const GET_RECORD: &str = "get_record";
    pub const UPDATE_RECORD: &str = "update_record";
    pub const UPDATE_RECORDS: &str = "update_records";
    pub const DELETE_RECORD: &str = "delete_record";
    pub const DELETE_RECORDS: &str = "delete_records";
    pub const REPLACE_RECORD: &str = "replace_record";
    pub const REPLACE_RECORDS: &str = "replace_records";
    pub const GET_ALL_RECORDS: &str = "get_all_records";
    pub const GET_RECORDS_WITH_QUERY: &str = "get_records_with_query";
    pub const GET_COUNT: &str = "get_count";
    pub const GET_COUNT_WITH_QUERY: &str = "get_count_with_query";
    pub const SEARCH_RECORDS: &str = "search_records";
    pub const SEARCH_RECORDS_WITH_RANGE: &str = "search_records_with_range";
    pub const GET_CURRENT_VERSION: &str = "get_current_version";
    pub const GET_CHANGES_BY_VERSION: &str = "get_changes_by_version";

    pub(crate) const MUTATING: &[&str] = &[
        INSERT_RECORD,
        INSERT_RECORDS,
        UPDATE_RECORD,
        UPDATE_RECORDS,
        DELETE_RECORD,
        DELETE_RECORDS,
        REPLACE_RECORD,
        REPLACE_RECORDS,
    ];
}

/// Returns whether a successful reply to `function` carries a version.
pub fn is_mutating(function: &str) -> bool {
    function::MUTATING.iter().any(|name| *name == function)
}

/// Builds a request frame.
pub fn encode_request(function: &str, payload: &[u8]) -> ContactsResult<Vec<u8>> {
    let mut body = MarshalWriter::new();
    body.put_u16(PROTOCOL_VERSION)?;
    body.put_str(Some(function))?;
    body.put_bytes(payload)?;
    seal(body, MAX_FRAME_BYTES)
}

/// Splits a request frame into function name and payload.
///
/// # Errors
/// - `Ipc` for a length mismatch or a foreign protocol version.
pub fn decode_request(frame: &[u8]) -> ContactsResult<(String, &[u8])> {
    let mut reader = MarshalReader::new(open(frame)?);
    let version = reader.get_u16().map_err(desync)?;
    if version != PROTOCOL_VERSION {
        return Err(ContactsError::Ipc(format!(
            "protocol version {version} is not supported (expected {PROTOCOL_VERSION})"
        )));
    }
    let function = reader
        .get_required_str("function name")
        .map_err(desync)?;
    Ok((function, reader.rest()))
}

/// Builds a success reply frame.
pub fn encode_response(version: Option<i64>, payload: &[u8]) -> ContactsResult<Vec<u8>> {
    encode_response_within(version, payload, MAX_FRAME_BYTES)
}

pub(crate) fn encode_response_within(
    version: Option<i64>,
    payload: &[u8],
    max_frame_bytes: usize,
) -> ContactsResult<Vec<u8>> {
    let mut body = MarshalWriter::new();
    body.put_i32(ErrorCode::None.as_i32())?;
    if let Some(version) = version {
        body.put_i64(version)?;
    }
    body.put_bytes(payload)?;
    seal(body, max_frame_bytes)
}

/// Builds a failure reply frame. Infallible so it can report allocation
/// failures of the regular path.
pub fn error_frame(code: ErrorCode) -> Vec<u8> {
    let mut frame = Vec::with_capacity(LEN_BYTES + 4);
    frame.put_u32_le(4);
    frame.put_i32_le(code.as_i32());
    frame
}

/// Unpacks a reply frame into the committed version and the payload.
///
/// # Errors
/// - The remote error, rebuilt from its code, for a failed call.
/// - `Ipc` when the frame is malformed.
pub fn decode_response(frame: &[u8], mutating: bool) -> ContactsResult<(Option<i64>, &[u8])> {
    let mut reader = MarshalReader::new(open(frame)?);
    let code = reader.get_i32().map_err(desync)?;
    if code != ErrorCode::None.as_i32() {
        return Err(ContactsError::from_code(code));
    }
    let version = if mutating {
        Some(reader.get_i64().map_err(desync)?)
    } else {
        None
    };
    Ok((version, reader.rest()))
}

/// Reads the `[offset][limit]` pair of paging calls.
pub(crate) fn get_window(reader: &mut MarshalReader<'_>) -> ContactsResult<(usize, usize)> {
    let offset = reader.get_u32()? as usize;
    let limit = reader.get_u32()? as usize;
    Ok((offset, limit))
}

pub(crate) fn put_window(writer: &mut MarshalWriter, offset: usize, limit: usize) -> ContactsResult<()> {
    writer.put_len(offset)?;
    writer.put_len(limit)
}

pub(crate) fn put_ids(writer: &mut MarshalWriter, ids: &[i32]) -> ContactsResult<()> {
    writer.put_len(ids.len())?;
    ids.iter().try_for_each(|id| writer.put_i32(*id))
}

pub(crate) fn get_ids(reader: &mut MarshalReader<'_>) -> ContactsResult<Vec<i32>> {
    let count = reader.get_len(4)?;
    (0..count).map(|_| reader.get_i32()).collect()
}

fn seal(body: MarshalWriter, max_frame_bytes: usize) -> ContactsResult<Vec<u8>> {
    let body = body.into_bytes();
    if body.len() > max_frame_bytes {
        return Err(ContactsError::Ipc(format!(
            "frame of {} bytes exceeds limit {max_frame_bytes}",
            body.len()
        )));
    }
    let mut frame = MarshalWriter::new();
    frame.put_len(body.len())?;
    frame.put_bytes(&body)?;
    Ok(frame.into_bytes())
}

fn open(frame: &[u8]) -> ContactsResult<&[u8]> {
    let mut reader = MarshalReader::new(frame);
    let len = reader.get_u32().map_err(desync)? as usize;
    let body = reader.rest();
    if body.len() != len {
        return Err(ContactsError::Ipc(format!(
            "frame declares {len} bytes but carries {}",
            body.len()
        )));
    }
    Ok(body)
}

fn desync(err: ContactsError) -> ContactsError {
    ContactsError::Ipc(format!("malformed frame: {err}"))
}

#[cfg(test)]
mod tests {
    use super::{
        decode_request, decode_response, encode_request, encode_response, error_frame, function,
        is_mutating, PROTOCOL_VERSION,
    };
    use crate::error::{ContactsError, ErrorCode};

    #[test]
    fn request_frame_carries_function_and_payload() {
        let frame = encode_request(function::GET_COUNT, &[1, 2, 3]).unwrap();
        assert_eq!(
            u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize,
            frame.len() - 4
        );
        let (name, payload) = decode_request(&frame).unwrap();
        assert_eq!(name, function::GET_COUNT);
        assert_eq!(payload, &[1, 2, 3]);
    }

    #[test]
    fn foreign_protocol_version_is_rejected() {
        let mut frame = encode_request(function::GET_COUNT, &[]).unwrap();
        let bumped = (PROTOCOL_VERSION + 1).to_le_bytes();
        frame[4] = bumped[0];
        frame[5] = bumped[1];
        assert!(matches!(decode_request(&frame), Err(ContactsError::Ipc(_))));
    }

    #[test]
    fn truncated_frame_is_an_ipc_error() {
        let frame = encode_request(function::GET_COUNT, &[9, 9]).unwrap();
        let err = decode_request(&frame[..frame.len() - 1]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Ipc);
    }

    #[test]
    fn mutating_reply_carries_version() {
        let frame = encode_response(Some(42), &[7]).unwrap();
        let (version, payload) = decode_response(&frame, true).unwrap();
        assert_eq!(version, Some(42));
        assert_eq!(payload, &[7]);
        assert!(is_mutating(function::DELETE_RECORDS));
        assert!(!is_mutating(function::GET_CHANGES_BY_VERSION));
    }

    #[test]
    fn error_reply_rebuilds_remote_error() {
        let frame = error_frame(ErrorCode::NoData);
        let err = decode_response(&frame, true).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoData);
    }
}
