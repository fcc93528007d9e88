//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Carry raw IPC frames for callers that speak the marshal protocol.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - `ipc_call` always returns a well-formed reply frame.

use contacts_core::ipc::error_frame;
use contacts_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    ContactsService, IpcServer, SchemaRegistry,
};
use log::error;
use std::path::PathBuf;
use std::sync::OnceLock;

const DB_FILE_NAME: &str = "contacts.sqlite3";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Idempotent for the same `level + log_dir`; conflicting calls fail.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Lists the registered view URIs in registry order.
///
/// Returns an empty list when the registry cannot be built.
#[flutter_rust_bridge::frb(sync)]
pub fn list_views() -> Vec<String> {
    match SchemaRegistry::connect() {
        Ok(registry) => registry.view_uris().map(str::to_string).collect(),
        Err(err) => {
            error!("event=ffi_list_views module=ffi status=error error={err}");
            Vec::new()
        }
    }
}

/// Executes one IPC request frame against the local store.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Input is a request frame built with the core's IPC envelope.
/// - Output is a reply frame; failures travel as its error code.
#[flutter_rust_bridge::frb(sync)]
pub fn ipc_call(frame: Vec<u8>) -> Vec<u8> {
    match ContactsService::open(resolve_db_path()) {
        Ok(service) => IpcServer::new(service).handle_frame(&frame),
        Err(err) => {
            error!(
                "event=ffi_ipc_call module=ffi status=error error_code={} error={err}",
                err.code().as_i32()
            );
            error_frame(err.code())
        }
    }
}

/// Returns the store's current transaction version, or `-1` when the store
/// cannot be opened.
#[flutter_rust_bridge::frb(sync)]
pub fn current_version() -> i64 {
    ContactsService::open(resolve_db_path())
        .and_then(|service| service.get_current_version())
        .unwrap_or(-1)
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("CONTACTS_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::{core_version, current_version, init_logging, ipc_call, list_views, ping};
    use contacts_core::ipc::{decode_response, encode_request, function};
    use contacts_core::marshal::{MarshalReader, MarshalWriter};
    use contacts_core::schema::property::view;
    use contacts_core::ErrorCode;

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn list_views_contains_contact_view() {
        assert!(list_views().iter().any(|uri| uri == view::CONTACT));
    }

    #[test]
    fn ipc_call_counts_addressbooks() {
        let mut args = MarshalWriter::new();
        args.put_str(Some(view::ADDRESSBOOK)).unwrap();
        let request = encode_request(function::GET_COUNT, args.as_slice()).unwrap();

        let reply = ipc_call(request);
        let (version, payload) = decode_response(&reply, false).unwrap();
        assert_eq!(version, None);
        let mut reader = MarshalReader::new(payload);
        assert!(reader.get_u32().unwrap() >= 1);
        assert!(current_version() >= 0);
    }

    #[test]
    fn ipc_call_rejects_garbage_frames() {
        let reply = ipc_call(vec![1, 2, 3]);
        let err = decode_response(&reply, false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Ipc);
    }
}
