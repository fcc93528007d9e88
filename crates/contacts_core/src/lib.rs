//! Core of the contacts data service.
//! Owns the record model, its wire protocol and the SQLite-backed views.

pub mod backend;
pub mod db;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod marshal;
pub mod plugin;
pub mod query;
pub mod record;
pub mod schema;
pub mod service;

pub use error::{ContactsError, ContactsResult, ErrorCode};
pub use ipc::{IpcClient, IpcServer, IpcTransport, LoopbackTransport};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use plugin::{ChangeType, SearchRange};
pub use query::{Filter, MatchOp, Query};
pub use record::{PropertyState, Record, RecordHandle, RecordList, Value};
pub use schema::{DataKind, PropertyDescriptor, PropertyId, SchemaRegistry, ViewSchema};
pub use service::{AccessPolicy, AllowAll, Committed, ContactsService, TokenPolicy};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
