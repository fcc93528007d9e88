//! Error taxonomy shared by every core layer.
//!
//! # Responsibility
//! - Define the single error type returned by record, list, query,
//!   marshal, backend and service operations.
//! - Map every error kind to a stable integer code for the IPC wire.
//!
//! # Invariants
//! - Caller mistakes are reported as `InvalidParameter`/`NoData`, never as
//!   panics.
//! - `ErrorCode` values are persisted in IPC buffers and must not change.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ContactsResult<T> = Result<T, ContactsError>;

/// Stable integer codes carried by IPC responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    None = 0,
    InvalidParameter = -22,
    NoData = -61,
    OutOfMemory = -12,
    PermissionDenied = -13,
    NotSupported = -95,
    Db = -1001,
    Ipc = -1002,
    Internal = -1003,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Parses a wire code. Unknown codes are reported as `None`.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            -22 => Some(Self::InvalidParameter),
            -61 => Some(Self::NoData),
            -12 => Some(Self::OutOfMemory),
            -13 => Some(Self::PermissionDenied),
            -95 => Some(Self::NotSupported),
            -1001 => Some(Self::Db),
            -1002 => Some(Self::Ipc),
            -1003 => Some(Self::Internal),
            _ => None,
        }
    }
}

/// Error returned by every fallible core operation.
#[derive(Debug)]
pub enum ContactsError {
    /// Bad handle, type mismatch, malformed query or unknown property.
    InvalidParameter(String),
    /// Record, child or row not found; buffer exhausted while decoding.
    NoData(String),
    /// View URI is not registered.
    ViewNotFound(String),
    /// Allocation failure while growing a marshal buffer.
    OutOfMemory,
    /// Access policy rejected a permission token.
    PermissionDenied(&'static str),
    /// Operation has no implementation for the given view.
    NotSupported(String),
    /// Store-level failure, propagated opaquely.
    Db(DbError),
    /// Transport failure or buffer desync.
    Ipc(String),
    /// Broken internal consistency.
    Internal(String),
}

impl ContactsError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub(crate) fn no_data(message: impl Into<String>) -> Self {
        Self::NoData(message.into())
    }

    /// Returns the wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidParameter(_) => ErrorCode::InvalidParameter,
            Self::NoData(_) | Self::ViewNotFound(_) => ErrorCode::NoData,
            Self::OutOfMemory => ErrorCode::OutOfMemory,
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::NotSupported(_) => ErrorCode::NotSupported,
            Self::Db(_) => ErrorCode::Db,
            Self::Ipc(_) => ErrorCode::Ipc,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Rebuilds an error from a code received over IPC.
    ///
    /// Remote details do not cross the boundary, so messages are generic.
    pub fn from_code(code: i32) -> Self {
        match ErrorCode::from_i32(code) {
            Some(ErrorCode::InvalidParameter) => Self::invalid("remote call rejected parameters"),
            Some(ErrorCode::NoData) => Self::no_data("remote call found no data"),
            Some(ErrorCode::OutOfMemory) => Self::OutOfMemory,
            Some(ErrorCode::PermissionDenied) => Self::PermissionDenied("remote"),
            Some(ErrorCode::NotSupported) => Self::NotSupported("remote call".to_string()),
            Some(ErrorCode::Db) => Self::Internal("remote database failure".to_string()),
            Some(ErrorCode::Ipc) => Self::Ipc("remote transport failure".to_string()),
            Some(ErrorCode::Internal) => Self::Internal("remote internal failure".to_string()),
            Some(ErrorCode::None) | None => Self::Ipc(format!("unexpected error code {code}")),
        }
    }
}

impl Display for ContactsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidParameter(message) => write!(f, "invalid parameter: {message}"),
            Self::NoData(message) => write!(f, "no data: {message}"),
            Self::ViewNotFound(uri) => write!(f, "view not registered: {uri}"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::PermissionDenied(token) => write!(f, "permission denied: {token}"),
            Self::NotSupported(what) => write!(f, "not supported: {what}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Ipc(message) => write!(f, "ipc failure: {message}"),
            Self::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

impl Error for ContactsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ContactsError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ContactsError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::{ContactsError, ErrorCode};

    #[test]
    fn codes_survive_wire_conversion() {
        for code in [
            ErrorCode::InvalidParameter,
            ErrorCode::NoData,
            ErrorCode::OutOfMemory,
            ErrorCode::PermissionDenied,
            ErrorCode::NotSupported,
            ErrorCode::Ipc,
            ErrorCode::Internal,
        ] {
            let rebuilt = ContactsError::from_code(code.as_i32());
            assert_eq!(rebuilt.code(), code);
        }
    }

    #[test]
    fn unknown_view_reports_no_data_code() {
        let err = ContactsError::ViewNotFound("contacts.unknown".to_string());
        assert_eq!(err.code(), ErrorCode::NoData);
    }

    #[test]
    fn success_code_is_not_an_error() {
        let err = ContactsError::from_code(0);
        assert_eq!(err.code(), ErrorCode::Ipc);
    }
}
