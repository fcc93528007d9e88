//! Tagged scalar values and per-property slot state.

use crate::record::RecordList;
use crate::schema::DataKind;
use serde::Serialize;

/// Scalar property value.
///
/// `Str(None)` is a NULL string and is distinct from `Str(Some(""))`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(Option<String>),
    Bool(bool),
    Int(i32),
    UInt(u32),
    LongLong(i64),
    Double(f64),
}

impl Value {
    pub fn kind(&self) -> DataKind {
        match self {
            Self::Str(_) => DataKind::Str,
            Self::Bool(_) => DataKind::Bool,
            Self::Int(_) => DataKind::Int,
            Self::UInt(_) => DataKind::UInt,
            Self::LongLong(_) => DataKind::LongLong,
            Self::Double(_) => DataKind::Double,
        }
    }

    /// Returns the type default for a scalar kind.
    pub fn default_for(kind: DataKind) -> Option<Self> {
        match kind {
            DataKind::Str => Some(Self::Str(None)),
            DataKind::Bool => Some(Self::Bool(false)),
            DataKind::Int => Some(Self::Int(0)),
            DataKind::UInt => Some(Self::UInt(0)),
            DataKind::LongLong => Some(Self::LongLong(0)),
            DataKind::Double => Some(Self::Double(0.0)),
            DataKind::RecordList => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => value.as_deref(),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(Some(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(Some(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::UInt(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::LongLong(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

/// Materialization state of one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyState {
    /// Not materialized because a projection excluded it.
    Unset,
    /// Never assigned; reads return the type default.
    Default,
    /// Holds an explicitly loaded or assigned value.
    Present,
}

/// Storage cell of one property inside a record.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    Unset,
    Default,
    Present(Value),
    Children(RecordList),
}

impl Slot {
    pub(crate) fn state(&self) -> PropertyState {
        match self {
            Self::Unset => PropertyState::Unset,
            Self::Default => PropertyState::Default,
            Self::Present(_) => PropertyState::Present,
            Self::Children(list) if list.is_empty() && list.removed_ids().is_empty() => {
                PropertyState::Default
            }
            Self::Children(_) => PropertyState::Present,
        }
    }
}
