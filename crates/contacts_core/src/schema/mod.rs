//! Property schema model and the view registry.
//!
//! # Responsibility
//! - Describe every view as an ordered list of typed property descriptors.
//! - Map property ids to a compact per-view index used by records.
//!
//! # Invariants
//! - Property ids are unique per view and stable across versions.
//! - A property's `DataKind` never changes for a given id.
//! - Descriptor order is the canonical field order on the marshal wire.

pub mod property;
pub mod registry;
pub(crate) mod views;

use crate::error::{ContactsError, ContactsResult};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

pub use registry::{SchemaRegistry, ViewEntry, ViewPermissions};

/// Stable identifier of one property within a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u32);

impl PropertyId {
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Display for PropertyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Semantic data type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Str,
    Bool,
    Int,
    UInt,
    LongLong,
    Double,
    RecordList,
}

impl DataKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::LongLong => "longlong",
            Self::Double => "double",
            Self::RecordList => "record_list",
        }
    }

    pub fn is_scalar(self) -> bool {
        !matches!(self, Self::RecordList)
    }
}

impl Display for DataKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Static metadata for one property of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub id: PropertyId,
    /// Snake-case name used for diagnostics and JSON output.
    pub name: &'static str,
    pub kind: DataKind,
    pub primary_id: bool,
    pub read_only: bool,
    pub projectable: bool,
    /// View URI of child records, set only for `DataKind::RecordList`.
    pub child_view: Option<&'static str>,
}

impl PropertyDescriptor {
    pub const fn new(id: PropertyId, name: &'static str, kind: DataKind) -> Self {
        Self {
            id,
            name,
            kind,
            primary_id: false,
            read_only: false,
            projectable: true,
            child_view: None,
        }
    }

    pub const fn children(id: PropertyId, name: &'static str, child_view: &'static str) -> Self {
        Self {
            id,
            name,
            kind: DataKind::RecordList,
            primary_id: false,
            read_only: false,
            projectable: true,
            child_view: Some(child_view),
        }
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Marks the property as the view's single-column identity.
    pub const fn primary(mut self) -> Self {
        self.primary_id = true;
        self.read_only = true;
        self
    }

    pub const fn filter_only(mut self) -> Self {
        self.projectable = false;
        self
    }
}

/// Ordered descriptor table of one view, with an id-to-index map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSchema {
    uri: String,
    descriptors: Vec<PropertyDescriptor>,
    index: HashMap<PropertyId, usize>,
    primary: Option<usize>,
}

impl ViewSchema {
    /// Builds a schema, rejecting duplicate ids, multiple primary ids and
    /// record-list properties without a child view.
    pub fn new(uri: impl Into<String>, descriptors: &[PropertyDescriptor]) -> ContactsResult<Self> {
        let uri = uri.into();
        if uri.trim().is_empty() {
            return Err(ContactsError::invalid("view uri cannot be empty"));
        }

        let mut index = HashMap::with_capacity(descriptors.len());
        let mut primary = None;
        for (position, descriptor) in descriptors.iter().enumerate() {
            if index.insert(descriptor.id, position).is_some() {
                return Err(ContactsError::invalid(format!(
                    "duplicate property {} in view {uri}",
                    descriptor.id
                )));
            }
            if descriptor.primary_id {
                if primary.is_some() {
                    return Err(ContactsError::invalid(format!(
                        "view {uri} declares more than one primary id"
                    )));
                }
                if descriptor.kind != DataKind::Int {
                    return Err(ContactsError::invalid(format!(
                        "primary id of view {uri} must be int"
                    )));
                }
                primary = Some(position);
            }
            if (descriptor.kind == DataKind::RecordList) != descriptor.child_view.is_some() {
                return Err(ContactsError::invalid(format!(
                    "property {} of view {uri} has inconsistent child view",
                    descriptor.id
                )));
            }
        }

        Ok(Self {
            uri,
            descriptors: descriptors.to_vec(),
            index,
            primary,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn descriptors(&self) -> &[PropertyDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn index_of(&self, property: PropertyId) -> Option<usize> {
        self.index.get(&property).copied()
    }

    pub fn descriptor(&self, property: PropertyId) -> Option<&PropertyDescriptor> {
        self.index_of(property).map(|position| &self.descriptors[position])
    }

    /// Resolves a property to its compact index, or `InvalidParameter`.
    pub fn require(&self, property: PropertyId) -> ContactsResult<(usize, &PropertyDescriptor)> {
        match self.index_of(property) {
            Some(position) => Ok((position, &self.descriptors[position])),
            None => Err(ContactsError::invalid(format!(
                "property {property} does not belong to view {}",
                self.uri
            ))),
        }
    }

    /// Returns the primary-id property, if this view has one.
    pub fn primary_id_property(&self) -> Option<PropertyId> {
        self.primary.map(|position| self.descriptors[position].id)
    }

    pub(crate) fn primary_index(&self) -> Option<usize> {
        self.primary
    }

    pub fn scalar_count(&self) -> usize {
        self.descriptors
            .iter()
            .filter(|descriptor| descriptor.kind.is_scalar())
            .count()
    }
}
