//! Process-wide view registry.
//!
//! # Responsibility
//! - Map a view URI to its schema, backend plugin and permission tokens.
//! - Hand out one shared registry per process for as long as any logical
//!   connection holds it.
//!
//! # Invariants
//! - A view URI is registered at most once.
//! - The registry is immutable once shared; population happens before the
//!   first `Arc` is handed out.
//! - The shared registry is rebuilt after the last holder drops it.

use super::{PropertyDescriptor, PropertyId, ViewSchema};
use crate::error::{ContactsError, ContactsResult};
use crate::plugin::RecordPlugin;
use crate::record::Record;
use log::{debug, info};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

static SHARED_REGISTRY: Lazy<Mutex<Weak<SchemaRegistry>>> = Lazy::new(|| Mutex::new(Weak::new()));

/// Read/write permission tokens a backend checks before touching a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewPermissions {
    pub read: &'static str,
    pub write: &'static str,
}

impl ViewPermissions {
    pub const CONTACT: Self = Self {
        read: "contact.read",
        write: "contact.write",
    };
}

/// Registered view: schema, backend and permission tokens.
pub struct ViewEntry {
    pub schema: Arc<ViewSchema>,
    pub plugin: Arc<dyn RecordPlugin>,
    pub permissions: ViewPermissions,
}

/// View URI keyed registry of schemas and backends.
#[derive(Default)]
pub struct SchemaRegistry {
    views: BTreeMap<String, ViewEntry>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry populated with every built-in view.
    pub fn builtin() -> ContactsResult<Self> {
        let mut registry = Self::new();
        crate::backend::register_builtin_views(&mut registry)?;
        Ok(registry)
    }

    /// Returns the process-wide registry, building it on first connect.
    ///
    /// Every holder shares one instance; the instance is torn down when the
    /// last `Arc` drops and rebuilt by the next call.
    pub fn connect() -> ContactsResult<Arc<Self>> {
        let mut slot = SHARED_REGISTRY
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(registry) = slot.upgrade() {
            return Ok(registry);
        }

        let registry = Arc::new(Self::builtin()?);
        *slot = Arc::downgrade(&registry);
        info!(
            "event=registry_init module=schema status=ok views={}",
            registry.len()
        );
        Ok(registry)
    }

    /// Registers one view.
    ///
    /// # Errors
    /// - `InvalidParameter` when the URI is already registered or the
    ///   descriptor table is malformed.
    pub fn register(
        &mut self,
        view_uri: &str,
        descriptors: &[PropertyDescriptor],
        plugin: Arc<dyn RecordPlugin>,
        permissions: ViewPermissions,
    ) -> ContactsResult<()> {
        if self.views.contains_key(view_uri) {
            return Err(ContactsError::invalid(format!(
                "view {view_uri} is already registered"
            )));
        }

        let schema = ViewSchema::new(view_uri, descriptors)?;
        for descriptor in schema.descriptors() {
            if let Some(child_view) = descriptor.child_view {
                if child_view == view_uri {
                    return Err(ContactsError::invalid(format!(
                        "view {view_uri} cannot contain itself"
                    )));
                }
            }
        }

        debug!(
            "event=view_register module=schema status=ok view={} properties={}",
            view_uri,
            schema.len()
        );
        self.views.insert(
            view_uri.to_string(),
            ViewEntry {
                schema: Arc::new(schema),
                plugin,
                permissions,
            },
        );
        Ok(())
    }

    /// Looks up one view.
    ///
    /// # Errors
    /// - `ViewNotFound` when the URI is not registered.
    pub fn lookup(&self, view_uri: &str) -> ContactsResult<&ViewEntry> {
        self.views
            .get(view_uri)
            .ok_or_else(|| ContactsError::ViewNotFound(view_uri.to_string()))
    }

    pub fn schema(&self, view_uri: &str) -> ContactsResult<&Arc<ViewSchema>> {
        self.lookup(view_uri).map(|entry| &entry.schema)
    }

    /// Returns the primary-id property of a view.
    ///
    /// `Ok(None)` means the view has no single-column identity; callers must
    /// treat that as "unsupported for this view".
    pub fn lookup_primary_id_property(&self, view_uri: &str) -> ContactsResult<Option<PropertyId>> {
        self.lookup(view_uri)
            .map(|entry| entry.schema.primary_id_property())
    }

    /// Creates an empty record bound to a registered view.
    ///
    /// # Errors
    /// - `InvalidParameter` when the URI is unknown.
    pub fn create_record(&self, view_uri: &str) -> ContactsResult<Record> {
        match self.views.get(view_uri) {
            Some(entry) => Ok(Record::new(Arc::clone(&entry.schema))),
            None => Err(ContactsError::invalid(format!(
                "cannot create record for unknown view {view_uri}"
            ))),
        }
    }

    pub fn view_uris(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl Drop for SchemaRegistry {
    fn drop(&mut self) {
        if !self.views.is_empty() {
            debug!(
                "event=registry_teardown module=schema status=ok views={}",
                self.views.len()
            );
        }
    }
}
