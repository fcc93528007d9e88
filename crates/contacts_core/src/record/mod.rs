//! Schema-bound dynamic record model.
//!
//! # Responsibility
//! - Hold typed property values of one view, keyed by property id.
//! - Own child record lists for `RecordList` properties.
//! - Track which properties changed since creation or last persistence.
//!
//! # Invariants
//! - Every accessor validates the property id against the record's view and
//!   the accessor's data kind; mismatches are `InvalidParameter`.
//! - `set_*` always marks the property dirty, even for an identical value.
//! - A record exclusively owns its child lists; clones share nothing.

mod dirty;
mod list;
mod value;

pub use dirty::DirtySet;
pub use list::RecordList;
pub(crate) use value::Slot;
pub use value::{PropertyState, Value};

use crate::error::{ContactsError, ContactsResult};
use crate::schema::{DataKind, PropertyDescriptor, PropertyId, SchemaRegistry, ViewSchema};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a record instance.
///
/// Clones keep the handle of their source so a child can be addressed in
/// both trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordHandle(u64);

impl RecordHandle {
    fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

/// Typed property container bound to one view schema.
#[derive(Debug, Clone)]
pub struct Record {
    handle: RecordHandle,
    schema: Arc<ViewSchema>,
    slots: Vec<Slot>,
    dirty: DirtySet,
}

impl Record {
    pub(crate) fn new(schema: Arc<ViewSchema>) -> Self {
        let slots = schema
            .descriptors()
            .iter()
            .map(|descriptor| match descriptor.child_view {
                Some(child_view) => Slot::Children(RecordList::for_view(child_view)),
                None => Slot::Default,
            })
            .collect();
        let dirty = DirtySet::new(schema.len());
        Self {
            handle: RecordHandle::next(),
            schema,
            slots,
            dirty,
        }
    }

    /// Creates an empty record for a registered view.
    ///
    /// # Errors
    /// - `InvalidParameter` when `view_uri` is unknown.
    pub fn create(registry: &SchemaRegistry, view_uri: &str) -> ContactsResult<Self> {
        registry.create_record(view_uri)
    }

    pub fn view_uri(&self) -> &str {
        self.schema.uri()
    }

    pub fn schema(&self) -> &Arc<ViewSchema> {
        &self.schema
    }

    pub fn handle(&self) -> RecordHandle {
        self.handle
    }

    /// Returns the primary id, or `None` for views without one or when the
    /// id has not been assigned yet.
    ///
    /// Only a loaded id counts; row id 0 (the default address book) is a
    /// real id.
    pub fn id(&self) -> Option<i32> {
        let index = self.schema.primary_index()?;
        match &self.slots[index] {
            Slot::Present(Value::Int(id)) if *id >= 0 => Some(*id),
            _ => None,
        }
    }

    pub fn get_str(&self, property: PropertyId) -> ContactsResult<Option<String>> {
        self.get_str_ref(property).map(|value| value.map(str::to_string))
    }

    /// Borrows a string value without copying it.
    pub fn get_str_ref(&self, property: PropertyId) -> ContactsResult<Option<&str>> {
        let index = self.scalar_index(property, DataKind::Str)?;
        Ok(match &self.slots[index] {
            Slot::Present(Value::Str(value)) => value.as_deref(),
            _ => None,
        })
    }

    pub fn get_bool(&self, property: PropertyId) -> ContactsResult<bool> {
        let index = self.scalar_index(property, DataKind::Bool)?;
        Ok(matches!(self.slots[index], Slot::Present(Value::Bool(true))))
    }

    pub fn get_int(&self, property: PropertyId) -> ContactsResult<i32> {
        let index = self.scalar_index(property, DataKind::Int)?;
        Ok(match self.slots[index] {
            Slot::Present(Value::Int(value)) => value,
            _ => 0,
        })
    }

    pub fn get_uint(&self, property: PropertyId) -> ContactsResult<u32> {
        let index = self.scalar_index(property, DataKind::UInt)?;
        Ok(match self.slots[index] {
            Slot::Present(Value::UInt(value)) => value,
            _ => 0,
        })
    }

    pub fn get_longlong(&self, property: PropertyId) -> ContactsResult<i64> {
        let index = self.scalar_index(property, DataKind::LongLong)?;
        Ok(match self.slots[index] {
            Slot::Present(Value::LongLong(value)) => value,
            _ => 0,
        })
    }

    pub fn get_double(&self, property: PropertyId) -> ContactsResult<f64> {
        let index = self.scalar_index(property, DataKind::Double)?;
        Ok(match self.slots[index] {
            Slot::Present(Value::Double(value)) => value,
            _ => 0.0,
        })
    }

    pub fn set_str(&mut self, property: PropertyId, value: Option<&str>) -> ContactsResult<()> {
        let index = self.writable_index(property, DataKind::Str)?;
        self.store(index, Value::Str(value.map(str::to_string)));
        Ok(())
    }

    pub fn set_bool(&mut self, property: PropertyId, value: bool) -> ContactsResult<()> {
        let index = self.writable_index(property, DataKind::Bool)?;
        self.store(index, Value::Bool(value));
        Ok(())
    }

    pub fn set_int(&mut self, property: PropertyId, value: i32) -> ContactsResult<()> {
        let index = self.writable_index(property, DataKind::Int)?;
        self.store(index, Value::Int(value));
        Ok(())
    }

    pub fn set_uint(&mut self, property: PropertyId, value: u32) -> ContactsResult<()> {
        let index = self.writable_index(property, DataKind::UInt)?;
        self.store(index, Value::UInt(value));
        Ok(())
    }

    pub fn set_longlong(&mut self, property: PropertyId, value: i64) -> ContactsResult<()> {
        let index = self.writable_index(property, DataKind::LongLong)?;
        self.store(index, Value::LongLong(value));
        Ok(())
    }

    pub fn set_double(&mut self, property: PropertyId, value: f64) -> ContactsResult<()> {
        let index = self.writable_index(property, DataKind::Double)?;
        self.store(index, Value::Double(value));
        Ok(())
    }

    /// Appends a child record; ownership moves to this record.
    ///
    /// # Errors
    /// - `InvalidParameter` when `property` is not a record-list property of
    ///   this view or the child belongs to a different view. The child is
    ///   dropped in that case.
    pub fn add_child(&mut self, property: PropertyId, child: Record) -> ContactsResult<()> {
        let (index, descriptor) = self.list_index(property)?;
        if Some(child.view_uri()) != descriptor.child_view {
            return Err(ContactsError::invalid(format!(
                "child of view {} cannot be added to property {property} of {}",
                child.view_uri(),
                self.view_uri()
            )));
        }
        self.children_at_mut(index)?.append(child)?;
        self.dirty.insert(index);
        Ok(())
    }

    /// Detaches a child record and returns ownership to the caller.
    ///
    /// A detached child that was already persisted is remembered by id so the
    /// next update of this record deletes it from the store.
    ///
    /// # Errors
    /// - `NoData` when no child with `handle` exists under `property`.
    pub fn remove_child(
        &mut self,
        property: PropertyId,
        handle: RecordHandle,
    ) -> ContactsResult<Record> {
        let (index, _) = self.list_index(property)?;
        let list = self.children_at_mut(index)?;
        let child = list.remove(handle).ok_or_else(|| {
            ContactsError::no_data(format!("child record not found under {property}"))
        })?;
        if let Some(id) = child.id() {
            list.mark_removed(id);
        }
        self.dirty.insert(index);
        Ok(child)
    }

    pub fn child_count(&self, property: PropertyId) -> ContactsResult<usize> {
        Ok(self.children(property)?.len())
    }

    /// Borrows the child at `index`.
    ///
    /// # Errors
    /// - `NoData` when `index` is out of range.
    pub fn child_at(&self, property: PropertyId, index: usize) -> ContactsResult<&Record> {
        self.children(property)?.get(index).ok_or_else(|| {
            ContactsError::no_data(format!("no child at index {index} under {property}"))
        })
    }

    pub fn child_at_mut(&mut self, property: PropertyId, index: usize) -> ContactsResult<&mut Record> {
        let (slot_index, _) = self.list_index(property)?;
        self.children_at_mut(slot_index)?
            .get_mut(index)
            .ok_or_else(|| {
                ContactsError::no_data(format!("no child at index {index} under {property}"))
            })
    }

    /// Borrows the child list of a record-list property.
    ///
    /// A list excluded by projection reads as empty.
    pub fn children(&self, property: PropertyId) -> ContactsResult<&RecordList> {
        static EMPTY: RecordList = RecordList::new();
        let (index, _) = self.list_index(property)?;
        Ok(match &self.slots[index] {
            Slot::Children(list) => list,
            _ => &EMPTY,
        })
    }

    /// Consumes the record.
    ///
    /// With `delete_children` the whole tree is dropped; otherwise the direct
    /// children are detached and returned to the caller in property order.
    pub fn destroy(self, delete_children: bool) -> Vec<Record> {
        if delete_children {
            return Vec::new();
        }
        self.slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Children(list) => Some(list),
                _ => None,
            })
            .flat_map(|list| list.destroy(false))
            .collect()
    }

    pub fn property_state(&self, property: PropertyId) -> ContactsResult<PropertyState> {
        let (index, _) = self.schema.require(property)?;
        Ok(self.slots[index].state())
    }

    /// Returns whether a projection excluded at least one property.
    pub fn is_projected(&self) -> bool {
        self.slots.iter().any(|slot| matches!(slot, Slot::Unset))
    }

    pub fn is_dirty(&self, property: PropertyId) -> ContactsResult<bool> {
        let (index, _) = self.schema.require(property)?;
        Ok(self.dirty.contains(index))
    }

    /// Returns whether this record or any descendant has a dirty property.
    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
            || self.slots.iter().any(|slot| match slot {
                Slot::Children(list) => list.iter().any(Record::has_changes),
                _ => false,
            })
    }

    pub fn dirty_properties(&self) -> Vec<PropertyId> {
        self.dirty
            .iter()
            .map(|index| self.schema.descriptors()[index].id)
            .collect()
    }

    /// Clears dirty bits of this record and every descendant, and forgets
    /// removed child ids.
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
        for slot in &mut self.slots {
            if let Slot::Children(list) = slot {
                list.clear_removed();
                list.iter_mut().for_each(Record::clear_dirty);
            }
        }
    }

    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub(crate) fn dirty_set(&self) -> &DirtySet {
        &self.dirty
    }

    pub(crate) fn mark_dirty(&mut self, index: usize) {
        self.dirty.insert(index);
    }

    /// Stores a value without marking it dirty (store/wire hydration).
    pub(crate) fn load(&mut self, index: usize, value: Value) {
        self.slots[index] = Slot::Present(value);
    }

    /// Kind-checked hydration by property id; read-only properties allowed.
    pub(crate) fn load_property(&mut self, property: PropertyId, value: Value) -> ContactsResult<()> {
        let index = self.scalar_index(property, value.kind())?;
        self.load(index, value);
        Ok(())
    }

    pub(crate) fn set_slot(&mut self, index: usize, slot: Slot) {
        self.slots[index] = slot;
    }

    /// Returns the value of a scalar slot, or the kind's default.
    pub(crate) fn value_at(&self, index: usize) -> Option<Value> {
        match &self.slots[index] {
            Slot::Present(value) => Some(value.clone()),
            Slot::Children(_) => None,
            Slot::Unset | Slot::Default => {
                Value::default_for(self.schema.descriptors()[index].kind)
            }
        }
    }

    /// Marks every property outside `projection` as unset.
    pub(crate) fn apply_projection(&mut self, projection: &[PropertyId]) {
        if projection.is_empty() {
            return;
        }
        for (index, descriptor) in self.schema.descriptors().iter().enumerate() {
            if !projection.contains(&descriptor.id) {
                self.slots[index] = Slot::Unset;
            }
        }
    }

    /// Takes over the values and children of `stored` while keeping this
    /// record's handle. Dirty bits are taken from `stored` too.
    pub(crate) fn reload_from(&mut self, stored: Record) {
        self.slots = stored.slots;
        self.dirty = stored.dirty;
    }

    pub(crate) fn has_child_lists(&self) -> bool {
        self.schema
            .descriptors()
            .iter()
            .any(|descriptor| descriptor.child_view.is_some())
    }

    pub(crate) fn children_at_mut(&mut self, index: usize) -> ContactsResult<&mut RecordList> {
        if matches!(self.slots[index], Slot::Unset) {
            let child_view = self.schema.descriptors()[index].child_view.ok_or_else(|| {
                ContactsError::Internal(format!("slot {index} is not a record list"))
            })?;
            self.slots[index] = Slot::Children(RecordList::for_view(child_view));
        }
        match &mut self.slots[index] {
            Slot::Children(list) => Ok(list),
            _ => Err(ContactsError::Internal(format!(
                "slot {index} is not a record list"
            ))),
        }
    }

    fn store(&mut self, index: usize, value: Value) {
        self.slots[index] = Slot::Present(value);
        self.dirty.insert(index);
    }

    fn scalar_index(&self, property: PropertyId, expected: DataKind) -> ContactsResult<usize> {
        let (index, descriptor) = self.schema.require(property)?;
        check_kind(self.view_uri(), descriptor, expected)?;
        Ok(index)
    }

    fn writable_index(&self, property: PropertyId, expected: DataKind) -> ContactsResult<usize> {
        let (index, descriptor) = self.schema.require(property)?;
        check_kind(self.view_uri(), descriptor, expected)?;
        if descriptor.read_only {
            return Err(ContactsError::invalid(format!(
                "property {} of view {} is read-only",
                descriptor.name,
                self.view_uri()
            )));
        }
        Ok(index)
    }

    fn list_index(&self, property: PropertyId) -> ContactsResult<(usize, &PropertyDescriptor)> {
        let (index, descriptor) = self.schema.require(property)?;
        check_kind(self.view_uri(), descriptor, DataKind::RecordList)?;
        Ok((index, descriptor))
    }
}

fn check_kind(view_uri: &str, descriptor: &PropertyDescriptor, expected: DataKind) -> ContactsResult<()> {
    if descriptor.kind == expected {
        return Ok(());
    }
    Err(ContactsError::invalid(format!(
        "property {} of view {view_uri} is {}, not {expected}",
        descriptor.name, descriptor.kind
    )))
}

impl PartialEq for Record {
    /// Deep equality over view, slot states, values, children and dirty bits.
    /// Handles are identities, not content, and are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.schema.uri() == other.schema.uri()
            && self.slots == other.slots
            && self.dirty == other.dirty
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let visible = self
            .slots
            .iter()
            .filter(|slot| !matches!(slot, Slot::Unset))
            .count();
        let mut map = serializer.serialize_map(Some(visible + 1))?;
        map.serialize_entry("view_uri", self.view_uri())?;
        for (descriptor, slot) in self.schema.descriptors().iter().zip(&self.slots) {
            match slot {
                Slot::Unset => {}
                Slot::Children(list) => map.serialize_entry(descriptor.name, list)?,
                Slot::Present(value) => map.serialize_entry(descriptor.name, value)?,
                Slot::Default => {
                    map.serialize_entry(descriptor.name, &Value::default_for(descriptor.kind))?
                }
            }
        }
        map.end()
    }
}
