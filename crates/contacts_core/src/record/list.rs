//! Ordered, owning collection of records of one view.

use super::{Record, RecordHandle};
use crate::error::{ContactsError, ContactsResult};
use serde::{Serialize, Serializer};
use std::collections::VecDeque;

/// Homogeneous sequence of records.
///
/// The first record appended fixes the view unless the list was created for
/// a view up front. Iteration borrows the list, so mutation during iteration
/// is rejected at compile time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordList {
    view_uri: Option<String>,
    records: VecDeque<Record>,
    removed_ids: Vec<i32>,
}

impl RecordList {
    pub const fn new() -> Self {
        Self {
            view_uri: None,
            records: VecDeque::new(),
            removed_ids: Vec::new(),
        }
    }

    pub fn for_view(view_uri: &str) -> Self {
        Self {
            view_uri: Some(view_uri.to_string()),
            ..Self::new()
        }
    }

    pub fn view_uri(&self) -> Option<&str> {
        self.view_uri.as_deref()
    }

    pub fn append(&mut self, record: Record) -> ContactsResult<()> {
        self.admit(&record)?;
        self.records.push_back(record);
        Ok(())
    }

    pub fn prepend(&mut self, record: Record) -> ContactsResult<()> {
        self.admit(&record)?;
        self.records.push_front(record);
        Ok(())
    }

    pub fn reverse(&mut self) {
        self.records.make_contiguous().reverse();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Record> + '_ {
        self.records.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Record> {
        self.records.get_mut(index)
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.front()
    }

    /// Detaches the record with `handle`, returning ownership to the caller.
    pub fn remove(&mut self, handle: RecordHandle) -> Option<Record> {
        let position = self
            .records
            .iter()
            .position(|record| record.handle() == handle)?;
        self.records.remove(position)
    }

    /// Consumes the list; without `delete_records` the records are handed
    /// back in order.
    pub fn destroy(self, delete_records: bool) -> Vec<Record> {
        if delete_records {
            Vec::new()
        } else {
            self.records.into()
        }
    }

    /// Ids of persisted records removed from this list since it was loaded.
    pub fn removed_ids(&self) -> &[i32] {
        &self.removed_ids
    }

    pub(crate) fn mark_removed(&mut self, id: i32) {
        if !self.removed_ids.contains(&id) {
            self.removed_ids.push(id);
        }
    }

    pub(crate) fn clear_removed(&mut self) {
        self.removed_ids.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn admit(&mut self, record: &Record) -> ContactsResult<()> {
        match &self.view_uri {
            Some(uri) if uri != record.view_uri() => Err(ContactsError::invalid(format!(
                "record of view {} cannot join a list of {uri}",
                record.view_uri()
            ))),
            Some(_) => Ok(()),
            None => {
                self.view_uri = Some(record.view_uri().to_string());
                Ok(())
            }
        }
    }
}

impl IntoIterator for RecordList {
    type Item = Record;
    type IntoIter = std::collections::vec_deque::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordList {
    type Item = &'a Record;
    type IntoIter = std::collections::vec_deque::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<Record> for RecordList {
    /// Collects records without a view check; callers collect from one view.
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        let records: VecDeque<Record> = iter.into_iter().collect();
        Self {
            view_uri: records.front().map(|record| record.view_uri().to_string()),
            records,
            removed_ids: Vec::new(),
        }
    }
}

impl Serialize for RecordList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.iter())
    }
}
