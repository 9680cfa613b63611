//! Single entry of a record

use super::{EntryType, Value};

/// Simple entry to fill
///
/// Besides the value it remembers whether the value has ever been assigned
/// and whether it is the same value as the one in storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    entry_type: EntryType,
    data: Value,
    is_set: bool,
    from_storage: bool,
}

impl Entry {
    pub fn new(entry_type: EntryType) -> Self {
        Self {
            entry_type,
            data: Value::Null,
            is_set: false,
            from_storage: false,
        }
    }

    pub fn entry_type(&self) -> &EntryType {
        &self.entry_type
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Set data without type checks; mappers use it after their own conversion
    pub fn set_data(&mut self, data: Value, from_storage: bool) -> &mut Self {
        self.data = data;
        self.is_set = true;
        self.from_storage = from_storage;
        self
    }

    pub fn is_set(&self) -> bool {
        self.is_set
    }

    pub fn is_from_storage(&self) -> bool {
        self.from_storage
    }

    pub fn mark_from_storage(&mut self, from_storage: bool) {
        self.from_storage = from_storage;
    }
}
