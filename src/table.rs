use crate::interner::{str_eq, RStr};
use crate::value::Value;

//===----------------------------------------------------------------------===//
// Table
//
// Open-addressed map from interned string to value, with a const flag per
// entry. An empty slot has no key and a Nil value; a tombstone has no key
// and a true value. Grows when count + 1 would exceed 75% of capacity.
//===----------------------------------------------------------------------===//

const INITIAL_CAPACITY: usize = 8;
const MAX_LOAD_NUM: usize = 3;
const MAX_LOAD_DEN: usize = 4;

#[derive(Debug, Clone)]
pub struct Entry {
    pub key: Option<RStr>,
    pub value: Value,
    pub is_const: bool,
}

impl Entry {
    fn empty() -> Self {
        Entry { key: None, value: Value::Nil, is_const: false }
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && !matches!(self.value, Value::Nil)
    }
}

#[derive(Debug, Default)]
pub struct Table {
    entries: Vec<Entry>,
    /// Occupied slots, tombstones included. Counting tombstones toward the
    /// load factor guarantees probing always finds an empty slot.
    count: usize,
    /// Live keys.
    live: usize,
}

impl Table {
    pub fn new() -> Self {
        Table { entries: Vec::new(), count: 0, live: 0 }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Index of the entry for `key`: its current slot if present, otherwise
    /// the slot an insert should use (recycling the first tombstone seen).
    fn find_entry(entries: &[Entry], key: &RStr) -> usize {
        let capacity = entries.len();
        let mut index = key.hash as usize % capacity;
        let mut tombstone: Option<usize> = None;

        loop {
            let entry = &entries[index];
            match &entry.key {
                None => {
                    if entry.is_tombstone() {
                        if tombstone.is_none() {
                            tombstone = Some(index);
                        }
                    } else {
                        return tombstone.unwrap_or(index);
                    }
                }
                Some(existing) => {
                    if str_eq(existing, key) {
                        return index;
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self) {
        let capacity = if self.entries.len() < INITIAL_CAPACITY {
            INITIAL_CAPACITY
        } else {
            self.entries.len() * 2
        };

        let old = std::mem::replace(&mut self.entries, vec![Entry::empty(); capacity]);
        self.count = 0;
        self.live = 0;

        for entry in old {
            if let Some(key) = entry.key {
                let index = Self::find_entry(&self.entries, &key);
                self.entries[index] = Entry {
                    key: Some(key),
                    value: entry.value,
                    is_const: entry.is_const,
                };
                self.count += 1;
                self.live += 1;
            }
        }
    }

    pub fn get(&self, key: &RStr) -> Option<Value> {
        if self.count == 0 {
            return None;
        }
        let index = Self::find_entry(&self.entries, key);
        let entry = &self.entries[index];
        entry.key.as_ref().map(|_| entry.value.clone())
    }

    /// Returns the const flag for `key`, or None when absent.
    pub fn get_const_flag(&self, key: &RStr) -> Option<bool> {
        if self.count == 0 {
            return None;
        }
        let index = Self::find_entry(&self.entries, key);
        let entry = &self.entries[index];
        entry.key.as_ref().map(|_| entry.is_const)
    }

    /// Inserts or overwrites. Returns true when the key was new.
    pub fn set(&mut self, key: RStr, value: Value, is_const: bool) -> bool {
        if (self.count + 1) * MAX_LOAD_DEN > self.entries.len() * MAX_LOAD_NUM {
            self.grow();
        }

        let index = Self::find_entry(&self.entries, &key);
        let entry = &mut self.entries[index];
        let is_new = entry.key.is_none();
        if is_new {
            if !entry.is_tombstone() {
                self.count += 1;
            }
            self.live += 1;
        }

        entry.key = Some(key);
        entry.value = value;
        entry.is_const = is_const;
        is_new
    }

    /// Removal leaves a tombstone; the slot still counts toward load.
    pub fn delete(&mut self, key: &RStr) -> bool {
        if self.count == 0 {
            return false;
        }
        let index = Self::find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        if entry.key.is_none() {
            return false;
        }

        entry.key = None;
        entry.value = Value::Bool(true);
        entry.is_const = false;
        self.live -= 1;
        true
    }

    pub fn has(&self, key: &RStr) -> bool {
        if self.count == 0 {
            return false;
        }
        let index = Self::find_entry(&self.entries, key);
        self.entries[index].key.is_some()
    }

    pub fn keys(&self) -> Vec<RStr> {
        self.entries
            .iter()
            .filter_map(|entry| entry.key.clone())
            .collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries
            .iter()
            .filter(|entry| entry.key.is_some())
            .map(|entry| entry.value.clone())
            .collect()
    }
}
