//! The generic table (§2, §4.4, §4.6): an open-addressed hash table keyed by
//! interned-string identity, used both for globals and — via `find_interned` — as
//! the backing store for the string intern table itself.

use std::rc::Rc;

use crate::object::ObjString;

const MAX_LOAD_FACTOR: f64 = 0.75;
const INITIAL_CAPACITY: usize = 8;

enum Slot<V> {
    Empty,
    Tombstone,
    Occupied(Rc<ObjString>, V),
}

pub struct Table<V> {
    entries: Vec<Slot<V>>,
    /// occupied + tombstones, matching the source's load-factor bookkeeping.
    count: usize,
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|s| matches!(s, Slot::Occupied(..)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Walks the probe sequence for `hash`, returning the index of either the
    /// matching occupied slot, the first tombstone seen, or an empty slot —
    /// whichever `pred` says is a match, mirroring `findEntry`/`findString`.
    fn probe(&self, hash: u32, mut is_match: impl FnMut(&Rc<ObjString>) -> bool) -> usize {
        let capacity = self.capacity();
        let mut index = hash as usize % capacity;
        let mut tombstone: Option<usize> = None;
        loop {
            match &self.entries[index] {
                Slot::Empty => return tombstone.unwrap_or(index),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Slot::Occupied(key, _) => {
                    if is_match(key) {
                        return index;
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self) {
        let new_capacity = if self.capacity() == 0 {
            INITIAL_CAPACITY
        } else {
            self.capacity() * 2
        };
        let old_entries = std::mem::replace(
            &mut self.entries,
            (0..new_capacity).map(|_| Slot::Empty).collect(),
        );
        self.count = 0;
        for slot in old_entries {
            if let Slot::Occupied(key, value) = slot {
                let hash = key.hash;
                let index = self.probe(hash, |k| Rc::ptr_eq(k, &key));
                self.entries[index] = Slot::Occupied(key, value);
                self.count += 1;
            }
        }
    }

    /// Inserts or overwrites `key`. Returns `true` if this created a new entry
    /// (matches the source's `DEFINE_GLOBAL`/`SET_GLOBAL` "did it already exist"
    /// contract, §4.4).
    pub fn set(&mut self, key: Rc<ObjString>, value: V) -> bool {
        if self.count + 1 > (self.capacity() as f64 * MAX_LOAD_FACTOR) as usize {
            self.grow();
        }

        let hash = key.hash;
        let index = self.probe(hash, |k| Rc::ptr_eq(k, &key) || (k.hash == hash && k.as_str() == key.as_str()));
        let is_new = !matches!(self.entries[index], Slot::Occupied(..));
        let was_tombstone = matches!(self.entries[index], Slot::Tombstone);
        self.entries[index] = Slot::Occupied(key, value);
        if is_new && !was_tombstone {
            self.count += 1;
        }
        is_new
    }

    pub fn get(&self, key: &Rc<ObjString>) -> Option<&V> {
        if self.capacity() == 0 {
            return None;
        }
        let index = self.probe(key.hash, |k| Rc::ptr_eq(k, key));
        match &self.entries[index] {
            Slot::Occupied(_, value) => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: &Rc<ObjString>) -> Option<&mut V> {
        if self.capacity() == 0 {
            return None;
        }
        let index = self.probe(key.hash, |k| Rc::ptr_eq(k, key));
        match &mut self.entries[index] {
            Slot::Occupied(_, value) => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, key: &Rc<ObjString>) -> bool {
        self.get(key).is_some()
    }

    /// Deletes `key`, leaving a tombstone so later probes keep working (§4.4 —
    /// `SET_GLOBAL` relies on this to roll back a spurious insert).
    pub fn delete(&mut self, key: &Rc<ObjString>) -> bool {
        if self.capacity() == 0 {
            return false;
        }
        let index = self.probe(key.hash, |k| Rc::ptr_eq(k, key));
        if matches!(self.entries[index], Slot::Occupied(..)) {
            self.entries[index] = Slot::Tombstone;
            true
        } else {
            false
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Rc<ObjString>, &V)> {
        self.entries.iter().filter_map(|s| match s {
            Slot::Occupied(k, v) => Some((k, v)),
            _ => None,
        })
    }

    /// Finds a canonical string with these exact bytes, comparing by content
    /// rather than pointer — the one place lookup can't rely on the key already
    /// being interned, since interning is what's producing the key (§4.6).
    pub fn find_interned(&self, s: &str, hash: u32) -> Option<Rc<ObjString>> {
        if self.capacity() == 0 {
            return None;
        }
        let index = self.probe(hash, |k| k.hash == hash && k.as_str() == s);
        match &self.entries[index] {
            Slot::Occupied(key, _) => Some(key.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::StringInterner;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_then_get_round_trips() {
        let mut interner = StringInterner::new();
        let mut table: Table<i32> = Table::new();
        let key = interner.intern("x");
        assert!(table.set(key.clone(), 42));
        assert_eq!(table.get(&key), Some(&42));
    }

    #[test]
    fn set_on_existing_key_reports_not_new_and_overwrites() {
        let mut interner = StringInterner::new();
        let mut table: Table<i32> = Table::new();
        let key = interner.intern("x");
        assert!(table.set(key.clone(), 1));
        assert!(!table.set(key.clone(), 2));
        assert_eq!(table.get(&key), Some(&2));
    }

    #[test]
    fn delete_then_set_recovers_the_slot() {
        let mut interner = StringInterner::new();
        let mut table: Table<i32> = Table::new();
        let key = interner.intern("x");
        table.set(key.clone(), 1);
        assert!(table.delete(&key));
        assert_eq!(table.get(&key), None);
        assert!(table.set(key.clone(), 9));
        assert_eq!(table.get(&key), Some(&9));
    }

    #[test]
    fn grows_past_many_entries() {
        let mut interner = StringInterner::new();
        let mut table: Table<i32> = Table::new();
        for i in 0..200 {
            let key = interner.intern(&format!("key{i}"));
            table.set(key, i);
        }
        for i in 0..200 {
            let key = interner.intern(&format!("key{i}"));
            assert_eq!(table.get(&key), Some(&i));
        }
    }
}
