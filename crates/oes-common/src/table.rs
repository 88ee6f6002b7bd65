//! Ordered table that never auto-creates entries.
//!
//! `SyncTable` is the storage behind every OES table (FDB, neighbors,
//! routes, router interfaces, ...). It differs from a bare `BTreeMap` in
//! three ways:
//!
//! - Lookups never create entries, and every failure is an [`OesError`]
//!   carrying the table name and key.
//! - An optional capacity models a hardware table: inserting a new key into
//!   a full table fails with `NO_RESOURCES`.
//! - [`SyncTable::walk`] implements the GET / GET_FIRST / GET_NEXT read
//!   contract. Because keys are totally ordered and GET_NEXT resumes from
//!   a key rather than a position, a walk stays consistent while entries
//!   are inserted or removed between calls: every entry present for the
//!   whole walk is returned exactly once, in key order.

use crate::cmd::GetCmd;
use crate::error::{OesError, OesResult};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::ops::Bound;

/// Trait for values that can be referenced by entries of other tables.
pub trait HasRefCount {
    /// Increments the reference count and returns the new value.
    fn increment_ref(&mut self) -> u32;

    /// Decrements the reference count and returns the new value.
    ///
    /// Returns `None` if the count would underflow.
    fn decrement_ref(&mut self) -> Option<u32>;

    fn ref_count(&self) -> u32;
}

#[derive(Debug, Clone)]
pub struct SyncTable<K, V> {
    name: &'static str,
    inner: BTreeMap<K, V>,
    capacity: Option<usize>,
}

impl<K, V> SyncTable<K, V>
where
    K: Ord + Clone + Debug,
{
    /// Creates an unbounded table.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: BTreeMap::new(),
            capacity: None,
        }
    }

    /// Creates a table holding at most `capacity` entries.
    pub fn with_capacity_limit(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            inner: BTreeMap::new(),
            capacity: Some(capacity),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.inner.len() >= cap)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the value for `key`. **This never creates entries.**
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Returns the value for `key`. **This never creates entries.**
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    /// Like [`get`](Self::get) but fails with `ENTRY_NOT_FOUND`.
    pub fn lookup(&self, key: &K) -> OesResult<&V> {
        let name = self.name;
        self.inner
            .get(key)
            .ok_or_else(|| OesError::not_found(format!("{} {:?}", name, key)))
    }

    /// Like [`get_mut`](Self::get_mut) but fails with `ENTRY_NOT_FOUND`.
    pub fn lookup_mut(&mut self, key: &K) -> OesResult<&mut V> {
        let name = self.name;
        self.inner
            .get_mut(key)
            .ok_or_else(|| OesError::not_found(format!("{} {:?}", name, key)))
    }

    /// Inserts a new entry.
    ///
    /// Fails with `ENTRY_ALREADY_EXISTS` if the key is present and with
    /// `NO_RESOURCES` if the table is full.
    pub fn insert_new(&mut self, key: K, value: V) -> OesResult<()> {
        if self.inner.contains_key(&key) {
            return Err(OesError::already_exists(format!("{} {:?}", self.name, key)));
        }
        if self.is_full() {
            return Err(OesError::no_resources(format!("{} table full", self.name)));
        }
        self.inner.insert(key, value);
        Ok(())
    }

    /// Inserts or replaces an entry, returning the replaced value.
    ///
    /// Capacity is only checked when the key is new.
    pub fn upsert(&mut self, key: K, value: V) -> OesResult<Option<V>> {
        if !self.inner.contains_key(&key) && self.is_full() {
            return Err(OesError::no_resources(format!("{} table full", self.name)));
        }
        Ok(self.inner.insert(key, value))
    }

    /// Removes an entry, failing with `ENTRY_NOT_FOUND` if absent.
    pub fn remove(&mut self, key: &K) -> OesResult<V> {
        let name = self.name;
        self.inner
            .remove(key)
            .ok_or_else(|| OesError::not_found(format!("{} {:?}", name, key)))
    }

    /// Removes every entry matching `pred` and returns them in key order.
    pub fn drain_where<F>(&mut self, mut pred: F) -> Vec<(K, V)>
    where
        F: FnMut(&K, &V) -> bool,
    {
        let keys: Vec<K> = self
            .inner
            .iter()
            .filter(|(k, v)| pred(k, v))
            .map(|(k, _)| k.clone())
            .collect();

        keys.into_iter()
            .filter_map(|k| self.inner.remove(&k).map(|v| (k, v)))
            .collect()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.inner.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.inner.values_mut()
    }

    /// Iterates entries with keys in `range`.
    pub fn range<R>(&self, range: R) -> impl Iterator<Item = (&K, &V)>
    where
        R: std::ops::RangeBounds<K>,
    {
        self.inner.range(range)
    }

    /// Reads entries according to the table read contract.
    ///
    /// - `Get`: `key` is required and `count` must be 1; returns that entry
    ///   or fails with `ENTRY_NOT_FOUND`.
    /// - `GetFirst`: returns up to `count` entries from the start; `key` is
    ///   ignored.
    /// - `GetNext`: `key` is required; returns up to `count` entries with
    ///   keys strictly greater than `key`. `key` need not exist.
    ///
    /// `count == 0` fails with `PARAM_ERROR`. `GetActivity` is handled by
    /// tables that track activity and is rejected here.
    pub fn walk(&self, cmd: GetCmd, key: Option<&K>, count: usize) -> OesResult<Vec<(K, V)>>
    where
        V: Clone,
    {
        if count == 0 {
            return Err(OesError::param(format!("{} read with count 0", self.name)));
        }

        match cmd {
            GetCmd::Get => {
                let key = key.ok_or_else(|| {
                    OesError::param(format!("{} GET requires a key", self.name))
                })?;
                if count != 1 {
                    return Err(OesError::param(format!(
                        "{} GET requires count 1, got {}",
                        self.name, count
                    )));
                }
                let value = self.lookup(key)?;
                Ok(vec![(key.clone(), value.clone())])
            }
            GetCmd::GetFirst => Ok(self
                .inner
                .iter()
                .take(count)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            GetCmd::GetNext => {
                let key = key.ok_or_else(|| {
                    OesError::param(format!("{} GET_NEXT requires a key", self.name))
                })?;
                Ok(self
                    .inner
                    .range((Bound::Excluded(key), Bound::Unbounded))
                    .take(count)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect())
            }
            GetCmd::GetActivity => Err(OesError::CmdUnsupported {
                cmd: cmd.to_string(),
                op: self.name,
            }),
        }
    }
}

impl<K, V> SyncTable<K, V>
where
    K: Ord + Clone + Debug,
    V: HasRefCount,
{
    /// Increments the reference count for the given key.
    ///
    /// **This never creates entries.**
    pub fn increment_ref(&mut self, key: &K) -> OesResult<u32> {
        Ok(self.lookup_mut(key)?.increment_ref())
    }

    /// Decrements the reference count for the given key.
    pub fn decrement_ref(&mut self, key: &K) -> OesResult<u32> {
        let name = self.name;
        self.lookup_mut(key)?.decrement_ref().ok_or_else(|| {
            OesError::failed(format!("{} {:?} reference count underflow", name, key))
        })
    }

    pub fn ref_count(&self, key: &K) -> Option<u32> {
        self.inner.get(key).map(|e| e.ref_count())
    }

    /// Removes an entry only if nothing references it.
    pub fn remove_unreferenced(&mut self, key: &K) -> OesResult<V> {
        let refs = self.lookup(key)?.ref_count();
        if refs > 0 {
            return Err(OesError::in_use(format!(
                "{} {:?} referenced {} times",
                self.name, key, refs
            )));
        }
        self.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::OesStatus;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct RefCountedValue {
        ref_count: u32,
    }

    impl RefCountedValue {
        fn new() -> Self {
            Self { ref_count: 0 }
        }
    }

    impl HasRefCount for RefCountedValue {
        fn increment_ref(&mut self) -> u32 {
            self.ref_count += 1;
            self.ref_count
        }

        fn decrement_ref(&mut self) -> Option<u32> {
            if self.ref_count == 0 {
                None
            } else {
                self.ref_count -= 1;
                Some(self.ref_count)
            }
        }

        fn ref_count(&self) -> u32 {
            self.ref_count
        }
    }

    fn table_with(keys: &[u32]) -> SyncTable<u32, String> {
        let mut table = SyncTable::new("test");
        for k in keys {
            table.insert_new(*k, format!("v{}", k)).unwrap();
        }
        table
    }

    fn keys_of(entries: &[(u32, String)]) -> Vec<u32> {
        entries.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_get_never_creates() {
        let mut table: SyncTable<u32, String> = SyncTable::new("test");
        assert!(table.get(&1).is_none());
        assert!(table.get_mut(&1).is_none());
        assert!(table.is_empty());
        assert_eq!(table.lookup(&1).unwrap_err().status(), OesStatus::EntryNotFound);
    }

    #[test]
    fn test_insert_new_rejects_duplicates() {
        let mut table = table_with(&[1]);
        let err = table.insert_new(1, "again".to_string()).unwrap_err();
        assert_eq!(err.status(), OesStatus::EntryAlreadyExists);
    }

    #[test]
    fn test_capacity_limit() {
        let mut table: SyncTable<u32, u32> = SyncTable::with_capacity_limit("fdb", 2);
        table.insert_new(1, 1).unwrap();
        table.insert_new(2, 2).unwrap();
        assert!(table.is_full());
        assert_eq!(table.insert_new(3, 3).unwrap_err().status(), OesStatus::NoResources);
        assert_eq!(table.upsert(3, 3).unwrap_err().status(), OesStatus::NoResources);

        // Replacing an existing key does not need room.
        assert_eq!(table.upsert(2, 20).unwrap(), Some(2));
    }

    #[test]
    fn test_walk_get() {
        let table = table_with(&[1, 5, 9]);
        let got = table.walk(GetCmd::Get, Some(&5), 1).unwrap();
        assert_eq!(got, vec![(5, "v5".to_string())]);

        let err = table.walk(GetCmd::Get, Some(&4), 1).unwrap_err();
        assert_eq!(err.status(), OesStatus::EntryNotFound);

        let err = table.walk(GetCmd::Get, Some(&5), 2).unwrap_err();
        assert_eq!(err.status(), OesStatus::ParamError);

        let err = table.walk(GetCmd::Get, None, 1).unwrap_err();
        assert_eq!(err.status(), OesStatus::ParamError);
    }

    #[test]
    fn test_walk_get_first() {
        let table = table_with(&[9, 1, 5]);
        assert_eq!(keys_of(&table.walk(GetCmd::GetFirst, None, 2).unwrap()), vec![1, 5]);
        assert_eq!(keys_of(&table.walk(GetCmd::GetFirst, None, 10).unwrap()), vec![1, 5, 9]);

        let empty: SyncTable<u32, String> = SyncTable::new("empty");
        assert!(empty.walk(GetCmd::GetFirst, None, 4).unwrap().is_empty());
    }

    #[test]
    fn test_walk_get_next_from_missing_key() {
        let table = table_with(&[1, 5, 9]);
        assert_eq!(keys_of(&table.walk(GetCmd::GetNext, Some(&2), 5).unwrap()), vec![5, 9]);
        assert_eq!(keys_of(&table.walk(GetCmd::GetNext, Some(&5), 1).unwrap()), vec![9]);
        assert!(table.walk(GetCmd::GetNext, Some(&9), 3).unwrap().is_empty());
    }

    #[test]
    fn test_walk_zero_count() {
        let table = table_with(&[1]);
        let err = table.walk(GetCmd::GetFirst, None, 0).unwrap_err();
        assert_eq!(err.status(), OesStatus::ParamError);
    }

    #[test]
    fn test_walk_consistent_under_mutation() {
        let mut table = table_with(&[10, 20, 30, 40, 50]);
        let mut seen = Vec::new();

        let first = table.walk(GetCmd::GetFirst, None, 2).unwrap();
        seen.extend(keys_of(&first));
        let mut cursor = *seen.last().unwrap();

        // Mutate behind and ahead of the cursor.
        table.remove(&10).unwrap();
        table.insert_new(15, "v15".to_string()).unwrap();
        table.remove(&40).unwrap();
        table.insert_new(45, "v45".to_string()).unwrap();

        loop {
            let batch = table.walk(GetCmd::GetNext, Some(&cursor), 2).unwrap();
            if batch.is_empty() {
                break;
            }
            cursor = batch.last().unwrap().0;
            seen.extend(keys_of(&batch));
        }

        // 30 and 50 were present throughout and are seen once; 15 is behind
        // the cursor and not revisited.
        assert_eq!(seen, vec![10, 20, 30, 45, 50]);
    }

    #[test]
    fn test_drain_where() {
        let mut table = table_with(&[1, 2, 3, 4]);
        let removed = table.drain_where(|k, _| k % 2 == 0);
        assert_eq!(keys_of(&removed), vec![2, 4]);
        assert_eq!(table.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_ref_counting() {
        let mut table: SyncTable<u32, RefCountedValue> = SyncTable::new("rif");
        assert!(table.increment_ref(&1).is_err());

        table.insert_new(1, RefCountedValue::new()).unwrap();
        assert_eq!(table.increment_ref(&1).unwrap(), 1);
        assert_eq!(
            table.remove_unreferenced(&1).unwrap_err().status(),
            OesStatus::ResourceInUse
        );

        assert_eq!(table.decrement_ref(&1).unwrap(), 0);
        assert!(table.decrement_ref(&1).is_err());
        assert!(table.remove_unreferenced(&1).is_ok());
    }
}
