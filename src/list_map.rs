use std::{cmp::Ordering, marker::PhantomData, mem, ptr, ptr::NonNull};

use crate::{error::Result, pool_alloc::PoolAlloc};

struct Node<K, V> {
    next: Option<NonNull<Node<K, V>>>,
    key: K,
    value: V,
}

/// Sorted singly linked map whose nodes live in pool blocks.
///
/// Capacity is fixed at `SLOTS` entries; a full map surfaces
/// `OutOfCapacity` from `insert` until something is removed.
pub struct ListMap<K, V, const SLOTS: usize> {
    head: Option<NonNull<Node<K, V>>>,
    len: usize,
    alloc: PoolAlloc<Node<K, V>, SLOTS>,
}

impl<K: Ord, V, const SLOTS: usize> ListMap<K, V, SLOTS> {
    pub fn new() -> Self {
        Self {
            head: None,
            len: 0,
            alloc: PoolAlloc::new(),
        }
    }

    /// Builds the map on `alloc`'s slot count, rebinding it to the internal
    /// node type. The element type of `alloc` itself is irrelevant here.
    pub fn with_alloc<X>(alloc: &PoolAlloc<X, SLOTS>) -> Self {
        Self {
            head: None,
            len: 0,
            alloc: alloc.rebind(),
        }
    }

    /// Inserts `key -> value` and returns the value it replaced, if any.
    /// A full map fails with `OutOfCapacity` and stays unchanged.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let mut prev: Option<NonNull<Node<K, V>>> = None;
        let mut cur = self.head;
        while let Some(node) = cur {
            let node_ref = unsafe { &mut *node.as_ptr() };
            match node_ref.key.cmp(&key) {
                Ordering::Less => {
                    prev = Some(node);
                    cur = node_ref.next;
                }
                Ordering::Equal => {
                    return Ok(Some(mem::replace(&mut node_ref.value, value)));
                }
                Ordering::Greater => break,
            }
        }

        let node = self.alloc.allocate(1)?;
        unsafe {
            self.alloc.construct(
                node,
                Node {
                    next: cur,
                    key,
                    value,
                },
            );
            match prev {
                Some(p) => (*p.as_ptr()).next = Some(node),
                None => self.head = Some(node),
            }
        }
        self.len += 1;
        Ok(None)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let mut cur = self.head;
        while let Some(node) = cur {
            let node_ref = unsafe { &*node.as_ptr() };
            match node_ref.key.cmp(key) {
                Ordering::Less => cur = node_ref.next,
                Ordering::Equal => return Some(&node_ref.value),
                Ordering::Greater => return None,
            }
        }
        None
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Unlinks `key`, hands its block back to the pool and returns the
    /// stored value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let mut prev: Option<NonNull<Node<K, V>>> = None;
        let mut cur = self.head;
        while let Some(node) = cur {
            let node_ref = unsafe { &*node.as_ptr() };
            match node_ref.key.cmp(key) {
                Ordering::Less => {
                    prev = Some(node);
                    cur = node_ref.next;
                }
                Ordering::Equal => {
                    let next = node_ref.next;
                    match prev {
                        Some(p) => unsafe { (*p.as_ptr()).next = next },
                        None => self.head = next,
                    }
                    let unlinked = unsafe { ptr::read(node.as_ptr()) };
                    unsafe { self.alloc.deallocate(node.as_ptr(), 1) };
                    self.len -= 1;
                    return Some(unlinked.value);
                }
                Ordering::Greater => return None,
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            cur: self.head,
            _marker: PhantomData,
        }
    }

    /// Bytes of pool memory behind this map.
    pub fn mem_usage(&self) -> usize {
        self.alloc.mem_usage()
    }
}

impl<K: Ord, V, const SLOTS: usize> Default for ListMap<K, V, SLOTS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, const SLOTS: usize> Drop for ListMap<K, V, SLOTS> {
    fn drop(&mut self) {
        let mut cur = self.head;
        while let Some(node) = cur {
            cur = unsafe { (*node.as_ptr()).next };
            unsafe {
                self.alloc.destroy(node);
                self.alloc.deallocate(node.as_ptr(), 1);
            }
        }
    }
}

pub struct Iter<'a, K, V> {
    cur: Option<NonNull<Node<K, V>>>,
    _marker: PhantomData<&'a Node<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cur?;
        let node_ref = unsafe { &*node.as_ptr() };
        self.cur = node_ref.next;
        Some((&node_ref.key, &node_ref.value))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};

    use itertools::Itertools;

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_insert_get() -> anyhow::Result<()> {
        let mut map: ListMap<u32, String, 8> = ListMap::new();
        assert!(map.is_empty());

        assert_eq!(map.insert(2, "two".to_string())?, None);
        assert_eq!(map.insert(1, "one".to_string())?, None);
        assert_eq!(map.insert(3, "three".to_string())?, None);
        assert_eq!(map.len(), 3);

        assert_eq!(map.get(&1).map(String::as_str), Some("one"));
        assert_eq!(map.get(&2).map(String::as_str), Some("two"));
        assert_eq!(map.get(&3).map(String::as_str), Some("three"));
        assert_eq!(map.get(&4), None);

        let old = map.insert(2, "zwei".to_string())?;
        assert_eq!(old.as_deref(), Some("two"));
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&2).map(String::as_str), Some("zwei"));
        Ok(())
    }

    #[test]
    fn test_sorted_iteration() {
        let mut map: ListMap<i32, i32, 32> = ListMap::new();
        for key in [5, 1, 9, 3, 7, 2, 8, 4, 6, 0] {
            map.insert(key, key * 10).expect("insert failed");
        }

        let keys = map.iter().map(|(k, _)| *k).collect_vec();
        assert_eq!(keys, (0..10).collect_vec());
        let values = map.iter().map(|(_, v)| *v).collect_vec();
        assert_eq!(values, (0..10).map(|k| k * 10).collect_vec());
    }

    #[test]
    fn test_remove_relinks() {
        let mut map: ListMap<u8, u8, 4> = ListMap::new();
        for k in 0..4 {
            map.insert(k, k).expect("insert failed");
        }

        assert_eq!(map.remove(&2), Some(2));
        assert_eq!(map.remove(&2), None);
        assert_eq!(map.len(), 3);
        assert!(!map.contains_key(&2));

        // removing the head has to move it forward
        assert_eq!(map.remove(&0), Some(0));
        assert_eq!(map.iter().map(|(k, _)| *k).collect_vec(), vec![1, 3]);
    }

    #[test]
    fn test_capacity_exhaustion() {
        let mut map: ListMap<u32, u32, 4> = ListMap::new();
        for k in 0..4 {
            map.insert(k, k).expect("insert under capacity failed");
        }
        assert!(matches!(map.insert(4, 4), Err(Error::OutOfCapacity(_))));
        assert_eq!(map.len(), 4);

        // replacing an existing key needs no new node even when full
        assert_eq!(map.insert(1, 11).expect("replace failed"), Some(1));

        map.remove(&0);
        map.insert(4, 4).expect("insert after remove failed");
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_churn_stays_within_footprint() {
        let mut map: ListMap<u64, u64, 8> = ListMap::new();
        let footprint = map.mem_usage();

        for round in 0..100u64 {
            for k in 0..8 {
                map.insert(round * 8 + k, k).expect("insert failed");
            }
            assert!(matches!(
                map.insert(u64::MAX, 0),
                Err(Error::OutOfCapacity(_))
            ));
            for k in 0..8 {
                assert_eq!(map.remove(&(round * 8 + k)), Some(k));
            }
            assert!(map.is_empty());
        }

        assert_eq!(map.mem_usage(), footprint);
    }

    #[test]
    fn test_drop_releases_every_node() {
        static DROPPED: AtomicUsize = AtomicUsize::new(0);

        struct Counted;

        impl Drop for Counted {
            fn drop(&mut self) {
                DROPPED.fetch_add(1, SeqCst);
            }
        }

        {
            let mut map: ListMap<u32, Counted, 16> = ListMap::new();
            for k in 0..10 {
                map.insert(k, Counted).expect("insert failed");
            }
            assert_eq!(DROPPED.load(SeqCst), 0);
        }
        assert_eq!(DROPPED.load(SeqCst), 10);
    }

    #[test]
    fn test_replace_drops_old_value_once() {
        static DROPPED: AtomicUsize = AtomicUsize::new(0);

        struct Counted;

        impl Drop for Counted {
            fn drop(&mut self) {
                DROPPED.fetch_add(1, SeqCst);
            }
        }

        let mut map: ListMap<u8, Counted, 4> = ListMap::new();
        map.insert(1, Counted).expect("insert failed");
        let old = map.insert(1, Counted).expect("replace failed");
        assert_eq!(DROPPED.load(SeqCst), 0);

        drop(old);
        assert_eq!(DROPPED.load(SeqCst), 1);

        map.remove(&1);
        assert_eq!(DROPPED.load(SeqCst), 2);
    }

    #[test]
    fn test_with_alloc_placeholder_type() {
        // the element type only sizes the source allocator, the map rebinds
        let alloc: PoolAlloc<u8, 8> = PoolAlloc::new();
        let mut map: ListMap<String, u64, 8> = ListMap::with_alloc(&alloc);

        map.insert("b".to_string(), 2).expect("insert failed");
        map.insert("a".to_string(), 1).expect("insert failed");
        assert_eq!(map.get(&"a".to_string()), Some(&1));
        assert_eq!(map.len(), 2);

        // the source allocator's own pool is untouched
        assert_eq!(alloc.available(), 8);
        assert!(map.mem_usage() > 0);
    }
}
