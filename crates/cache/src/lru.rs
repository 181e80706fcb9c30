//! An arena-backed LRU list. Nodes live in a [`slab::Slab`] and are linked
//! by stable keys rather than raw pointers, sidestepping the intrusive
//! cross-pointer list upstream's `CDirectoryCache`/`CPathCache` use their
//! own hand-rolled doubly linked list for.

use slab::Slab;
use rustc_hash::FxHashMap as HashMap;
use std::hash::Hash;

struct Node<V> {
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A generic least-recently-used list keyed by `K`, storing `V`. Every
/// lookup that "touches" an entry moves it to the front; eviction always
/// removes from the back.
pub struct LruList<K, V> {
    slots: Slab<Node<V>>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K: Eq + Hash + Clone, V> Default for LruList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V> LruList<K, V> {
    pub fn new() -> Self {
        Self {
            slots: Slab::new(),
            index: HashMap::default(),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&i| &self.slots[i].value)
    }

    /// Mutable access without re-touching MRU order, for patching an
    /// entry's value in place (e.g. a per-file cache update).
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let i = *self.index.get(key)?;
        Some(&mut self.slots[i].value)
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = {
            let node = &self.slots[slot];
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        self.slots[slot].prev = None;
        self.slots[slot].next = old_head;
        if let Some(h) = old_head {
            self.slots[h].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    /// Moves `key` to the most-recently-used position. No-op if absent.
    pub fn touch(&mut self, key: &K) {
        if let Some(&slot) = self.index.get(key) {
            self.detach(slot);
            self.push_front(slot);
        }
    }

    /// Inserts or replaces `key`, marking it most-recently-used. Returns
    /// the previous value, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            self.detach(slot);
            self.push_front(slot);
            return Some(std::mem::replace(&mut self.slots[slot].value, value));
        }
        let slot = self.slots.insert(Node {
            value,
            prev: None,
            next: None,
        });
        self.index.insert(key, slot);
        self.push_front(slot);
        None
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.index.remove(key)?;
        self.detach(slot);
        Some(self.slots.remove(slot).value)
    }

    /// Removes and returns the least-recently-used key/value pair.
    pub fn pop_back(&mut self) -> Option<(K, V)> {
        let slot = self.tail?;
        self.detach(slot);
        let node = self.slots.remove(slot);
        let key = self
            .index
            .iter()
            .find(|(_, &v)| v == slot)
            .map(|(k, _)| k.clone())?;
        self.index.remove(&key);
        Some((key, node.value))
    }

    pub fn iter_keys_mru_first(&self) -> impl Iterator<Item = &K> + '_ {
        let mut cur = self.head;
        let mut seen_to_key: HashMap<usize, &K> = HashMap::default();
        for (k, &slot) in self.index.iter() {
            seen_to_key.insert(slot, k);
        }
        std::iter::from_fn(move || {
            let slot = cur?;
            cur = self.slots[slot].next;
            seen_to_key.get(&slot).copied()
        })
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }
}
