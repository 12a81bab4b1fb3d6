//! Small bounded and case-insensitive containers.

use std::collections::{HashMap, VecDeque};

use crate::cache::Capacity;

// == Bounded List ==
/// FIFO list that drops its oldest item when a push would exceed capacity.
#[derive(Debug, Clone)]
pub struct BoundedList<T> {
    items: VecDeque<T>,
    capacity: Capacity,
}

impl<T> BoundedList<T> {
    pub fn new(capacity: Capacity) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Appends an item, returning the oldest one if it was dropped.
    pub fn push(&mut self, item: T) -> Option<T> {
        let dropped = self.make_room();
        self.items.push_back(item);
        dropped
    }

    /// Inserts at `index` (clamped to the end), dropping the oldest item first
    /// when full. `index` refers to positions after the drop.
    pub fn insert(&mut self, index: usize, item: T) -> Option<T> {
        let dropped = self.make_room();
        self.items.insert(index.min(self.items.len()), item);
        dropped
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.items.remove(index)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Most recently pushed item.
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    fn make_room(&mut self) -> Option<T> {
        match self.capacity.limit() {
            Some(limit) if self.items.len() >= limit => self.items.pop_front(),
            _ => None,
        }
    }
}

impl<'a, T> IntoIterator for &'a BoundedList<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// == Insensitive Map ==
/// String-keyed map whose keys compare case-insensitively.
///
/// Keys are stored lowercased.
#[derive(Debug, Clone)]
pub struct InsensitiveMap<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for InsensitiveMap<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> InsensitiveMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        self.entries.insert(fold(key), value)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(&fold(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(&fold(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(&fold(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&fold(key))
    }

    /// Iterates stored (folded) keys and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: AsRef<str>, V> FromIterator<(K, V)> for InsensitiveMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key.as_ref(), value);
        }
        map
    }
}

fn fold(key: &str) -> String {
    key.to_lowercase()
}
