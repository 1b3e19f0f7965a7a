//! Deterministic containers used across the graph
//!
//! - `OrderedSet`: insertion-ordered list with a membership index
//! - `DeepSet`: uniqueness by canonical string instead of identity

use std::collections::HashSet;
use std::hash::Hash;

/// Values with a canonical, order-independent string form.
pub trait UniqueString {
    fn to_unique_string(&self) -> String;
}

/// Insertion-ordered sequence with a membership set.
///
/// `add` always appends to the list, so the list keeps an audit trail of
/// every insertion (duplicates included). Membership and `len` go through
/// the set.
#[derive(Debug, Clone, Default)]
pub struct OrderedSet<T: Eq + Hash + Clone> {
    list: Vec<T>,
    set: HashSet<T>,
}

impl<T: Eq + Hash + Clone> OrderedSet<T> {
    pub fn new() -> Self {
        Self {
            list: Vec::new(),
            set: HashSet::new(),
        }
    }

    pub fn add(&mut self, value: T) {
        if !self.set.contains(&value) {
            self.set.insert(value.clone());
        }
        self.list.push(value);
    }

    pub fn add_all(&mut self, other: &OrderedSet<T>) {
        for value in &other.list {
            self.add(value.clone());
        }
    }

    #[inline]
    pub fn has(&self, value: &T) -> bool {
        self.set.contains(value)
    }

    /// Number of distinct values.
    #[inline]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Every insertion in order, duplicates included.
    pub fn as_slice(&self) -> &[T] {
        &self.list
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.list.iter()
    }

    /// Distinct values in first-seen order.
    pub fn distinct(&self) -> Vec<&T> {
        let mut seen: HashSet<&T> = HashSet::with_capacity(self.set.len());
        self.list.iter().filter(|v| seen.insert(*v)).collect()
    }
}

impl<T: Eq + Hash + Clone> PartialEq for OrderedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.set == other.set
    }
}

impl<T: Eq + Hash + Clone> Eq for OrderedSet<T> {}

impl<T: Eq + Hash + Clone> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = OrderedSet::new();
        for value in iter {
            set.add(value);
        }
        set
    }
}

impl<'a, T: Eq + Hash + Clone> IntoIterator for &'a OrderedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}

/// Set of values deduplicated by `to_unique_string()`.
///
/// Iteration follows the insertion order of first-seen values.
#[derive(Debug, Clone)]
pub struct DeepSet<T: UniqueString> {
    elements: Vec<T>,
    keys: HashSet<String>,
}

impl<T: UniqueString> Default for DeepSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: UniqueString> DeepSet<T> {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// Adds `value` unless an equal canonical string is present.
    /// Returns whether the value was inserted.
    pub fn add(&mut self, value: T) -> bool {
        if self.keys.insert(value.to_unique_string()) {
            self.elements.push(value);
            true
        } else {
            false
        }
    }

    pub fn add_all(&mut self, values: impl IntoIterator<Item = T>) {
        for value in values {
            self.add(value);
        }
    }

    pub fn has(&self, value: &T) -> bool {
        self.keys.contains(&value.to_unique_string())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn map<U: UniqueString>(&self, f: impl FnMut(&T) -> U) -> DeepSet<U> {
        self.elements.iter().map(f).collect()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.elements
    }
}

impl<T: UniqueString> PartialEq for DeepSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys
    }
}

impl<T: UniqueString> FromIterator<T> for DeepSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = DeepSet::new();
        set.add_all(iter);
        set
    }
}

impl<T: UniqueString> IntoIterator for DeepSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a, T: UniqueString> IntoIterator for &'a DeepSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl UniqueString for String {
    fn to_unique_string(&self) -> String {
        self.clone()
    }
}
