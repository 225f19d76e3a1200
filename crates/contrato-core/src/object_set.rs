// contrato-core/src/object_set.rs
// ============================================================================
// Module: Object Set
// Description: Insertion-ordered, deduplicating container.
// Purpose: Back contract children with hash-keyed lookup and stable ordering.
// Dependencies: serde_json, crate::hashing
// ============================================================================

//! ## Overview
//! Children order feeds deterministic hashing and template rendering, so the
//! set keeps insertion order. Elements are deduplicated by their identity
//! hash; elements without one (an unfinished contract built with hashing
//! disabled) fall back to [`SetMember::is_same`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::hashing::ContentHash;
use crate::hashing::hash_canonical_json;

// ============================================================================
// SECTION: Membership
// ============================================================================

/// Identity used by [`ObjectSet`] to deduplicate elements.
pub trait SetMember {
    /// Content hash of the element, when it has one.
    fn identity(&self) -> Option<ContentHash>;

    /// Fallback comparison for elements without an identity.
    fn is_same(&self, other: &Self) -> bool;
}

impl<T: SetMember + ?Sized> SetMember for Arc<T> {
    fn identity(&self) -> Option<ContentHash> {
        self.as_ref().identity()
    }

    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl SetMember for Value {
    fn identity(&self) -> Option<ContentHash> {
        hash_canonical_json(self).ok()
    }

    fn is_same(&self, other: &Self) -> bool {
        self == other
    }
}

// ============================================================================
// SECTION: Object Set
// ============================================================================

/// Ordered set of values keyed by their identity hash.
///
/// # Invariants
/// - `index` maps every hashed element to its position in `items`.
/// - No two elements share an identity.
#[derive(Debug, Clone)]
pub struct ObjectSet<T> {
    /// Elements in insertion order.
    items: Vec<T>,
    /// Position lookup by identity hash.
    index: HashMap<ContentHash, usize>,
}

impl<T> Default for ObjectSet<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: SetMember> ObjectSet<T> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element. Returns `false` when an equal element is present.
    pub fn add(&mut self, item: T) -> bool {
        match item.identity() {
            Some(hash) => {
                if self.index.contains_key(&hash) {
                    return false;
                }
                self.index.insert(hash, self.items.len());
            }
            None => {
                if self.items.iter().any(|existing| existing.is_same(&item)) {
                    return false;
                }
            }
        }
        self.items.push(item);
        true
    }

    /// Removes an element, returning it when it was present.
    pub fn remove(&mut self, item: &T) -> Option<T> {
        let position = match item.identity() {
            Some(hash) => self.index.get(&hash).copied(),
            None => self.items.iter().position(|existing| existing.is_same(item)),
        }?;
        let removed = self.items.remove(position);
        self.reindex();
        Some(removed)
    }

    /// Looks an element up by identity hash.
    #[must_use]
    pub fn get(&self, hash: &ContentHash) -> Option<&T> {
        self.index.get(hash).and_then(|position| self.items.get(*position))
    }

    /// True when an equal element is present.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        match item.identity() {
            Some(hash) => self.index.contains_key(&hash),
            None => self.items.iter().any(|existing| existing.is_same(item)),
        }
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// All elements in insertion order.
    #[must_use]
    pub fn get_all(&self) -> &[T] {
        &self.items
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the set holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Rebuilds the hash index after positions shift.
    fn reindex(&mut self) {
        self.index.clear();
        for (position, item) in self.items.iter().enumerate() {
            if let Some(hash) = item.identity() {
                self.index.insert(hash, position);
            }
        }
    }
}

impl<T: SetMember> FromIterator<T> for ObjectSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.add(item);
        }
        set
    }
}

impl<'a, T: SetMember> IntoIterator for &'a ObjectSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
