//! Ordered multimap based on a left-leaning Red-Black Tree.
//!
//! This module provides [`TreeMultimap`], a mutable ordered container that
//! maps each key to a FIFO queue of values.
//!
//! # Overview
//!
//! `TreeMultimap` stores all values sharing a key inside a single tree node,
//! so the tree itself never contains duplicate keys. Inserting an existing
//! key appends to that key's value queue; removing a key pops the oldest
//! value and only excises the node once its queue drains.
//!
//! - O(log N) get
//! - O(log N) insert
//! - O(log N) remove
//! - O(log N) `min_key`/`max_key`
//! - O(1) len and `is_empty`
//!
//! # Examples
//!
//! ```rust
//! use timberline::multimap::TreeMultimap;
//!
//! let mut map = TreeMultimap::new();
//! map.insert(5, "first");
//! map.insert(5, "second");
//! map.insert(2, "other");
//!
//! // Two distinct keys, even though key 5 holds two values
//! assert_eq!(map.len(), 2);
//!
//! // The oldest value under a key is served first
//! assert_eq!(map.get(&5), Ok(&"first"));
//! map.remove(&5);
//! assert_eq!(map.get(&5), Ok(&"second"));
//! ```
//!
//! # Internal Structure
//!
//! The left-leaning Red-Black Tree maintains the following invariants:
//! 1. Binary-search-tree order over keys
//! 2. The root is black
//! 3. Red links lean left: no node has a red right child
//! 4. No two consecutive red links
//! 5. Every path from the root to an empty subtree has the same number of
//!    black nodes
//! 6. A live node's value queue is never empty
//!
//! These invariants ensure the tree height is O(log N). Every mutating
//! operation descends recursively and repairs the local invariants on the
//! way back up; the root is forced black after the top-level call returns.

use smallvec::{SmallVec, smallvec};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::iter::FromIterator;

// =============================================================================
// Color and Node Definitions
// =============================================================================

/// The color of a Red-Black Tree link.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Color {
    Red,
    Black,
}

impl Color {
    /// Returns the opposite color.
    const fn toggled(self) -> Self {
        match self {
            Self::Red => Self::Black,
            Self::Black => Self::Red,
        }
    }
}

/// Per-key value storage. Values append at the back and drain from the
/// front; the common multiplicity-1 case stays inline.
type ValueQueue<V> = SmallVec<[V; 2]>;

/// An exclusively owned subtree. `None` is an empty subtree and counts as
/// black everywhere colors are inspected.
type Link<K, V> = Option<Box<Node<K, V>>>;

/// Internal node structure for the left-leaning Red-Black Tree.
struct Node<K, V> {
    key: K,
    values: ValueQueue<V>,
    color: Color,
    left: Link<K, V>,
    right: Link<K, V>,
}

impl<K, V> Node<K, V> {
    /// Creates a new red node holding a single value.
    fn new_red(key: K, value: V) -> Self {
        Self {
            key,
            values: smallvec![value],
            color: Color::Red,
            left: None,
            right: None,
        }
    }
}

/// Checks if an optional node is red. Empty subtrees are black.
fn is_red<K, V>(node: Option<&Node<K, V>>) -> bool {
    node.is_some_and(|node| node.color == Color::Red)
}

/// Checks if the left child's left child is red.
fn is_left_left_red<K, V>(node: &Node<K, V>) -> bool {
    node.left
        .as_ref()
        .is_some_and(|left| is_red(left.left.as_deref()))
}

// =============================================================================
// Balance Primitives
// =============================================================================
//
// The rotations take ownership of a subtree and hand back its new root.
// A rotation transfers the old root's color to the new root and demotes the
// old root to red; children move across without being copied.

/// Rotates the subtree to the left around its root.
fn rotate_left<K, V>(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
    let Some(mut child) = node.right.take() else {
        // Callers only rotate left when a right child exists.
        return node;
    };
    node.right = child.left.take();
    child.color = node.color;
    node.color = Color::Red;
    child.left = Some(node);
    child
}

/// Rotates the subtree to the right around its root.
fn rotate_right<K, V>(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
    let Some(mut child) = node.left.take() else {
        // Callers only rotate right when a left child exists.
        return node;
    };
    node.left = child.right.take();
    child.color = node.color;
    node.color = Color::Red;
    child.right = Some(node);
    child
}

/// Toggles the color of a node and both of its children, modeling a 2-3 tree
/// split or merge.
fn flip_colors<K, V>(node: &mut Node<K, V>) {
    node.color = node.color.toggled();
    if let Some(left) = node.left.as_mut() {
        left.color = left.color.toggled();
    }
    if let Some(right) = node.right.as_mut() {
        right.color = right.color.toggled();
    }
}

/// Restores the local left-leaning invariants after a mutation.
///
/// The three checks run in this exact order:
/// 1. right child red and left child not red: rotate left
/// 2. left child red and left-left grandchild red: rotate right
/// 3. both children red: flip colors
fn fix_up<K, V>(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
    if is_red(node.right.as_deref()) && !is_red(node.left.as_deref()) {
        node = rotate_left(node);
    }
    if is_red(node.left.as_deref()) && is_left_left_red(&node) {
        node = rotate_right(node);
    }
    if is_red(node.left.as_deref()) && is_red(node.right.as_deref()) {
        flip_colors(&mut node);
    }
    node
}

/// Pushes a red link down the left spine so the left recursive step of a
/// deletion never descends into a subtree without a red link to consume.
fn move_red_left<K, V>(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
    flip_colors(&mut node);
    let right_left_red = node
        .right
        .as_ref()
        .is_some_and(|right| is_red(right.left.as_deref()));
    if right_left_red {
        if let Some(right) = node.right.take() {
            node.right = Some(rotate_right(right));
        }
        node = rotate_left(node);
        flip_colors(&mut node);
    }
    node
}

/// Pushes a red link down the right spine, the mirror of [`move_red_left`].
fn move_red_right<K, V>(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
    flip_colors(&mut node);
    if is_left_left_red(&node) {
        node = rotate_right(node);
        flip_colors(&mut node);
    }
    node
}

/// Deletes the minimum node of a subtree and returns the remaining subtree
/// together with the removed node's key and value queue.
///
/// Two-child removal swaps the deleted node's payload for its in-order
/// successor's, so the payload is moved out rather than dropped here.
fn delete_min<K, V>(mut node: Box<Node<K, V>>) -> (Link<K, V>, (K, ValueQueue<V>)) {
    if node.left.is_none() {
        let Node { key, values, .. } = *node;
        return (None, (key, values));
    }
    if !is_red(node.left.as_deref()) && !is_left_left_red(&node) {
        node = move_red_left(node);
    }
    match node.left.take() {
        Some(left) => {
            let (rest, payload) = delete_min(left);
            node.left = rest;
            (Some(fix_up(node)), payload)
        }
        None => {
            // move_red_left never empties the left link, so this node can
            // only be the minimum itself.
            let Node { key, values, .. } = *node;
            (None, (key, values))
        }
    }
}

// =============================================================================
// Error Definition
// =============================================================================

/// Errors surfaced by the fallible [`TreeMultimap`] queries.
///
/// Inserting a duplicate key is deliberately *not* an error: the multimap
/// accepts repeated keys by appending to the key's value queue.
///
/// # Examples
///
/// ```rust
/// use timberline::multimap::{MultimapError, TreeMultimap};
///
/// let map: TreeMultimap<i32, i32> = TreeMultimap::new();
/// assert_eq!(map.get(&1), Err(MultimapError::KeyNotFound));
/// assert_eq!(map.min_key(), Err(MultimapError::EmptyContainer));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultimapError {
    /// The requested key is not present. Raised only by [`TreeMultimap::get`];
    /// [`TreeMultimap::contains_key`] never fails.
    KeyNotFound,
    /// The multimap holds no entries. Raised by [`TreeMultimap::min_key`] and
    /// [`TreeMultimap::max_key`].
    EmptyContainer,
}

impl fmt::Display for MultimapError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyNotFound => write!(formatter, "key not found in multimap"),
            Self::EmptyContainer => write!(formatter, "multimap is empty"),
        }
    }
}

impl std::error::Error for MultimapError {}

// =============================================================================
// TreeMultimap Definition
// =============================================================================

/// A mutable ordered multimap based on a left-leaning Red-Black Tree.
///
/// Each distinct key occupies one tree node holding a FIFO queue of values:
/// inserting under an existing key appends to the queue, removing pops the
/// oldest value, and the node is structurally excised only when the queue
/// empties. The structure owns its subtrees exclusively and is meant for
/// single-threaded use.
///
/// # Time Complexity
///
/// | Operation      | Complexity |
/// |----------------|------------|
/// | `new`          | O(1)       |
/// | `get`          | O(log N)   |
/// | `insert`       | O(log N)   |
/// | `remove`       | O(log N)   |
/// | `contains_key` | O(log N)   |
/// | `min_key`/`max_key` | O(log N) |
/// | `len`          | O(1)       |
/// | `is_empty`     | O(1)       |
///
/// # Examples
///
/// ```rust
/// use timberline::multimap::TreeMultimap;
///
/// let mut map = TreeMultimap::new();
/// for key in [2, 18, 42, 43, 16] {
///     map.insert(key, key);
/// }
///
/// assert_eq!(map.len(), 5);
/// assert_eq!(map.min_key(), Ok(&2));
/// assert_eq!(map.max_key(), Ok(&43));
///
/// // Entries iterate in key order
/// let keys: Vec<&i32> = map.keys().collect();
/// assert_eq!(keys, vec![&2, &16, &18, &42, &43]);
/// ```
pub struct TreeMultimap<K, V> {
    /// Root node of the tree.
    root: Link<K, V>,
    /// Number of distinct keys, not total stored values.
    length: usize,
}

impl<K, V> TreeMultimap<K, V> {
    /// Creates a new empty multimap.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use timberline::multimap::TreeMultimap;
    ///
    /// let map: TreeMultimap<i32, String> = TreeMultimap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            length: 0,
        }
    }

    /// Returns the number of distinct keys in the multimap.
    ///
    /// A key holding several values still counts once; the count changes
    /// only when a node is created or excised.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use timberline::multimap::TreeMultimap;
    ///
    /// let mut map = TreeMultimap::new();
    /// map.insert(1, "a");
    /// map.insert(1, "b");
    /// map.insert(2, "c");
    /// assert_eq!(map.len(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the multimap contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl<K: Ord, V> TreeMultimap<K, V> {
    /// Inserts a key-value pair into the multimap.
    ///
    /// Insertion always succeeds. A previously absent key gets a fresh node;
    /// an existing key has the value appended to the back of its queue
    /// without changing [`len`](Self::len) or the tree shape.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use timberline::multimap::TreeMultimap;
    ///
    /// let mut map = TreeMultimap::new();
    /// map.insert(1, "one");
    /// map.insert(1, "uno");
    ///
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.values_of(&1), Some(&["one", "uno"][..]));
    /// ```
    pub fn insert(&mut self, key: K, value: V) {
        let (mut root, created) = Self::insert_at(self.root.take(), key, value);
        root.color = Color::Black;
        self.root = Some(root);
        if created {
            self.length += 1;
        }
    }

    /// Recursive helper for insert. Returns the subtree root and whether a
    /// new node was created.
    fn insert_at(link: Link<K, V>, key: K, value: V) -> (Box<Node<K, V>>, bool) {
        let Some(mut node) = link else {
            return (Box::new(Node::new_red(key, value)), true);
        };
        let created = match key.cmp(&node.key) {
            Ordering::Less => {
                let (left, created) = Self::insert_at(node.left.take(), key, value);
                node.left = Some(left);
                created
            }
            Ordering::Greater => {
                let (right, created) = Self::insert_at(node.right.take(), key, value);
                node.right = Some(right);
                created
            }
            Ordering::Equal => {
                node.values.push(value);
                false
            }
        };
        (fix_up(node), created)
    }

    /// Removes one value occurrence for the given key.
    ///
    /// A no-op when the key is absent. On a hit, the oldest value is popped
    /// from the key's queue; the node itself is excised, and
    /// [`len`](Self::len) decremented, only when the queue empties.
    ///
    /// The key may be any borrowed form of the map's key type, but the
    /// ordering on the borrowed form must match the ordering on the key type.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use timberline::multimap::TreeMultimap;
    ///
    /// let mut map = TreeMultimap::new();
    /// map.insert(5, 1);
    /// map.insert(5, 2);
    ///
    /// map.remove(&5);
    /// assert_eq!(map.get(&5), Ok(&2)); // node survives, oldest value gone
    ///
    /// map.remove(&5);
    /// assert!(!map.contains_key(&5)); // queue drained, node excised
    ///
    /// map.remove(&5); // absent key: nothing happens
    /// assert_eq!(map.len(), 0);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        // Cheap guard: never start a structural descent on a miss.
        if !self.contains_key(key) {
            return;
        }
        let (root, excised) = match self.root.take() {
            Some(root) => Self::remove_at(root, key),
            None => (None, false),
        };
        self.root = root;
        if excised {
            self.length -= 1;
        }
        if let Some(root) = self.root.as_mut() {
            root.color = Color::Black;
        }
    }

    /// Recursive helper for remove: classic LLRB top-down red-pushing
    /// deletion, adapted for per-key multiplicity. Returns the subtree root
    /// and whether a node was structurally excised.
    fn remove_at<Q>(mut node: Box<Node<K, V>>, key: &Q) -> (Link<K, V>, bool)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let excised;
        if key < node.key.borrow() {
            if !is_red(node.left.as_deref()) && !is_left_left_red(&node) {
                node = move_red_left(node);
            }
            let (left, left_excised) = match node.left.take() {
                Some(left) => Self::remove_at(left, key),
                None => (None, false),
            };
            node.left = left;
            excised = left_excised;
        } else {
            if is_red(node.left.as_deref()) {
                node = rotate_right(node);
            }
            if key == node.key.borrow() && node.right.is_none() {
                if node.values.len() > 1 {
                    node.values.remove(0);
                    return (Some(node), false);
                }
                // Multiplicity dropped to zero at a node with no right
                // child: excise it and skip fix-up on this frame.
                return (None, true);
            }
            let right_left_red = node
                .right
                .as_ref()
                .is_some_and(|right| is_red(right.left.as_deref()));
            if !is_red(node.right.as_deref()) && !right_left_red {
                node = move_red_right(node);
            }
            if key == node.key.borrow() {
                if node.values.len() > 1 {
                    node.values.remove(0);
                    excised = false;
                } else if let Some(right) = node.right.take() {
                    // Replace this node's payload with its in-order
                    // successor's, then delete the successor node from the
                    // right subtree.
                    let (rest, (successor_key, successor_values)) = delete_min(right);
                    node.key = successor_key;
                    node.values = successor_values;
                    node.right = rest;
                    excised = true;
                } else {
                    // The no-right-child case already returned above.
                    excised = false;
                }
            } else {
                let (right, right_excised) = match node.right.take() {
                    Some(right) => Self::remove_at(right, key),
                    None => (None, false),
                };
                node.right = right;
                excised = right_excised;
            }
        }
        (Some(fix_up(node)), excised)
    }

    /// Iterative descent to the node holding the given key.
    fn find_node<Q>(&self, key: &Q) -> Option<&Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            match key.cmp(node.key.borrow()) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Greater => current = node.right.as_deref(),
                Ordering::Equal => return Some(node),
            }
        }
        None
    }

    /// Returns the oldest surviving value stored under the given key.
    ///
    /// # Errors
    ///
    /// Returns [`MultimapError::KeyNotFound`] if the key is absent.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use timberline::multimap::{MultimapError, TreeMultimap};
    ///
    /// let mut map = TreeMultimap::new();
    /// map.insert("hello".to_string(), 1);
    /// map.insert("hello".to_string(), 2);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Ok(&1));
    /// assert_eq!(map.get("world"), Err(MultimapError::KeyNotFound));
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Result<&V, MultimapError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_node(key)
            .and_then(|node| node.values.first())
            .ok_or(MultimapError::KeyNotFound)
    }

    /// Returns `true` if the multimap holds at least one value for the key.
    ///
    /// Unlike [`get`](Self::get), this never fails.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_node(key).is_some()
    }

    /// Returns all values currently stored under the given key, oldest
    /// first, or `None` if the key is absent.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn values_of<Q>(&self, key: &Q) -> Option<&[V]>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_node(key).map(|node| node.values.as_slice())
    }

    /// Returns the smallest key in the multimap.
    ///
    /// # Errors
    ///
    /// Returns [`MultimapError::EmptyContainer`] if the multimap is empty.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use timberline::multimap::TreeMultimap;
    ///
    /// let mut map = TreeMultimap::new();
    /// map.insert(3, ());
    /// map.insert(1, ());
    /// assert_eq!(map.min_key(), Ok(&1));
    /// ```
    pub fn min_key(&self) -> Result<&K, MultimapError> {
        let mut node = self
            .root
            .as_deref()
            .ok_or(MultimapError::EmptyContainer)?;
        while let Some(left) = node.left.as_deref() {
            node = left;
        }
        Ok(&node.key)
    }

    /// Returns the largest key in the multimap.
    ///
    /// # Errors
    ///
    /// Returns [`MultimapError::EmptyContainer`] if the multimap is empty.
    ///
    /// # Complexity
    ///
    /// O(log N)
    pub fn max_key(&self) -> Result<&K, MultimapError> {
        let mut node = self
            .root
            .as_deref()
            .ok_or(MultimapError::EmptyContainer)?;
        while let Some(right) = node.right.as_deref() {
            node = right;
        }
        Ok(&node.key)
    }
}

impl<K, V> TreeMultimap<K, V> {
    /// Returns an iterator over `(key, values)` entries in ascending key
    /// order. The values slice lists that key's queue oldest first.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use timberline::multimap::TreeMultimap;
    ///
    /// let mut map = TreeMultimap::new();
    /// map.insert(2, "b");
    /// map.insert(1, "a");
    /// map.insert(2, "B");
    ///
    /// let entries: Vec<(&i32, &[&str])> = map.iter().collect();
    /// assert_eq!(entries, vec![(&1, &["a"][..]), (&2, &["b", "B"][..])]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> TreeMultimapIterator<'_, K, V> {
        let mut entries = Vec::with_capacity(self.length);
        Self::collect_in_order(self.root.as_deref(), &mut entries);
        TreeMultimapIterator {
            entries,
            current_index: 0,
        }
    }

    /// Returns an iterator over the distinct keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// In-order traversal collecting `(key, values)` pairs.
    fn collect_in_order<'a>(node: Option<&'a Node<K, V>>, entries: &mut Vec<(&'a K, &'a [V])>) {
        if let Some(node) = node {
            Self::collect_in_order(node.left.as_deref(), entries);
            entries.push((&node.key, node.values.as_slice()));
            Self::collect_in_order(node.right.as_deref(), entries);
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<K, V> Default for TreeMultimap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for TreeMultimap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for TreeMultimap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq> Eq for TreeMultimap<K, V> {}

impl<K: Ord, V> Extend<(K, V)> for TreeMultimap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iterable: I) {
        for (key, value) in iterable {
            self.insert(key, value);
        }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for TreeMultimap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iterable: I) -> Self {
        let mut map = Self::new();
        map.extend(iterable);
        map
    }
}

impl<'a, K, V> IntoIterator for &'a TreeMultimap<K, V> {
    type Item = (&'a K, &'a [V]);
    type IntoIter = TreeMultimapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Iterator Definition
// =============================================================================

/// In-order iterator over the entries of a [`TreeMultimap`].
///
/// Yields `(key, values)` pairs in ascending key order; each values slice is
/// that key's queue, oldest value first.
pub struct TreeMultimapIterator<'a, K, V> {
    entries: Vec<(&'a K, &'a [V])>,
    current_index: usize,
}

impl<'a, K, V> Iterator for TreeMultimapIterator<'a, K, V> {
    type Item = (&'a K, &'a [V]);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.get(self.current_index).copied();
        if entry.is_some() {
            self.current_index += 1;
        }
        entry
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len() - self.current_index;
        (remaining, Some(remaining))
    }
}

impl<K, V> ExactSizeIterator for TreeMultimapIterator<'_, K, V> {}

// =============================================================================
// Tests
// =============================================================================
