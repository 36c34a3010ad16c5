use std::fmt::{self, Debug, Formatter};
use std::slice;

use crate::interval::Interval;

/// A union of atomic intervals in canonical form.
///
/// The pieces are non-empty, sorted and pairwise disjoint. Pieces that overlap
/// or touch at an included value are merged on construction, so two sets
/// covering the same values are equal.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct IntervalSet<T> {
    pieces: Vec<Interval<T>>,
}

impl<T> IntervalSet<T> {
    /// The empty set.
    pub const fn new() -> Self {
        Self { pieces: Vec::new() }
    }

    /// Whether the set contains no value.
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// The number of atomic pieces.
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// The atomic pieces in order.
    pub fn iter(&self) -> slice::Iter<'_, Interval<T>> {
        self.pieces.iter()
    }
}

impl<T: Ord + Clone> IntervalSet<T> {
    /// Add all values of an atomic interval.
    pub fn insert(&mut self, interval: Interval<T>) {
        if interval.is_empty() {
            return;
        }
        let mut pieces = std::mem::take(&mut self.pieces);
        pieces.push(interval);
        self.pieces = canonicalize(pieces);
    }

    /// The values in either set.
    pub fn union(&self, other: &Self) -> Self {
        self.iter().chain(other.iter()).cloned().collect()
    }

    /// The values in both sets.
    pub fn intersection(&self, other: &Self) -> Self {
        self.iter()
            .flat_map(|a| other.iter().map(move |b| a.intersection(b)))
            .collect()
    }

    /// The values in this set but not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        self.iter()
            .flat_map(|a| {
                other.iter().fold(vec![a.clone()], |remaining, b| {
                    remaining.iter().flat_map(|piece| piece.difference(b)).collect()
                })
            })
            .collect()
    }

    /// Whether every value of `interval` is in the set.
    pub fn contains(&self, interval: &Interval<T>) -> bool {
        // A contiguous run of values fits inside one canonical piece or none.
        interval.is_empty() || self.iter().any(|piece| piece.contains(interval))
    }

    /// Whether `value` is in the set.
    pub fn contains_value(&self, value: &T) -> bool {
        self.iter().any(|piece| piece.contains_value(value))
    }

    /// Whether the set shares at least one value with `interval`.
    pub fn overlaps(&self, interval: &Interval<T>) -> bool {
        self.iter().any(|piece| piece.overlaps(interval))
    }
}

/// Sort the pieces and merge connected neighbours.
fn canonicalize<T: Ord + Clone>(mut pieces: Vec<Interval<T>>) -> Vec<Interval<T>> {
    pieces.retain(|piece| !piece.is_empty());
    pieces.sort();
    let mut merged: Vec<Interval<T>> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match merged.last_mut() {
            Some(last) => match last.merge(&piece) {
                Some(hull) => *last = hull,
                None => merged.push(piece),
            },
            None => merged.push(piece),
        }
    }
    merged
}

impl<T> Default for IntervalSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> From<Interval<T>> for IntervalSet<T> {
    fn from(interval: Interval<T>) -> Self {
        let mut set = Self::new();
        set.insert(interval);
        set
    }
}

impl<T: Ord + Clone> FromIterator<Interval<T>> for IntervalSet<T> {
    fn from_iter<I: IntoIterator<Item = Interval<T>>>(iter: I) -> Self {
        Self { pieces: canonicalize(iter.into_iter().collect()) }
    }
}

impl<T> IntoIterator for IntervalSet<T> {
    type Item = Interval<T>;
    type IntoIter = std::vec::IntoIter<Interval<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pieces.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a IntervalSet<T> {
    type Item = &'a Interval<T>;
    type IntoIter = slice::Iter<'a, Interval<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pieces.iter()
    }
}

impl<T: Debug> Debug for IntervalSet<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.pieces.is_empty() {
            return f.pad("()");
        }
        for (i, piece) in self.pieces.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            Debug::fmt(piece, f)?;
        }
        Ok(())
    }
}
