//! Fixed-width bitmask sets.
//!
//! A [`BitmaskSet`] stores membership of small integers as bits in an array of
//! 32-bit words: value `v` lives in word `v / 32`, bit `v % 32`. The layout is
//! what the enforcement side reads, so it is part of the output format.

use serde::ser::{Serialize, Serializer};
use std::fmt;

/// Bits per storage word.
pub const WORD_BITS: usize = 32;

/// Membership set over `0..WORDS * 32`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitmaskSet<const WORDS: usize> {
    words: [u32; WORDS],
}

/// Socket address families (64 values).
pub type FamilySet = BitmaskSet<2>;

/// IP protocols (256 values).
pub type ProtocolSet = BitmaskSet<8>;

/// Socket types (32 values).
pub type TypeSet = BitmaskSet<1>;

impl<const WORDS: usize> BitmaskSet<WORDS> {
    /// Number of distinct values the set can hold.
    pub const CAPACITY: usize = WORDS * WORD_BITS;

    /// Creates an empty set.
    pub const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    /// Creates a set with every bit set.
    pub const fn full() -> Self {
        Self {
            words: [u32::MAX; WORDS],
        }
    }

    /// Builds a set from raw words.
    pub const fn from_words(words: [u32; WORDS]) -> Self {
        Self { words }
    }

    /// Sets the bit for `value`.
    ///
    /// Returns false, leaving the set untouched, if `value` is outside the
    /// set's capacity.
    pub fn insert(&mut self, value: usize) -> bool {
        match self.words.get_mut(value / WORD_BITS) {
            Some(word) => {
                *word |= 1u32 << (value % WORD_BITS);
                true
            }
            None => false,
        }
    }

    /// Clears the bit for `value`; out-of-range values are ignored.
    pub fn remove(&mut self, value: usize) {
        if let Some(word) = self.words.get_mut(value / WORD_BITS) {
            *word &= !(1u32 << (value % WORD_BITS));
        }
    }

    /// Sets every bit in every word, including values with no symbolic name.
    pub fn insert_all(&mut self) {
        self.words = [u32::MAX; WORDS];
    }

    /// Returns true if `value` is a member.
    pub fn contains(&self, value: usize) -> bool {
        self.words
            .get(value / WORD_BITS)
            .is_some_and(|word| word & (1u32 << (value % WORD_BITS)) != 0)
    }

    /// Folds `other` into this set (bitwise OR).
    pub fn union_with(&mut self, other: &Self) {
        for (word, theirs) in self.words.iter_mut().zip(other.words.iter()) {
            *word |= theirs;
        }
    }

    /// Returns true if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    /// Returns true if every bit is set.
    pub fn is_full(&self) -> bool {
        self.words.iter().all(|word| *word == u32::MAX)
    }

    /// Number of members.
    pub fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Raw storage words.
    pub fn words(&self) -> &[u32; WORDS] {
        &self.words
    }

    /// Iterates over members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..Self::CAPACITY).filter(move |value| self.contains(*value))
    }
}

impl<const WORDS: usize> Default for BitmaskSet<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const WORDS: usize> fmt::Debug for BitmaskSet<WORDS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.words.iter().map(|word| format!("{word:#010x}")))
            .finish()
    }
}

impl<const WORDS: usize> Serialize for BitmaskSet<WORDS> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.words.iter())
    }
}
