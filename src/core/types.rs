//! Core identifiers and affinity masks
//!
//! A [`CoreId`] names one logical CPU as the OS numbers it. An
//! [`AffinityMask`] is a set of them stored as a word-backed bitset, so hosts
//! with more than 64 logical cores are representable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical CPU core identifier, valid in `[0, core_count)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct CoreId(pub usize);

impl CoreId {
    /// Raw index of the core
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for CoreId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const WORD_BITS: usize = u64::BITS as usize;

/// Set of logical cores a thread may run on.
///
/// Bit `i` is set exactly when `CoreId(i)` is a member. Trailing zero words are
/// never stored, so two masks with the same members compare equal.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct AffinityMask {
    words: Vec<u64>,
}

impl AffinityMask {
    /// Mask with no cores
    pub fn empty() -> Self {
        Self { words: Vec::new() }
    }

    /// Mask containing exactly one core
    pub fn single(core: CoreId) -> Self {
        let mut mask = Self::empty();
        mask.insert(core);
        mask
    }

    /// Add a core to the mask
    pub fn insert(&mut self, core: CoreId) {
        let (word, bit) = (core.0 / WORD_BITS, core.0 % WORD_BITS);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << bit;
    }

    /// Remove a core from the mask
    pub fn remove(&mut self, core: CoreId) {
        let (word, bit) = (core.0 / WORD_BITS, core.0 % WORD_BITS);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !(1u64 << bit);
        }
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }

    /// Whether `core` is a member
    pub fn contains(&self, core: CoreId) -> bool {
        let (word, bit) = (core.0 / WORD_BITS, core.0 % WORD_BITS);
        self.words.get(word).is_some_and(|w| w & (1u64 << bit) != 0)
    }

    /// True when no core is set
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of cores in the mask
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Lowest core in the mask
    pub fn first(&self) -> Option<CoreId> {
        self.iter().next()
    }

    /// Highest core in the mask
    pub fn max_core(&self) -> Option<CoreId> {
        let last = self.words.last()?;
        let top = WORD_BITS - 1 - last.leading_zeros() as usize;
        Some(CoreId((self.words.len() - 1) * WORD_BITS + top))
    }

    /// Members in ascending order
    pub fn iter(&self) -> impl Iterator<Item = CoreId> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(CoreId(i * WORD_BITS + bit))
            })
        })
    }

    /// Backing words, least significant core first
    pub fn as_words(&self) -> &[u64] {
        &self.words
    }
}

impl FromIterator<CoreId> for AffinityMask {
    fn from_iter<I: IntoIterator<Item = CoreId>>(iter: I) -> Self {
        let mut mask = Self::empty();
        for core in iter {
            mask.insert(core);
        }
        mask
    }
}

impl fmt::Debug for AffinityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|c| c.0)).finish()
    }
}

impl fmt::Display for AffinityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, core) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", core)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sets_exactly_one_bit() {
        let mask = AffinityMask::single(CoreId(3));
        assert_eq!(mask.len(), 1);
        assert!(mask.contains(CoreId(3)));
        assert!(!mask.contains(CoreId(2)));
        assert_eq!(mask.as_words(), &[0b1000]);
    }

    #[test]
    fn spans_multiple_words() {
        let mask: AffinityMask = [CoreId(1), CoreId(64), CoreId(130)].into_iter().collect();
        assert_eq!(mask.len(), 3);
        assert_eq!(mask.as_words().len(), 3);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![CoreId(1), CoreId(64), CoreId(130)]);
        assert_eq!(mask.first(), Some(CoreId(1)));
        assert_eq!(mask.max_core(), Some(CoreId(130)));
    }

    #[test]
    fn remove_trims_trailing_words() {
        let mut mask: AffinityMask = [CoreId(0), CoreId(100)].into_iter().collect();
        mask.remove(CoreId(100));
        assert_eq!(mask, AffinityMask::single(CoreId(0)));
        mask.remove(CoreId(0));
        assert!(mask.is_empty());
        assert_eq!(mask.max_core(), None);
    }

    #[test]
    fn display_lists_members() {
        let mask: AffinityMask = [CoreId(2), CoreId(0)].into_iter().collect();
        assert_eq!(mask.to_string(), "{0,2}");
        assert_eq!(AffinityMask::empty().to_string(), "{}");
    }
}
