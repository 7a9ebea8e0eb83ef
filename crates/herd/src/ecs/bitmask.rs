//! # Bitmask — Component Sets as Bits
//!
//! Every entity carries a [`Bitmask`] with one bit per registered component id.
//! Matcher rules carry one too, so "does this entity match?" becomes a handful
//! of word-wise AND operations instead of a lookup per component.
//!
//! ## Memory Layout
//!
//! ```text
//! ids:    0 1 2 3 ... 63 | 64 65 ...
//! words: [     word 0     |  word 1  ...]
//! ```
//!
//! Words are `u64`, so there is no sign bit to trip over when masking the top
//! bit of a word.
//!
//! ## Growable Capacity
//!
//! A fixed word count sized from "components registered so far" breaks as soon
//! as a component is registered after some masks already exist. Here the
//! word vector grows on [`set`](Bitmask::set), and every comparison treats
//! missing words as zero. A mask built when three components existed compares
//! correctly against one built after the fortieth registration.

use std::fmt;

const WORD_BITS: usize = u64::BITS as usize;

/// A growable set of component ids stored as bits.
#[derive(Clone, Default)]
pub struct Bitmask {
    words: Vec<u64>,
}

impl Bitmask {
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Pre-size for ids `0..bits`.
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(WORD_BITS)],
        }
    }

    /// Build a mask with every id in `ids` set.
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        let mut mask = Self::new();
        for id in ids {
            mask.set(id);
        }
        mask
    }

    #[inline]
    fn locate(id: u32) -> (usize, u64) {
        let id = id as usize;
        (id / WORD_BITS, 1u64 << (id % WORD_BITS))
    }

    pub fn set(&mut self, id: u32) {
        let (word, bit) = Self::locate(id);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= bit;
    }

    pub fn clear(&mut self, id: u32) {
        let (word, bit) = Self::locate(id);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !bit;
        }
    }

    pub fn test(&self, id: u32) -> bool {
        let (word, bit) = Self::locate(id);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    /// True if the two masks share at least one set bit ("any of").
    pub fn intersects(&self, other: &Bitmask) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(a, b)| a & b != 0)
    }

    /// True if every bit set in `self` is also set in `other` ("all of").
    pub fn is_subset_of(&self, other: &Bitmask) -> bool {
        self.words.iter().enumerate().all(|(i, &w)| {
            let o = other.words.get(i).copied().unwrap_or(0);
            w & o == w
        })
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Unset every bit, keeping the allocation.
    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate set ids in ascending order.
    pub fn ones(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            (0..WORD_BITS)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| (i * WORD_BITS + bit) as u32)
        })
    }
}

impl PartialEq for Bitmask {
    /// Trailing zero words are ignored, so masks of different capacity
    /// compare by their set bits only.
    fn eq(&self, other: &Self) -> bool {
        let len = self.words.len().max(other.words.len());
        (0..len).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for Bitmask {}

impl fmt::Debug for Bitmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ones()).finish()
    }
}
