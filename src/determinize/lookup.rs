//! Interning of small slices.
//!
//! Slices are copied into one flat buffer and addressed by a dense `u32`
//! id; equal slices get the same id. The hash index maps a slice hash to
//! the ids sharing it, so collisions only cost a comparison.

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;

pub(crate) fn hash_slice<T: Hash>(items: &[T]) -> u64 {
    let mut hasher = FxHasher::default();
    items.hash(&mut hasher);
    hasher.finish()
}

#[derive(Clone, Debug)]
pub struct SliceTable<T> {
    data: Vec<T>,
    spans: Vec<(u32, u32)>,
    index: FxHashMap<u64, SmallVec<[u32; 2]>>,
}

impl<T> Default for SliceTable<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            spans: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T: Copy + Eq + Hash> SliceTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `items`, inserting a copy if it is not there yet.
    pub fn insert(&mut self, items: &[T]) -> u32 {
        let hash = hash_slice(items);
        if let Some(ids) = self.index.get(&hash) {
            for &id in ids {
                if self.get(id) == items {
                    return id;
                }
            }
        }
        let id = self.spans.len() as u32;
        let start = self.data.len() as u32;
        self.data.extend_from_slice(items);
        self.spans.push((start, items.len() as u32));
        self.index.entry(hash).or_default().push(id);
        id
    }

    #[inline]
    pub fn get(&self, id: u32) -> &[T] {
        let (start, len) = self.spans[id as usize];
        &self.data[start as usize..(start + len) as usize]
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
