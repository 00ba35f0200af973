//! Tag versions.
//!
//! A version is a numbered register holding one tag value. Each closure item
//! carries a vector of versions, one per tag, interned in a `TagVerTable`.
//! `NewVersions` hands out the fresh versions of one transition: items that
//! set a tag the same way share the version, so the transition needs one
//! `Set` command per distinct update, not one per item.

use rustc_hash::FxHashMap;

use super::lookup::SliceTable;
use crate::dfa::{TagCmd, TagVer};

/// Interned tag-version vectors.
pub type TagVerTable = SliceTable<TagVer>;

/// Fresh versions allocated for the transition under construction.
#[derive(Default, Debug)]
pub struct NewVersions {
    /// In allocation order: `(tag, base, bottom, version)`.
    order: Vec<(usize, TagVer, bool, TagVer)>,
    map: FxHashMap<(usize, TagVer, bool), TagVer>,
}

impl NewVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version for `tag` updated from `base` with a position (`bottom` false)
    /// or with "no match". `maxver` is the run-wide counter.
    pub fn version_for(&mut self, tag: usize, base: TagVer, bottom: bool, maxver: &mut TagVer) -> TagVer {
        *self.map.entry((tag, base, bottom)).or_insert_with(|| {
            *maxver += 1;
            self.order.push((tag, base, bottom, *maxver));
            *maxver
        })
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `Set` commands for every fresh version, in allocation order.
    pub fn commands(&self) -> Vec<TagCmd> {
        self.order
            .iter()
            .map(|&(_, _, bottom, lhs)| TagCmd::Set { lhs, bottom })
            .collect()
    }
}
