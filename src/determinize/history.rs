//! Append-only tag history trie.
//!
//! Every path explored by a closure records its tag events as a chain of
//! nodes linked to their predecessor. Paths that share a prefix share the
//! nodes, so extending a path is a single push and never copies.

use smallvec::SmallVec;

use crate::nfa::TagInfo;

/// Index of a history node. `ROOT` is the empty history.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct HistIdx(u32);

impl HistIdx {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn is_root(self) -> bool {
        self == ROOT
    }
}

pub const ROOT: HistIdx = HistIdx(0);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HistNode {
    /// Always an earlier node (or `ROOT`).
    pub pred: HistIdx,
    pub step: u32,
    pub info: TagInfo,
    pub origin: u32,
}

#[derive(Clone, Debug)]
pub struct TagHistory {
    nodes: Vec<HistNode>,
}

impl Default for TagHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl TagHistory {
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(256);
        nodes.push(HistNode {
            pred: ROOT,
            step: 0,
            info: TagInfo::default(),
            origin: 0,
        });
        Self { nodes }
    }

    pub fn push(&mut self, pred: HistIdx, step: u32, info: TagInfo, origin: u32) -> HistIdx {
        debug_assert!(pred.index() < self.nodes.len());
        let idx = HistIdx(self.nodes.len() as u32);
        self.nodes.push(HistNode {
            pred,
            step,
            info,
            origin,
        });
        idx
    }

    #[inline]
    pub fn at(&self, idx: HistIdx) -> &HistNode {
        &self.nodes[idx.index()]
    }

    #[inline]
    pub fn pred(&self, idx: HistIdx) -> HistIdx {
        self.nodes[idx.index()].pred
    }

    #[inline]
    pub fn info(&self, idx: HistIdx) -> TagInfo {
        self.nodes[idx.index()].info
    }

    /// All nodes but the sentinel, in insertion order.
    pub fn nodes(&self) -> &[HistNode] {
        &self.nodes[1..]
    }

    /// Number of nodes, the sentinel included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Drop everything but the sentinel.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
    }

    /// Latest event of every tag on the path, sorted by tag.
    pub fn last_events(&self, mut idx: HistIdx, out: &mut Vec<TagInfo>) {
        out.clear();
        let mut seen: SmallVec<[usize; 8]> = SmallVec::new();
        while !idx.is_root() {
            let node = &self.nodes[idx.index()];
            let tag = node.info.tag();
            if !seen.contains(&tag) {
                seen.push(tag);
                out.push(node.info);
            }
            idx = node.pred;
        }
        out.sort_unstable();
    }

    /// Events on the path, from the root to `idx`.
    pub fn path(&self, mut idx: HistIdx, out: &mut Vec<TagInfo>) {
        out.clear();
        while !idx.is_root() {
            let node = &self.nodes[idx.index()];
            out.push(node.info);
            idx = node.pred;
        }
        out.reverse();
    }
}
