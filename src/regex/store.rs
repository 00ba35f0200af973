//! Tag value storage for the NFA simulator.
//!
//! Every config points into a store through a `u32` handle. Two stores:
//!
//! - `OffsetRows`: one row of tag offsets per config, double-buffered so a
//!   step reads the previous rows while writing the next ones
//! - `HistoryTrie`: a persistent trie of tag events shared by all configs;
//!   offsets are rebuilt from a node's path only when a match is reported

use rustc_hash::FxHashMap;

use crate::nfa::TagInfo;

pub trait TagStore {
    /// Reset the store and return the handle of the empty tag set.
    fn root(&mut self) -> u32;

    /// Handle of `from` with `events` applied at `pos`.
    fn extend(&mut self, from: u32, events: &[TagInfo], pos: usize) -> u32;

    /// Make every handle returned by `extend` since the last commit readable.
    fn commit(&mut self);

    /// Tag offsets of `handle`, `-1` for unset tags.
    fn offsets(&self, handle: u32, out: &mut [isize]);
}

pub struct OffsetRows {
    ntags: usize,
    cur: Vec<isize>,
    next: Vec<isize>,
}

impl OffsetRows {
    pub fn new(ntags: usize) -> Self {
        Self {
            ntags,
            cur: Vec::new(),
            next: Vec::new(),
        }
    }

    fn row(&self, handle: u32) -> &[isize] {
        let start = handle as usize * self.ntags;
        &self.cur[start..start + self.ntags]
    }
}

impl TagStore for OffsetRows {
    fn root(&mut self) -> u32 {
        self.next.clear();
        self.cur.clear();
        self.cur.resize(self.ntags, -1);
        0
    }

    fn extend(&mut self, from: u32, events: &[TagInfo], pos: usize) -> u32 {
        let handle = (self.next.len() / self.ntags.max(1)) as u32;
        let start = from as usize * self.ntags;
        self.next
            .extend_from_slice(&self.cur[start..start + self.ntags]);
        let row = self.next.len() - self.ntags;
        for info in events {
            self.next[row + info.tag()] = if info.neg() { -1 } else { pos as isize };
        }
        handle
    }

    fn commit(&mut self) {
        std::mem::swap(&mut self.cur, &mut self.next);
        self.next.clear();
    }

    fn offsets(&self, handle: u32, out: &mut [isize]) {
        out.copy_from_slice(self.row(handle));
    }
}

#[derive(Clone, Copy, Debug)]
struct TrieNode {
    pred: u32,
    info: TagInfo,
    pos: usize,
}

/// Arena of tag events; node 0 is the empty path.
pub struct HistoryTrie {
    ntags: usize,
    nodes: Vec<TrieNode>,
    /// Configs that extend one node the same way share the child.
    children: FxHashMap<(u32, TagInfo, usize), u32>,
}

impl HistoryTrie {
    pub fn new(ntags: usize) -> Self {
        Self {
            ntags,
            nodes: Vec::new(),
            children: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    fn child(&mut self, pred: u32, info: TagInfo, pos: usize) -> u32 {
        let next = self.nodes.len() as u32;
        let idx = *self.children.entry((pred, info, pos)).or_insert(next);
        if idx == next {
            self.nodes.push(TrieNode { pred, info, pos });
        }
        idx
    }
}

impl TagStore for HistoryTrie {
    fn root(&mut self) -> u32 {
        self.nodes.clear();
        self.children.clear();
        self.nodes.push(TrieNode {
            pred: 0,
            info: TagInfo::default(),
            pos: 0,
        });
        0
    }

    fn extend(&mut self, from: u32, events: &[TagInfo], pos: usize) -> u32 {
        events
            .iter()
            .fold(from, |node, &info| self.child(node, info, pos))
    }

    fn commit(&mut self) {}

    fn offsets(&self, handle: u32, out: &mut [isize]) {
        debug_assert_eq!(out.len(), self.ntags);
        let mut seen = vec![false; self.ntags];
        out.fill(-1);
        let mut idx = handle;
        while idx != 0 {
            let node = self.nodes[idx as usize];
            let tag = node.info.tag();
            if !seen[tag] {
                seen[tag] = true;
                if !node.info.neg() {
                    out[tag] = node.pos as isize;
                }
            }
            idx = node.pred;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(tags: &[(usize, bool)]) -> Vec<TagInfo> {
        tags.iter().map(|&(t, neg)| TagInfo::new(t, neg)).collect()
    }

    fn check_store(store: &mut dyn TagStore) {
        let root = store.root();
        let a = store.extend(root, &events(&[(0, false)]), 2);
        let b = store.extend(root, &events(&[(0, false), (1, true)]), 3);
        store.commit();

        let mut out = [0isize; 2];
        store.offsets(a, &mut out);
        assert_eq!(out, [2, -1]);
        store.offsets(b, &mut out);
        assert_eq!(out, [3, -1]);

        let c = store.extend(b, &events(&[(1, false)]), 5);
        store.commit();
        store.offsets(c, &mut out);
        assert_eq!(out, [3, 5]);
    }

    #[test]
    fn test_offset_rows() {
        check_store(&mut OffsetRows::new(2));
    }

    #[test]
    fn test_history_trie() {
        check_store(&mut HistoryTrie::new(2));
    }

    #[test]
    fn test_later_event_overrides_earlier() {
        let mut trie = HistoryTrie::new(1);
        let root = trie.root();
        let a = trie.extend(root, &events(&[(0, false)]), 1);
        let b = trie.extend(a, &events(&[(0, true)]), 4);
        let c = trie.extend(b, &events(&[(0, false)]), 6);
        let mut out = [0isize];
        trie.offsets(b, &mut out);
        assert_eq!(out, [-1]);
        trie.offsets(c, &mut out);
        assert_eq!(out, [6]);
    }

    #[test]
    fn test_trie_shares_equal_extensions() {
        let mut trie = HistoryTrie::new(2);
        let root = trie.root();
        let a = trie.extend(root, &events(&[(0, false)]), 1);
        let b = trie.extend(root, &events(&[(0, false)]), 1);
        assert_eq!(a, b);
        assert_eq!(trie.len(), 2);
        assert_eq!(trie.extend(a, &[], 9), a);
    }
}
