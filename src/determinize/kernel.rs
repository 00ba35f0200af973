//! Kernel cache: identity of DFA states.
//!
//! A kernel is the ordered list of `(NFA state, tag versions, lookahead)`
//! items of a DFA state plus its precedence table. Kernels are stored in
//! run-long flat buffers and addressed by id. A candidate kernel resolves to
//!
//! - `Exact`: an equal kernel already exists
//! - `Mapped`: an existing kernel has the same shape and its versions are a
//!   bijective renaming of the candidate's; the returned commands move the
//!   candidate's registers into the existing ones
//! - `New`: otherwise, and the candidate is stored

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;

use super::history::HistIdx;
use super::lookup::SliceTable;
use super::tagver::TagVerTable;
use crate::dfa::{TagCmd, TagVer};
use crate::nfa::{StateId, TagInfo};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KernelItem {
    pub state: StateId,
    /// Interned tag-version vector.
    pub tvers: u32,
    /// Lookahead history; only its signature takes part in identity.
    pub tlook: HistIdx,
    /// Interned lookahead signature (latest event per tag).
    pub look: u32,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Resolution {
    New,
    Exact,
    Mapped(Vec<TagCmd>),
}

impl Resolution {
    pub fn is_new(&self) -> bool {
        matches!(self, Resolution::New)
    }
}

/// What a mapping attempt reads besides the kernels.
pub struct MapEnv<'a> {
    pub tagvers: &'a TagVerTable,
    pub looks: &'a SliceTable<TagInfo>,
    /// Versions of tags set in an item's lookahead are not compared.
    pub lookahead: bool,
    /// `Set` commands of the transition being resolved.
    pub sets: &'a [TagCmd],
}

#[derive(Clone, Copy, Debug)]
struct Span {
    items: u32,
    len: u32,
    table: u32,
    table_len: u32,
}

#[derive(Default)]
pub struct KernelCache {
    items: Vec<KernelItem>,
    tables: Vec<i32>,
    spans: Vec<Span>,
    buckets: FxHashMap<u64, SmallVec<[u32; 2]>>,
    x2y: FxHashMap<TagVer, TagVer>,
    y2x: FxHashMap<TagVer, TagVer>,
    pairs: Vec<(TagVer, TagVer)>,
}

fn shape_hash(items: &[KernelItem], table: &[i32]) -> u64 {
    let mut hasher = FxHasher::default();
    items.len().hash(&mut hasher);
    for item in items {
        item.state.hash(&mut hasher);
        item.look.hash(&mut hasher);
    }
    table.hash(&mut hasher);
    hasher.finish()
}

fn exact(x: &[KernelItem], y: &[KernelItem]) -> bool {
    x.iter()
        .zip(y)
        .all(|(a, b)| a.state == b.state && a.tvers == b.tvers && a.look == b.look)
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn items(&self, id: u32) -> &[KernelItem] {
        let s = self.spans[id as usize];
        &self.items[s.items as usize..(s.items + s.len) as usize]
    }

    pub fn table(&self, id: u32) -> &[i32] {
        let s = self.spans[id as usize];
        &self.tables[s.table as usize..(s.table + s.table_len) as usize]
    }

    /// Resolve a candidate kernel to a state id.
    pub fn find_or_create(
        &mut self,
        items: &[KernelItem],
        table: &[i32],
        env: &MapEnv<'_>,
    ) -> (u32, Resolution) {
        let hash = shape_hash(items, table);
        let candidates: SmallVec<[u32; 2]> = self
            .buckets
            .get(&hash)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|&id| self.same_shape(id, items, table))
                    .collect()
            })
            .unwrap_or_default();

        for &id in &candidates {
            if exact(self.items(id), items) {
                return (id, Resolution::Exact);
            }
        }
        for &id in &candidates {
            if let Some(cmds) = self.map(id, items, env) {
                return (id, Resolution::Mapped(cmds));
            }
        }

        let id = self.spans.len() as u32;
        self.spans.push(Span {
            items: self.items.len() as u32,
            len: items.len() as u32,
            table: self.tables.len() as u32,
            table_len: table.len() as u32,
        });
        self.items.extend_from_slice(items);
        self.tables.extend_from_slice(table);
        self.buckets.entry(hash).or_default().push(id);
        (id, Resolution::New)
    }

    fn same_shape(&self, id: u32, items: &[KernelItem], table: &[i32]) -> bool {
        let ys = self.items(id);
        ys.len() == items.len()
            && ys
                .iter()
                .zip(items)
                .all(|(a, b)| a.state == b.state && a.look == b.look)
            && self.table(id) == table
    }

    /// Try to rename the candidate's versions into those of kernel `id`.
    fn map(&mut self, id: u32, xs: &[KernelItem], env: &MapEnv<'_>) -> Option<Vec<TagCmd>> {
        self.x2y.clear();
        self.y2x.clear();
        self.pairs.clear();

        let s = self.spans[id as usize];
        let ys = &self.items[s.items as usize..(s.items + s.len) as usize];
        for (x, y) in xs.iter().zip(ys) {
            let xv = env.tagvers.get(x.tvers);
            let yv = env.tagvers.get(y.tvers);
            let look = env.looks.get(x.look);
            for (tag, (&vx, &vy)) in xv.iter().zip(yv).enumerate() {
                if env.lookahead && look.iter().any(|info| info.tag() == tag) {
                    continue;
                }
                match (self.x2y.get(&vx), self.y2x.get(&vy)) {
                    (None, None) => {
                        self.x2y.insert(vx, vy);
                        self.y2x.insert(vy, vx);
                        self.pairs.push((vx, vy));
                    }
                    (Some(&m), Some(&n)) if m == vy && n == vx => {}
                    _ => return None,
                }
            }
        }

        let mut sets = Vec::with_capacity(env.sets.len());
        for cmd in env.sets {
            if let TagCmd::Set { lhs, bottom } = *cmd {
                if let Some(y) = self.x2y.remove(&lhs) {
                    sets.push(TagCmd::Set { lhs: y, bottom });
                }
            }
        }

        let mut copies: Vec<TagCmd> = self
            .pairs
            .iter()
            .filter(|&&(x, y)| x != y && self.x2y.get(&x) == Some(&y))
            .map(|&(x, y)| TagCmd::Copy { lhs: y, rhs: x })
            .collect();

        let mut cmds = Vec::with_capacity(copies.len() + sets.len());
        while !copies.is_empty() {
            // A copy may run once no other pending copy still reads its target.
            let ready = copies.iter().position(|c| {
                let lhs = c.lhs();
                !copies.iter().any(|d| d.rhs() == Some(lhs))
            })?;
            cmds.push(copies.remove(ready));
        }
        cmds.extend(sets);
        Some(cmds)
    }
}
