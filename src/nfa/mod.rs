//! Tagged NFA: the read-only input of determinization and simulation.
//!
//! States live in a single arena and refer to each other by `StateId`, so
//! loops (`*`, `+`) are plain back edges rather than shared ownership.
//!
//! - `NfaState` / `NfaKind`: a state and its closed set of shapes
//! - `Tag` / `TagInfo`: capture boundaries and the events recorded for them
//! - `NfaBuilder`: arena allocation plus the derived `topord` and `indeg`
//! - `build`: lowering of a small regex AST into an `Nfa`

pub mod build;

use smallvec::SmallVec;

use crate::{Error, Result};

/// A state identifier - just an index into the NFA arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StateId(u32);

impl StateId {
    /// Sentinel for a not-yet-wired arc.
    pub const NONE: StateId = StateId(u32::MAX);

    pub const fn new(index: u32) -> Self {
        StateId(index)
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Half-open symbol range `[lo, hi)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Range {
    pub lo: u32,
    pub hi: u32,
}

impl Range {
    pub fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    /// Range matching exactly one byte.
    pub fn byte(b: u8) -> Self {
        Self::new(b as u32, b as u32 + 1)
    }

    #[inline]
    pub fn contains(&self, sym: u32) -> bool {
        self.lo <= sym && sym < self.hi
    }
}

/// A tag event: tag index plus whether the tag is negated (set to "no match").
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct TagInfo(u32);

impl TagInfo {
    pub fn new(tag: usize, neg: bool) -> Self {
        TagInfo(((tag as u32) << 1) | neg as u32)
    }

    #[inline]
    pub fn tag(self) -> usize {
        (self.0 >> 1) as usize
    }

    #[inline]
    pub fn neg(self) -> bool {
        self.0 & 1 == 1
    }

    /// Closing boundaries have odd indices.
    #[inline]
    pub fn is_closing(self) -> bool {
        self.tag() % 2 == 1
    }
}

/// A capture-group boundary.
///
/// Tag `2 * capture` opens the group and `2 * capture + 1` closes it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Tag {
    pub capture: usize,
    pub closing: bool,
    /// Number of capture groups enclosing this tag's group.
    pub height: i32,
}

impl Tag {
    pub fn index(&self) -> usize {
        2 * self.capture + self.closing as usize
    }
}

/// A top-level alternative, owning the tags `ltag..htag`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Rule {
    pub ltag: usize,
    pub htag: usize,
}

impl Rule {
    pub fn tags(&self) -> std::ops::Range<usize> {
        self.ltag..self.htag
    }
}

/// The shape of an NFA state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NfaKind {
    /// Ordered epsilon split; `out1` has priority.
    Alt { out1: StateId, out2: StateId },
    /// Untagged epsilon arc.
    Nil { out: StateId },
    /// Tagged epsilon arc.
    Tag { info: TagInfo, out: StateId },
    /// Consumes one symbol from any of `ranges`.
    Ran {
        ranges: SmallVec<[Range; 2]>,
        out: StateId,
    },
    /// Accepting state of `rule`.
    Fin { rule: usize },
}

#[derive(Clone, Debug)]
pub struct NfaState {
    pub kind: NfaKind,
    /// Position in a topological order of epsilon arcs (back edges ignored).
    pub topord: u32,
    /// Number of incoming arcs.
    pub indeg: u32,
}

impl NfaState {
    #[inline]
    pub fn is_ran(&self) -> bool {
        matches!(self.kind, NfaKind::Ran { .. })
    }

    #[inline]
    pub fn is_fin(&self) -> bool {
        matches!(self.kind, NfaKind::Fin { .. })
    }

    /// Rule of an accepting state.
    #[inline]
    pub fn rule(&self) -> Option<usize> {
        match self.kind {
            NfaKind::Fin { rule } => Some(rule),
            _ => None,
        }
    }

    fn arcs(&self) -> SmallVec<[StateId; 2]> {
        match &self.kind {
            NfaKind::Alt { out1, out2 } => SmallVec::from_slice(&[*out1, *out2]),
            NfaKind::Nil { out } | NfaKind::Tag { out, .. } | NfaKind::Ran { out, .. } => {
                SmallVec::from_slice(&[*out])
            }
            NfaKind::Fin { .. } => SmallVec::new(),
        }
    }
}

/// A finished tagged NFA.
#[derive(Clone, Debug)]
pub struct Nfa {
    states: Vec<NfaState>,
    root: StateId,
    tags: Vec<Tag>,
    rules: Vec<Rule>,
}

impl Nfa {
    pub fn root(&self) -> StateId {
        self.root
    }

    pub fn states(&self) -> &[NfaState] {
        &self.states
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of capture groups across all rules.
    pub fn captures(&self) -> usize {
        self.tags.len() / 2
    }

    /// Alphabet class boundaries: sorted lower bounds of the symbol classes
    /// induced by every range in the NFA. Class `i` is
    /// `[charset[i], charset[i + 1])`, the last one ends at `alphabet_size`.
    pub fn charset(&self, alphabet_size: u32) -> Vec<u32> {
        let mut bounds = vec![0, alphabet_size];
        for state in &self.states {
            if let NfaKind::Ran { ranges, .. } = &state.kind {
                for r in ranges {
                    bounds.push(r.lo.min(alphabet_size));
                    bounds.push(r.hi.min(alphabet_size));
                }
            }
        }
        bounds.sort_unstable();
        bounds.dedup();
        bounds.pop();
        bounds
    }
}

impl std::ops::Index<StateId> for Nfa {
    type Output = NfaState;

    #[inline]
    fn index(&self, id: StateId) -> &Self::Output {
        &self.states[id.index()]
    }
}

/// Arena-style NFA construction.
///
/// States are allocated contiguously and wired by `StateId`; a state may be
/// reserved first and filled in later to close a loop.
#[derive(Default)]
pub struct NfaBuilder {
    states: Vec<NfaState>,
    tags: Vec<Tag>,
    rules: Vec<Rule>,
}

impl NfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: NfaKind) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(NfaState {
            kind,
            topord: 0,
            indeg: 0,
        });
        id
    }

    /// Reserve a state to be defined later with `set`.
    pub fn reserve(&mut self) -> StateId {
        self.alloc(NfaKind::Nil {
            out: StateId::NONE,
        })
    }

    pub fn set(&mut self, id: StateId, kind: NfaKind) {
        self.states[id.index()].kind = kind;
    }

    pub fn alt(&mut self, out1: StateId, out2: StateId) -> StateId {
        self.alloc(NfaKind::Alt { out1, out2 })
    }

    pub fn nil(&mut self, out: StateId) -> StateId {
        self.alloc(NfaKind::Nil { out })
    }

    pub fn tag(&mut self, tag: usize, neg: bool, out: StateId) -> StateId {
        self.alloc(NfaKind::Tag {
            info: TagInfo::new(tag, neg),
            out,
        })
    }

    pub fn ran(&mut self, ranges: &[Range], out: StateId) -> StateId {
        self.alloc(NfaKind::Ran {
            ranges: SmallVec::from_slice(ranges),
            out,
        })
    }

    pub fn fin(&mut self, rule: usize) -> StateId {
        self.alloc(NfaKind::Fin { rule })
    }

    /// Register a tag; its index must agree with its parity.
    pub fn add_tag(&mut self, tag: Tag) -> Result<usize> {
        let idx = self.tags.len();
        if tag.index() != idx {
            return Err(Error::InvalidNfa(format!(
                "tag {idx} declared as {} boundary of capture {}",
                if tag.closing { "closing" } else { "opening" },
                tag.capture
            )));
        }
        self.tags.push(tag);
        Ok(idx)
    }

    pub fn add_rule(&mut self, rule: Rule) -> usize {
        self.rules.push(rule);
        self.rules.len() - 1
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Validate arcs and derive in-degrees and the topological order.
    pub fn finish(mut self, root: StateId) -> Result<Nfa> {
        let n = self.states.len();
        if root.is_none() || root.index() >= n {
            return Err(Error::InvalidNfa(format!("root state {} out of range", root.0)));
        }
        for (i, state) in self.states.iter().enumerate() {
            for out in state.arcs() {
                if out.is_none() || out.index() >= n {
                    return Err(Error::InvalidNfa(format!("state {i} has a dangling arc")));
                }
            }
            match &state.kind {
                NfaKind::Tag { info, .. } if info.tag() >= self.tags.len() => {
                    return Err(Error::InvalidNfa(format!(
                        "state {i} refers to unknown tag {}",
                        info.tag()
                    )));
                }
                NfaKind::Fin { rule } if *rule >= self.rules.len() => {
                    return Err(Error::InvalidNfa(format!(
                        "state {i} accepts unknown rule {rule}"
                    )));
                }
                _ => {}
            }
        }

        // The root counts its initial entry, so a loop back to it is a join.
        let mut indeg = vec![0u32; n];
        indeg[root.index()] = 1;
        for state in &self.states {
            for out in state.arcs() {
                indeg[out.index()] += 1;
            }
        }
        for (state, d) in self.states.iter_mut().zip(indeg) {
            state.indeg = d;
        }

        // Reverse post-order of an iterative DFS over all arcs; epsilon arcs
        // that are not back edges go from lower to higher `topord`.
        let mut order = Vec::with_capacity(n);
        let mut seen = vec![false; n];
        let mut stack: Vec<(StateId, usize)> = vec![(root, 0)];
        seen[root.index()] = true;
        while let Some((id, next)) = stack.pop() {
            let arcs = self.states[id.index()].arcs();
            if next < arcs.len() {
                stack.push((id, next + 1));
                let child = arcs[next];
                if !seen[child.index()] {
                    seen[child.index()] = true;
                    stack.push((child, 0));
                }
            } else {
                order.push(id);
            }
        }
        let reachable = order.len();
        for (pos, id) in order.iter().rev().enumerate() {
            self.states[id.index()].topord = pos as u32;
        }
        let mut next = reachable as u32;
        for (i, state) in self.states.iter_mut().enumerate() {
            if !seen[i] {
                state.topord = next;
                next += 1;
            }
        }

        if self.rules.is_empty() {
            self.rules.push(Rule {
                ltag: 0,
                htag: self.tags.len(),
            });
        }

        Ok(Nfa {
            states: self.states,
            root,
            tags: self.tags,
            rules: self.rules,
        })
    }
}
