//! Tagged epsilon-closure.
//!
//! From the items reached on a symbol, follow epsilon arcs until every
//! branch stops at a symbol-consuming or accepting state. Crossing a tagged
//! arc appends a node to the item's lookahead history. When two branches
//! meet at a state only one survives:
//!
//! - leftmost: the first branch to arrive, in DFS priority order
//! - POSIX: the winner of `precedence`, computed either with GOR1
//!   (topological passes) or GTOP (heap on the NFA topological order)
//!
//! The buffers are generic over the item type so the determinizer and the
//! NFA simulator share them.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::Write as _;

use smallvec::SmallVec;

use super::history::{HistIdx, TagHistory, ROOT};
use super::precedence::{precedence, PrecStats, PrecView};
use crate::nfa::{Nfa, NfaKind, NfaState, StateId};
use crate::options::{Options, PosixClosure, Semantics};
use crate::Result;

/// A closure item as seen by the traversal.
pub trait Item: Copy {
    fn state(&self) -> StateId;
    fn origin(&self) -> u32;
    /// Lookahead history, the tags crossed during this closure.
    fn look(&self) -> HistIdx;
    /// The same item moved to `state` with lookahead `look`.
    fn moved(&self, state: StateId, look: HistIdx) -> Self;
}

/// Closure item of the determinizer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ClosItem {
    pub state: StateId,
    /// Index of the kernel item this one was reached from.
    pub origin: u32,
    /// Interned tag-version vector.
    pub tvers: u32,
    /// Tags to apply on the incoming transition.
    pub ttran: HistIdx,
    pub tlook: HistIdx,
}

impl Item for ClosItem {
    #[inline]
    fn state(&self) -> StateId {
        self.state
    }

    #[inline]
    fn origin(&self) -> u32 {
        self.origin
    }

    #[inline]
    fn look(&self) -> HistIdx {
        self.tlook
    }

    #[inline]
    fn moved(&self, state: StateId, tlook: HistIdx) -> Self {
        ClosItem {
            state,
            tlook,
            ..*self
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ClosureStats {
    pub closures: u64,
    pub items: u64,
    pub prec: PrecStats,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Strategy {
    Leftmost,
    Gor1,
    Gtop,
}

impl Strategy {
    pub fn from_options(opts: &Options) -> Self {
        match (opts.semantics, opts.posix_closure) {
            (Semantics::Leftmost, _) => Strategy::Leftmost,
            (Semantics::Posix, PosixClosure::Gor1) => Strategy::Gor1,
            (Semantics::Posix, PosixClosure::Gtop) => Strategy::Gtop,
        }
    }

    pub fn is_posix(self) -> bool {
        self != Strategy::Leftmost
    }
}

/// Per-closure context.
pub struct ClosEnv<'a> {
    pub nfa: &'a Nfa,
    pub history: &'a mut TagHistory,
    /// Precedence table of the kernel the reached items come from.
    pub table: &'a [i32],
    pub size: usize,
    /// Recorded in history nodes.
    pub step: u32,
    pub stats: &'a mut ClosureStats,
}

const NOCLOS: u32 = u32::MAX;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Gor1Status {
    NoPass,
    TopSort,
    Linear,
}

/// Scratch space reused by every closure of a run.
pub struct ClosureBuffers<I> {
    done: Vec<I>,
    /// Per NFA state: index of its item in `done`.
    clos: Vec<u32>,
    status: Vec<Gor1Status>,
    active: Vec<bool>,
    arcidx: Vec<u8>,
    inqueue: Vec<bool>,
    topsort: Vec<StateId>,
    linear: Vec<StateId>,
    heap: BinaryHeap<Reverse<(u32, StateId)>>,
    stack: Vec<I>,
}

fn epsilon_arc(state: &NfaState, i: u8) -> Option<StateId> {
    match (&state.kind, i) {
        (NfaKind::Alt { out1, .. }, 0) => Some(*out1),
        (NfaKind::Alt { out2, .. }, 1) => Some(*out2),
        (NfaKind::Nil { out } | NfaKind::Tag { out, .. }, 0) => Some(*out),
        _ => None,
    }
}

impl<I: Item> ClosureBuffers<I> {
    pub fn new(nstates: usize) -> Self {
        Self {
            done: Vec::new(),
            clos: vec![NOCLOS; nstates],
            status: vec![Gor1Status::NoPass; nstates],
            active: vec![false; nstates],
            arcidx: vec![0; nstates],
            inqueue: vec![false; nstates],
            topsort: Vec::new(),
            linear: Vec::new(),
            heap: BinaryHeap::new(),
            stack: Vec::new(),
        }
    }

    /// Items of the last closure, after pruning.
    pub fn items(&self) -> &[I] {
        &self.done
    }

    pub fn items_mut(&mut self) -> &mut Vec<I> {
        &mut self.done
    }

    /// Compute the closure of `reached` and prune it to `Ran` items plus at
    /// most one `Fin` item.
    pub fn closure(&mut self, env: &mut ClosEnv<'_>, strategy: Strategy, reached: &[I]) -> Result<()> {
        self.done.clear();
        let result = match strategy {
            Strategy::Leftmost => {
                self.leftmost(env, reached);
                Ok(())
            }
            Strategy::Gor1 => self.gor1(env, reached),
            Strategy::Gtop => self.gtop(env, reached),
        };
        self.reset();
        result?;

        env.stats.closures += 1;
        env.stats.items += self.done.len() as u64;
        prune(&mut self.done, env.nfa);
        Ok(())
    }

    fn reset(&mut self) {
        let touched = self
            .done
            .iter()
            .map(|x| x.state())
            .chain(self.topsort.drain(..))
            .chain(self.linear.drain(..));
        for q in touched {
            let i = q.index();
            self.clos[i] = NOCLOS;
            self.status[i] = Gor1Status::NoPass;
            self.active[i] = false;
            self.arcidx[i] = 0;
            self.inqueue[i] = false;
        }
        self.heap.clear();
        self.stack.clear();
    }

    fn leftmost(&mut self, env: &mut ClosEnv<'_>, reached: &[I]) {
        self.stack.extend(reached.iter().rev().copied());
        while let Some(x) = self.stack.pop() {
            let q = x.state();
            if self.clos[q.index()] != NOCLOS {
                continue;
            }
            self.clos[q.index()] = self.done.len() as u32;
            self.done.push(x);

            match env.nfa[q].kind {
                NfaKind::Nil { out } => self.stack.push(x.moved(out, x.look())),
                NfaKind::Alt { out1, out2 } => {
                    self.stack.push(x.moved(out2, x.look()));
                    self.stack.push(x.moved(out1, x.look()));
                }
                NfaKind::Tag { info, out } => {
                    let look = env.history.push(x.look(), env.step, info, x.origin());
                    self.stack.push(x.moved(out, look));
                }
                NfaKind::Ran { .. } | NfaKind::Fin { .. } => {}
            }
        }
    }

    fn gor1(&mut self, env: &mut ClosEnv<'_>, reached: &[I]) -> Result<()> {
        for x in reached {
            self.relax(env, *x)?;
        }
        for x in reached.iter().rev() {
            let q = x.state().index();
            self.active[q] = true;
            if self.status[q] == Gor1Status::NoPass {
                self.status[q] = Gor1Status::TopSort;
                self.topsort.push(x.state());
            }
        }

        while !self.topsort.is_empty() {
            // Pass 1: depth-first order over epsilon arcs into `linear`.
            while let Some(&q) = self.topsort.last() {
                let state = &env.nfa[q];
                let mut next = None;
                while let Some(p) = epsilon_arc(state, self.arcidx[q.index()]) {
                    self.arcidx[q.index()] += 1;
                    if self.status[p.index()] == Gor1Status::NoPass {
                        next = Some(p);
                        break;
                    }
                }
                match next {
                    Some(p) => {
                        self.status[p.index()] = Gor1Status::TopSort;
                        self.topsort.push(p);
                    }
                    None => {
                        self.topsort.pop();
                        self.status[q.index()] = Gor1Status::Linear;
                        self.linear.push(q);
                    }
                }
            }

            // Pass 2: scan in topological order.
            while let Some(q) = self.linear.pop() {
                let i = q.index();
                self.arcidx[i] = 0;
                self.status[i] = Gor1Status::NoPass;
                if self.active[i] {
                    self.active[i] = false;
                    for p in self.scan(env, q)? {
                        let j = p.index();
                        self.active[j] = true;
                        if self.status[j] == Gor1Status::NoPass {
                            self.status[j] = Gor1Status::TopSort;
                            self.topsort.push(p);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn gtop(&mut self, env: &mut ClosEnv<'_>, reached: &[I]) -> Result<()> {
        for x in reached {
            if self.relax(env, *x)? {
                self.enqueue(env.nfa, x.state());
            }
        }
        while let Some(Reverse((_, q))) = self.heap.pop() {
            self.inqueue[q.index()] = false;
            for p in self.scan(env, q)? {
                self.enqueue(env.nfa, p);
            }
        }
        Ok(())
    }

    fn enqueue(&mut self, nfa: &Nfa, q: StateId) {
        if !self.inqueue[q.index()] {
            self.inqueue[q.index()] = true;
            self.heap.push(Reverse((nfa[q].topord, q)));
        }
    }

    /// Relax the epsilon arcs of `q`; returns the improved targets.
    fn scan(&mut self, env: &mut ClosEnv<'_>, q: StateId) -> Result<SmallVec<[StateId; 2]>> {
        let x = self.done[self.clos[q.index()] as usize];
        let mut improved = SmallVec::new();
        match env.nfa[q].kind {
            NfaKind::Nil { out } => {
                if self.relax(env, x.moved(out, x.look()))? {
                    improved.push(out);
                }
            }
            NfaKind::Alt { out1, out2 } => {
                for out in [out1, out2] {
                    if self.relax(env, x.moved(out, x.look()))? {
                        improved.push(out);
                    }
                }
            }
            NfaKind::Tag { info, out } => {
                let look = env.history.push(x.look(), env.step, info, x.origin());
                if self.relax(env, x.moved(out, look))? {
                    improved.push(out);
                }
            }
            NfaKind::Ran { .. } | NfaKind::Fin { .. } => {}
        }
        Ok(improved)
    }

    /// Record `x` at its state unless the item already there is better.
    fn relax(&mut self, env: &mut ClosEnv<'_>, x: I) -> Result<bool> {
        let q = x.state();
        let idx = self.clos[q.index()];
        if idx == NOCLOS {
            self.clos[q.index()] = self.done.len() as u32;
            self.done.push(x);
            return Ok(true);
        }

        let y = self.done[idx as usize];
        let replace = env.nfa[q].indeg < 2 || {
            let view = PrecView {
                tags: env.nfa.tags(),
                history: env.history,
                table: env.table,
                size: env.size,
            };
            let p = precedence(
                &view,
                (x.look(), x.origin()),
                (y.look(), y.origin()),
                &mut env.stats.prec,
            )?;
            p.order.is_lt()
        };
        if replace {
            self.done[idx as usize] = x;
        }
        Ok(replace)
    }
}

/// Keep `Ran` items in order, followed by the `Fin` item of the smallest rule.
pub fn prune<I: Item>(items: &mut Vec<I>, nfa: &Nfa) {
    let mut fin: Option<(usize, I)> = None;
    items.retain(|x| match nfa[x.state()].kind {
        NfaKind::Ran { .. } => true,
        NfaKind::Fin { rule } => {
            if fin.map_or(true, |(r, _)| rule < r) {
                fin = Some((rule, *x));
            }
            false
        }
        _ => false,
    });
    if let Some((_, x)) = fin {
        items.push(x);
    }
}

/// POSIX kernel order: `Ran` items by state, then the `Fin` item.
pub fn sort_posix<I: Item>(items: &mut [I], nfa: &Nfa) {
    items.sort_by_key(|x| (nfa[x.state()].is_fin(), x.state()));
}

/// One line per item: state, origin and the lookahead tags.
pub fn dump<I: Item>(items: &[I], history: &TagHistory) -> String {
    let mut out = String::new();
    let mut path = Vec::new();
    for x in items {
        history.path(x.look(), &mut path);
        let _ = write!(out, "{}:{}", x.state().index(), x.origin());
        for info in &path {
            let _ = write!(out, " {}{}", info.tag(), if info.neg() { "n" } else { "" });
        }
        out.push('\n');
    }
    out
}

/// Start item of a closure over the NFA root.
pub fn root_item(nfa: &Nfa, tvers: u32) -> ClosItem {
    ClosItem {
        state: nfa.root(),
        origin: 0,
        tvers,
        ttran: ROOT,
        tlook: ROOT,
    }
}
