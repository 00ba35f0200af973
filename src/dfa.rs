//! Tagged DFA: the output of determinization.
//!
//! Tag values live in numbered registers (tag versions). Every transition
//! carries the register commands to run when it is taken; accepting states
//! carry final commands that move the accepted rule's tags into the fixed
//! `finvers` registers. Replaying the DFA over an input therefore yields the
//! submatch offsets of the longest accepted prefix.

use crate::nfa::Rule;

/// A register number. Version 0 is unused.
pub type TagVer = u32;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TagCmd {
    /// `lhs = rhs`
    Copy { lhs: TagVer, rhs: TagVer },
    /// `lhs = cursor`, or `lhs = -1` for a bottom (no match) value.
    Set { lhs: TagVer, bottom: bool },
}

impl TagCmd {
    pub fn lhs(&self) -> TagVer {
        match *self {
            TagCmd::Copy { lhs, .. } | TagCmd::Set { lhs, .. } => lhs,
        }
    }

    pub fn rhs(&self) -> Option<TagVer> {
        match *self {
            TagCmd::Copy { rhs, .. } => Some(rhs),
            TagCmd::Set { .. } => None,
        }
    }

    #[inline]
    fn apply(&self, regs: &mut [isize], cursor: isize) {
        match *self {
            TagCmd::Copy { lhs, rhs } => regs[lhs as usize] = regs[rhs as usize],
            TagCmd::Set { lhs, bottom } => regs[lhs as usize] = if bottom { -1 } else { cursor },
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Transition {
    pub target: u32,
    pub cmds: Vec<TagCmd>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DfaState {
    /// One entry per alphabet class; `None` is the dead state.
    pub arcs: Vec<Option<Transition>>,
    pub rule: Option<usize>,
    pub fin_cmds: Vec<TagCmd>,
}

/// Counters collected during determinization.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct DfaStats {
    pub states: usize,
    pub versions: u32,
    pub closures: u64,
    pub closure_items: u64,
    pub prec_calls: u64,
    pub prec_steps: u64,
    pub mapped: u64,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Dfa {
    /// Lower bounds of the alphabet classes.
    pub charset: Vec<u32>,
    pub alphabet_size: u32,
    pub states: Vec<DfaState>,
    /// Run before the first symbol (TDFA(0) only).
    pub init_cmds: Vec<TagCmd>,
    /// Register holding tag `t` after an accept.
    pub finvers: Vec<TagVer>,
    pub registers: usize,
    pub lookahead: bool,
    pub rules: Vec<Rule>,
    pub stats: DfaStats,
}

/// Result of a DFA replay.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DfaMatch {
    pub rule: usize,
    /// Length of the accepted prefix.
    pub end: usize,
    /// Value of every tag, `-1` when unset.
    pub tags: Vec<isize>,
}

impl Dfa {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Alphabet class of a symbol.
    pub fn class_of(&self, sym: u32) -> Option<usize> {
        if sym >= self.alphabet_size {
            return None;
        }
        self.charset.partition_point(|&lo| lo <= sym).checked_sub(1)
    }

    /// Run the DFA over `input` from its start, returning the longest
    /// accepted prefix.
    pub fn replay(&self, input: &[u8]) -> Option<DfaMatch> {
        if self.states.is_empty() {
            return None;
        }
        let mut regs = vec![-1isize; self.registers];
        for cmd in &self.init_cmds {
            cmd.apply(&mut regs, 0);
        }

        let mut last = None;
        let mut state = 0usize;
        self.accept(state, 0, &mut regs, &mut last);
        for (pos, &b) in input.iter().enumerate() {
            let Some(class) = self.class_of(b as u32) else {
                break;
            };
            let Some(t) = &self.states[state].arcs[class] else {
                break;
            };
            let cursor = if self.lookahead { pos } else { pos + 1 };
            for cmd in &t.cmds {
                cmd.apply(&mut regs, cursor as isize);
            }
            state = t.target as usize;
            self.accept(state, pos + 1, &mut regs, &mut last);
        }

        last.map(|(rule, end)| DfaMatch {
            rule,
            end,
            tags: self.finvers.iter().map(|&v| regs[v as usize]).collect(),
        })
    }

    fn accept(&self, state: usize, pos: usize, regs: &mut [isize], last: &mut Option<(usize, usize)>) {
        let s = &self.states[state];
        if let Some(rule) = s.rule {
            for cmd in &s.fin_cmds {
                cmd.apply(regs, pos as isize);
            }
            *last = Some((rule, pos));
        }
    }
}
