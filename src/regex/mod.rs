//! Matching entry points.
//!
//! A `Regex` holds the tagged NFA of a pattern and, unless built with
//! `Regex::new_nfa`, its determinized DFA. Every entry point matches at the
//! start of the input, takes the longest accepted prefix and fills `pmatch`
//! POSIX style: slot 0 is the whole match, slot `k` capture group `k`, and
//! unset groups or slots beyond the pattern's groups are `(-1, -1)`.
//!
//! The `regexec_nfa_*` functions simulate the NFA directly with the same
//! closure and precedence code the determinizer uses. They keep tag values
//! either in per-config offset rows or in a shared history trie.

mod store;


use crate::determinize::closure::{self, ClosEnv, ClosureBuffers, ClosureStats, Item, Strategy};
use crate::determinize::determinize;
use crate::determinize::history::{HistIdx, TagHistory, ROOT};
use crate::determinize::precedence::{self, PrecView};
use crate::dfa::Dfa;
use crate::diagnostics::TracingSink;
use crate::nfa::build::{compile, Ast};
use crate::nfa::{Nfa, NfaKind, StateId, TagInfo};
use crate::options::{Options, Semantics};
use crate::{Error, Result};

pub use store::{HistoryTrie, OffsetRows, TagStore};

/// Offsets of one (sub)match; `(-1, -1)` when unset.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RegMatch {
    pub rm_so: isize,
    pub rm_eo: isize,
}

impl RegMatch {
    pub const UNSET: RegMatch = RegMatch { rm_so: -1, rm_eo: -1 };

    pub fn new(rm_so: isize, rm_eo: isize) -> Self {
        Self { rm_so, rm_eo }
    }

    pub fn is_set(&self) -> bool {
        self.rm_so >= 0
    }
}

impl Default for RegMatch {
    fn default() -> Self {
        Self::UNSET
    }
}

/// A compiled pattern.
#[derive(Debug)]
pub struct Regex {
    nfa: Nfa,
    dfa: Option<Dfa>,
    nsub: usize,
    opts: Options,
}

impl Regex {
    /// Compile `ast` and determinize it. Diagnostics go to `tracing`.
    pub fn new(ast: &Ast, opts: Options) -> Result<Self> {
        let mut re = Self::new_nfa(ast, opts)?;
        re.dfa = Some(determinize(&re.nfa, &re.opts, &mut TracingSink)?);
        Ok(re)
    }

    /// Compile `ast` for the NFA entry points only.
    pub fn new_nfa(ast: &Ast, opts: Options) -> Result<Self> {
        let nfa = compile(std::slice::from_ref(ast))?;
        Ok(Self {
            nsub: nfa.captures(),
            nfa,
            dfa: None,
            opts,
        })
    }

    /// Number of capture groups.
    pub fn nsub(&self) -> usize {
        self.nsub
    }

    pub fn nfa(&self) -> &Nfa {
        &self.nfa
    }

    pub fn dfa(&self) -> Option<&Dfa> {
        self.dfa.as_ref()
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }
}

/// Match with the DFA built by `Regex::new`.
pub fn regexec_dfa(re: &Regex, input: &[u8], pmatch: &mut [RegMatch]) -> Result<bool> {
    let dfa = re.dfa.as_ref().ok_or(Error::MissingDfa)?;
    let found = dfa.replay(input).map(|m| (m.end, m.tags));
    Ok(report(re, found, pmatch))
}

/// POSIX NFA simulation with an offsets row per config.
pub fn regexec_nfa_posix(re: &Regex, input: &[u8], pmatch: &mut [RegMatch]) -> Result<bool> {
    let store = OffsetRows::new(re.nfa.tags().len());
    simulate(re, posix(re), store, input, pmatch)
}

/// POSIX NFA simulation over a shared history trie.
pub fn regexec_nfa_posix_trie(re: &Regex, input: &[u8], pmatch: &mut [RegMatch]) -> Result<bool> {
    let store = HistoryTrie::new(re.nfa.tags().len());
    simulate(re, posix(re), store, input, pmatch)
}

/// Leftmost-greedy NFA simulation with an offsets row per config.
pub fn regexec_nfa_leftmost(re: &Regex, input: &[u8], pmatch: &mut [RegMatch]) -> Result<bool> {
    let store = OffsetRows::new(re.nfa.tags().len());
    simulate(re, Strategy::Leftmost, store, input, pmatch)
}

/// Leftmost-greedy NFA simulation over a shared history trie.
pub fn regexec_nfa_leftmost_trie(
    re: &Regex,
    input: &[u8],
    pmatch: &mut [RegMatch],
) -> Result<bool> {
    let store = HistoryTrie::new(re.nfa.tags().len());
    simulate(re, Strategy::Leftmost, store, input, pmatch)
}

/// POSIX closure strategy, keeping the pattern's choice of algorithm.
fn posix(re: &Regex) -> Strategy {
    Strategy::from_options(&re.opts.clone().with_semantics(Semantics::Posix))
}

/// Fill `pmatch` from the match end and tag offsets.
fn report(re: &Regex, found: Option<(usize, Vec<isize>)>, pmatch: &mut [RegMatch]) -> bool {
    pmatch.fill(RegMatch::UNSET);
    let Some((end, tags)) = found else {
        return false;
    };
    if let Some(whole) = pmatch.first_mut() {
        *whole = RegMatch::new(0, end as isize);
    }
    for (k, slot) in pmatch.iter_mut().enumerate().skip(1).take(re.nsub) {
        let (so, eo) = (tags[2 * (k - 1)], tags[2 * (k - 1) + 1]);
        if so >= 0 && eo >= 0 {
            *slot = RegMatch::new(so, eo);
        }
    }
    true
}

/// Simulator config: an NFA state plus a handle to its tag values.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Config {
    state: StateId,
    /// Index of the config this one was reached from.
    origin: u32,
    /// Handle into the tag store.
    thist: u32,
    /// Tags crossed during the current step.
    look: HistIdx,
}

impl Item for Config {
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
        self.look
    }

    #[inline]
    fn moved(&self, state: StateId, look: HistIdx) -> Self {
        Config { state, look, ..*self }
    }
}

fn simulate<S: TagStore>(
    re: &Regex,
    strategy: Strategy,
    mut store: S,
    input: &[u8],
    pmatch: &mut [RegMatch],
) -> Result<bool> {
    let nfa = &re.nfa;
    let ntags = nfa.tags().len();

    // Per-step history; config tag values live in `store`.
    let mut history = TagHistory::new();
    let mut bufs: ClosureBuffers<Config> = ClosureBuffers::new(nfa.len());
    let mut stats = ClosureStats::default();
    let mut table: Vec<i32> = Vec::new();
    let mut next_table: Vec<i32> = Vec::new();
    let mut events: Vec<TagInfo> = Vec::new();
    let mut found: Option<(usize, Vec<isize>)> = None;

    let mut reached = vec![Config {
        state: nfa.root(),
        origin: 0,
        thist: store.root(),
        look: ROOT,
    }];
    let mut size = 0;

    for pos in 0..=input.len() {
        history.clear();
        let mut env = ClosEnv {
            nfa,
            history: &mut history,
            table: &table,
            size,
            step: pos as u32,
            stats: &mut stats,
        };
        bufs.closure(&mut env, strategy, &reached)?;

        let items = bufs.items_mut();
        if strategy.is_posix() {
            closure::sort_posix(&mut items[..], nfa);
            let view = PrecView {
                tags: nfa.tags(),
                history: &history,
                table: &table,
                size,
            };
            precedence::build_table(&view, &items[..], &mut stats.prec, &mut next_table)?;
            std::mem::swap(&mut table, &mut next_table);
            size = items.len();
        }

        for x in items.iter_mut() {
            history.path(x.look, &mut events);
            x.thist = store.extend(x.thist, &events, pos);
        }
        store.commit();

        if let Some(last) = items.last().filter(|x| nfa[x.state].is_fin()) {
            let mut tags = vec![-1isize; ntags];
            store.offsets(last.thist, &mut tags);
            found = Some((pos, tags));
        }

        let Some(&sym) = input.get(pos) else {
            break;
        };
        reached.clear();
        for (i, x) in items.iter().enumerate() {
            if let NfaKind::Ran { ranges, out } = &nfa[x.state].kind {
                if ranges.iter().any(|r| r.contains(sym as u32)) {
                    reached.push(Config {
                        state: *out,
                        origin: i as u32,
                        thist: x.thist,
                        look: ROOT,
                    });
                }
            }
        }
        if reached.is_empty() {
            break;
        }
    }

    tracing::trace!(
        closures = stats.closures,
        prec_calls = stats.prec.calls,
        "simulation finished"
    );
    Ok(report(re, found, pmatch))
}
