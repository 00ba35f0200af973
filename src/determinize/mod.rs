//! Determinization of a tagged NFA.
//!
//! DFA states are discovered breadth-first in creation order. For every
//! state and alphabet class the driver:
//!
//! 1. collects the NFA states reached on the class's symbol
//! 2. computes their tagged epsilon-closure (`closure`)
//! 3. for POSIX, sorts the closure and builds its precedence table
//! 4. assigns fresh tag versions for the tags set on the transition
//! 5. resolves the resulting kernel in the `KernelCache`, which yields the
//!    target state and the transition's register commands
//!
//! All run state lives in one `Determinizer` and is dropped with it.
//!
//! ## Components
//! - `history`: append-only tag history trie
//! - `lookup`: interning of small slices
//! - `tagver`: tag-version vectors and per-transition fresh versions
//! - `closure`: leftmost and POSIX (GOR1 / GTOP) closures
//! - `precedence`: POSIX comparison of tag histories
//! - `kernel`: DFA state identity and version mapping

pub mod closure;
pub mod history;
pub mod kernel;
pub mod lookup;
pub mod precedence;
pub mod tagver;


use std::fmt;

use closure::{ClosEnv, ClosItem, ClosureBuffers, ClosureStats, Strategy};
use history::{TagHistory, ROOT};
use kernel::{KernelCache, KernelItem, MapEnv, Resolution};
use lookup::SliceTable;
use precedence::PrecView;
use tagver::{NewVersions, TagVerTable};

use crate::dfa::{Dfa, DfaState, DfaStats, TagCmd, TagVer, Transition};
use crate::diagnostics::Diagnostics;
use crate::nfa::{Nfa, NfaKind, TagInfo};
use crate::options::Options;
use crate::{Error, Result};

/// Determinize `nfa`. On failure exactly one error is reported to `diag`
/// and no DFA is returned.
pub fn determinize(nfa: &Nfa, opts: &Options, diag: &mut dyn Diagnostics) -> Result<Dfa> {
    Determinizer::new(nfa, opts).run(diag)
}

/// Where a run failed.
#[derive(Clone, Copy, Debug)]
enum Site {
    Start,
    Transition { state: usize, class: usize, lo: u32 },
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Site::Start => write!(f, "initial state"),
            Site::Transition { state, class, lo } => {
                write!(f, "state {state}, symbol class {class} (from {lo:#x})")
            }
        }
    }
}

/// Run context of one determinization.
pub struct Determinizer<'a> {
    nfa: &'a Nfa,
    opts: &'a Options,
    strategy: Strategy,
    charset: Vec<u32>,
    ntags: usize,

    history: TagHistory,
    tagvers: TagVerTable,
    looks: SliceTable<TagInfo>,
    kernels: KernelCache,
    newvers: NewVersions,
    maxver: TagVer,

    bufs: ClosureBuffers<ClosItem>,
    reached: Vec<ClosItem>,
    prectbl: Vec<i32>,
    kitems: Vec<KernelItem>,
    sig: Vec<TagInfo>,
    vers: Vec<TagVer>,

    states: Vec<DfaState>,
    init_cmds: Vec<TagCmd>,
    stats: ClosureStats,
    mapped: u64,
}

impl<'a> Determinizer<'a> {
    pub fn new(nfa: &'a Nfa, opts: &'a Options) -> Self {
        let ntags = nfa.tags().len();
        Self {
            nfa,
            opts,
            strategy: Strategy::from_options(opts),
            charset: nfa.charset(opts.alphabet_size),
            ntags,
            history: TagHistory::new(),
            tagvers: TagVerTable::new(),
            looks: SliceTable::new(),
            kernels: KernelCache::new(),
            newvers: NewVersions::new(),
            maxver: 2 * ntags as TagVer,
            bufs: ClosureBuffers::new(nfa.len()),
            reached: Vec::new(),
            prectbl: Vec::new(),
            kitems: Vec::new(),
            sig: Vec::new(),
            vers: Vec::with_capacity(ntags),
            states: Vec::new(),
            init_cmds: Vec::new(),
            stats: ClosureStats::default(),
            mapped: 0,
        }
    }

    pub fn history(&self) -> &TagHistory {
        &self.history
    }

    pub fn kernels(&self) -> &KernelCache {
        &self.kernels
    }

    pub fn run(&mut self, diag: &mut dyn Diagnostics) -> Result<Dfa> {
        if let Err((error, site)) = self.build() {
            diag.error(format!("determinization failed at {site}: {error}"));
            return Err(error);
        }
        Ok(self.finish(diag))
    }

    fn build(&mut self) -> std::result::Result<(), (Error, Site)> {
        let init: Vec<TagVer> = (1..=self.ntags as TagVer).collect();
        let tvers = self.tagvers.insert(&init);
        self.reached.clear();
        self.reached.push(closure::root_item(self.nfa, tvers));
        let (_, cmds) = self.transition(None).map_err(|e| (e, Site::Start))?;
        self.init_cmds = cmds;

        let mut state = 0;
        while state < self.states.len() {
            for class in 0..self.charset.len() {
                let arc = self.step(state, class).map_err(|e| {
                    let lo = self.charset[class];
                    (e, Site::Transition { state, class, lo })
                })?;
                self.states[state].arcs.push(arc);
            }
            state += 1;
        }
        Ok(())
    }

    /// Transition of `state` on alphabet class `class`.
    fn step(&mut self, state: usize, class: usize) -> Result<Option<Transition>> {
        let sym = self.charset[class];
        self.reached.clear();
        for (i, k) in self.kernels.items(state as u32).iter().enumerate() {
            if let NfaKind::Ran { ranges, out } = &self.nfa[k.state].kind {
                if ranges.iter().any(|r| r.contains(sym)) {
                    self.reached.push(ClosItem {
                        state: *out,
                        origin: i as u32,
                        tvers: k.tvers,
                        ttran: k.tlook,
                        tlook: ROOT,
                    });
                }
            }
        }
        if self.reached.is_empty() {
            return Ok(None);
        }
        let (target, cmds) = self.transition(Some(state as u32))?;
        Ok(Some(Transition { target, cmds }))
    }

    /// Close over `self.reached` and resolve the target kernel.
    fn transition(&mut self, origin: Option<u32>) -> Result<(u32, Vec<TagCmd>)> {
        let nfa = self.nfa;
        let (table, size) = match origin {
            Some(s) => (self.kernels.table(s), self.kernels.items(s).len()),
            None => (&[][..], 0),
        };

        let mut env = ClosEnv {
            nfa,
            history: &mut self.history,
            table,
            size,
            step: 0,
            stats: &mut self.stats,
        };
        self.bufs.closure(&mut env, self.strategy, &self.reached)?;

        let items = self.bufs.items_mut();
        if self.strategy.is_posix() {
            closure::sort_posix(&mut items[..], nfa);
            let view = PrecView {
                tags: nfa.tags(),
                history: &self.history,
                table,
                size,
            };
            precedence::build_table(&view, &items[..], &mut self.stats.prec, &mut self.prectbl)?;
        } else {
            self.prectbl.clear();
        }

        if self.opts.dump_closure {
            tracing::trace!(
                origin = ?origin,
                "closure:\n{}",
                closure::dump(&items[..], &self.history)
            );
        }

        // TDFA(0): every tag is applied on the incoming transition.
        if !self.opts.lookahead {
            for x in items.iter_mut() {
                x.ttran = x.tlook;
                x.tlook = ROOT;
            }
        }

        let mark = self.maxver;
        self.newvers.clear();
        self.kitems.clear();
        for x in items.iter() {
            self.vers.clear();
            self.vers.extend_from_slice(self.tagvers.get(x.tvers));
            self.history.last_events(x.ttran, &mut self.sig);
            for info in &self.sig {
                let t = info.tag();
                self.vers[t] = self.newvers.version_for(t, 0, info.neg(), &mut self.maxver);
            }
            let tvers = self.tagvers.insert(&self.vers);

            self.history.last_events(x.tlook, &mut self.sig);
            let look = self.looks.insert(&self.sig);
            self.kitems.push(KernelItem {
                state: x.state,
                tvers,
                tlook: x.tlook,
                look,
            });
        }

        let sets = self.newvers.commands();
        let env = MapEnv {
            tagvers: &self.tagvers,
            looks: &self.looks,
            lookahead: self.opts.lookahead,
            sets: &sets,
        };
        let (id, resolution) = self.kernels.find_or_create(&self.kitems, &self.prectbl, &env);
        let cmds = match resolution {
            Resolution::Mapped(cmds) => {
                self.maxver = mark;
                self.mapped += 1;
                cmds
            }
            Resolution::Exact => sets,
            Resolution::New => {
                if self.kernels.len() > self.opts.max_states {
                    return Err(Error::StateLimitExceeded {
                        states: self.kernels.len(),
                        max: self.opts.max_states,
                    });
                }
                self.add_state(id);
                sets
            }
        };
        if self.maxver > self.opts.max_tag_versions {
            return Err(Error::TagVersionLimitExceeded {
                versions: self.maxver,
                max: self.opts.max_tag_versions,
            });
        }
        Ok((id, cmds))
    }

    #[inline]
    fn finver(&self, tag: usize) -> TagVer {
        (self.ntags + 1 + tag) as TagVer
    }

    /// Append the DFA state of new kernel `id`, with its final commands.
    fn add_state(&mut self, id: u32) {
        debug_assert_eq!(id as usize, self.states.len());
        let mut state = DfaState::default();
        let fin = self
            .kernels
            .items(id)
            .last()
            .and_then(|k| self.nfa[k.state].rule().map(|rule| (rule, *k)));
        if let Some((rule, k)) = fin {
            let vers = self.tagvers.get(k.tvers);
            let look = self.looks.get(k.look);
            for t in self.nfa.rules()[rule].tags() {
                let lhs = self.finver(t);
                state.fin_cmds.push(match look.iter().find(|info| info.tag() == t) {
                    Some(info) => TagCmd::Set {
                        lhs,
                        bottom: info.neg(),
                    },
                    None => TagCmd::Copy { lhs, rhs: vers[t] },
                });
            }
            state.rule = Some(rule);
        }
        self.states.push(state);
    }

    fn finish(&mut self, diag: &mut dyn Diagnostics) -> Dfa {
        let states = std::mem::take(&mut self.states);
        for rule in 0..self.nfa.rules().len() {
            if !states.iter().any(|s| s.rule == Some(rule)) {
                diag.warning(format!("rule {rule} is shadowed and never matches"));
            }
        }

        let stats = DfaStats {
            states: states.len(),
            versions: self.maxver,
            closures: self.stats.closures,
            closure_items: self.stats.items,
            prec_calls: self.stats.prec.calls,
            prec_steps: self.stats.prec.steps,
            mapped: self.mapped,
        };
        tracing::debug!(
            states = stats.states,
            versions = stats.versions,
            closures = stats.closures,
            closure_items = stats.closure_items,
            prec_calls = stats.prec_calls,
            prec_steps = stats.prec_steps,
            mapped = stats.mapped,
            "determinization finished"
        );

        Dfa {
            charset: self.charset.clone(),
            alphabet_size: self.opts.alphabet_size,
            states,
            init_cmds: std::mem::take(&mut self.init_cmds),
            finvers: (0..self.ntags).map(|t| self.finver(t)).collect(),
            registers: self.maxver as usize + 1,
            lookahead: self.opts.lookahead,
            rules: self.nfa.rules().to_vec(),
            stats,
        }
    }
}
