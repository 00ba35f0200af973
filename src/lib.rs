//! tagdfa: tagged NFA to tagged DFA determinization with submatch extraction
//!
//! A regular expression with capture groups is lowered to a tagged NFA whose
//! epsilon arcs record capture boundaries. Determinization turns it into a
//! tagged DFA whose transitions carry register commands, so that submatch
//! offsets come out of a single left-to-right pass. Ambiguity between paths
//! is resolved either with POSIX leftmost-longest rules (Okui-style
//! precedence over tag histories) or with leftmost-greedy priority.
//!
//! The same closure, history and precedence machinery also drives a direct
//! NFA simulator, used when no DFA is wanted or to cross-check one.
//!
//! ```
//! use tagdfa::{regexec_dfa, Ast, Options, RegMatch, Regex};
//!
//! let a = || Ast::star(Ast::byte(b'a'));
//! let re = Regex::new(&Ast::cat(vec![Ast::cap(a()), Ast::cap(a())]), Options::default())?;
//!
//! let mut pmatch = [RegMatch::UNSET; 3];
//! assert!(regexec_dfa(&re, b"aaa", &mut pmatch)?);
//! assert_eq!(pmatch[1], RegMatch::new(0, 3));
//! assert_eq!(pmatch[2], RegMatch::new(3, 3));
//! # Ok::<(), tagdfa::Error>(())
//! ```

pub mod determinize;
pub mod dfa;
pub mod diagnostics;
pub mod nfa;
pub mod options;
pub mod regex;

pub use determinize::determinize;
pub use dfa::{Dfa, DfaStats, TagCmd, TagVer};
pub use diagnostics::{Diagnostic, Diagnostics, Severity, TracingSink};
pub use nfa::build::{compile, Ast};
pub use nfa::{Nfa, Range, StateId};
pub use options::{Options, PosixClosure, Semantics};
pub use regex::{
    regexec_dfa, regexec_nfa_leftmost, regexec_nfa_leftmost_trie, regexec_nfa_posix,
    regexec_nfa_posix_trie, RegMatch, Regex,
};

/// Errors raised while building or determinizing an automaton.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid NFA: {0}")]
    InvalidNfa(String),

    #[error("precedence: tags {tag1} and {tag2} are both closing")]
    BothClosing { tag1: usize, tag2: usize },

    #[error("precedence: tags {tag1} and {tag2} are both negated")]
    BothNegative { tag1: usize, tag2: usize },

    #[error("precedence: unresolved tie between tags {tag1} and {tag2}")]
    UnresolvedTie { tag1: usize, tag2: usize },

    #[error("precedence: histories from different origins share a prefix")]
    SharedPrefixAcrossOrigins,

    #[error("DFA state limit exceeded: {states} states (max: {max})")]
    StateLimitExceeded { states: usize, max: usize },

    #[error("tag version limit exceeded: {versions} versions (max: {max})")]
    TagVersionLimitExceeded { versions: u32, max: u32 },

    #[error("pattern was compiled without a DFA")]
    MissingDfa,
}

pub type Result<T> = std::result::Result<T, Error>;
