//! Determinization options.

/// How ambiguous submatches are resolved.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Semantics {
    /// Leftmost-longest per subexpression, compared over tag histories.
    #[default]
    Posix,
    /// First path in priority order wins.
    Leftmost,
}

/// Traversal used for POSIX closures.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PosixClosure {
    /// Goldberg-Radzik: repeated topological passes with a linear buffer.
    #[default]
    Gor1,
    /// Min-heap on the NFA topological order.
    Gtop,
}

/// Configuration for determinization and simulation.
///
/// # Example
/// ```
/// use tagdfa::{Options, Semantics};
///
/// let opts = Options::default()
///     .with_semantics(Semantics::Leftmost)
///     .with_max_states(100);
/// assert_eq!(opts.max_states, 100);
/// assert!(opts.lookahead);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    pub semantics: Semantics,
    pub posix_closure: PosixClosure,
    /// TDFA(1): closure tags are applied on the next transition. When off,
    /// TDFA(0): they are applied on the transition that enters the state.
    pub lookahead: bool,
    /// Symbols are `0..alphabet_size`.
    pub alphabet_size: u32,
    /// Maximum number of DFA states before the run is aborted.
    pub max_states: usize,
    /// Maximum number of tag versions (registers) before the run is aborted.
    pub max_tag_versions: u32,
    /// Log every closure at trace level.
    pub dump_closure: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            semantics: Semantics::Posix,
            posix_closure: PosixClosure::Gor1,
            lookahead: true,
            alphabet_size: 256,
            max_states: 10_000,
            max_tag_versions: 100_000,
            dump_closure: false,
        }
    }
}

impl Options {
    pub fn with_semantics(mut self, semantics: Semantics) -> Self {
        self.semantics = semantics;
        self
    }

    pub fn with_posix_closure(mut self, algo: PosixClosure) -> Self {
        self.posix_closure = algo;
        self
    }

    pub fn with_lookahead(mut self, lookahead: bool) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn with_alphabet_size(mut self, size: u32) -> Self {
        self.alphabet_size = size;
        self
    }

    pub fn with_max_states(mut self, max: usize) -> Self {
        self.max_states = max;
        self
    }

    pub fn with_max_tag_versions(mut self, max: u32) -> Self {
        self.max_tag_versions = max;
        self
    }

    pub fn with_dump_closure(mut self, dump: bool) -> Self {
        self.dump_closure = dump;
        self
    }

    pub fn is_posix(&self) -> bool {
        self.semantics == Semantics::Posix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = Options::default();
        assert_eq!(opts.semantics, Semantics::Posix);
        assert_eq!(opts.posix_closure, PosixClosure::Gor1);
        assert!(opts.lookahead);
        assert_eq!(opts.alphabet_size, 256);
        assert!(opts.is_posix());
    }

    #[test]
    fn test_builder_chain() {
        let opts = Options::default()
            .with_semantics(Semantics::Leftmost)
            .with_posix_closure(PosixClosure::Gtop)
            .with_lookahead(false)
            .with_max_tag_versions(16)
            .with_dump_closure(true);
        assert!(!opts.is_posix());
        assert_eq!(opts.posix_closure, PosixClosure::Gtop);
        assert!(!opts.lookahead);
        assert_eq!(opts.max_tag_versions, 16);
        assert!(opts.dump_closure);
    }
}
