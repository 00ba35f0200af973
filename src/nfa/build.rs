//! Lowering of a small regex AST into a tagged NFA.
//!
//! There is no syntax parser here: patterns are assembled with the `Ast`
//! helper constructors. The lowering is continuation-passing, each node is
//! built in front of the state that follows it, so loops close over a
//! reserved state instead of being patched afterwards.
//!
//! Capture groups are numbered in preorder. Every alternative that skips a
//! capture group records negated tags for it after the branch it takes, so
//! that all paths through an alternation set the same tags. A `?` or `*`
//! whose body can match the empty string has no separate skip path: the
//! empty match already sets every tag of the body.

use super::{Nfa, NfaBuilder, NfaKind, Range, Rule, StateId, Tag};
use crate::{Error, Result};

/// Regex AST over byte ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ast {
    /// Matches the empty string.
    Empty,
    /// One symbol from any of the ranges.
    Class(Vec<Range>),
    Cat(Vec<Ast>),
    /// Ordered alternation; earlier branches have priority.
    Alt(Vec<Ast>),
    /// Capture group.
    Cap(Box<Ast>),
    Star(Box<Ast>),
    Plus(Box<Ast>),
    Opt(Box<Ast>),
}

impl Ast {
    pub fn byte(b: u8) -> Ast {
        Ast::Class(vec![Range::byte(b)])
    }

    /// Inclusive byte range.
    pub fn range(lo: u8, hi: u8) -> Ast {
        Ast::Class(vec![Range::new(lo as u32, hi as u32 + 1)])
    }

    /// Any byte.
    pub fn any() -> Ast {
        Ast::Class(vec![Range::new(0, 256)])
    }

    /// Literal byte string.
    pub fn lit(s: &str) -> Ast {
        match s.as_bytes() {
            [] => Ast::Empty,
            [b] => Ast::byte(*b),
            bytes => Ast::Cat(bytes.iter().map(|&b| Ast::byte(b)).collect()),
        }
    }

    pub fn cat(items: Vec<Ast>) -> Ast {
        Ast::Cat(items)
    }

    pub fn alt(items: Vec<Ast>) -> Ast {
        Ast::Alt(items)
    }

    pub fn cap(x: Ast) -> Ast {
        Ast::Cap(Box::new(x))
    }

    pub fn star(x: Ast) -> Ast {
        Ast::Star(Box::new(x))
    }

    pub fn plus(x: Ast) -> Ast {
        Ast::Plus(Box::new(x))
    }

    pub fn opt(x: Ast) -> Ast {
        Ast::Opt(Box::new(x))
    }

    /// Number of capture groups in this subtree.
    pub fn captures(&self) -> usize {
        match self {
            Ast::Empty | Ast::Class(_) => 0,
            Ast::Cat(xs) | Ast::Alt(xs) => xs.iter().map(Ast::captures).sum(),
            Ast::Cap(x) => 1 + x.captures(),
            Ast::Star(x) | Ast::Plus(x) | Ast::Opt(x) => x.captures(),
        }
    }

    /// Whether this subtree matches the empty string.
    pub fn nullable(&self) -> bool {
        match self {
            Ast::Empty | Ast::Star(_) | Ast::Opt(_) => true,
            Ast::Class(_) => false,
            Ast::Cat(xs) => xs.iter().all(Ast::nullable),
            Ast::Alt(xs) => xs.iter().any(Ast::nullable),
            Ast::Cap(x) | Ast::Plus(x) => x.nullable(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Ast::Empty => true,
            Ast::Cat(xs) => xs.iter().all(Ast::is_empty),
            Ast::Star(x) | Ast::Plus(x) | Ast::Opt(x) => x.is_empty(),
            _ => false,
        }
    }
}

/// Compile one or more rules into a single NFA.
///
/// Rule `i` owns the tags of its own capture groups and accepts in a `Fin`
/// state carrying `i`. With several rules the root is a plain priority
/// alternation of the rule entries; no negated tags are added between rules.
pub fn compile(rules: &[Ast]) -> Result<Nfa> {
    if rules.is_empty() {
        return Err(Error::InvalidNfa("no rules to compile".to_string()));
    }

    let mut b = NfaBuilder::new();
    let mut bases = Vec::with_capacity(rules.len());
    for ast in rules {
        let ltag = b.tag_count();
        bases.push(ltag / 2);
        declare_tags(ast, 0, &mut b)?;
        b.add_rule(Rule {
            ltag,
            htag: b.tag_count(),
        });
    }

    let mut entries = Vec::with_capacity(rules.len());
    for (i, (ast, &base)) in rules.iter().zip(&bases).enumerate() {
        let fin = b.fin(i);
        entries.push(Lowering { b: &mut b }.lower(ast, fin, base));
    }

    let mut root = entries.pop().unwrap_or(StateId::NONE);
    while let Some(entry) = entries.pop() {
        root = b.alt(entry, root);
    }
    b.finish(root)
}

/// Declare the tags of every capture group in preorder.
fn declare_tags(ast: &Ast, depth: i32, b: &mut NfaBuilder) -> Result<()> {
    match ast {
        Ast::Empty | Ast::Class(_) => Ok(()),
        Ast::Cat(xs) | Ast::Alt(xs) => xs.iter().try_for_each(|x| declare_tags(x, depth, b)),
        Ast::Cap(x) => {
            let capture = b.tag_count() / 2;
            for closing in [false, true] {
                b.add_tag(Tag {
                    capture,
                    closing,
                    height: depth,
                })?;
            }
            declare_tags(x, depth + 1, b)
        }
        Ast::Star(x) | Ast::Plus(x) | Ast::Opt(x) => declare_tags(x, depth, b),
    }
}

struct Lowering<'a> {
    b: &'a mut NfaBuilder,
}

impl Lowering<'_> {
    /// Build `ast` in front of `next`; `base` is the preorder number of the
    /// first capture group inside `ast`.
    fn lower(&mut self, ast: &Ast, next: StateId, base: usize) -> StateId {
        match ast {
            Ast::Empty => next,
            Ast::Class(ranges) => self.b.ran(ranges, next),
            Ast::Cat(xs) => {
                let mut bases = Vec::with_capacity(xs.len());
                let mut c = base;
                for x in xs {
                    bases.push(c);
                    c += x.captures();
                }
                let mut cur = next;
                for (x, &c) in xs.iter().zip(&bases).rev() {
                    cur = self.lower(x, cur, c);
                }
                cur
            }
            Ast::Alt(xs) => self.lower_alt(xs, next, base),
            Ast::Cap(x) => {
                let open = 2 * base;
                let close = self.b.tag(open + 1, false, next);
                let body = self.lower(x, close, base + 1);
                self.b.tag(open, false, body)
            }
            Ast::Star(x) if x.is_empty() => next,
            Ast::Star(x) if x.nullable() => self.lower_plus(x, next, base),
            Ast::Star(x) => {
                let lp = self.b.reserve();
                let body = self.lower(x, lp, base);
                self.b.set(lp, NfaKind::Alt { out1: body, out2: next });
                match x.captures() {
                    0 => lp,
                    n => {
                        let skip = self.negate(base, n, next);
                        self.b.alt(body, skip)
                    }
                }
            }
            Ast::Plus(x) if x.is_empty() => next,
            Ast::Plus(x) => self.lower_plus(x, next, base),
            Ast::Opt(x) if x.is_empty() => next,
            Ast::Opt(x) if x.nullable() => self.lower(x, next, base),
            Ast::Opt(x) => {
                let body = self.lower(x, next, base);
                let skip = self.negate(base, x.captures(), next);
                self.b.alt(body, skip)
            }
        }
    }

    /// Body followed by a loop back to it or an exit to `next`.
    fn lower_plus(&mut self, x: &Ast, next: StateId, base: usize) -> StateId {
        let lp = self.b.reserve();
        let body = self.lower(x, lp, base);
        self.b.set(lp, NfaKind::Alt { out1: body, out2: next });
        body
    }

    /// Right-folded alternation: each branch is followed by the negated
    /// captures of the branches it does not take.
    fn lower_alt(&mut self, xs: &[Ast], next: StateId, base: usize) -> StateId {
        match xs {
            [] => next,
            [x] => self.lower(x, next, base),
            [x, rest @ ..] => {
                let ncap = x.captures();
                let rest_caps: usize = rest.iter().map(Ast::captures).sum();

                let after_x = self.negate(base + ncap, rest_caps, next);
                let first = self.lower(x, after_x, base);

                let after_rest = self.negate(base, ncap, next);
                let second = self.lower_alt(rest, after_rest, base + ncap);

                self.b.alt(first, second)
            }
        }
    }

    /// Chain of negated open/close tags for captures `base..base + n`,
    /// applied in ascending tag order before `next`.
    fn negate(&mut self, base: usize, n: usize, next: StateId) -> StateId {
        let mut cur = next;
        for tag in (2 * base..2 * (base + n)).rev() {
            cur = self.b.tag(tag, true, cur);
        }
        cur
    }
}
