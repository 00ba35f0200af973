//! Benchmarks for determinization and matching
//!
//! Determinization cost per closure algorithm, plus DFA replay against the
//! two NFA simulators on the same pattern.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tagdfa::{
    compile, determinize, regexec_dfa, regexec_nfa_posix, regexec_nfa_posix_trie, Ast, Options,
    PosixClosure, RegMatch, Regex, Semantics, TracingSink,
};

fn a_or_b() -> Ast {
    Ast::alt(vec![Ast::byte(b'a'), Ast::byte(b'b')])
}

/// `((a|b)*)(a(a|b)(a|b)(a|b))`: many states, captures on both halves.
fn suffix_pattern() -> Ast {
    Ast::cat(vec![
        Ast::cap(Ast::star(a_or_b())),
        Ast::cap(Ast::cat(vec![Ast::byte(b'a'), a_or_b(), a_or_b(), a_or_b()])),
    ])
}

/// `(([a-z]+)@([a-z]+)\.([a-z]+))*`-like nested groups.
fn nested_pattern() -> Ast {
    let word = || Ast::cap(Ast::plus(Ast::range(b'a', b'z')));
    Ast::star(Ast::cap(Ast::cat(vec![
        word(),
        Ast::byte(b'@'),
        word(),
        Ast::byte(b'.'),
        word(),
        Ast::opt(Ast::byte(b';')),
    ])))
}

fn bench_determinize(c: &mut Criterion) {
    let nfa = compile(&[suffix_pattern()]).unwrap();
    let variants = [
        ("determinize_gor1", Options::default()),
        (
            "determinize_gtop",
            Options::default().with_posix_closure(PosixClosure::Gtop),
        ),
        (
            "determinize_leftmost",
            Options::default().with_semantics(Semantics::Leftmost),
        ),
        (
            "determinize_tdfa0",
            Options::default().with_lookahead(false),
        ),
    ];
    for (name, opts) in variants {
        c.bench_function(name, |b| {
            b.iter(|| determinize(black_box(&nfa), &opts, &mut TracingSink).unwrap())
        });
    }
}

fn bench_nested_determinize(c: &mut Criterion) {
    let nfa = compile(&[nested_pattern()]).unwrap();
    let opts = Options::default();
    c.bench_function("determinize_nested", |b| {
        b.iter(|| determinize(black_box(&nfa), &opts, &mut TracingSink).unwrap())
    });
}

fn bench_match(c: &mut Criterion) {
    let re = Regex::new(&nested_pattern(), Options::default()).unwrap();
    let input = "alice@example.com;bob@example.org;carol@example.net".repeat(20);
    let mut pmatch = vec![RegMatch::UNSET; re.nsub() + 1];

    c.bench_function("match_dfa", |b| {
        b.iter(|| regexec_dfa(&re, black_box(input.as_bytes()), &mut pmatch).unwrap())
    });
    c.bench_function("match_nfa_posix", |b| {
        b.iter(|| regexec_nfa_posix(&re, black_box(input.as_bytes()), &mut pmatch).unwrap())
    });
    c.bench_function("match_nfa_posix_trie", |b| {
        b.iter(|| regexec_nfa_posix_trie(&re, black_box(input.as_bytes()), &mut pmatch).unwrap())
    });
}

criterion_group!(
    benches,
    bench_determinize,
    bench_nested_determinize,
    bench_match
);
criterion_main!(benches);
