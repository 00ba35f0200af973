//! POSIX precedence over tag histories.
//!
//! Two items competing for one NFA state are compared by walking their
//! histories back to the common ancestor. The longest-match priority of a
//! branch is the minimal height of the tags seen on its unshared part; the
//! higher priority wins. Ties fall back to the leftmost order, either from
//! the precedence table of the previous kernel (different origins) or from
//! the last diverging tags (same origin, a fork frame).
//!
//! Both priorities and the leftmost decision of a pair are packed in one
//! `i32`: the low 30 bits hold the sign-extended longest priority, the high
//! 2 bits the leftmost order (-1, 0, 1).

use std::cmp::Ordering;

use super::closure::Item;
use super::history::{HistIdx, TagHistory};
use crate::nfa::{Tag, TagInfo};
use crate::{Error, Result};

/// Largest longest-match priority; 29 bits so that it stays positive.
pub const MAX_RHO: i32 = 0x1fff_ffff;

pub fn pack(longest: i32, leftmost: i32) -> i32 {
    let packed = ((longest as u32 & 0x3fff_ffff) | ((leftmost as u32) << 30)) as i32;
    debug_assert!(unpack_longest(packed) == longest && unpack_leftmost(packed) == leftmost);
    packed
}

#[inline]
pub fn unpack_longest(packed: i32) -> i32 {
    (((packed as u32) << 2) as i32) >> 2
}

#[inline]
pub fn unpack_leftmost(packed: i32) -> i32 {
    packed >> 30
}

/// Everything a comparison reads.
pub struct PrecView<'a> {
    pub tags: &'a [Tag],
    pub history: &'a TagHistory,
    /// Table of the kernel the compared items originate from.
    pub table: &'a [i32],
    pub size: usize,
}

/// Outcome of one comparison; `Less` means the first item wins.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Prec {
    pub order: Ordering,
    pub rho1: i32,
    pub rho2: i32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct PrecStats {
    pub calls: u64,
    pub steps: u64,
}

fn ordering(v: i32) -> Ordering {
    v.cmp(&0)
}

fn as_i32(o: Ordering) -> i32 {
    match o {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Compare the branch `(idx1, orig1)` against `(idx2, orig2)`.
pub fn precedence(
    view: &PrecView<'_>,
    (idx1, orig1): (HistIdx, u32),
    (idx2, orig2): (HistIdx, u32),
    stats: &mut PrecStats,
) -> Result<Prec> {
    stats.calls += 1;

    if idx1 == idx2 && orig1 == orig2 {
        return Ok(Prec {
            order: Ordering::Equal,
            rho1: MAX_RHO,
            rho2: MAX_RHO,
        });
    }

    let fork_frame = orig1 == orig2;
    let (prec, mut prec1, mut prec2) = if fork_frame {
        (0, MAX_RHO, MAX_RHO)
    } else {
        let n = view.size;
        let (o1, o2) = (orig1 as usize, orig2 as usize);
        let p12 = view.table[o1 * n + o2];
        let p21 = view.table[o2 * n + o1];
        (unpack_leftmost(p12), unpack_longest(p12), unpack_longest(p21))
    };

    let hist = view.history;
    let height = |info: TagInfo| view.tags[info.tag()].height;

    let mut info1 = TagInfo::default();
    let mut info2 = TagInfo::default();
    let (mut i1, mut i2) = (idx1, idx2);
    while i1 != i2 {
        if i1 > i2 {
            info1 = hist.info(i1);
            prec1 = prec1.min(height(info1));
            i1 = hist.pred(i1);
        } else {
            info2 = hist.info(i2);
            prec2 = prec2.min(height(info2));
            i2 = hist.pred(i2);
        }
        stats.steps += 1;
    }
    if !i1.is_root() {
        if !fork_frame {
            return Err(Error::SharedPrefixAcrossOrigins);
        }
        let h = height(hist.info(i1));
        prec1 = prec1.min(h);
        prec2 = prec2.min(h);
    }

    let done = |order| {
        Ok(Prec {
            order,
            rho1: prec1,
            rho2: prec2,
        })
    };

    // longest
    if prec1 != prec2 {
        return done(prec2.cmp(&prec1));
    }
    if !fork_frame {
        return done(ordering(prec));
    }

    // leftmost
    if i1 == idx1 && i2 == idx2 {
        return done(Ordering::Equal);
    }
    if i1 == idx1 {
        return done(Ordering::Less);
    }
    if i2 == idx2 {
        return done(Ordering::Greater);
    }

    let (tag1, tag2) = (info1.tag(), info2.tag());
    match (info1.is_closing(), info2.is_closing()) {
        (true, true) => return Err(Error::BothClosing { tag1, tag2 }),
        (true, false) => return done(Ordering::Less),
        (false, true) => return done(Ordering::Greater),
        (false, false) => {}
    }
    match (info1.neg(), info2.neg()) {
        (true, true) => Err(Error::BothNegative { tag1, tag2 }),
        (true, false) => done(Ordering::Greater),
        (false, true) => done(Ordering::Less),
        // Alternatives and rules start with distinct opening tags.
        (false, false) if tag1 != tag2 => done(tag1.cmp(&tag2)),
        (false, false) => Err(Error::UnresolvedTie { tag1, tag2 }),
    }
}

/// Fill `out` with the packed precedence table of `items`.
pub fn build_table<I: Item>(
    view: &PrecView<'_>,
    items: &[I],
    stats: &mut PrecStats,
    out: &mut Vec<i32>,
) -> Result<()> {
    let n = items.len();
    out.clear();
    out.resize(n * n, 0);
    for i in 0..n {
        let x = (items[i].look(), items[i].origin());
        for j in i + 1..n {
            let y = (items[j].look(), items[j].origin());
            let p = precedence(view, x, y, stats)?;
            let l = as_i32(p.order);
            out[i * n + j] = pack(p.rho1, l);
            out[j * n + i] = pack(p.rho2, -l);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::determinize::closure::ClosItem;
    use crate::determinize::history::ROOT;
    use crate::nfa::StateId;
    use proptest::prelude::*;

    fn flat_tags(n: usize) -> Vec<Tag> {
        (0..n)
            .map(|i| Tag {
                capture: i / 2,
                closing: i % 2 == 1,
                height: 0,
            })
            .collect()
    }

    fn view<'a>(tags: &'a [Tag], history: &'a TagHistory) -> PrecView<'a> {
        PrecView {
            tags,
            history,
            table: &[],
            size: 0,
        }
    }

    fn cmp(v: &PrecView<'_>, x: HistIdx, y: HistIdx) -> Result<Prec> {
        precedence(v, (x, 0), (y, 0), &mut PrecStats::default())
    }

    #[test]
    fn test_pack_examples() {
        assert_eq!(unpack_longest(pack(MAX_RHO, -1)), MAX_RHO);
        assert_eq!(unpack_leftmost(pack(MAX_RHO, -1)), -1);
        assert_eq!(unpack_longest(pack(-5, 1)), -5);
        assert_eq!(unpack_leftmost(pack(-5, 1)), 1);
        assert_eq!(pack(0, 0), 0);
    }

    #[test]
    fn test_identical_histories() {
        let tags = flat_tags(2);
        let mut h = TagHistory::new();
        let a = h.push(ROOT, 0, TagInfo::new(0, false), 0);
        let p = cmp(&view(&tags, &h), a, a).unwrap();
        assert_eq!(p.order, Ordering::Equal);
        assert_eq!((p.rho1, p.rho2), (MAX_RHO, MAX_RHO));
    }

    #[test]
    fn test_longest_prefers_higher_priority() {
        let mut tags = flat_tags(4);
        tags[2].height = 1;
        tags[3].height = 1;
        let mut h = TagHistory::new();
        let x = h.push(ROOT, 0, TagInfo::new(2, false), 0);
        let y = h.push(ROOT, 0, TagInfo::new(1, false), 0);
        let v = view(&tags, &h);

        let p = cmp(&v, x, y).unwrap();
        assert_eq!(p.order, Ordering::Less);
        assert_eq!((p.rho1, p.rho2), (1, 0));
        assert_eq!(cmp(&v, y, x).unwrap().order, Ordering::Greater);
    }

    #[test]
    fn test_fork_shorter_wins() {
        let tags = flat_tags(2);
        let mut h = TagHistory::new();
        let a = h.push(ROOT, 0, TagInfo::new(0, false), 0);
        let b = h.push(a, 0, TagInfo::new(1, false), 0);
        let v = view(&tags, &h);
        assert_eq!(cmp(&v, a, b).unwrap().order, Ordering::Less);
        assert_eq!(cmp(&v, b, a).unwrap().order, Ordering::Greater);
    }

    #[test]
    fn test_fork_closing_beats_opening() {
        let tags = flat_tags(4);
        let mut h = TagHistory::new();
        let a = h.push(ROOT, 0, TagInfo::new(0, false), 0);
        let x = h.push(a, 0, TagInfo::new(1, false), 0);
        let y = h.push(a, 0, TagInfo::new(2, false), 0);
        let v = view(&tags, &h);
        assert_eq!(cmp(&v, x, y).unwrap().order, Ordering::Less);
        assert_eq!(cmp(&v, y, x).unwrap().order, Ordering::Greater);
    }

    #[test]
    fn test_fork_positive_beats_negated() {
        let tags = flat_tags(4);
        let mut h = TagHistory::new();
        let x = h.push(ROOT, 0, TagInfo::new(2, true), 0);
        let y = h.push(ROOT, 0, TagInfo::new(0, false), 0);
        let v = view(&tags, &h);
        assert_eq!(cmp(&v, x, y).unwrap().order, Ordering::Greater);
        assert_eq!(cmp(&v, y, x).unwrap().order, Ordering::Less);
    }

    #[test]
    fn test_fork_smaller_positive_tag_wins() {
        let tags = flat_tags(4);
        let mut h = TagHistory::new();
        let x = h.push(ROOT, 0, TagInfo::new(0, false), 0);
        let y = h.push(ROOT, 0, TagInfo::new(2, false), 0);
        assert_eq!(cmp(&view(&tags, &h), x, y).unwrap().order, Ordering::Less);
    }

    #[test]
    fn test_invariant_violations_are_errors() {
        let tags = flat_tags(4);
        let mut h = TagHistory::new();
        let c1 = h.push(ROOT, 0, TagInfo::new(1, false), 0);
        let c3 = h.push(ROOT, 0, TagInfo::new(3, false), 0);
        let n0 = h.push(ROOT, 0, TagInfo::new(0, true), 0);
        let n2 = h.push(ROOT, 0, TagInfo::new(2, true), 0);
        let p0 = h.push(ROOT, 0, TagInfo::new(0, false), 0);
        let p0b = h.push(ROOT, 0, TagInfo::new(0, false), 0);
        let v = view(&tags, &h);

        assert_eq!(cmp(&v, c1, c3), Err(Error::BothClosing { tag1: 1, tag2: 3 }));
        assert_eq!(cmp(&v, n0, n2), Err(Error::BothNegative { tag1: 0, tag2: 2 }));
        assert_eq!(cmp(&v, p0, p0b), Err(Error::UnresolvedTie { tag1: 0, tag2: 0 }));
    }

    #[test]
    fn test_different_origins_read_table() {
        let tags = flat_tags(2);
        let h = TagHistory::new();
        let table = [0, pack(5, -1), pack(5, 1), 0];
        let v = PrecView {
            tags: &tags,
            history: &h,
            table: &table,
            size: 2,
        };
        let mut stats = PrecStats::default();
        let p = precedence(&v, (ROOT, 0), (ROOT, 1), &mut stats).unwrap();
        assert_eq!(p.order, Ordering::Less);
        assert_eq!((p.rho1, p.rho2), (5, 5));
        let p = precedence(&v, (ROOT, 1), (ROOT, 0), &mut stats).unwrap();
        assert_eq!(p.order, Ordering::Greater);
        assert_eq!(stats.calls, 2);
    }

    #[test]
    fn test_shared_prefix_across_origins_is_an_error() {
        let tags = flat_tags(2);
        let mut h = TagHistory::new();
        let a = h.push(ROOT, 0, TagInfo::new(0, false), 0);
        let b = h.push(a, 0, TagInfo::new(1, false), 1);
        let table = [0; 4];
        let v = PrecView {
            tags: &tags,
            history: &h,
            table: &table,
            size: 2,
        };
        let r = precedence(&v, (a, 0), (b, 1), &mut PrecStats::default());
        assert_eq!(r, Err(Error::SharedPrefixAcrossOrigins));
    }

    fn item(state: u32, origin: u32, tlook: HistIdx) -> ClosItem {
        ClosItem {
            state: StateId::new(state),
            origin,
            tvers: 0,
            ttran: ROOT,
            tlook,
        }
    }

    proptest! {
        #[test]
        fn prop_cross_origin_table_is_antisymmetric(
            heights in prop::collection::vec(0i32..3, 4),
            paths in prop::collection::vec(
                prop::collection::vec((0usize..8, any::<bool>()), 0..4),
                2..5,
            ),
        ) {
            let tags: Vec<Tag> = (0..8)
                .map(|i| Tag { capture: i / 2, closing: i % 2 == 1, height: heights[i / 2] })
                .collect();
            let n = paths.len();
            let mut stats = PrecStats::default();

            // Previous kernel: one fork per item, each on its own opening tag.
            let mut prev_hist = TagHistory::new();
            let prev: Vec<ClosItem> = (0..n)
                .map(|k| {
                    let idx = prev_hist.push(ROOT, 0, TagInfo::new(2 * k, false), 0);
                    item(k as u32, 0, idx)
                })
                .collect();
            let mut prev_table = Vec::new();
            build_table(&view(&tags, &prev_hist), &prev, &mut stats, &mut prev_table).unwrap();

            // Current items come from distinct origins, each on a fresh path.
            let mut h = TagHistory::new();
            let items: Vec<ClosItem> = paths
                .iter()
                .enumerate()
                .map(|(i, path)| {
                    let idx = path.iter().fold(ROOT, |pred, &(tag, neg)| {
                        h.push(pred, 1, TagInfo::new(tag, neg), (n - 1 - i) as u32)
                    });
                    item(i as u32, (n - 1 - i) as u32, idx)
                })
                .collect();
            let v = PrecView { tags: &tags, history: &h, table: &prev_table, size: n };
            let mut table = Vec::new();
            build_table(&v, &items, &mut stats, &mut table).unwrap();

            for i in 0..n {
                prop_assert_eq!(table[i * n + i], 0);
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let l = unpack_leftmost(table[i * n + j]);
                    prop_assert_ne!(l, 0);
                    prop_assert_eq!(l, -unpack_leftmost(table[j * n + i]));

                    let x = (items[i].tlook, items[i].origin);
                    let y = (items[j].tlook, items[j].origin);
                    let p = precedence(&v, x, y, &mut stats).unwrap();
                    let q = precedence(&v, y, x, &mut stats).unwrap();
                    prop_assert_ne!(p.order, Ordering::Equal);
                    prop_assert_eq!(p.order, q.order.reverse());
                    prop_assert_eq!((p.rho1, p.rho2), (q.rho2, q.rho1));
                }
            }
        }

        #[test]
        fn prop_pack_round_trip(longest in -(1i32 << 29)..(1i32 << 29), leftmost in -1i32..=1) {
            let p = pack(longest, leftmost);
            prop_assert_eq!(unpack_longest(p), longest);
            prop_assert_eq!(unpack_leftmost(p), leftmost);
        }

        #[test]
        fn prop_fork_precedence_is_antisymmetric(
            edges in prop::collection::vec((any::<prop::sample::Index>(), 0usize..6, any::<bool>()), 1..24),
            heights in prop::collection::vec(0i32..3, 3),
            a in any::<prop::sample::Index>(),
            b in any::<prop::sample::Index>(),
        ) {
            let tags: Vec<Tag> = (0..6)
                .map(|i| Tag { capture: i / 2, closing: i % 2 == 1, height: heights[i / 2] })
                .collect();
            let mut h = TagHistory::new();
            let mut nodes = vec![ROOT];
            for (p, tag, neg) in &edges {
                let pred = nodes[p.index(nodes.len())];
                nodes.push(h.push(pred, 0, TagInfo::new(*tag, *neg), 0));
            }
            let x = nodes[a.index(nodes.len())];
            let y = nodes[b.index(nodes.len())];
            let v = view(&tags, &h);

            match (cmp(&v, x, y), cmp(&v, y, x)) {
                (Ok(p), Ok(q)) => {
                    prop_assert_eq!(p.order, q.order.reverse());
                    prop_assert_eq!((p.rho1, p.rho2), (q.rho2, q.rho1));
                }
                (Err(_), Err(_)) => {}
                (p, q) => prop_assert!(false, "asymmetric outcome {:?} / {:?}", p, q),
            }
        }
    }
}
