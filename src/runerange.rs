//! Operations on rune ranges.
//!
//! A rune range is a sorted list of closed intervals over the Unicode
//! code-point space, e.g. `['0'..'9', 'a'..'z']` for the digits and the
//! lowercase latin letters. A single rune `a` is the degenerate pair
//! `['a'..'a']`. Pairs are ordered by their lower bound and never intersect.
//!
//! Negative runes never occur in real text; the pipeline reserves a handful
//! of negative sentinels for zero-width assertions and the lazy-quantifier
//! marker, each of which travels through a range as a degenerate pair.

use regex_syntax::hir::{ClassUnicode, ClassUnicodeRange};

/// A Unicode code point, or one of the negative pseudo-runes below.
pub type Rune = i32;

/// The last valid Unicode code point.
pub const RUNE_LAST: Rune = 0x0010_FFFF;

/// Zero-width assertion: start of the input.
pub const RUNE_BEGIN_TEXT: Rune = -100;
/// Zero-width assertion: end of the input.
pub const RUNE_END_TEXT: Rune = -200;
/// Zero-width assertion: start of the input or just after a newline.
pub const RUNE_BEGIN_LINE: Rune = -300;
/// Zero-width assertion: end of the input or just before a newline.
pub const RUNE_END_LINE: Rune = -400;
/// Zero-width assertion: a word/non-word transition.
pub const RUNE_WORD_BOUNDARY: Rune = -500;
/// Zero-width assertion: no word/non-word transition.
pub const RUNE_NO_WORD_BOUNDARY: Rune = -600;
/// Marker for a lazy-quantifier choice point; resolved by the generated
/// matcher's backtracking stack, never by consuming input.
pub const RUNE_LAZY: Rune = -700;

/// A closed interval of runes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunePair {
    pub lo: Rune,
    pub hi: Rune,
}

impl RunePair {
    pub const fn new(lo: Rune, hi: Rune) -> RunePair {
        return RunePair { lo, hi };
    }

    pub const fn single(r: Rune) -> RunePair {
        return RunePair { lo: r, hi: r };
    }

    /// Pseudo-runes are negative and only ever appear as degenerate pairs.
    pub const fn is_pseudo(&self) -> bool {
        return self.lo < 0;
    }
}

/// Returns `true` if the rune is in the range.
pub fn contains_rune(ranges: &[RunePair], r: Rune) -> bool {
    return ranges.iter().any(|p| r >= p.lo && r <= p.hi);
}

/// Returns `true` if the range `a` contains the range `b`, i.e. every pair
/// of `b` lies wholly inside some pair of `a`.
pub fn contains(a: &[RunePair], b: &[RunePair]) -> bool {
    return b
        .iter()
        .all(|bp| a.iter().any(|ap| bp.lo >= ap.lo && bp.hi <= ap.hi));
}

/// Adds a single rune to the range in place, keeping it canonical: an
/// adjacent interval is extended (merging with its neighbour when the gap
/// closes), otherwise a new degenerate pair is spliced in at its position.
pub fn add(ranges: &mut Vec<RunePair>, r: Rune) {
    if ranges.is_empty() {
        ranges.push(RunePair::single(r));
        return;
    }

    let mut i = 0;
    while i < ranges.len() && r >= ranges[i].lo {
        if r == ranges[i].hi + 1 {
            if i + 1 < ranges.len() && r + 1 == ranges[i + 1].lo {
                ranges[i].hi = ranges[i + 1].hi;
                ranges.remove(i + 1);
                return;
            }
            ranges[i].hi += 1;
            return;
        }
        if r <= ranges[i].hi {
            return;
        }
        i += 1;
    }
    if i >= ranges.len() {
        ranges.push(RunePair::single(r));
    } else if r == ranges[i].lo - 1 {
        ranges[i].lo -= 1;
    } else {
        ranges.insert(i, RunePair::single(r));
    }
}

/// Returns a fresh range containing all the runes of `a` and `b`. Neither
/// input is modified.
pub fn sum(a: &[RunePair], b: &[RunePair]) -> Vec<RunePair> {
    if a.is_empty() {
        return b.to_vec();
    }
    if b.is_empty() {
        return a.to_vec();
    }

    let mut c = Vec::with_capacity(a.len() + b.len());
    c.extend_from_slice(a);
    c.extend_from_slice(b);
    c.sort_by_key(|p| p.lo);

    let mut d: Vec<RunePair> = Vec::with_capacity(c.len());
    d.push(c[0]);
    for p in &c[1..] {
        let tail = d.len() - 1;
        if p.lo <= d[tail].hi {
            if p.hi > d[tail].hi {
                d[tail].hi = p.hi;
            }
        } else {
            d.push(*p);
        }
    }

    return d;
}

/// Returns a fresh range containing all the runes of the original range plus
/// every member of each covered rune's simple case-folding orbit, so that
/// e.g. `a..z` picks up `A..Z` along with oddballs like the long s and the
/// Kelvin sign. The original range is not modified.
pub fn fold(ranges: &[RunePair]) -> Vec<RunePair> {
    if ranges.is_empty() {
        return Vec::new();
    }

    // Orbit walking is delegated to the Unicode tables that ship with the
    // pattern parser. Pairs are clipped to the two valid char planes around
    // the surrogate gap; surrogates have no orbit.
    let mut class_ranges = Vec::new();
    for p in ranges {
        if p.is_pseudo() {
            continue;
        }
        for (lo, hi) in [(p.lo, p.hi.min(0xD7FF)), (p.lo.max(0xE000), p.hi.min(RUNE_LAST))] {
            if lo > hi {
                continue;
            }
            if let (Some(start), Some(end)) = (char::from_u32(lo as u32), char::from_u32(hi as u32))
            {
                class_ranges.push(ClassUnicodeRange::new(start, end));
            }
        }
    }

    let mut class = ClassUnicode::new(class_ranges);
    class.case_fold_simple();
    let folded: Vec<RunePair> = class
        .ranges()
        .iter()
        .map(|r| RunePair::new(r.start() as Rune, r.end() as Rune))
        .collect();

    return sum(ranges, &folded);
}

/// Splits a collection of (possibly intersecting) ranges into disjoint
/// pairs so that every input range is a union of some of the pairs.
///
/// A work queue is seeded with every input pair. Each popped pair is scanned
/// against the accumulated result: an exact duplicate is dropped, a partial
/// overlap splits both pairs into left remainder, intersection, and right
/// remainder (fragments go back on the queue), and a pair with no overlap at
/// all is appended. Adjacent output pairs are deliberately not merged, since
/// distinct fragments may lead to different successor states downstream.
pub fn split(sets: &[&[RunePair]]) -> Vec<RunePair> {
    let mut queue: Vec<RunePair> = sets.iter().flat_map(|s| s.iter().copied()).collect();
    if queue.is_empty() {
        return Vec::new();
    }

    let mut result: Vec<RunePair> = Vec::with_capacity(queue.len());
    'outer: while let Some(p) = queue.pop() {
        let RunePair { lo: r0, hi: r1 } = p;

        for i in 0..result.len() {
            let q = result[i];
            if r0 == q.lo && r1 == q.hi {
                continue 'outer;
            }

            if r0 <= q.lo {
                if r1 >= q.lo {
                    if r1 <= q.hi {
                        if r0 <= q.lo - 1 {
                            queue.push(RunePair::new(r0, q.lo - 1));
                        }
                        queue.push(RunePair::new(q.lo, r1));
                        if r1 + 1 <= q.hi {
                            queue.push(RunePair::new(r1 + 1, q.hi));
                        }
                        result.remove(i);
                    } else {
                        if r0 <= q.lo - 1 {
                            queue.push(RunePair::new(r0, q.lo - 1));
                        }
                        if q.hi + 1 <= r1 {
                            queue.push(RunePair::new(q.hi + 1, r1));
                        }
                    }
                    continue 'outer;
                }
            } else if r1 >= q.hi {
                if r0 <= q.hi {
                    if q.lo <= r0 - 1 {
                        queue.push(RunePair::new(q.lo, r0 - 1));
                    }
                    queue.push(RunePair::new(r0, q.hi));
                    if q.hi + 1 <= r1 {
                        queue.push(RunePair::new(q.hi + 1, r1));
                    }
                    result.remove(i);
                    continue 'outer;
                }
            } else {
                // p sits strictly inside q
                if q.lo <= r0 - 1 {
                    queue.push(RunePair::new(q.lo, r0 - 1));
                }
                queue.push(p);
                if r1 + 1 <= q.hi {
                    queue.push(RunePair::new(r1 + 1, q.hi));
                }
                result.remove(i);
                continue 'outer;
            }
        }

        result.push(p);
    }

    result.sort_by_key(|p| p.lo);
    return result;
}
