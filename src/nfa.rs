//! Construction of ε-NFAs from regular expressions.
//!
//! The surface syntax is handled by [`regex_syntax`]; this module lowers the
//! parsed HIR into a Thompson-style automaton whose edges carry rune ranges.
//! Zero-width assertions and lazy-quantifier choice points travel as
//! pseudo-rune edges so the subset construction can keep them apart from
//! input-consuming edges.

use std::collections::HashMap;

use log::debug;
use regex_syntax::hir::{Capture, Class, Hir, HirKind, Look, Repetition};

use crate::runerange::{
    Rune, RunePair, RUNE_BEGIN_LINE, RUNE_BEGIN_TEXT, RUNE_END_LINE, RUNE_END_TEXT, RUNE_LAZY,
    RUNE_NO_WORD_BOUNDARY, RUNE_WORD_BOUNDARY,
};
use crate::Error;

/// Index of a state in the automaton's arena.
pub type StateId = usize;

/// A transition taken when the next rune falls into `ranges`.
/// An empty range is an ε-transition and consumes nothing.
#[derive(Debug, Clone)]
pub struct Transition {
    pub ranges: Vec<RunePair>,
    pub to: StateId,
}

/// A single NFA state; its id is its index in [`Nfa::states`].
#[derive(Debug, Default)]
pub struct State {
    pub is_final: bool,
    pub transitions: Vec<Transition>,
}

/// An ε-NFA with one start state and one final state. All states live in a
/// flat arena and reference each other by index, so cycles (from `*` and
/// friends) never show up in the ownership graph.
#[derive(Debug)]
pub struct Nfa {
    pub states: Vec<State>,
    pub start: StateId,
    pub end: StateId,
}

impl Nfa {
    /// Builds the automaton for an already-simplified HIR.
    pub fn from_hir(hir: &Hir) -> Result<Nfa, Error> {
        let mut builder = Builder { states: Vec::new() };
        let (start, end) = builder.build(hir)?;
        builder.states[end].is_final = true;
        return Ok(Nfa {
            states: builder.states,
            start,
            end,
        });
    }
}

/// Parses a Perl-flavoured regular expression, simplifies bounded
/// repetition, and builds the ε-NFA.
pub fn parse(pattern: &str) -> Result<Nfa, Error> {
    let hir = regex_syntax::Parser::new().parse(pattern)?;
    let hir = simplify(&hir);
    let nfa = Nfa::from_hir(&hir)?;
    debug!("{pattern:?}: NFA with {} states", nfa.states.len());
    return Ok(nfa);
}

/// Rewrites `R{m,n}` in terms of concatenation and `?` (`a{2,4}` becomes
/// `aa(?:a(?:a)?)?`), preserving the greedy flag. Open-ended `R{m,}` repeats
/// are left intact; the builder expands them by cloning.
pub fn simplify(hir: &Hir) -> Hir {
    return match hir.kind() {
        HirKind::Concat(subs) => Hir::concat(subs.iter().map(simplify).collect()),
        HirKind::Alternation(subs) => Hir::alternation(subs.iter().map(simplify).collect()),
        HirKind::Capture(cap) => Hir::capture(Capture {
            index: cap.index,
            name: cap.name.clone(),
            sub: Box::new(simplify(&cap.sub)),
        }),
        HirKind::Repetition(rep) => {
            let sub = simplify(&rep.sub);
            match (rep.min, rep.max) {
                (0, Some(0)) => Hir::empty(),
                (1, Some(1)) => sub,
                (0, Some(1)) | (_, None) => {
                    Hir::repetition(Repetition {
                        min: rep.min,
                        max: rep.max,
                        greedy: rep.greedy,
                        sub: Box::new(sub),
                    })
                }
                (min, Some(max)) => {
                    let quest = |h: Hir| {
                        Hir::repetition(Repetition {
                            min: 0,
                            max: Some(1),
                            greedy: rep.greedy,
                            sub: Box::new(h),
                        })
                    };
                    let mut parts: Vec<Hir> = Vec::with_capacity(min as usize + 1);
                    for _ in 0..min {
                        parts.push(sub.clone());
                    }
                    if max > min {
                        let mut tail = quest(sub.clone());
                        for _ in 0..max - min - 1 {
                            tail = quest(Hir::concat(vec![sub.clone(), tail]));
                        }
                        parts.push(tail);
                    }
                    Hir::concat(parts)
                }
            }
        }
        _ => hir.clone(),
    };
}

fn look_name(look: Look) -> &'static str {
    return match look {
        Look::Start => "Start",
        Look::End => "End",
        Look::StartLF => "StartLF",
        Look::EndLF => "EndLF",
        Look::StartCRLF => "StartCRLF",
        Look::EndCRLF => "EndCRLF",
        Look::WordAscii => "WordAscii",
        Look::WordAsciiNegate => "WordAsciiNegate",
        Look::WordUnicode => "WordUnicode",
        Look::WordUnicodeNegate => "WordUnicodeNegate",
        _ => "WordHalfBoundary",
    };
}

fn class_ranges(class: &Class) -> Vec<RunePair> {
    return match class {
        Class::Unicode(cls) => cls
            .ranges()
            .iter()
            .map(|r| RunePair::new(r.start() as Rune, r.end() as Rune))
            .collect(),
        Class::Bytes(cls) => cls
            .ranges()
            .iter()
            .map(|r| RunePair::new(r.start() as Rune, r.end() as Rune))
            .collect(),
    };
}

struct Builder {
    states: Vec<State>,
}

impl Builder {
    fn node(&mut self) -> StateId {
        self.states.push(State::default());
        return self.states.len() - 1;
    }

    fn epsilon(&mut self, from: StateId, to: StateId) {
        self.states[from].transitions.push(Transition {
            ranges: Vec::new(),
            to,
        });
    }

    fn edge(&mut self, from: StateId, to: StateId, ranges: Vec<RunePair>) {
        self.states[from].transitions.push(Transition { ranges, to });
    }

    fn pseudo(&mut self, from: StateId, to: StateId, r: Rune) {
        self.edge(from, to, vec![RunePair::single(r)]);
    }

    /// Structural recursion over the HIR; returns the fragment's
    /// `(begin, end)` states.
    fn build(&mut self, hir: &Hir) -> Result<(StateId, StateId), Error> {
        return match hir.kind() {
            HirKind::Empty => {
                let n = self.node();
                Ok((n, n))
            }
            HirKind::Literal(lit) => {
                let text = std::str::from_utf8(&lit.0)
                    .map_err(|_| Error::UnsupportedOp("non-UTF-8 literal"))?;
                let begin = self.node();
                let mut cur = begin;
                for c in text.chars() {
                    let next = self.node();
                    self.edge(cur, next, vec![RunePair::single(c as Rune)]);
                    cur = next;
                }
                Ok((begin, cur))
            }
            HirKind::Class(class) => {
                let ranges = class_ranges(class);
                let begin = self.node();
                let end = self.node();
                // an empty class matches nothing; leave the fragment unwired
                if !ranges.is_empty() {
                    self.edge(begin, end, ranges);
                }
                Ok((begin, end))
            }
            HirKind::Look(look) => {
                let r = match look {
                    Look::Start => RUNE_BEGIN_TEXT,
                    Look::End => RUNE_END_TEXT,
                    Look::StartLF => RUNE_BEGIN_LINE,
                    Look::EndLF => RUNE_END_LINE,
                    Look::WordAscii | Look::WordUnicode => RUNE_WORD_BOUNDARY,
                    Look::WordAsciiNegate | Look::WordUnicodeNegate => RUNE_NO_WORD_BOUNDARY,
                    other => return Err(Error::UnsupportedOp(look_name(*other))),
                };
                let begin = self.node();
                let end = self.node();
                self.pseudo(begin, end, r);
                Ok((begin, end))
            }
            HirKind::Capture(cap) => self.build(&cap.sub),
            HirKind::Repetition(rep) => self.build_repetition(rep),
            HirKind::Concat(subs) => {
                let mut begin = None;
                let mut cur: Option<StateId> = None;
                for sub in subs {
                    let (b, e) = self.build(sub)?;
                    match cur {
                        Some(c) => self.epsilon(c, b),
                        None => begin = Some(b),
                    }
                    cur = Some(e);
                }
                match (begin, cur) {
                    (Some(b), Some(e)) => Ok((b, e)),
                    _ => {
                        let n = self.node();
                        Ok((n, n))
                    }
                }
            }
            HirKind::Alternation(subs) => {
                let begin = self.node();
                let end = self.node();
                for sub in subs {
                    let (b, e) = self.build(sub)?;
                    self.epsilon(begin, b);
                    self.epsilon(e, end);
                }
                Ok((begin, end))
            }
        };
    }

    /// Star, plus, quest, and open-ended repeats.
    ///
    /// Greedy forks order the ε-edge into the sub-expression before the
    /// ε-edge to the exit. Lazy forks keep only the exit ε-edge and reach
    /// the sub-expression through a `RUNE_LAZY` pseudo-edge: the deprioritised
    /// branch must not be absorbed into the fork's ε-closure, or the DFA
    /// would keep preferring the long match. The generated matcher records
    /// the choice point and retries the marked branch when the short path
    /// fails.
    fn build_repetition(&mut self, rep: &Repetition) -> Result<(StateId, StateId), Error> {
        return match (rep.min, rep.max) {
            (0, Some(1)) => {
                let begin = self.node();
                let end = self.node();
                let (b, e) = self.build(&rep.sub)?;
                if rep.greedy {
                    self.epsilon(begin, b);
                    self.epsilon(begin, end);
                } else {
                    self.epsilon(begin, end);
                    self.pseudo(begin, b, RUNE_LAZY);
                }
                self.epsilon(e, end);
                Ok((begin, end))
            }
            (0, None) => {
                let begin = self.node();
                let end = self.node();
                let (b, e) = self.build(&rep.sub)?;
                if rep.greedy {
                    self.epsilon(begin, b);
                    self.epsilon(begin, end);
                    self.epsilon(e, b);
                    self.epsilon(e, end);
                } else {
                    self.epsilon(begin, end);
                    self.pseudo(begin, b, RUNE_LAZY);
                    self.epsilon(e, end);
                    self.pseudo(e, b, RUNE_LAZY);
                }
                Ok((begin, end))
            }
            (1, None) => {
                let begin = self.node();
                let end = self.node();
                let (b, e) = self.build(&rep.sub)?;
                self.epsilon(begin, b);
                if rep.greedy {
                    self.epsilon(e, b);
                    self.epsilon(e, end);
                } else {
                    self.epsilon(e, end);
                    self.pseudo(e, b, RUNE_LAZY);
                }
                Ok((begin, end))
            }
            (min, None) => {
                // R{m,}: m deep clones chained linearly, then a star-style
                // fork around the original fragment.
                let (b, e) = self.build(&rep.sub)?;
                let mut begin = None;
                let mut prev_end: Option<StateId> = None;
                for _ in 0..min {
                    let (cb, ce) = self.clone_fragment(b, e);
                    match prev_end {
                        Some(pe) => self.epsilon(pe, cb),
                        None => begin = Some(cb),
                    }
                    prev_end = Some(ce);
                }
                let fork = self.node();
                let end = self.node();
                if let Some(pe) = prev_end {
                    self.epsilon(pe, fork);
                }
                let begin = begin.unwrap_or(fork);
                if rep.greedy {
                    self.epsilon(fork, b);
                    self.epsilon(fork, end);
                    self.epsilon(e, b);
                    self.epsilon(e, end);
                } else {
                    self.epsilon(fork, end);
                    self.pseudo(fork, b, RUNE_LAZY);
                    self.epsilon(e, end);
                    self.pseudo(e, b, RUNE_LAZY);
                }
                Ok((begin, end))
            }
            _ => Err(Error::UnsupportedOp("bounded repetition")),
        };
    }

    /// Deep-copies the sub-graph reachable from `start` with fresh ids,
    /// preserving shape and final flags. Back-edges are patched through the
    /// old-id → new-id map on the second pass.
    fn clone_fragment(&mut self, start: StateId, end: StateId) -> (StateId, StateId) {
        let mut map: HashMap<StateId, StateId> = HashMap::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if map.contains_key(&id) {
                continue;
            }
            let targets: Vec<StateId> = self.states[id].transitions.iter().map(|t| t.to).collect();
            let fresh = self.node();
            self.states[fresh].is_final = self.states[id].is_final;
            map.insert(id, fresh);
            stack.extend(targets);
        }
        for (&old, &new) in &map {
            let cloned: Vec<Transition> = self.states[old]
                .transitions
                .iter()
                .map(|t| Transition {
                    ranges: t.ranges.clone(),
                    to: map[&t.to],
                })
                .collect();
            self.states[new].transitions = cloned;
        }
        return (map[&start], map[&end]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_pseudo_edge(nfa: &Nfa, r: Rune) -> bool {
        return nfa.states.iter().any(|s| {
            s.transitions
                .iter()
                .any(|t| t.ranges.len() == 1 && t.ranges[0] == RunePair::single(r))
        });
    }

    #[test]
    fn literal_chain() {
        let nfa = parse("abc").unwrap();
        assert_eq!(nfa.states.len(), 4);
        assert!(nfa.states[nfa.end].is_final);
        assert!(!nfa.states[nfa.start].is_final);
        // every edge is a singleton rune pair
        for s in &nfa.states {
            for t in &s.transitions {
                assert_eq!(t.ranges.len(), 1);
                assert_eq!(t.ranges[0].lo, t.ranges[0].hi);
            }
        }
    }

    #[test]
    fn char_class_edge() {
        let nfa = parse("[a-z0-9]").unwrap();
        assert_eq!(nfa.states.len(), 2);
        let t = &nfa.states[nfa.start].transitions[0];
        assert_eq!(
            t.ranges,
            vec![
                RunePair::new('0' as Rune, '9' as Rune),
                RunePair::new('a' as Rune, 'z' as Rune),
            ],
        );
    }

    #[test]
    fn anchors_become_pseudo_edges() {
        let nfa = parse("^a$").unwrap();
        assert!(has_pseudo_edge(&nfa, RUNE_BEGIN_TEXT));
        assert!(has_pseudo_edge(&nfa, RUNE_END_TEXT));

        let nfa = parse(r"(?m)^a$").unwrap();
        assert!(has_pseudo_edge(&nfa, RUNE_BEGIN_LINE));
        assert!(has_pseudo_edge(&nfa, RUNE_END_LINE));

        let nfa = parse(r"a\b").unwrap();
        assert!(has_pseudo_edge(&nfa, RUNE_WORD_BOUNDARY));
        let nfa = parse(r"a\B").unwrap();
        assert!(has_pseudo_edge(&nfa, RUNE_NO_WORD_BOUNDARY));
    }

    #[test]
    fn lazy_quantifiers_carry_the_marker() {
        for pattern in ["a*?", "a+?", "a??", "a{2,}?"] {
            let nfa = parse(pattern).unwrap();
            assert!(has_pseudo_edge(&nfa, RUNE_LAZY), "no lazy marker in {pattern}");
        }
        for pattern in ["a*", "a+", "a?", "a{2,}"] {
            let nfa = parse(pattern).unwrap();
            assert!(!has_pseudo_edge(&nfa, RUNE_LAZY), "stray lazy marker in {pattern}");
        }
    }

    #[test]
    fn simplify_eliminates_bounded_repeats() {
        fn bounded(hir: &Hir) -> bool {
            return match hir.kind() {
                HirKind::Repetition(rep) => {
                    matches!(rep.max, Some(n) if n > 1 || rep.min != 0) || bounded(&rep.sub)
                }
                HirKind::Concat(subs) | HirKind::Alternation(subs) => subs.iter().any(bounded),
                HirKind::Capture(cap) => bounded(&cap.sub),
                _ => false,
            };
        }

        for pattern in ["a{2,4}", "a{1,3}", "(ab){3}", "a{0,3}", "(a|b){2,2}"] {
            let hir = regex_syntax::Parser::new().parse(pattern).unwrap();
            assert!(!bounded(&simplify(&hir)), "{pattern} kept a bounded repeat");
        }
    }

    #[test]
    fn unsimplified_bounded_repeat_is_rejected() {
        let hir = regex_syntax::Parser::new().parse("a{2,4}").unwrap();
        let err = Nfa::from_hir(&hir).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOp(_)));
    }

    #[test]
    fn open_repeat_clones_the_fragment() {
        // sub fragment (2 states) + two clones (4) + fork and exit (2)
        let nfa = parse("a{2,}").unwrap();
        assert_eq!(nfa.states.len(), 8);
        assert!(nfa.states[nfa.end].is_final);

        // the two required copies plus the looped original each carry an
        // 'a' edge
        let a_edges = nfa
            .states
            .iter()
            .flat_map(|s| &s.transitions)
            .filter(|t| t.ranges == vec![RunePair::single('a' as Rune)])
            .count();
        assert_eq!(a_edges, 3);
    }

    #[test]
    fn captures_are_unwrapped() {
        let plain = parse("ab").unwrap();
        let captured = parse("(ab)").unwrap();
        assert_eq!(plain.states.len(), captured.states.len());

        let plain = parse("a").unwrap();
        let captured = parse("(a)").unwrap();
        assert_eq!(plain.states.len(), captured.states.len());
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(matches!(parse("(a"), Err(Error::Parse(_))));
        assert!(matches!(parse("[z-a]"), Err(Error::Parse(_))));
    }
}
