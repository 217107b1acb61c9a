//! Conversion of ε-NFAs into deterministic finite automata.
//!
//! The classical powerset construction, adapted to interval-labelled edges:
//! every outgoing label of a state set is fragmented into disjoint pieces by
//! [`runerange::split`], and each piece leads to the union of ε-closures
//! behind the transitions whose label contains it. Zero-width pseudo-rune
//! pairs are never mixed into real-rune edge labels; each one travels as its
//! own edge so the emitter can dispatch on them separately.

use std::collections::HashMap;

use log::debug;

use crate::nfa::{self, Nfa};
use crate::runerange::{self, RunePair};

/// A DFA transition: either a set of real rune intervals (consuming a single
/// rune) or one pseudo pair (consuming nothing).
#[derive(Debug, Clone)]
pub struct Transition {
    pub ranges: Vec<RunePair>,
    pub to: usize,
}

/// A DFA state; its id is its index in [`Dfa::states`] and state 0 is the
/// start state. A state may transition to itself.
#[derive(Debug)]
pub struct State {
    pub is_final: bool,
    pub transitions: Vec<Transition>,
    /// Sorted, comma-separated ids of the NFA states in this state's
    /// ε-closure. Two distinct DFA states never share a label.
    pub label: String,
    closure: Vec<nfa::StateId>,
}

#[derive(Debug)]
pub struct Dfa {
    pub states: Vec<State>,
}

/// Runs the subset construction over `nfa`. The resulting automaton starts
/// at state 0; a state is final exactly when its ε-closure contains the
/// NFA's final state.
pub fn from_nfa(nfa: &Nfa) -> Dfa {
    let mut builder = Builder {
        nfa,
        states: Vec::new(),
        by_label: HashMap::new(),
        closure_cache: HashMap::new(),
    };
    let cls = builder.closure(nfa.start);
    let (start, _) = builder.state_for(cls);
    builder.construct(start);
    debug!("DFA with {} states", builder.states.len());
    return Dfa {
        states: builder.states,
    };
}

fn label_of(cls: &[nfa::StateId]) -> String {
    let mut label = String::new();
    for (i, id) in cls.iter().enumerate() {
        if i > 0 {
            label.push(',');
        }
        label.push_str(&id.to_string());
    }
    return label;
}

struct Builder<'a> {
    nfa: &'a Nfa,
    states: Vec<State>,
    by_label: HashMap<String, usize>,
    closure_cache: HashMap<nfa::StateId, Vec<nfa::StateId>>,
}

impl Builder<'_> {
    /// ε-closure of one NFA state: everything reachable through edges with
    /// an empty label, the state itself included. Sorted, deduplicated,
    /// cached per state.
    fn closure(&mut self, id: nfa::StateId) -> Vec<nfa::StateId> {
        if let Some(cls) = self.closure_cache.get(&id) {
            return cls.clone();
        }

        let mut seen = vec![false; self.nfa.states.len()];
        seen[id] = true;
        let mut stack = vec![id];
        let mut cls = Vec::new();
        while let Some(n) = stack.pop() {
            cls.push(n);
            for t in &self.nfa.states[n].transitions {
                if t.ranges.is_empty() && !seen[t.to] {
                    seen[t.to] = true;
                    stack.push(t.to);
                }
            }
        }
        cls.sort_unstable();

        self.closure_cache.insert(id, cls.clone());
        return cls;
    }

    /// Returns the state for a closure, creating it when its label is new.
    fn state_for(&mut self, cls: Vec<nfa::StateId>) -> (usize, bool) {
        let label = label_of(&cls);
        if let Some(&i) = self.by_label.get(&label) {
            return (i, false);
        }

        let is_final = cls.iter().any(|&n| self.nfa.states[n].is_final);
        self.states.push(State {
            is_final,
            transitions: Vec::new(),
            label: label.clone(),
            closure: cls,
        });
        let i = self.states.len() - 1;
        self.by_label.insert(label, i);
        return (i, true);
    }

    fn construct(&mut self, idx: usize) {
        let nfa = self.nfa;
        let cls = self.states[idx].closure.clone();

        let mut sets: Vec<&[RunePair]> = Vec::new();
        for &n in &cls {
            for t in &nfa.states[n].transitions {
                if !t.ranges.is_empty() {
                    sets.push(&t.ranges);
                }
            }
        }
        let pieces = runerange::split(&sets);

        let mut pseudo: Vec<(RunePair, usize)> = Vec::new();
        let mut real: Vec<(usize, Vec<RunePair>)> = Vec::new();
        for piece in pieces {
            let mut union: Vec<nfa::StateId> = Vec::new();
            for &n in &cls {
                for t in &nfa.states[n].transitions {
                    if !t.ranges.is_empty() && runerange::contains(&t.ranges, &[piece]) {
                        let cls = self.closure(t.to);
                        union.extend(cls);
                    }
                }
            }
            union.sort_unstable();
            union.dedup();

            let (target, created) = self.state_for(union);
            if created {
                self.construct(target);
            }

            if piece.is_pseudo() {
                pseudo.push((piece, target));
            } else {
                // re-unite the fragments leading to the same state
                match real.iter_mut().find(|(to, _)| *to == target) {
                    Some((_, ranges)) => *ranges = runerange::sum(ranges, &[piece]),
                    None => real.push((target, vec![piece])),
                }
            }
        }

        let mut transitions: Vec<Transition> = pseudo
            .into_iter()
            .map(|(p, to)| Transition {
                ranges: vec![p],
                to,
            })
            .collect();
        transitions.extend(real.into_iter().map(|(to, ranges)| Transition { ranges, to }));
        self.states[idx].transitions = transitions;
    }
}
