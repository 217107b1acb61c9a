//! Generation of Rust source code from deterministic finite automata.
//!
//! The DFA is rendered as a `loop { match state { .. } }` machine, the
//! closest Rust relative of a labelled goto layout: a jump to state `N`
//! becomes `state = N; continue;` and the backtrack section sits in the
//! catch-all arm. The emitted function depends on nothing but core.

use log::debug;
use proc_macro2::{Literal, TokenStream};
use quote::quote;

use crate::dfa::{Dfa, Transition};
use crate::runerange::{
    RunePair, RUNE_BEGIN_LINE, RUNE_BEGIN_TEXT, RUNE_END_LINE, RUNE_END_TEXT, RUNE_LAST,
    RUNE_LAZY, RUNE_NO_WORD_BOUNDARY, RUNE_WORD_BOUNDARY,
};
use crate::{Error, InputKind};

const HEADER: &str = "// Code generated by re2dfa. DO NOT EDIT.\n\n";

/// Emits a matcher function for `dfa` as formatted Rust source.
///
/// The function lives in `pub mod <module>`, is named `<function>`, takes
/// `&str` or `&[u8]` depending on `kind`, and returns the byte length of the
/// longest matched prefix, `-1` if none.
pub fn generate(dfa: &Dfa, module: &str, function: &str, kind: InputKind) -> Result<String, Error> {
    let module_ident: syn::Ident =
        syn::parse_str(module).map_err(|_| Error::InvalidIdentifier(module.to_string()))?;
    let fn_ident: syn::Ident =
        syn::parse_str(function).map_err(|_| Error::InvalidIdentifier(function.to_string()))?;

    let emitter = Emitter::new(dfa);
    let matcher = emitter.matcher_fn(&fn_ident, kind);
    let helpers = emitter.helpers();

    let source = quote! {
        pub mod #module_ident {
            #matcher
            #helpers
        }
    };
    let file: syn::File = syn::parse2(source)?;

    debug!(
        "emitted {module}::{} ({} states)",
        fn_ident,
        dfa.states.len(),
    );
    let mut out = String::from(HEADER);
    out.push_str(&prettyplease::unparse(&file));
    return Ok(out);
}

fn is_lazy_edge(t: &Transition) -> bool {
    return t.ranges.len() == 1 && t.ranges[0].lo == RUNE_LAZY;
}

fn is_pseudo_edge(t: &Transition) -> bool {
    return t.ranges.len() == 1 && t.ranges[0].is_pseudo();
}

struct Emitter<'a> {
    dfa: &'a Dfa,
    /// States with outgoing edges, in id order; only these get a match arm.
    live: Vec<usize>,
    has_lazy: bool,
    needs_decode: bool,
    uses_word: bool,
    uses_prev_rune: bool,
    updates_end: bool,
}

impl<'a> Emitter<'a> {
    fn new(dfa: &'a Dfa) -> Emitter<'a> {
        let live: Vec<usize> = (0..dfa.states.len())
            .filter(|&i| !dfa.states[i].transitions.is_empty())
            .collect();

        let mut has_lazy = false;
        let mut needs_decode = false;
        let mut uses_word = false;
        let mut uses_prev_rune = false;
        let mut updates_end = false;
        for &i in &live {
            for t in &dfa.states[i].transitions {
                if is_lazy_edge(t) {
                    has_lazy = true;
                } else if is_pseudo_edge(t) {
                    match t.ranges[0].lo {
                        RUNE_WORD_BOUNDARY | RUNE_NO_WORD_BOUNDARY => uses_word = true,
                        RUNE_BEGIN_LINE => uses_prev_rune = true,
                        _ => {}
                    }
                } else {
                    needs_decode = true;
                }
                if dfa.states[t.to].is_final && !is_lazy_edge(t) {
                    updates_end = true;
                }
            }
        }

        return Emitter {
            dfa,
            live,
            has_lazy,
            needs_decode,
            uses_word,
            uses_prev_rune,
            updates_end,
        };
    }

    fn is_live(&self, id: usize) -> bool {
        return !self.dfa.states[id].transitions.is_empty();
    }

    /// What to do when a state runs out of options: without lazy edges the
    /// match is over, with them control moves to the backtrack arm.
    fn return_or_backtrack(&self) -> TokenStream {
        if self.has_lazy {
            let bt = Literal::usize_unsuffixed(self.dfa.states.len());
            return quote! { state = #bt; continue; };
        }
        return quote! { return end; };
    }

    /// The goto-or-finish tail shared by every matched edge: record the end
    /// position on a final target, then either jump to the target or fall
    /// back to return-or-backtrack when the target has no outgoing edges.
    fn edge_tail(&self, to: usize) -> TokenStream {
        let mut tail = TokenStream::new();
        if self.dfa.states[to].is_final {
            tail.extend(quote! { end = i as isize; });
        }
        if self.is_live(to) {
            let target = Literal::usize_unsuffixed(to);
            tail.extend(quote! { state = #target; continue; });
        } else {
            tail.extend(self.return_or_backtrack());
        }
        return tail;
    }

    fn pseudo_predicate(&self, r: i32) -> TokenStream {
        return match r {
            RUNE_BEGIN_TEXT => quote! { i == 0 },
            RUNE_END_TEXT => quote! { i == s.len() },
            RUNE_BEGIN_LINE => quote! { i == 0 || r == 10 },
            RUNE_END_LINE => quote! { i == s.len() || s[i] == 10 },
            RUNE_WORD_BOUNDARY => quote! {
                (i > 0 && i >= rlen && is_word_char(s[i - rlen]))
                    != (i < s.len() && is_word_char(s[i]))
            },
            RUNE_NO_WORD_BOUNDARY => quote! {
                (i > 0 && i >= rlen && is_word_char(s[i - rlen]))
                    == (i < s.len() && is_word_char(s[i]))
            },
            _ => unreachable!("not a zero-width pseudo-rune: {r}"),
        };
    }

    /// The tightest test for one interval.
    fn rune_predicate(&self, pair: RunePair) -> TokenStream {
        let lo = Literal::i32_unsuffixed(pair.lo);
        let hi = Literal::i32_unsuffixed(pair.hi);
        if pair.lo == pair.hi {
            return quote! { r == #lo };
        }
        if pair.lo == 0 {
            return quote! { r <= #hi };
        }
        if pair.hi == RUNE_LAST {
            return quote! { r >= #lo };
        }
        return quote! { r >= #lo && r <= #hi };
    }

    fn state_arm(&self, id: usize) -> TokenStream {
        let state = &self.dfa.states[id];
        let sid = Literal::usize_unsuffixed(id);
        let ret = self.return_or_backtrack();
        let mut body = TokenStream::new();

        // Lazy choice point: the greedy continuation below runs first, with
        // a frame recording how to retry the marked branch; a resuming
        // thread jumps straight to it.
        if let Some(t) = state.transitions.iter().find(|t| is_lazy_edge(t)) {
            let target = Literal::usize_unsuffixed(t.to);
            body.extend(quote! {
                if lazy {
                    lazy = false;
                    state = #target;
                    continue;
                }
                stack.push((#sid, i));
            });
        }

        // zero-width edges
        for t in &state.transitions {
            if !is_pseudo_edge(t) || is_lazy_edge(t) {
                continue;
            }
            let pred = self.pseudo_predicate(t.ranges[0].lo);
            let tail = self.edge_tail(t.to);
            body.extend(quote! {
                if #pred {
                    #tail
                }
            });
        }

        // rune-consuming edges
        if state.transitions.iter().any(|t| !is_pseudo_edge(t)) {
            body.extend(quote! {
                (r, rlen) = decode_rune(s, i);
                if rlen == 0 {
                    #ret
                }
                i += rlen;
            });
            for t in &state.transitions {
                if is_pseudo_edge(t) {
                    continue;
                }
                let parts = t.ranges.iter().map(|&p| self.rune_predicate(p));
                let tail = self.edge_tail(t.to);
                body.extend(quote! {
                    if #(#parts)||* {
                        #tail
                    }
                });
            }
        }

        body.extend(ret);
        return quote! {
            #sid => {
                #body
            }
        };
    }

    fn matcher_fn(&self, name: &syn::Ident, kind: InputKind) -> TokenStream {
        let input = match kind {
            InputKind::Str => quote! { s: &str },
            InputKind::Bytes => quote! { s: &[u8] },
        };
        let end_init = Literal::isize_unsuffixed(if self.dfa.states[0].is_final { 0 } else { -1 });

        if self.live.is_empty() {
            // the expression decides everything at position 0
            return quote! {
                pub fn #name(#input) -> isize {
                    let _ = s;
                    return #end_init;
                }
            };
        }

        let reborrow = match kind {
            InputKind::Str => quote! { let s = s.as_bytes(); },
            InputKind::Bytes => TokenStream::new(),
        };

        let mut decls = TokenStream::new();
        if self.updates_end {
            decls.extend(quote! { let mut end: isize = #end_init; });
        } else {
            decls.extend(quote! { let end: isize = #end_init; });
        }
        if self.needs_decode || self.has_lazy {
            decls.extend(quote! { let mut i: usize = 0; });
        } else {
            decls.extend(quote! { let i: usize = 0; });
        }
        if self.needs_decode {
            decls.extend(quote! {
                let mut r: i32 = 0;
                let mut rlen: usize = 0;
            });
        } else {
            if self.uses_prev_rune {
                decls.extend(quote! { let r: i32 = 0; });
            }
            if self.uses_word {
                decls.extend(quote! { let rlen: usize = 0; });
            }
        }
        if self.has_lazy {
            decls.extend(quote! {
                let mut lazy = false;
                let mut stack: Vec<(usize, usize)> = Vec::new();
            });
        }

        let needs_goto = self.has_lazy
            || self.live.iter().any(|&i| {
                self.dfa.states[i]
                    .transitions
                    .iter()
                    .any(|t| self.is_live(t.to))
            });
        if needs_goto {
            decls.extend(quote! { let mut state: usize = 0; });
        } else {
            decls.extend(quote! { let state: usize = 0; });
        }

        let arms = self.live.iter().map(|&i| self.state_arm(i));
        let default_arm = if self.has_lazy {
            quote! {
                _ => {
                    if end >= 0 {
                        return end;
                    }
                    match stack.pop() {
                        Some((next, pos)) => {
                            lazy = true;
                            state = next;
                            i = pos;
                        }
                        None => return end,
                    }
                }
            }
        } else {
            quote! { _ => return end, }
        };

        return quote! {
            pub fn #name(#input) -> isize {
                #reborrow
                #decls
                loop {
                    match state {
                        #(#arms)*
                        #default_arm
                    }
                }
            }
        };
    }

    fn helpers(&self) -> TokenStream {
        let mut helpers = TokenStream::new();
        if self.live.is_empty() {
            return helpers;
        }
        if self.uses_word {
            helpers.extend(quote! {
                fn is_word_char(b: u8) -> bool {
                    return b == b'_' || b.is_ascii_alphanumeric();
                }
            });
        }
        if self.needs_decode {
            helpers.extend(quote! {
                fn decode_rune(s: &[u8], i: usize) -> (i32, usize) {
                    let b0 = match s.get(i) {
                        Some(&b) => b,
                        None => return (0, 0),
                    };
                    if b0 < 0x80 {
                        return (b0 as i32, 1);
                    }
                    let len = match b0 {
                        0xC2..=0xDF => 2,
                        0xE0..=0xEF => 3,
                        0xF0..=0xF4 => 4,
                        _ => return (0xFFFD, 0),
                    };
                    if i + len > s.len() {
                        return (0xFFFD, 0);
                    }
                    let mut r = (b0 as i32) & (0x7F >> len);
                    for k in 1..len {
                        let b = s[i + k];
                        if b & 0xC0 != 0x80 {
                            return (0xFFFD, 0);
                        }
                        r = (r << 6) | (b as i32 & 0x3F);
                    }
                    let ok = match len {
                        2 => r >= 0x80,
                        3 => r >= 0x800 && !(0xD800..=0xDFFF).contains(&r),
                        _ => (0x10000..=0x10FFFF).contains(&r),
                    };
                    if !ok {
                        return (0xFFFD, 0);
                    }
                    return (r, len);
                }
            });
        }
        return helpers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dfa, nfa};

    fn emit(pattern: &str, kind: InputKind) -> String {
        let dfa = dfa::from_nfa(&nfa::parse(pattern).unwrap());
        return generate(&dfa, "matchers", "is_match", kind).unwrap();
    }

    #[test]
    fn emits_a_formatted_module() {
        let src = emit("a+", InputKind::Str);
        assert!(src.starts_with("// Code generated by re2dfa. DO NOT EDIT.\n"));
        assert!(src.contains("pub mod matchers"));
        assert!(src.contains("pub fn is_match(s: &str) -> isize"));
        assert!(src.contains("fn decode_rune(s: &[u8], i: usize) -> (i32, usize)"));
        assert!(!src.contains("is_word_char"));
        assert!(!src.contains("stack"));
    }

    #[test]
    fn bytes_kind_changes_only_the_signature() {
        let src = emit("a+", InputKind::Bytes);
        assert!(src.contains("pub fn is_match(s: &[u8]) -> isize"));
        assert!(!src.contains("as_bytes"));

        let src = emit("a+", InputKind::Str);
        assert!(src.contains("let s = s.as_bytes();"));
    }

    #[test]
    fn word_boundary_brings_its_helper() {
        let src = emit(r"a\b", InputKind::Str);
        assert!(src.contains("fn is_word_char(b: u8) -> bool"));
    }

    #[test]
    fn lazy_quantifiers_bring_the_backtrack_stack() {
        let src = emit("a+?b", InputKind::Str);
        assert!(src.contains("let mut lazy = false;"));
        assert!(src.contains("let mut stack: Vec<(usize, usize)> = Vec::new();"));
        assert!(src.contains("stack.push"));

        let src = emit("a+b", InputKind::Str);
        assert!(!src.contains("lazy"));
    }

    #[test]
    fn empty_expression_returns_zero() {
        let src = emit("", InputKind::Str);
        assert!(src.contains("return 0;"));
        assert!(!src.contains("loop"));
    }

    #[test]
    fn tight_rune_predicates() {
        // singleton, zero-anchored, last-anchored and general intervals
        let src = emit("[\\x00-\\x20a][b-y]*.", InputKind::Str);
        assert!(src.contains("r <= 32"), "{src}");
        assert!(src.contains("r >= 98 && r <= 121"), "{src}");
        assert!(src.contains("r >= 11"), "{src}");
    }

    #[test]
    fn rejects_invalid_identifiers() {
        let dfa = dfa::from_nfa(&nfa::parse("a").unwrap());
        let err = generate(&dfa, "not a module", "f", InputKind::Str).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
        let err = generate(&dfa, "m", "fn", InputKind::Str).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }
}
