//! Transform regular expressions into finite state machines.
//!
//! A single expression is compiled in four stages: the pattern is parsed
//! (via [`regex_syntax`]) and lowered into an ε-NFA whose edges carry rune
//! ranges, the NFA is determinised by a subset construction that understands
//! zero-width pseudo-runes, and the resulting DFA is emitted as a
//! self-contained Rust function that returns the byte length of the longest
//! matched prefix of its input.
//!
//! ```
//! let source = re2dfa::compile("ab+", "matchers", "ab_plus", re2dfa::InputKind::Str)?;
//! assert!(source.contains("pub fn ab_plus"));
//! # Ok::<(), re2dfa::Error>(())
//! ```

use std::str::FromStr;

use thiserror::Error;

pub mod codegen;
pub mod dfa;
pub mod nfa;
pub mod runerange;

/// Errors surfaced by the compilation pipeline. Compilation never recovers
/// partially: on error no source is produced.
#[derive(Debug, Error)]
pub enum Error {
    /// The expression is not a valid regular expression.
    #[error("invalid regular expression: {0}")]
    Parse(#[from] Box<regex_syntax::Error>),
    /// The expression contains an operator the NFA builder does not
    /// implement, e.g. a bounded repetition that bypassed simplification.
    #[error("unsupported operator: {0}")]
    UnsupportedOp(&'static str),
    /// Only `str` and `bytes` matchers can be generated.
    #[error("invalid input kind: {0:?} (expected str or bytes)")]
    InvalidInputKind(String),
    /// Module and function names must be Rust identifiers.
    #[error("not a valid identifier: {0:?}")]
    InvalidIdentifier(String),
    /// The emitted source failed to re-parse before formatting; this
    /// indicates a bug in the emitter.
    #[error("emitted source failed to format: {0}")]
    Format(#[from] syn::Error),
}

impl From<regex_syntax::Error> for Error {
    fn from(err: regex_syntax::Error) -> Error {
        return Error::Parse(Box::new(err));
    }
}

/// Input type accepted by an emitted matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// The generated function takes `&str`.
    Str,
    /// The generated function takes `&[u8]`.
    Bytes,
}

impl FromStr for InputKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<InputKind, Error> {
        return match s {
            "str" => Ok(InputKind::Str),
            "bytes" => Ok(InputKind::Bytes),
            other => Err(Error::InvalidInputKind(other.to_string())),
        };
    }
}

/// Compiles one regular expression into matcher source: parse → NFA → DFA →
/// formatted Rust code.
pub fn compile(
    pattern: &str,
    module: &str,
    function: &str,
    kind: InputKind,
) -> Result<String, Error> {
    let nfa = nfa::parse(pattern)?;
    let dfa = dfa::from_nfa(&nfa);
    return codegen::generate(&dfa, module, function, kind);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_kind_parsing() {
        assert_eq!("str".parse::<InputKind>().unwrap(), InputKind::Str);
        assert_eq!("bytes".parse::<InputKind>().unwrap(), InputKind::Bytes);
        assert!(matches!(
            "string".parse::<InputKind>(),
            Err(Error::InvalidInputKind(_)),
        ));
        assert!(matches!(
            "[]byte".parse::<InputKind>(),
            Err(Error::InvalidInputKind(_)),
        ));
    }

    #[test]
    fn compile_produces_no_output_on_failure() {
        assert!(compile("(a", "m", "f", InputKind::Str).is_err());
        assert!(compile("a", "m", "not an ident", InputKind::Str).is_err());
    }
}
