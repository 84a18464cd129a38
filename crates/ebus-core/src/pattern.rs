//! # Key Patterns
//!
//! Glob patterns over canonical event key strings, scoped to a subsystem.
//!
//! `pattern_subscribe(CSW, "*.move*")` matches every key whose subsystem is
//! `CSW` and whose canonical string matches `CSW.*.move*`.
//!
//! | Syntax | Matches |
//! |--------|---------|
//! | `*` | any run of characters, dots included |
//! | `?` | exactly one character |
//! | `[abc]`, `[a-z]` | one character from the class |
//! | `[^a]`, `[!a]` | one character not in the class |
//! | `\x` | the literal character `x` |
//!
//! Matching is case-sensitive.

use crate::error::EventServiceError;
use ebus_types::{EventKey, Subsystem, KEY_SEPARATOR};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    AnyRun,
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl Token {
    /// Whether this single-character token accepts `c`. `AnyRun` never does.
    fn accepts(&self, c: char) -> bool {
        match self {
            Token::Literal(expected) => *expected == c,
            Token::AnyChar => true,
            Token::AnyRun => false,
            Token::Class { negated, ranges } => {
                let inside = ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&c));
                inside != *negated
            }
        }
    }
}

/// A compiled, subsystem-scoped glob over canonical key strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    subsystem: Option<Subsystem>,
    glob: String,
    tokens: Vec<Token>,
}

impl KeyPattern {
    /// Compile `glob` relative to `subsystem`.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::InvalidPattern` for an empty glob, an unclosed
    ///   character class, or a trailing escape.
    pub fn new(subsystem: Subsystem, glob: &str) -> Result<Self, EventServiceError> {
        let full = format!("{subsystem}{KEY_SEPARATOR}{glob}");
        Self::compile(Some(subsystem), glob, &full)
    }

    /// Compile `glob` against the full canonical string of keys from any
    /// subsystem.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::InvalidPattern` as for [`KeyPattern::new`].
    pub fn any_subsystem(glob: &str) -> Result<Self, EventServiceError> {
        Self::compile(None, glob, glob)
    }

    /// Pattern matching every key.
    #[must_use]
    pub fn everything() -> Self {
        Self {
            subsystem: None,
            glob: "*".to_string(),
            tokens: vec![Token::AnyRun],
        }
    }

    fn compile(
        subsystem: Option<Subsystem>,
        glob: &str,
        full: &str,
    ) -> Result<Self, EventServiceError> {
        let invalid = |reason: &str| EventServiceError::InvalidPattern {
            pattern: glob.to_string(),
            reason: reason.to_string(),
        };

        if glob.is_empty() {
            return Err(invalid("pattern must not be empty"));
        }

        let mut tokens = Vec::new();
        let mut chars = full.chars();
        while let Some(c) = chars.next() {
            let token = match c {
                '*' => {
                    // Consecutive stars are equivalent to one.
                    if tokens.last() == Some(&Token::AnyRun) {
                        continue;
                    }
                    Token::AnyRun
                }
                '?' => Token::AnyChar,
                '\\' => Token::Literal(chars.next().ok_or_else(|| invalid("trailing escape"))?),
                '[' => parse_class(&mut chars).ok_or_else(|| invalid("unclosed character class"))?,
                other => Token::Literal(other),
            };
            tokens.push(token);
        }

        Ok(Self {
            subsystem,
            glob: glob.to_string(),
            tokens,
        })
    }

    /// Subsystem the pattern is scoped to, if any.
    #[must_use]
    pub fn subsystem(&self) -> Option<Subsystem> {
        self.subsystem
    }

    /// The glob as given by the caller.
    #[must_use]
    pub fn glob(&self) -> &str {
        &self.glob
    }

    /// Whether `key` belongs to the subsystem and matches the glob.
    #[must_use]
    pub fn matches(&self, key: &EventKey) -> bool {
        if self.subsystem.is_some_and(|subsystem| subsystem != key.subsystem()) {
            return false;
        }
        let text: Vec<char> = key.canonical().chars().collect();
        glob_match(&self.tokens, &text)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subsystem {
            Some(subsystem) => write!(f, "{subsystem}{KEY_SEPARATOR}{}", self.glob),
            None => f.write_str(&self.glob),
        }
    }
}

/// Parse the body of a `[...]` class; the opening bracket is consumed.
fn parse_class(chars: &mut std::str::Chars<'_>) -> Option<Token> {
    let mut ranges = Vec::new();
    let mut negated = false;
    let mut first = true;

    loop {
        let c = chars.next()?;
        match c {
            ']' if !first || !ranges.is_empty() => break,
            '^' | '!' if first && !negated => {
                negated = true;
                continue;
            }
            _ => {}
        }
        first = false;

        let lo = if c == '\\' { chars.next()? } else { c };

        // Look ahead for a range without consuming a closing bracket.
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('-') {
            match lookahead.next() {
                Some(']') | None => ranges.push((lo, lo)),
                Some(hi) => {
                    let hi = if hi == '\\' { lookahead.next()? } else { hi };
                    *chars = lookahead;
                    ranges.push((lo.min(hi), lo.max(hi)));
                }
            }
        } else {
            ranges.push((lo, lo));
        }
    }

    Some(Token::Class { negated, ranges })
}

/// Greedy glob match with single-point backtracking on the last `*`.
fn glob_match(tokens: &[Token], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(Token::AnyRun) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(token) if token.accepts(text[t]) => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    backtrack = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    tokens[p..].iter().all(|token| *token == Token::AnyRun)
}
