//! LIKE pattern matching
//!
//! Dialect:
//! - `%` matches any run of bytes, including none
//! - `_` matches exactly one byte
//! - `\` makes the next byte literal; a trailing `\` is itself literal
//!
//! The whole value must match. Matching is byte-wise and case-sensitive.
//! Other engines plug in through `PatternMatcher`.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write;

use regex::bytes::{Regex, RegexBuilder};

use super::errors::{EvalError, EvalResult};

/// Matches a value against a LIKE pattern
pub trait PatternMatcher {
    fn matches(&mut self, value: &[u8], pattern: &[u8]) -> EvalResult<bool>;
}

/// Compiled patterns kept per matcher; the oldest is evicted first
pub const MAX_CACHED_PATTERNS: usize = 64;

/// Default matcher, compiling each distinct pattern once while it stays cached
#[derive(Debug)]
pub struct LikeMatcher {
    cache: HashMap<Vec<u8>, Regex>,
    order: VecDeque<Vec<u8>>,
    capacity: usize,
}

impl Default for LikeMatcher {
    fn default() -> Self {
        Self::with_capacity(MAX_CACHED_PATTERNS)
    }
}

impl LikeMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matcher holding at most `capacity` compiled patterns (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Number of compiled patterns held
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn compile(pattern: &[u8]) -> EvalResult<Regex> {
        RegexBuilder::new(&like_to_regex(pattern))
            .unicode(false)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| EvalError::Pattern(e.to_string()))
    }
}

impl PatternMatcher for LikeMatcher {
    fn matches(&mut self, value: &[u8], pattern: &[u8]) -> EvalResult<bool> {
        if let Some(regex) = self.cache.get(pattern) {
            return Ok(regex.is_match(value));
        }
        let regex = Self::compile(pattern)?;
        let matched = regex.is_match(value);
        if self.cache.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.cache.remove(&oldest);
            }
        }
        self.order.push_back(pattern.to_vec());
        self.cache.insert(pattern.to_vec(), regex);
        Ok(matched)
    }
}

/// Translates a LIKE pattern into an anchored byte regex
fn like_to_regex(pattern: &[u8]) -> String {
    let mut result = String::with_capacity(pattern.len() * 4 + 2);
    result.push('^');
    let mut bytes = pattern.iter().copied();

    while let Some(b) = bytes.next() {
        match b {
            b'%' => result.push_str(".*"),
            b'_' => result.push('.'),
            b'\\' => match bytes.next() {
                Some(next) => push_literal(&mut result, next),
                None => push_literal(&mut result, b'\\'),
            },
            _ => push_literal(&mut result, b),
        }
    }

    result.push('$');
    result
}

/// Every literal becomes `\xHH` so no byte is read as a metacharacter
fn push_literal(out: &mut String, b: u8) {
    let _ = write!(out, "\\x{:02X}", b);
}
