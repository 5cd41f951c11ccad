//! Completion patterns for prompt detection.

use std::fmt;

use memchr::memchr;
use regex::bytes::Regex;

use super::buffer::PatternBuffer;

/// What the expect loop waits for after writing a command.
#[derive(Clone)]
pub enum CompletionPattern {
    /// A single character; matches on the next occurrence read after the
    /// command was written.
    Sentinel(u8),

    /// A regex anchored to the end of the accumulated output.
    Anchored(Regex),
}

impl CompletionPattern {
    /// Build a completion pattern from a pattern string.
    ///
    /// A one-character pattern becomes a literal sentinel. Anything longer is
    /// compiled as a regex and anchored to the end of the buffer.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        match pattern.as_bytes() {
            [byte] => Ok(Self::Sentinel(*byte)),
            _ => compile_prompt_pattern(pattern).map(Self::Anchored),
        }
    }

    /// Find where the completion ends in the buffer.
    ///
    /// `fresh_from` is the buffer offset where the most recent read began;
    /// sentinels only look at those fresh bytes. Returns the offset just past
    /// the match.
    pub fn find_end(&self, buffer: &PatternBuffer, fresh_from: usize) -> Option<usize> {
        match self {
            Self::Sentinel(byte) => {
                let fresh = buffer.as_slice().get(fresh_from..)?;
                memchr(*byte, fresh).map(|pos| fresh_from + pos + 1)
            }
            Self::Anchored(regex) => buffer.search_tail(regex).map(|(_, end)| end),
        }
    }

    /// Whether the pattern matches anywhere in `data` (regex) or `data`
    /// contains the sentinel.
    pub fn is_match(&self, data: &[u8]) -> bool {
        match self {
            Self::Sentinel(byte) => memchr(*byte, data).is_some(),
            Self::Anchored(regex) => regex.is_match(data),
        }
    }
}

impl From<Regex> for CompletionPattern {
    fn from(regex: Regex) -> Self {
        Self::Anchored(regex)
    }
}

impl fmt::Debug for CompletionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentinel(byte) => write!(f, "Sentinel({:?})", *byte as char),
            Self::Anchored(regex) => write!(f, "Anchored({:?})", regex.as_str()),
        }
    }
}

impl fmt::Display for CompletionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentinel(byte) => write!(f, "{}", *byte as char),
            Self::Anchored(regex) => write!(f, "{}", regex.as_str()),
        }
    }
}

/// Compile a prompt pattern string into a regex anchored to end-of-buffer.
///
/// Driver prompts are usually written with `(?m)` and a trailing `$`, which
/// would also match at any line end. Wrapping the pattern and appending `\z`
/// makes only a prompt at the very end of the output count.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?:{pattern})\z"))
}

/// Combine several prompt patterns into one that matches any of them.
pub fn combine_prompt_patterns<'a>(
    patterns: impl IntoIterator<Item = &'a str>,
) -> Result<Regex, regex::Error> {
    let alternatives: Vec<String> = patterns
        .into_iter()
        .map(|pattern| format!("(?:{pattern})"))
        .collect();
    compile_prompt_pattern(&alternatives.join("|"))
}
