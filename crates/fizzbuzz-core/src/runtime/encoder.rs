// crates/fizzbuzz-core/src/runtime/encoder.rs
// ============================================================================
// Module: FizzBuzz Sequence Encoder
// Description: Streaming JSON encoder for FizzBuzz sequences.
// Purpose: Write arbitrarily long sequences with bounded memory.
// Dependencies: crate::core, crate::runtime::cancel, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`SequenceEncoder`] turns a validated [`Configuration`] into the byte-exact
//! layout `["1","2","fizz",...]` followed by a newline. The three replacement
//! fragments are JSON-escaped once up front; numbers are formatted straight
//! into a reusable chunk buffer that is handed to the writer whenever it fills.
//! The whole array is never held in memory.
//!
//! [`Configuration::tokens`] exposes the same sequence as a lazy iterator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io;
use std::io::Write;

use thiserror::Error;

use crate::core::Configuration;
use crate::core::InvalidInputError;
use crate::runtime::cancel::CancelToken;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Chunk size at which buffered output is handed to the writer.
pub const CHUNK_BYTES: usize = 8 * 1024;
/// Extra chunk capacity so a typical token never forces a reallocation.
const CHUNK_SLACK: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Sequence encoding errors.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Configuration failed validation; nothing was written.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),
    /// The writer rejected a write; some bytes may already have been written.
    #[error("sequence write failed: {0}")]
    Write(#[source] io::Error),
    /// Encoding stopped because the cancel token fired; output is incomplete.
    #[error("sequence encoding cancelled")]
    Cancelled,
    /// A replacement string could not be escaped.
    #[error("sequence serialization failed: {0}")]
    Serialize(String),
}

// ============================================================================
// SECTION: Tokens
// ============================================================================

/// A single sequence element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Index divisible by neither divisor.
    Number(i64),
    /// Index divisible only by the first divisor.
    Replacement1(&'a str),
    /// Index divisible only by the second divisor.
    Replacement2(&'a str),
    /// Index divisible by both divisors.
    Joined(&'a str, &'a str),
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Replacement1(text) | Self::Replacement2(text) => f.write_str(text),
            Self::Joined(first, second) => {
                f.write_str(first)?;
                f.write_str(second)
            }
        }
    }
}

/// Which rule applies at an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Plain number.
    Number,
    /// First replacement.
    First,
    /// Second replacement.
    Second,
    /// Both replacements joined.
    Both,
}

/// Classifies `index` against two positive divisors.
const fn rule_at(index: i64, divisor1: i64, divisor2: i64) -> Rule {
    match (index % divisor1 == 0, index % divisor2 == 0) {
        (true, true) => Rule::Both,
        (true, false) => Rule::First,
        (false, true) => Rule::Second,
        (false, false) => Rule::Number,
    }
}

/// Lazy, restartable token iterator over `1 ..= limit`.
///
/// # Invariants
/// - Stops at `limit` or after `i64::MAX` without wrapping.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    /// Validated configuration being iterated.
    config: &'a Configuration,
    /// Next index to yield, `None` once exhausted.
    next: Option<i64>,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        if index > self.config.limit {
            self.next = None;
            return None;
        }
        self.next = index.checked_add(1);
        let config = self.config;
        Some(match rule_at(index, config.divisor1, config.divisor2) {
            Rule::Number => Token::Number(index),
            Rule::First => Token::Replacement1(&config.replacement1),
            Rule::Second => Token::Replacement2(&config.replacement2),
            Rule::Both => Token::Joined(&config.replacement1, &config.replacement2),
        })
    }
}

impl Configuration {
    /// Returns the lazy token sequence for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError`] when a divisor is not strictly positive.
    pub fn tokens(&self) -> Result<Tokens<'_>, InvalidInputError> {
        self.validate()?;
        Ok(Tokens {
            config: self,
            next: Some(1),
        })
    }
}

// ============================================================================
// SECTION: Encoder
// ============================================================================

/// Streaming JSON encoder for one configuration.
///
/// # Invariants
/// - Divisors are strictly positive.
/// - Fragments hold the JSON string form, quotes included.
#[derive(Debug, Clone)]
pub struct SequenceEncoder {
    /// Inclusive upper bound.
    limit: i64,
    /// First divisor.
    divisor1: i64,
    /// Second divisor.
    divisor2: i64,
    /// Escaped first replacement.
    fragment1: Vec<u8>,
    /// Escaped second replacement.
    fragment2: Vec<u8>,
    /// Escaped concatenation of both replacements.
    fragment12: Vec<u8>,
}

impl SequenceEncoder {
    /// Validates the configuration and precomputes escaped fragments.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::InvalidInput`] for non-positive divisors.
    pub fn new(config: &Configuration) -> Result<Self, EncodeError> {
        config.validate()?;
        let joined = format!("{}{}", config.replacement1, config.replacement2);
        Ok(Self {
            limit: config.limit,
            divisor1: config.divisor1,
            divisor2: config.divisor2,
            fragment1: json_fragment(&config.replacement1)?,
            fragment2: json_fragment(&config.replacement2)?,
            fragment12: json_fragment(&joined)?,
        })
    }

    /// Writes the full sequence and returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::Write`] when the writer fails.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<u64, EncodeError> {
        self.write_to_with(writer, &CancelToken::new())
    }

    /// Writes the full sequence, checking `cancel` after every chunk.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::Write`] when the writer fails and
    /// [`EncodeError::Cancelled`] when the token fires. Either way the bytes
    /// already written do not form a complete document.
    pub fn write_to_with<W: Write>(
        &self,
        writer: W,
        cancel: &CancelToken,
    ) -> Result<u64, EncodeError> {
        self.write_from(writer, 1, cancel)
    }

    /// Encodes the sequence into an owned buffer.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when encoding fails.
    pub fn to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Writes indices `start ..= limit` as a complete array.
    fn write_from<W: Write>(
        &self,
        mut writer: W,
        start: i64,
        cancel: &CancelToken,
    ) -> Result<u64, EncodeError> {
        if cancel.is_cancelled() {
            return Err(EncodeError::Cancelled);
        }
        let mut chunk = Vec::with_capacity(CHUNK_BYTES + CHUNK_SLACK);
        let mut written = 0_u64;
        chunk.push(b'[');
        let mut index = start;
        while index <= self.limit {
            if index > start {
                chunk.push(b',');
            }
            self.push_token(&mut chunk, index)?;
            if chunk.len() >= CHUNK_BYTES {
                written = flush_chunk(&mut writer, &mut chunk, written)?;
                if cancel.is_cancelled() {
                    return Err(EncodeError::Cancelled);
                }
            }
            match index.checked_add(1) {
                Some(next) => index = next,
                None => break,
            }
        }
        chunk.extend_from_slice(b"]\n");
        written = flush_chunk(&mut writer, &mut chunk, written)?;
        writer.flush().map_err(EncodeError::Write)?;
        Ok(written)
    }

    /// Appends the JSON string for `index` to the chunk.
    fn push_token(&self, chunk: &mut Vec<u8>, index: i64) -> Result<(), EncodeError> {
        match rule_at(index, self.divisor1, self.divisor2) {
            Rule::Number => write!(chunk, "\"{index}\"").map_err(EncodeError::Write)?,
            Rule::First => chunk.extend_from_slice(&self.fragment1),
            Rule::Second => chunk.extend_from_slice(&self.fragment2),
            Rule::Both => chunk.extend_from_slice(&self.fragment12),
        }
        Ok(())
    }
}

/// Validates and writes the sequence for `config` in one call.
///
/// # Errors
///
/// Returns [`EncodeError`] when validation or writing fails.
pub fn write_sequence<W: Write>(config: &Configuration, writer: W) -> Result<u64, EncodeError> {
    SequenceEncoder::new(config)?.write_to(writer)
}

/// Encodes the sequence for `config` into an owned buffer.
///
/// # Errors
///
/// Returns [`EncodeError`] when validation fails.
pub fn encode(config: &Configuration) -> Result<Vec<u8>, EncodeError> {
    SequenceEncoder::new(config)?.to_vec()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the JSON string encoding of `value`, quotes included.
fn json_fragment(value: &str) -> Result<Vec<u8>, EncodeError> {
    serde_json::to_vec(value).map_err(|err| EncodeError::Serialize(err.to_string()))
}

/// Hands the chunk to the writer and clears it, returning the new byte total.
fn flush_chunk<W: Write>(
    writer: &mut W,
    chunk: &mut Vec<u8>,
    written: u64,
) -> Result<u64, EncodeError> {
    writer.write_all(chunk).map_err(EncodeError::Write)?;
    let total = written.saturating_add(chunk.len() as u64);
    chunk.clear();
    Ok(total)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
