//! Token stream over SLR content text
//!
//! SLR content is the indexable text form of an encoded vector: whitespace
//! separated words, each the zero-padded dimension token immediately followed
//! by the activation value, e.g. `00030.9000000 00500.8900000`. The tokenizer
//! splits every word after `token_width` characters and quantizes the rest.

use log::trace;

use crate::Weight;
use crate::codec::{EncodedTerm, VectorCodec};
use crate::error::{Error, Result};
use crate::vector::SparseVector;

/// Default maximum word length in characters
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 255;

/// Absolute maximum word length
pub const MAX_TOKEN_LENGTH_LIMIT: usize = 1024 * 1024;

/// One emitted token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Dimension token (value stripped)
    pub term: String,
    /// Quantized activation
    pub weight: Weight,
    /// Positions advanced since the previous token (1 + skipped words)
    pub position_increment: u32,
    /// Byte offsets of the dimension token in the input
    pub start_offset: usize,
    pub end_offset: usize,
}

impl From<Token> for EncodedTerm {
    fn from(token: Token) -> Self {
        EncodedTerm {
            token: token.term,
            weight: token.weight,
        }
    }
}

/// Splits SLR content into dimension tokens with quantized weights
///
/// Words longer than the max token length are skipped, as are words whose
/// value quantizes to zero. Skipped words still count as positions: the
/// next token's position increment grows by one per skipped word, and
/// [`end_position_increment`](Self::end_position_increment) reports the
/// trailing ones.
pub struct SlrTokenizer<'a> {
    codec: VectorCodec,
    text: &'a str,
    offset: usize,
    max_token_length: usize,
    skipped_positions: u32,
}

impl<'a> SlrTokenizer<'a> {
    pub fn new(codec: VectorCodec, text: &'a str) -> Self {
        Self {
            codec,
            text,
            offset: 0,
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
            skipped_positions: 0,
        }
    }

    /// Set the max word length (1..=MAX_TOKEN_LENGTH_LIMIT)
    pub fn with_max_token_length(mut self, length: usize) -> Result<Self> {
        if length < 1 {
            return Err(Error::Config(
                "max token length must be greater than zero".into(),
            ));
        }
        if length > MAX_TOKEN_LENGTH_LIMIT {
            return Err(Error::Config(format!(
                "max token length may not exceed {}",
                MAX_TOKEN_LENGTH_LIMIT
            )));
        }
        self.max_token_length = length;
        Ok(self)
    }

    pub fn max_token_length(&self) -> usize {
        self.max_token_length
    }

    /// Positions skipped after the last emitted token
    pub fn end_position_increment(&self) -> u32 {
        self.skipped_positions
    }

    /// Collect every token as an encoded term
    pub fn terms(self) -> Result<Vec<EncodedTerm>> {
        self.map(|token| token.map(EncodedTerm::from)).collect()
    }

    fn next_word(&mut self) -> Option<(usize, &'a str)> {
        let rest = &self.text[self.offset..];
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            self.offset = self.text.len();
            return None;
        }
        let start = self.offset + (rest.len() - trimmed.len());
        let len = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        self.offset = start + len;
        Some((start, &trimmed[..len]))
    }
}

impl Iterator for SlrTokenizer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (start, word) = self.next_word()?;

            if word.chars().count() > self.max_token_length {
                trace!("skipping {}-byte word at {}", word.len(), start);
                self.skipped_positions += 1;
                continue;
            }

            let width = self.codec.config().token_width();
            if word.len() <= width || !word.is_char_boundary(width) {
                return Some(Err(Error::MalformedVectorValue(format!(
                    "'{}' is not a {}-digit token followed by a value",
                    word, width
                ))));
            }
            let (term, value) = word.split_at(width);

            let dimension = match self.codec.parse_token(term) {
                Ok(dimension) => dimension,
                Err(e) => return Some(Err(e)),
            };
            let weight = match self.codec.quantize(dimension, value) {
                Ok(weight) => weight,
                Err(Error::ZeroActivation(_)) => {
                    trace!("skipping zero activation for dimension {}", dimension);
                    self.skipped_positions += 1;
                    continue;
                }
                Err(e) => return Some(Err(e)),
            };

            let position_increment = self.skipped_positions + 1;
            self.skipped_positions = 0;
            return Some(Ok(Token {
                term: term.to_string(),
                weight,
                position_increment,
                start_offset: start,
                end_offset: start + width,
            }));
        }
    }
}

/// Render a vector as SLR content text
///
/// Each value is written as its fixed-point quantization with exactly
/// `precision` fraction digits, so tokenizing the result gives back the same
/// weights as encoding the vector directly.
pub fn render_content(codec: &VectorCodec, vector: &SparseVector) -> Result<String> {
    let multiplier = codec.config().multiplier();
    let precision = codec.config().precision() as usize;
    let words: Vec<String> = codec
        .encode_vector(vector)?
        .into_iter()
        .map(|term| {
            format!(
                "{}{}.{:0precision$}",
                term.token,
                term.weight / multiplier,
                term.weight % multiplier,
                precision = precision
            )
        })
        .collect();
    Ok(words.join(" "))
}
