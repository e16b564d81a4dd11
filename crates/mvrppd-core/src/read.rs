use std::io;

use thiserror::Error;

use crate::solution::SolutionError;

/// Failure while reading an instance or solution from a textual stream.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("invalid number {token:?} while reading {what}")]
    InvalidNumber { token: String, what: &'static str },

    #[error(transparent)]
    Solution(#[from] SolutionError),
}

/// Whitespace tokenizer over a fully buffered stream, shared by the instance
/// and solution parsers.
pub(crate) struct Tokens {
    tokens: Vec<String>,
    next: usize,
}

impl Tokens {
    pub(crate) fn from_reader(mut reader: impl io::Read) -> Result<Self, ReadError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        Ok(Tokens {
            tokens: text.split_whitespace().map(str::to_string).collect(),
            next: 0,
        })
    }

    pub(crate) fn peek(&self) -> Option<&str> {
        self.tokens.get(self.next).map(String::as_str)
    }

    pub(crate) fn advance(&mut self) {
        self.next += 1;
    }

    pub(crate) fn number(&mut self, what: &'static str) -> Result<f64, ReadError> {
        let token = self
            .tokens
            .get(self.next)
            .ok_or(ReadError::UnexpectedEof(what))?;

        let value = token
            .parse::<f64>()
            .map_err(|_| ReadError::InvalidNumber {
                token: token.clone(),
                what,
            })?;

        self.next += 1;
        Ok(value)
    }

    pub(crate) fn index(&mut self, what: &'static str) -> Result<usize, ReadError> {
        let token = self
            .tokens
            .get(self.next)
            .ok_or(ReadError::UnexpectedEof(what))?;

        let value = token
            .parse::<usize>()
            .map_err(|_| ReadError::InvalidNumber {
                token: token.clone(),
                what,
            })?;

        self.next += 1;
        Ok(value)
    }

    /// Parses a number glued to a block marker (the writers emit `k0` and
    /// `r5`-style first tokens); an empty remainder falls through to the next
    /// token.
    pub(crate) fn number_after_marker(
        &mut self,
        rest: &str,
        what: &'static str,
    ) -> Result<f64, ReadError> {
        if rest.is_empty() {
            return self.number(what);
        }

        rest.parse::<f64>().map_err(|_| ReadError::InvalidNumber {
            token: rest.to_string(),
            what,
        })
    }
}
