//! Error types produced by the line reader, tokenizer, parser, and word expander.

use crate::source::SourcePosition;
use crate::token::Token;

/// An error produced while splitting a byte stream into logical lines.
#[derive(Debug, thiserror::Error)]
pub enum LineReaderError {
    /// The stream ended with a trailing, unpaired backslash.
    #[error("unexpected end of input inside escape sequence")]
    UnexpectedEof,
}

/// An error produced while tokenizing a logical line (or a whole script).
#[derive(Debug, thiserror::Error)]
pub enum TokenizerError {
    /// The input ended while a single-quoted string was still open.
    #[error("unterminated quoted string: unterminated single quote starting at {0}")]
    UnterminatedSingleQuote(SourcePosition),

    /// The input ended while a double-quoted string was still open.
    #[error("unterminated quoted string: unterminated double quote starting at {0}")]
    UnterminatedDoubleQuote(SourcePosition),

    /// The input ended while a backtick substitution was still open.
    #[error("unterminated backtick substitution starting at {0}")]
    UnterminatedBacktick(SourcePosition),

    /// The input ended with a trailing, unpaired backslash.
    #[error("unexpected end of input inside escape sequence at {0}")]
    UnterminatedEscape(SourcePosition),

    /// Propagated from the line reader.
    #[error(transparent)]
    LineReader(#[from] LineReaderError),
}

/// An error produced while parsing a token stream into an AST.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Tokenizing the input failed before parsing could begin.
    #[error("failed to tokenize input")]
    Tokenizing(#[from] TokenizerError),

    /// A word-expansion error occurred while building an `Expr` for a token.
    #[error("failed to expand word: {0}")]
    Expansion(#[from] WordError),

    /// Parsing failed near a specific token.
    #[error("at {}: expected {expected}, found {found}", .at)]
    Unexpected {
        /// The position at which parsing failed.
        at: SourcePosition,
        /// A human-readable description of what was expected.
        expected: String,
        /// A human-readable description of what was actually found.
        found: String,
    },

    /// Parsing failed at the end of input, where more tokens were expected.
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof {
        /// A human-readable description of what was expected.
        expected: String,
    },

    /// A redirection's duplication target was not a valid file descriptor number.
    #[error("bad fd number '{0}' at {1}")]
    BadFdNumber(String, SourcePosition),
}

impl ParseError {
    pub(crate) fn unexpected(found: &Token, expected: impl Into<String>) -> Self {
        Self::Unexpected {
            at: found.location.start,
            expected: expected.into(),
            found: found.describe(),
        }
    }
}

/// An error produced while expanding the raw text of a word into a sequence
/// of string literals and backtick substitutions.
#[derive(Debug, thiserror::Error)]
pub enum WordError {
    /// A trailing backslash had no following character to escape.
    #[error("unexpected end of input: dangling backslash in word")]
    DanglingEscape,

    /// A backtick substitution inside a word was never closed.
    #[error("unterminated backtick substitution in word")]
    UnterminatedBacktick,

    /// Parsing the command embedded in a backtick substitution failed.
    #[error("failed to parse backtick substitution: {0}")]
    BacktickParse(Box<ParseError>),
}
