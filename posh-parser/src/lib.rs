//! Tokenizer and recursive-descent parser for a POSIX-subset shell command
//! language: simple commands, pipelines, `&&`/`||` lists, backgrounding,
//! negation, IO redirection, and backtick command substitution.
//!
//! This crate only turns source text into an [`ast::Program`] — running
//! the resulting tree is `posh-core`'s job.

pub mod ast;
mod error;
mod expander;
mod parser;
mod source;
mod token;

pub use error::{LineReaderError, ParseError, TokenizerError, WordError};
pub use parser::{parse, parse_tokens};
pub use source::{SourcePosition, SourceSpan};
pub use token::{tokenize_str, unquote_str, LineReader, Token, TokenKind, Tokenizer};
