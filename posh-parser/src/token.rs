//! Line reading and tokenizing of POSIX-subset shell source text.
//!
//! The two pieces here are `LineReader` and `Tokenizer`: the line reader
//! finds logical-line boundaries and validates that the input doesn't end
//! mid-escape; the tokenizer turns a (possibly multi-line) source string
//! into a flat vector of [`Token`]s.

use std::cell::Cell;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{LineReaderError, TokenizerError};
use crate::source::{Cursor, SourcePosition, SourceSpan};

/// The full set of reserved words recognized at the token layer. Only `!`
/// is ever honored by the parser (see [`TokenKind::Bang`]); the rest are
/// kept as an inert extension point, the same way a shell tokenizer carries
/// a complete operator/keyword table even when only a subset of it is
/// reachable from a given grammar.
pub const RESERVED_WORDS: &[&str] = &[
    "!", "{", "}", "case", "do", "done", "elif", "else", "esac", "fi", "for", "if", "in", "then",
    "until", "while",
];

/// Returns whether `word` names a reserved word this grammar actually acts
/// on. Only `!` does; everything else in [`RESERVED_WORDS`] is parsed as a
/// plain `WORD` and never upgraded.
pub fn is_active_reserved_word(word: &str) -> bool {
    word == "!"
}

/// The mutable classification of a [`Token`]. Most variants are assigned
/// once, at tokenization time, and never change; `Word` may later be
/// upgraded to `AssignmentWord` or `Bang` by the parser (and reverted on
/// backtrack — see [`Token::set_kind`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum TokenKind {
    /// An ordinary word.
    #[strum(serialize = "WORD")]
    Word,
    /// A word of the form `NAME=value`, upgraded from `Word` by the parser.
    #[strum(serialize = "ASSIGNMENT_WORD")]
    AssignmentWord,
    /// A run of digits immediately followed by `<` or `>`.
    #[strum(serialize = "IO_NUMBER")]
    IoNumber,
    /// A single newline.
    #[strum(serialize = "NEWLINE")]
    Newline,
    /// End of the token stream.
    #[strum(serialize = "EOF")]
    Eof,
    /// `!`, upgraded from `Word` by the parser.
    #[strum(serialize = "!")]
    Bang,
    /// `;`
    #[strum(serialize = ";")]
    Semi,
    /// `&`
    #[strum(serialize = "&")]
    And,
    /// `&&`
    #[strum(serialize = "&&")]
    AndAnd,
    /// `||`
    #[strum(serialize = "||")]
    OrOr,
    /// `|`
    #[strum(serialize = "|")]
    Pipe,
    /// `<`
    #[strum(serialize = "<")]
    Less,
    /// `>`
    #[strum(serialize = ">")]
    Great,
    /// `>>`
    #[strum(serialize = ">>")]
    DGreat,
    /// `<&`
    #[strum(serialize = "<&")]
    LessAnd,
    /// `>&`
    #[strum(serialize = ">&")]
    GreatAnd,
    /// `<>`
    #[strum(serialize = "<>")]
    LessGreat,
    /// `>|`
    #[strum(serialize = ">|")]
    Clobber,
}

impl TokenKind {
    /// Returns whether this kind identifies one of the punctuation operators
    /// (as opposed to `Word`-family, `Newline`, or `Eof` tokens).
    pub const fn is_operator(self) -> bool {
        !matches!(
            self,
            Self::Word | Self::AssignmentWord | Self::IoNumber | Self::Newline | Self::Eof
        )
    }
}

/// The fixed operator table, in longest-match priority order. This is
/// restricted to the operators that actually have a `TokenKind` slot below;
/// `;;`, `<<`, and `<<-` are deliberately excluded since no here-document
/// or `case` grammar exists to consume them.
const OPERATORS: &[(&str, TokenKind)] = &[
    ("&&", TokenKind::AndAnd),
    ("||", TokenKind::OrOr),
    (">>", TokenKind::DGreat),
    ("<&", TokenKind::LessAnd),
    (">&", TokenKind::GreatAnd),
    ("<>", TokenKind::LessGreat),
    (">|", TokenKind::Clobber),
    ("&", TokenKind::And),
    ("|", TokenKind::Pipe),
    (";", TokenKind::Semi),
    ("<", TokenKind::Less),
    (">", TokenKind::Great),
];

fn operator_kind(s: &str) -> Option<TokenKind> {
    OPERATORS
        .iter()
        .find(|(op, _)| *op == s)
        .map(|(_, kind)| *kind)
}

fn is_operator_prefix(s: &str) -> bool {
    OPERATORS.iter().any(|(op, _)| op.starts_with(s))
}

/// A single lexical token, with its raw source text, its (mutable)
/// classification, and the span of source it came from.
#[derive(Clone, Debug)]
pub struct Token {
    /// The raw substring matched, quoting/escaping included verbatim.
    pub value: String,
    kind: Cell<TokenKind>,
    /// The span of source text this token was matched from.
    pub location: SourceSpan,
}

impl Token {
    fn new(value: String, kind: TokenKind, location: SourceSpan) -> Self {
        Self {
            value,
            kind: Cell::new(kind),
            location,
        }
    }

    /// Returns the token's current classification.
    pub fn kind(&self) -> TokenKind {
        self.kind.get()
    }

    /// Overwrites the token's classification, returning the previous value
    /// so the caller can restore it on backtrack.
    pub fn set_kind(&self, kind: TokenKind) -> TokenKind {
        self.kind.replace(kind)
    }

    /// Splits an `ASSIGNMENT_WORD`-shaped value at its first `=` into
    /// `(name, value_text)`. Valid regardless of the token's current
    /// `kind()` — callers decide when the split is meaningful.
    pub fn split_assignment(&self) -> Option<(&str, &str)> {
        let eq = self.value.find('=')?;
        let (name, rest) = self.value.split_at(eq);
        if is_valid_assignment_name(name) {
            Some((name, &rest[1..]))
        } else {
            None
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self.kind.get() {
            TokenKind::Word | TokenKind::AssignmentWord => format!("'{}'", self.value),
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Newline => "newline".to_string(),
            other => format!("'{other}'"),
        }
    }
}

/// Returns whether `name` is a syntactically valid assignment name: it must
/// start with a non-digit "name" character and contain only name
/// characters (`[A-Za-z0-9_]`).
pub fn is_valid_assignment_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_name_start(c) => (),
        _ => return false,
    }
    chars.all(is_name_continue)
}

const fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Reads a byte/rune stream as whole logical lines: a physical line
/// terminated by `\` immediately followed by a newline continues into the
/// next physical line, with the backslash-newline pair preserved verbatim
/// (the tokenizer is the one that actually discards it, via rule 7).
pub struct LineReader<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> LineReader<'a> {
    /// Creates a new reader over the given source text.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    /// Returns the next logical line (without its terminating newline), or
    /// `None` at end of stream.
    pub fn read_line(&mut self) -> Result<Option<String>, LineReaderError> {
        let mut line = String::new();
        let mut saw_any = false;

        loop {
            match self.chars.next() {
                None => {
                    return if saw_any { Ok(Some(line)) } else { Ok(None) };
                }
                Some('\n') => return Ok(Some(line)),
                Some('\\') => {
                    saw_any = true;
                    match self.chars.peek().copied() {
                        Some('\n') => {
                            line.push('\\');
                            line.push('\n');
                            self.chars.next();
                        }
                        Some(escaped) => {
                            line.push('\\');
                            line.push(escaped);
                            self.chars.next();
                        }
                        None => return Err(LineReaderError::UnexpectedEof),
                    }
                }
                Some(c) => {
                    saw_any = true;
                    line.push(c);
                }
            }
        }
    }
}

/// Tokenizes an entire script, validating logical-line boundaries with
/// [`LineReader`] first (so a script ending mid-escape is rejected early),
/// then running the [`Tokenizer`] over the reassembled source.
///
/// The returned vector always ends with exactly one `Eof` token.
pub fn tokenize_str(input: &str) -> Result<Vec<Token>, TokenizerError> {
    let mut reader = LineReader::new(input);
    let mut joined = String::new();
    let mut first = true;
    while let Some(line) = reader.read_line()? {
        if !first {
            joined.push('\n');
        }
        first = false;
        joined.push_str(&line);
    }
    // Preserve a final trailing newline, if the input had one; it produces
    // a NEWLINE token that the grammar's `linebreak` production consumes.
    if input.ends_with('\n') {
        joined.push('\n');
    }

    Tokenizer::new(&joined).tokenize()
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum QuoteMode {
    None,
    Single(SourcePosition),
    Double(SourcePosition),
}

/// Context-sensitive lexer implementing a rune-by-rune tokenizing policy.
pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    cursor: Cursor,
}

impl<'a> Tokenizer<'a> {
    /// Creates a tokenizer over the given (already logical-line-joined)
    /// source text.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            cursor: Cursor::new(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.cursor.advance(c);
        Some(c)
    }

    /// Runs the tokenizer to completion, returning every token including a
    /// trailing `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            tracing::trace!("tokenized {:?} {:?}", token.kind(), token.value);
            let is_eof = token.kind() == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, TokenizerError> {
        let mut value = String::new();
        let mut token_is_operator = false;
        let mut quote_mode = QuoteMode::None;
        let start = self.cursor.position;

        loop {
            let preserve_meaning = quote_mode != QuoteMode::None;
            let next = self.peek();

            let Some(c) = next else {
                // End of stream.
                match quote_mode {
                    QuoteMode::None => (),
                    QuoteMode::Single(pos) => {
                        return Err(TokenizerError::UnterminatedSingleQuote(pos));
                    }
                    QuoteMode::Double(pos) => {
                        return Err(TokenizerError::UnterminatedDoubleQuote(pos));
                    }
                }
                return Ok(self.finish(value, token_is_operator, start, TokenKind::Eof));
            };

            // Rule 1: a bare newline, seen before any token content, is its
            // own NEWLINE token.
            if value.is_empty() && !token_is_operator && c == '\n' && !preserve_meaning {
                self.advance();
                return Ok(Token::new(
                    "\n".to_string(),
                    TokenKind::Newline,
                    SourceSpan {
                        start,
                        end: self.cursor.position,
                    },
                ));
            }

            // Rules 2/3: extending (or ending) an in-progress operator.
            if token_is_operator && !preserve_meaning {
                let mut hypothetical = value.clone();
                hypothetical.push(c);
                if is_operator_prefix(&hypothetical) {
                    self.advance();
                    value.push(c);
                    continue;
                }
                return Ok(self.finish(value, true, start, operator_kind(&value).unwrap()));
            }

            // Rule 4: backslash escape (and the line-continuation
            // exception in rule 7), outside single quotes.
            if !preserve_meaning && c == '\\' {
                self.advance();
                if self.peek() == Some('\n') {
                    self.advance();
                    continue;
                }
                match self.advance() {
                    Some(escaped) => {
                        value.push('\\');
                        value.push(escaped);
                        continue;
                    }
                    None => return Err(TokenizerError::UnterminatedEscape(self.cursor.position)),
                }
            }

            // Rule 5: quote delimiters.
            if !preserve_meaning && c == '\'' {
                self.advance();
                value.push(c);
                quote_mode = QuoteMode::Single(self.cursor.position);
                continue;
            }
            if !preserve_meaning && c == '"' {
                self.advance();
                value.push(c);
                quote_mode = QuoteMode::Double(self.cursor.position);
                continue;
            }
            if matches!(quote_mode, QuoteMode::Single(_)) && c == '\'' {
                self.advance();
                value.push(c);
                quote_mode = QuoteMode::None;
                continue;
            }
            if matches!(quote_mode, QuoteMode::Double(_)) && c == '"' {
                self.advance();
                value.push(c);
                quote_mode = QuoteMode::None;
                continue;
            }
            // Backslash escaping *within* a double quote for the quote
            // character itself and backslash, matching rule 5's intent.
            if matches!(quote_mode, QuoteMode::Double(_)) && c == '\\' {
                self.advance();
                value.push(c);
                if let Some(escaped) = self.peek() {
                    if escaped == '"' || escaped == '\\' || escaped == '`' {
                        self.advance();
                        value.push(escaped);
                    }
                }
                continue;
            }

            // Rule 6: backtick subexpression, outside single quotes.
            if !matches!(quote_mode, QuoteMode::Single(_)) && c == '`' {
                let block = self.scan_backtick_block()?;
                value.push_str(&block);
                continue;
            }

            // Rule 9/10: comment start, only unquoted and not mid-token.
            if !preserve_meaning && c == '#' && value.is_empty() && !token_is_operator {
                self.skip_comment();
                continue;
            }

            // Rule 8: an unescaped rune that can start an operator.
            if !preserve_meaning && !value.is_empty() && !token_is_operator && can_start_operator(c)
            {
                return Ok(self.finish(
                    value.clone(),
                    false,
                    start,
                    classify_word(&value, Some(c)),
                ));
            }
            if !preserve_meaning && value.is_empty() && !token_is_operator && can_start_operator(c)
            {
                self.advance();
                value.push(c);
                token_is_operator = true;
                continue;
            }

            // Rule 9: unescaped, non-newline whitespace.
            if !preserve_meaning && is_blank(c) {
                self.advance();
                if !value.is_empty() {
                    return Ok(self.finish(
                        value.clone(),
                        token_is_operator,
                        start,
                        classify_word(&value, Some(' ')),
                    ));
                }
                continue;
            }

            // Rule 11: unescaped newline ends the current (non-operator)
            // token; leave the newline to be read again as its own token.
            if !preserve_meaning && c == '\n' && !value.is_empty() {
                return Ok(self.finish(
                    value.clone(),
                    false,
                    start,
                    classify_word(&value, None),
                ));
            }

            // Rule 12: otherwise, append.
            self.advance();
            value.push(c);
        }
    }

    fn finish(
        &self,
        value: String,
        token_is_operator: bool,
        start: SourcePosition,
        kind: TokenKind,
    ) -> Token {
        let kind = if token_is_operator {
            operator_kind(&value).unwrap_or(kind)
        } else {
            kind
        };
        Token::new(
            value,
            kind,
            SourceSpan {
                start,
                end: self.cursor.position,
            },
        )
    }

    /// Consumes a full backtick-delimited block, honoring nested backticks
    /// (which POSIX requires to be backslash-escaped) and internal quoting
    /// purely to find the matching terminator. Returns the block's raw
    /// text, backticks included.
    fn scan_backtick_block(&mut self) -> Result<String, TokenizerError> {
        let open_pos = self.cursor.position;
        tracing::trace!("entering backtick subexpression at {open_pos}");
        let mut block = String::new();
        block.push(self.advance().expect("caller peeked a backtick"));

        let mut in_escape = false;
        let mut quote_mode = QuoteMode::None;

        loop {
            let Some(c) = self.peek() else {
                return Err(TokenizerError::UnterminatedBacktick(open_pos));
            };

            if in_escape {
                self.advance();
                block.push(c);
                in_escape = false;
                continue;
            }

            match quote_mode {
                QuoteMode::Single(_) => {
                    self.advance();
                    block.push(c);
                    if c == '\'' {
                        quote_mode = QuoteMode::None;
                    }
                    continue;
                }
                QuoteMode::Double(_) => {
                    self.advance();
                    block.push(c);
                    match c {
                        '\\' => in_escape = true,
                        '"' => quote_mode = QuoteMode::None,
                        _ => (),
                    }
                    continue;
                }
                QuoteMode::None => (),
            }

            match c {
                '\\' => {
                    self.advance();
                    block.push(c);
                    in_escape = true;
                }
                '\'' => {
                    self.advance();
                    block.push(c);
                    quote_mode = QuoteMode::Single(self.cursor.position);
                }
                '"' => {
                    self.advance();
                    block.push(c);
                    quote_mode = QuoteMode::Double(self.cursor.position);
                }
                '`' => {
                    self.advance();
                    block.push(c);
                    return Ok(block);
                }
                _ => {
                    self.advance();
                    block.push(c);
                }
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }
}

const fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

const fn can_start_operator(c: char) -> bool {
    matches!(c, '&' | ';' | '|' | '<' | '>')
}

/// Classifies a finished word's raw text and trailing delimiter into its
/// final token kind (`WORD`, `IO_NUMBER`, or an operator).
fn classify_word(value: &str, delimiter: Option<char>) -> TokenKind {
    if let Some(kind) = operator_kind(value) {
        return kind;
    }
    if value == "\n" {
        return TokenKind::Newline;
    }
    if value.is_empty() {
        return TokenKind::Eof;
    }
    if matches!(delimiter, Some('<') | Some('>')) && !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
    {
        return TokenKind::IoNumber;
    }
    TokenKind::Word
}

/// Strips all quoting and escaping from a raw token value, returning the
/// underlying literal text.
pub fn unquote_str(s: &str) -> String {
    let mut result = String::new();
    let mut in_escape = false;
    let mut quote_mode = QuoteMode::None;

    for c in s.chars() {
        if in_escape {
            result.push(c);
            in_escape = false;
            continue;
        }
        match quote_mode {
            QuoteMode::Single(_) => {
                if c == '\'' {
                    quote_mode = QuoteMode::None;
                } else {
                    result.push(c);
                }
            }
            QuoteMode::Double(_) => match c {
                '"' => quote_mode = QuoteMode::None,
                '\\' => in_escape = true,
                _ => result.push(c),
            },
            QuoteMode::None => match c {
                '\'' => quote_mode = QuoteMode::Single(SourcePosition::START),
                '"' => quote_mode = QuoteMode::Double(SourcePosition::START),
                '\\' => in_escape = true,
                _ => result.push(c),
            },
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize_str(input)
            .unwrap()
            .iter()
            .map(Token::kind)
            .collect()
    }

    fn values(input: &str) -> Vec<String> {
        tokenize_str(input)
            .unwrap()
            .iter()
            .map(|t| t.value.clone())
            .collect()
    }

    #[test]
    fn tokenize_empty() {
        let tokens = tokenize_str("").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind(), TokenKind::Eof);
    }

    #[test]
    fn tokenize_simple_words() {
        assert_eq!(
            kinds("echo a b c"),
            vec![TokenKind::Word; 4]
                .into_iter()
                .chain([TokenKind::Eof])
                .collect::<Vec<_>>()
        );
        assert_eq!(values("echo a b c"), vec!["echo", "a", "b", "c", ""]);
    }

    #[test]
    fn tokenize_operators_longest_match() {
        assert_eq!(
            kinds("a&&b"),
            vec![TokenKind::Word, TokenKind::AndAnd, TokenKind::Word, TokenKind::Eof]
        );
        assert_eq!(
            kinds("a>>b"),
            vec![TokenKind::Word, TokenKind::DGreat, TokenKind::Word, TokenKind::Eof]
        );
    }

    #[test]
    fn tokenize_io_number() {
        assert_eq!(
            kinds("10>>output"),
            vec![
                TokenKind::IoNumber,
                TokenKind::DGreat,
                TokenKind::Word,
                TokenKind::Eof
            ]
        );
        // Not followed directly by < or >, so it's just a word.
        assert_eq!(kinds("10 a"), vec![TokenKind::Word, TokenKind::Word, TokenKind::Eof]);
    }

    #[test]
    fn tokenize_quotes() {
        assert_eq!(values(r#"echo "a b""#), vec!["echo", "\"a b\"", ""]);
        assert_eq!(values("echo 'a b'"), vec!["echo", "'a b'", ""]);
    }

    #[test]
    fn tokenize_unterminated_single_quote() {
        assert!(matches!(
            tokenize_str("'abc"),
            Err(TokenizerError::UnterminatedSingleQuote(_))
        ));
    }

    #[test]
    fn tokenize_unterminated_double_quote() {
        assert!(matches!(
            tokenize_str("\"abc"),
            Err(TokenizerError::UnterminatedDoubleQuote(_))
        ));
    }

    #[test]
    fn tokenize_line_continuation() {
        assert_eq!(values("a\\\nbc"), vec!["abc", ""]);
    }

    #[test]
    fn tokenize_backslash_escape() {
        assert_eq!(values(r"a\ b"), vec![r"a\ b", ""]);
    }

    #[test]
    fn tokenize_comment() {
        assert_eq!(values("a #comment\nb"), vec!["a", "\n", "b", ""]);
    }

    #[test]
    fn tokenize_backtick_block() {
        assert_eq!(values("echo `echo hi`"), vec!["echo", "`echo hi`", ""]);
    }

    #[test]
    fn tokenize_nested_backtick_block() {
        assert_eq!(
            values("echo `echo \\`hi\\``"),
            vec!["echo", "`echo \\`hi\\``", ""]
        );
    }

    #[test]
    fn tokenize_unterminated_backtick() {
        assert!(matches!(
            tokenize_str("`echo hi"),
            Err(TokenizerError::UnterminatedBacktick(_))
        ));
    }

    #[test]
    fn tokenize_newline_token() {
        assert_eq!(kinds("a\nb"), vec![
            TokenKind::Word,
            TokenKind::Newline,
            TokenKind::Word,
            TokenKind::Eof
        ]);
    }

    #[test]
    fn split_assignment_word() {
        let tokens = tokenize_str("X=Y").unwrap();
        assert_eq!(tokens[0].split_assignment(), Some(("X", "Y")));
    }

    #[test]
    fn reserved_word_table_is_inert_except_bang() {
        assert!(is_active_reserved_word("!"));
        assert!(!is_active_reserved_word("if"));
        assert!(RESERVED_WORDS.contains(&"while"));
    }
}
