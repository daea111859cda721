//! Turns a token's raw text into an [`Expr`]: a sequence of literal runs and
//! backtick substitutions, with quoting and escaping stripped away.
//!
//! This is a small scanner in its own right (distinct from the
//! [`crate::token`] tokenizer), operating on a single word's already-sliced
//! text rather than the whole source stream.

use crate::ast::{Backtick, Expr, ExprPart};
use crate::error::WordError;
use crate::source::SourceSpan;
use crate::token::tokenize_str;

/// Expands a single word's raw token text (quoting and escaping intact)
/// into an [`Expr`]. `location` is the span the originating token covered
/// in the outer source, used to tag the resulting node and any backtick
/// substitutions within it.
pub fn expand_word(raw: &str, location: SourceSpan) -> Result<Expr, WordError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = raw.chars().peekable();
    let mut quote = Quote::None;

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    literal.push(c);
                }
                continue;
            }
            Quote::Double => {
                if c == '"' {
                    quote = Quote::None;
                    continue;
                }
                if c == '\\' {
                    match chars.peek().copied() {
                        Some(escaped @ ('"' | '\\' | '`' | '$')) => {
                            chars.next();
                            literal.push(escaped);
                        }
                        _ => literal.push('\\'),
                    }
                    continue;
                }
                if c == '`' {
                    let backtick = scan_backtick(&mut chars)?;
                    parts.push(ExprPart::Literal(std::mem::take(&mut literal)));
                    parts.push(ExprPart::Backtick(parse_backtick(&backtick, location)?));
                    continue;
                }
                literal.push(c);
                continue;
            }
            Quote::None => {}
        }

        match c {
            '\'' => quote = Quote::Single,
            '"' => quote = Quote::Double,
            '\\' => match chars.next() {
                Some(escaped) => literal.push(escaped),
                None => return Err(WordError::DanglingEscape),
            },
            '`' => {
                let backtick = scan_backtick(&mut chars)?;
                parts.push(ExprPart::Literal(std::mem::take(&mut literal)));
                parts.push(ExprPart::Backtick(parse_backtick(&backtick, location)?));
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() || parts.is_empty() {
        parts.push(ExprPart::Literal(literal));
    }

    Ok(Expr { parts, location })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Consumes characters up to (and including) the closing backtick,
/// honoring nested backslash-escaped backticks and quoting exactly as the
/// tokenizer's own `scan_backtick_block` does. Returns the inner text,
/// with nested escaping of `` \` `` and `` \\ `` undone to the literal
/// character it represents.
fn scan_backtick(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<String, WordError> {
    let mut inner = String::new();
    let mut quote = Quote::None;

    loop {
        let Some(c) = chars.next() else {
            return Err(WordError::UnterminatedBacktick);
        };

        match quote {
            Quote::Single => {
                inner.push(c);
                if c == '\'' {
                    quote = Quote::None;
                }
                continue;
            }
            Quote::Double => {
                inner.push(c);
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            inner.push(escaped);
                        }
                    }
                    '"' => quote = Quote::None,
                    _ => (),
                }
                continue;
            }
            Quote::None => (),
        }

        match c {
            '`' => return Ok(inner),
            '\\' => match chars.next() {
                Some(escaped @ ('`' | '\\')) => inner.push(escaped),
                Some(escaped) => {
                    inner.push('\\');
                    inner.push(escaped);
                }
                None => return Err(WordError::UnterminatedBacktick),
            },
            '\'' => {
                inner.push(c);
                quote = Quote::Single;
            }
            '"' => {
                inner.push(c);
                quote = Quote::Double;
            }
            _ => inner.push(c),
        }
    }
}

/// Parses a backtick substitution's captured inner text as a full program,
/// per the resolution that `Backtick.inner` is always a `Node::Program`
/// rather than a bare expression.
fn parse_backtick(inner: &str, location: SourceSpan) -> Result<Backtick, WordError> {
    let tokens = tokenize_str(inner).map_err(|e| {
        WordError::BacktickParse(Box::new(crate::error::ParseError::Tokenizing(e)))
    })?;
    let program = crate::parser::parse_tokens(tokens)
        .map_err(|e| WordError::BacktickParse(Box::new(e)))?;
    Ok(Backtick {
        inner: Box::new(crate::ast::Node::Program(program)),
        location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourcePosition;
    use pretty_assertions::assert_eq;

    fn span() -> SourceSpan {
        SourceSpan {
            start: SourcePosition::START,
            end: SourcePosition::START,
        }
    }

    #[test]
    fn expand_plain_word() {
        let expr = expand_word("hello", span()).unwrap();
        assert_eq!(expr.as_literal(), Some("hello"));
    }

    #[test]
    fn expand_single_quoted() {
        let expr = expand_word("'a b'", span()).unwrap();
        assert_eq!(expr.as_literal(), Some("a b"));
    }

    #[test]
    fn expand_double_quoted_escape() {
        let expr = expand_word(r#""a \"b\" c""#, span()).unwrap();
        assert_eq!(expr.as_literal(), Some(r#"a "b" c"#));
    }

    #[test]
    fn expand_backslash_escape_outside_quotes() {
        let expr = expand_word(r"a\ b", span()).unwrap();
        assert_eq!(expr.as_literal(), Some("a b"));
    }

    #[test]
    fn expand_backtick_substitution() {
        let expr = expand_word("`echo hi`", span()).unwrap();
        assert_eq!(expr.parts.len(), 1);
        assert!(matches!(expr.parts[0], ExprPart::Backtick(_)));
    }

    #[test]
    fn expand_mixed_literal_and_backtick() {
        let expr = expand_word("pre`echo mid`post", span()).unwrap();
        assert_eq!(expr.parts.len(), 3);
        assert_eq!(expr.parts[0], ExprPart::Literal("pre".to_string()));
        assert!(matches!(expr.parts[1], ExprPart::Backtick(_)));
        assert_eq!(expr.parts[2], ExprPart::Literal("post".to_string()));
    }

    #[test]
    fn expand_dangling_escape_errors() {
        assert!(matches!(
            expand_word("a\\", span()),
            Err(WordError::DanglingEscape)
        ));
    }

    #[test]
    fn expand_unterminated_backtick_errors() {
        assert!(matches!(
            expand_word("`echo hi", span()),
            Err(WordError::UnterminatedBacktick)
        ));
    }
}
