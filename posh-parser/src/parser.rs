//! A recursive-descent parser over the token stream produced by
//! [`crate::token`].
//!
//! The parser walks an index into a flat `Vec<Token>` rather than an
//! iterator, so that rules which need lookahead across several tokens can
//! `backup()` to an earlier index and retry a different production. Token
//! identifier "upgrades" (`WORD` → `ASSIGNMENT_WORD`, `WORD` → `!`) are
//! applied in place via `Token::set_kind`'s interior mutability and are
//! undone symmetrically on backtrack, so a rejected parse never leaves a
//! token mutated for whoever retries from that position.

use crate::ast::{
    Binary, BinaryKind, Expr, IoRedirection, Node, Pipe, Program, RedirectMode, SimpleCommand,
};
use crate::error::ParseError;
use crate::expander::expand_word;
use crate::token::{is_active_reserved_word, tokenize_str, Token, TokenKind};

/// Parses a complete script into a [`Program`].
pub fn parse(input: &str) -> Result<Program, ParseError> {
    let tokens = tokenize_str(input)?;
    parse_tokens(tokens)
}

/// Parses an already-tokenized stream into a [`Program`]. Exposed
/// separately from [`parse`] so that backtick substitutions — which are
/// expanded from a token's raw text, not the original source string — can
/// feed their own freshly tokenized inner text through the same grammar.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Program, ParseError> {
    let mut parser = Parser::new(tokens);
    let program = parser.program()?;
    parser.expect_eof()?;
    Ok(program)
}

/// One reversible upgrade applied to a token's `kind` during speculative
/// parsing, recorded so [`Parser::backup`] can undo it.
struct Upgrade {
    index: usize,
    previous: TokenKind,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    upgrades: Vec<Upgrade>,
}

/// An opaque snapshot of parser state, returned by [`Parser::mark`] and
/// consumed by [`Parser::backup`] or [`Parser::commit`].
struct Mark {
    pos: usize,
    upgrade_len: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            upgrades: Vec::new(),
        }
    }

    fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            upgrade_len: self.upgrades.len(),
        }
    }

    /// Restores position and undoes every token-kind upgrade recorded since
    /// `mark` was taken, in reverse order.
    fn backup(&mut self, mark: Mark) {
        tracing::trace!(
            "backtracking from {} to {} ({} upgrade(s) reverted)",
            self.pos,
            mark.pos,
            self.upgrades.len() - mark.upgrade_len
        );
        while self.upgrades.len() > mark.upgrade_len {
            let upgrade = self.upgrades.pop().expect("checked len above");
            self.tokens[upgrade.index]
                .set_kind(upgrade.previous);
        }
        self.pos = mark.pos;
    }

    /// Discards a mark without restoring, once its speculative path has
    /// been committed to.
    fn commit(&mut self, _mark: Mark) {}

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> TokenKind {
        self.current().kind()
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// Upgrades the current token's kind, recording the change for
    /// possible backtrack, then advances past it.
    fn upgrade_and_advance(&mut self, kind: TokenKind) -> &Token {
        let index = self.pos;
        let previous = self.tokens[index].set_kind(kind);
        tracing::trace!("upgraded token {index} from {previous} to {kind}");
        self.upgrades.push(Upgrade { index, previous });
        self.advance()
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if self.peek_kind() == TokenKind::Eof {
            Ok(())
        } else {
            Err(ParseError::unexpected(self.current(), "end of input"))
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek_kind() == TokenKind::Newline {
            self.advance();
        }
    }

    // program : linebreak complete_commands linebreak
    //         | linebreak
    fn program(&mut self) -> Result<Program, ParseError> {
        self.skip_newlines();
        let mut commands = Vec::new();
        if self.peek_kind() == TokenKind::Eof {
            return Ok(Program { commands });
        }
        commands.push(self.and_or()?);
        loop {
            match self.peek_kind() {
                TokenKind::And => {
                    self.advance();
                    let last = commands.pop().expect("just pushed at least one command");
                    commands.push(Node::Background(Box::new(last)));
                    self.skip_newlines();
                    if matches!(self.peek_kind(), TokenKind::Eof) {
                        break;
                    }
                    commands.push(self.and_or()?);
                }
                TokenKind::Semi => {
                    self.advance();
                    self.skip_newlines();
                    if matches!(self.peek_kind(), TokenKind::Eof) {
                        break;
                    }
                    commands.push(self.and_or()?);
                }
                TokenKind::Newline => {
                    self.skip_newlines();
                    if matches!(self.peek_kind(), TokenKind::Eof) {
                        break;
                    }
                    commands.push(self.and_or()?);
                }
                _ => break,
            }
        }
        self.skip_newlines();
        Ok(Program { commands })
    }

    // and_or : pipeline (('&&'|'||') linebreak and_or)? [right-assoc]
    fn and_or(&mut self) -> Result<Node, ParseError> {
        let left = self.pipeline()?;
        let kind = match self.peek_kind() {
            TokenKind::AndAnd => BinaryKind::And,
            TokenKind::OrOr => BinaryKind::Or,
            _ => return Ok(left),
        };
        self.advance();
        self.skip_newlines();
        let right = self.and_or()?;
        Ok(Node::Binary(Binary {
            kind,
            left: Box::new(left),
            right: Box::new(right),
        }))
    }

    // pipeline : command ('|' linebreak command)*
    fn pipeline(&mut self) -> Result<Node, ParseError> {
        let mut commands = vec![self.command()?];
        while self.peek_kind() == TokenKind::Pipe {
            self.advance();
            self.skip_newlines();
            commands.push(self.command()?);
        }
        if commands.len() == 1 {
            Ok(commands.pop().expect("length checked above"))
        } else {
            Ok(Node::Pipe(Pipe { commands }))
        }
    }

    // command : '!' command
    //         | simple_command
    // (trailing '&' is handled one level up, in and_or's caller, so that
    // `cmd1 & cmd2` sequences correctly; here we only handle the bang
    // upgrade, since it binds tighter than backgrounding.)
    fn command(&mut self) -> Result<Node, ParseError> {
        if self.peek_kind() == TokenKind::Word && is_active_reserved_word(&self.current().value) {
            let mark = self.mark();
            self.upgrade_and_advance(TokenKind::Bang);
            match self.command() {
                Ok(inner) => {
                    self.commit(mark);
                    return Ok(Node::Not(Box::new(inner)));
                }
                Err(e) => {
                    self.backup(mark);
                    return Err(e);
                }
            }
        }
        self.simple_command()
    }

    // simple_command : cmd_prefix cmd_word cmd_suffix*
    //                | cmd_prefix
    //                | cmd_name cmd_suffix*
    fn simple_command(&mut self) -> Result<Node, ParseError> {
        let mark = self.mark();
        let mut command = SimpleCommand::default();

        loop {
            match self.peek_kind() {
                TokenKind::Word if self.looks_like_assignment() => {
                    self.upgrade_and_advance(TokenKind::AssignmentWord);
                    let token = &self.tokens[self.pos - 1];
                    let (name, value_text) = token
                        .split_assignment()
                        .expect("looks_like_assignment verified this splits");
                    let name = name.to_string();
                    let expr = expand_word(value_text, token.location)?;
                    command.assignments.insert(name, expr);
                }
                TokenKind::Less
                | TokenKind::Great
                | TokenKind::DGreat
                | TokenKind::LessAnd
                | TokenKind::GreatAnd
                | TokenKind::LessGreat
                | TokenKind::Clobber
                | TokenKind::IoNumber => {
                    let redirection = self.io_redirect()?;
                    command.redirections.push(redirection);
                }
                _ => break,
            }
        }

        let mut have_word = false;
        while matches!(self.peek_kind(), TokenKind::Word) {
            let token = self.advance();
            let expr = expand_word(&token.value, token.location)?;
            if have_word {
                command.args.push(expr);
            } else {
                command.word = expr;
                have_word = true;
            }

            loop {
                match self.peek_kind() {
                    TokenKind::Less
                    | TokenKind::Great
                    | TokenKind::DGreat
                    | TokenKind::LessAnd
                    | TokenKind::GreatAnd
                    | TokenKind::LessGreat
                    | TokenKind::Clobber
                    | TokenKind::IoNumber => {
                        let redirection = self.io_redirect()?;
                        command.redirections.push(redirection);
                    }
                    _ => break,
                }
            }
        }

        if !have_word && command.assignments.is_empty() && command.redirections.is_empty() {
            let err = ParseError::unexpected(self.current(), "a command");
            self.backup(mark);
            return Err(err);
        }

        self.commit(mark);
        Ok(Node::SimpleCommand(command))
    }

    /// Returns whether the current `WORD` token's raw text has the shape of
    /// an assignment (`NAME=...`), per POSIX rule 7b — only consulted while
    /// still in the command-prefix position, before any command word has
    /// been seen.
    fn looks_like_assignment(&self) -> bool {
        self.current().split_assignment().is_some()
    }

    // io_redirect : IO_NUMBER? (io_file | io_dup)
    fn io_redirect(&mut self) -> Result<IoRedirection, ParseError> {
        let explicit_fd = if self.peek_kind() == TokenKind::IoNumber {
            let token = self.advance();
            Some(token.value.parse::<u32>().map_err(|_| {
                ParseError::BadFdNumber(token.value.clone(), token.location.start)
            })?)
        } else {
            None
        };

        let mode = match self.peek_kind() {
            TokenKind::Less => RedirectMode::Input,
            TokenKind::Great => RedirectMode::Output,
            TokenKind::DGreat => RedirectMode::Append,
            TokenKind::LessAnd => RedirectMode::DuplicateInput,
            TokenKind::GreatAnd => RedirectMode::DuplicateOutput,
            TokenKind::LessGreat => RedirectMode::ReadWrite,
            TokenKind::Clobber => RedirectMode::Clobber,
            _ => return Err(ParseError::unexpected(self.current(), "a redirection operator")),
        };
        self.advance();

        if self.peek_kind() != TokenKind::Word {
            return Err(ParseError::unexpected(self.current(), "a word"));
        }
        let token = self.advance();
        let target = expand_word(&token.value, token.location)?;

        let fd = explicit_fd.unwrap_or(match mode {
            RedirectMode::Input | RedirectMode::DuplicateInput | RedirectMode::ReadWrite => 0,
            RedirectMode::Output
            | RedirectMode::Append
            | RedirectMode::DuplicateOutput
            | RedirectMode::Clobber => 1,
        });

        Ok(IoRedirection { fd, mode, target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprPart;
    use pretty_assertions::assert_eq;

    fn words(node: &Node) -> Vec<String> {
        match node {
            Node::SimpleCommand(cmd) => std::iter::once(&cmd.word)
                .chain(cmd.args.iter())
                .map(|w| w.as_literal().unwrap_or_default().to_string())
                .collect(),
            _ => panic!("expected a simple command"),
        }
    }

    #[test]
    fn parse_empty_program() {
        let program = parse("").unwrap();
        assert_eq!(program.commands.len(), 0);
    }

    #[test]
    fn parse_simple_command() {
        let program = parse("echo hello world").unwrap();
        assert_eq!(program.commands.len(), 1);
        assert_eq!(words(&program.commands[0]), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn parse_assignment_prefix() {
        let program = parse("FOO=bar echo hi").unwrap();
        let Node::SimpleCommand(cmd) = &program.commands[0] else {
            panic!("expected simple command");
        };
        assert_eq!(
            cmd.assignments.get("FOO").and_then(Expr::as_literal),
            Some("bar")
        );
        assert_eq!(words(&program.commands[0]), vec!["echo", "hi"]);
    }

    #[test]
    fn parse_bare_assignment() {
        let program = parse("FOO=bar").unwrap();
        let Node::SimpleCommand(cmd) = &program.commands[0] else {
            panic!("expected simple command");
        };
        assert_eq!(cmd.word.as_literal(), Some(""));
        assert!(cmd.args.is_empty());
        assert_eq!(
            cmd.assignments.get("FOO").and_then(Expr::as_literal),
            Some("bar")
        );
    }

    #[test]
    fn parse_pipeline() {
        let program = parse("echo hi | rev").unwrap();
        assert!(matches!(program.commands[0], Node::Pipe(_)));
    }

    #[test]
    fn parse_and_or() {
        // Right-associative: `a && b || c` parses as `a && (b || c)`.
        let program = parse("true && echo yes || echo no").unwrap();
        let Node::Binary(outer) = &program.commands[0] else {
            panic!("expected binary node");
        };
        assert_eq!(outer.kind, BinaryKind::And);
        assert!(matches!(*outer.left, Node::SimpleCommand(_)));
        let Node::Binary(inner) = &*outer.right else {
            panic!("expected nested binary node");
        };
        assert_eq!(inner.kind, BinaryKind::Or);
    }

    #[test]
    fn parse_negation() {
        let program = parse("! true").unwrap();
        assert!(matches!(program.commands[0], Node::Not(_)));
    }

    #[test]
    fn parse_background() {
        let program = parse("sleep 1 &").unwrap();
        assert_eq!(program.commands.len(), 1);
        assert!(matches!(program.commands[0], Node::Background(_)));
    }

    #[test]
    fn parse_sequence() {
        let program = parse("echo a; echo b\necho c").unwrap();
        assert_eq!(program.commands.len(), 3);
    }

    #[test]
    fn parse_redirection() {
        let program = parse("cat < input.txt > output.txt").unwrap();
        let Node::SimpleCommand(cmd) = &program.commands[0] else {
            panic!("expected simple command");
        };
        assert_eq!(cmd.redirections.len(), 2);
        assert_eq!(cmd.redirections[0].mode, RedirectMode::Input);
        assert_eq!(cmd.redirections[1].mode, RedirectMode::Output);
    }

    #[test]
    fn parse_fd_numbered_redirection() {
        let program = parse("echo hi 2>&1").unwrap();
        let Node::SimpleCommand(cmd) = &program.commands[0] else {
            panic!("expected simple command");
        };
        assert_eq!(cmd.redirections[0].fd, 2);
        assert_eq!(cmd.redirections[0].mode, RedirectMode::DuplicateOutput);
    }

    #[test]
    fn parse_backtick_inner_is_program() {
        let program = parse("echo `echo hi`").unwrap();
        let Node::SimpleCommand(cmd) = &program.commands[0] else {
            panic!("expected simple command");
        };
        let ExprPart::Backtick(backtick) = &cmd.args[0].parts[0] else {
            panic!("expected backtick part");
        };
        assert!(matches!(*backtick.inner, Node::Program(_)));
    }

    #[test]
    fn parse_syntax_error_on_bad_pipe() {
        assert!(parse("| echo hi").is_err());
    }

    #[test]
    fn parse_unsupported_operators_are_syntax_errors() {
        // `;;` and here-document operators have no grammar production and
        // surface as ordinary syntax errors rather than a dedicated kind.
        assert!(parse("echo hi ;;").is_err());
        assert!(parse("echo hi << EOF").is_err());
    }
}
