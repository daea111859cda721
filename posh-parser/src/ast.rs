//! The abstract syntax tree produced by the [`crate::parser`].
//!
//! `Node` is a single tagged sum covering every syntactic form this grammar
//! recognizes, so the executor can dispatch on it with one `match` rather
//! than a family of visitor traits — the same "open recursion over an enum"
//! shape the core evaluator expects to walk.

use indexmap::IndexMap;

use crate::source::SourceSpan;

/// The root of a parsed script: zero or more sequence-separated commands.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    /// The top-level commands, in left-to-right execution order.
    pub commands: Vec<Node>,
}

/// A single node of the AST. Commands and expressions share this type so
/// that `Backtick` substitutions can embed a full `Program` without a
/// separate parallel tree.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Node {
    /// A whole parsed script or backtick body: a sequence of commands.
    Program(Program),
    /// `name=value... word... redirect...`
    SimpleCommand(SimpleCommand),
    /// `left | right`
    Pipe(Pipe),
    /// `left && right` or `left || right`
    Binary(Binary),
    /// `command &`
    Background(Box<Node>),
    /// `! command`
    Not(Box<Node>),
    /// A word, after expansion into literal text and substitutions.
    Expr(Expr),
}

/// `left OP right`, where `OP` is `&&` or `||`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Binary {
    /// Which of `&&`/`||` this node represents.
    pub kind: BinaryKind,
    /// The left-hand command.
    pub left: Box<Node>,
    /// The right-hand command, evaluated conditionally on `left`'s status.
    pub right: Box<Node>,
}

/// Distinguishes `&&` from `||`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryKind {
    /// `&&`: run `right` only if `left` exits successfully.
    #[strum(serialize = "&&")]
    And,
    /// `||`: run `right` only if `left` exits unsuccessfully.
    #[strum(serialize = "||")]
    Or,
}

/// `commands[0] | commands[1] | ...`: each stage's standard output feeds
/// the next stage's standard input. Always holds at least two stages — a
/// single-stage pipeline collapses to its lone child during parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pipe {
    /// The pipeline's stages, in left-to-right (upstream-to-downstream)
    /// order.
    pub commands: Vec<Node>,
}

/// A command name plus its arguments, leading variable assignments, and
/// redirections, in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimpleCommand {
    /// Leading `NAME=value` assignments, in the order they appeared.
    /// Preserved as an ordered map (not deduplicated beyond last-write-wins)
    /// since later duplicate assignments must still win in order.
    pub assignments: IndexMap<String, Expr>,
    /// The command name. Empty (zero-part `Expr`) if this simple command
    /// consists only of assignments and/or redirections.
    pub word: Expr,
    /// The command's arguments, not including the command name itself.
    pub args: Vec<Expr>,
    /// IO redirections to apply before this command runs.
    pub redirections: Vec<IoRedirection>,
}

/// A single `[n]OP word` redirection.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IoRedirection {
    /// The file descriptor being redirected. Always present: defaulted per
    /// `mode` (0 for input-like modes, 1 for output-like ones) when the
    /// source had no explicit `IO_NUMBER` prefix.
    pub fd: u32,
    /// Which redirection operator this is.
    pub mode: RedirectMode,
    /// The target word (a filename, or a duplication target for `<&`/`>&`).
    pub target: Expr,
}

/// The operator of an [`IoRedirection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RedirectMode {
    /// `<`: open for reading.
    #[strum(serialize = "<")]
    Input,
    /// `>`: open for writing, truncating.
    #[strum(serialize = ">")]
    Output,
    /// `>>`: open for writing, appending.
    #[strum(serialize = ">>")]
    Append,
    /// `<&`: duplicate an existing descriptor for reading (or close with `-`).
    #[strum(serialize = "<&")]
    DuplicateInput,
    /// `>&`: duplicate an existing descriptor for writing (or close with `-`).
    #[strum(serialize = ">&")]
    DuplicateOutput,
    /// `<>`: open for both reading and writing.
    #[strum(serialize = "<>")]
    ReadWrite,
    /// `>|`: open for writing, truncating, ignoring `noclobber`-style checks.
    #[strum(serialize = ">|")]
    Clobber,
}

/// An expanded word: a concatenation of literal text and backtick command
/// substitutions, built by [`crate::expander`] from a token's raw text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    /// The ordered parts that, concatenated after evaluation, form this
    /// word's final text (before field splitting).
    pub parts: Vec<ExprPart>,
    /// The source span the originating token covered.
    pub location: SourceSpan,
}

/// One piece of an [`Expr`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprPart {
    /// A literal run of (already-unescaped) text.
    Literal(String),
    /// `` `command` ``: substitute the captured standard output of running
    /// `inner` (always a [`Node::Program`]) in place, subject to field
    /// splitting per the expansion rules.
    Backtick(Backtick),
}

/// A parsed backtick command substitution.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Backtick {
    /// The fully parsed command sequence inside the backticks.
    pub inner: Box<Node>,
    /// The span of source text the whole `` `...` `` construct covered.
    pub location: SourceSpan,
}

impl Expr {
    /// Returns whether this word is a single literal with no substitutions,
    /// in which case its final text is known without running anything.
    pub fn as_literal(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [ExprPart::Literal(s)] => Some(s),
            [] => Some(""),
            _ => None,
        }
    }
}
