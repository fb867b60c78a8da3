//! Types produced by the lexer and parser and consumed by the executor.

use std::collections::BTreeMap;
use std::fmt;

/// Lexer context at a position in the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteState {
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
    /// Inside `$(...)` or backticks; the payload is the nesting depth.
    InsideCommandSubstitution(u32),
    /// Directly after an unquoted backslash.
    AfterEscape,
    /// Inside `${...}`.
    InsideParameterExpansion,
}

impl QuoteState {
    /// Inside `'...'` or `"..."`.
    pub fn is_quoted(self) -> bool {
        matches!(self, QuoteState::SingleQuoted | QuoteState::DoubleQuoted)
    }
}

impl fmt::Display for QuoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteState::Unquoted => f.write_str("unquoted"),
            QuoteState::SingleQuoted => f.write_str("single-quoted string"),
            QuoteState::DoubleQuoted => f.write_str("double-quoted string"),
            QuoteState::InsideCommandSubstitution(depth) => {
                write!(f, "command substitution (depth {depth})")
            }
            QuoteState::AfterEscape => f.write_str("escape"),
            QuoteState::InsideParameterExpansion => f.write_str("parameter expansion"),
        }
    }
}

/// Which way a redirection points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirectKind {
    /// `>`
    Out,
    /// `>>`
    Append,
    /// `<`
    In,
    /// `>&`
    DupOut,
    /// `<&`
    DupIn,
}

impl RedirectKind {
    /// The descriptor redirected when no explicit fd prefix is given.
    pub fn default_fd(self) -> u32 {
        match self {
            RedirectKind::In | RedirectKind::DupIn => 0,
            RedirectKind::Out | RedirectKind::Append | RedirectKind::DupOut => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RedirectKind::Out => ">",
            RedirectKind::Append => ">>",
            RedirectKind::In => "<",
            RedirectKind::DupOut => ">&",
            RedirectKind::DupIn => "<&",
        }
    }
}

/// A redirection operator with its optional fd prefix (`2>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RedirectOp {
    pub fd: Option<u32>,
    pub kind: RedirectKind,
}

/// Shell control operator recognized outside quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `|`
    Pipe,
    /// `>`, `>>`, `<`, `>&`, `<&`
    Redirect(RedirectOp),
    /// `;`
    Semi,
    /// newline, equivalent to `;`
    Newline,
    /// `&`
    Background,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Pipe => f.write_str("|"),
            Operator::Redirect(RedirectOp { fd, kind }) => {
                if let Some(fd) = fd {
                    write!(f, "{fd}")?;
                }
                f.write_str(kind.as_str())
            }
            Operator::Semi => f.write_str(";"),
            Operator::Newline => f.write_str("\n"),
            Operator::Background => f.write_str("&"),
            Operator::And => f.write_str("&&"),
            Operator::Or => f.write_str("||"),
            Operator::OpenParen => f.write_str("("),
            Operator::CloseParen => f.write_str(")"),
        }
    }
}

/// A contiguous run of word text between delimiters and holes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    /// Shell syntax exactly as it goes on the command line.
    pub raw: String,
    /// The literal text after quote removal.
    pub text: String,
    /// Static text that the real shell would expand (`$x`, globs, `~`, ...).
    pub expands: bool,
}

impl Fragment {
    pub fn literal(raw: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            text: text.into(),
            expands: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Part of a word. Adjacent `Word` tokens belong to the same word.
    Word(Fragment),
    /// Marker for the `n`-th template hole; replaced during rendering.
    Hole(usize),
    Operator(Operator),
    Whitespace,
}

/// Constructs around a hole that its rendered text has to survive on top of
/// the innermost quote state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Enclosing {
    /// Backtick substitutions around the hole. The shell strips one level of
    /// backslash escapes per backtick before parsing the inner command.
    pub backticks: u32,
    /// A backtick substitution around the hole opened inside double quotes.
    pub quoted_backticks: bool,
    /// The hole sits inside `${...}`.
    pub parameter: bool,
}

/// A token paired with the quote state at its start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub token: Token,
    pub state: QuoteState,
    /// Only meaningful for [`Token::Hole`].
    pub enclosing: Enclosing,
}

/// One complete shell word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Word {
    pub raw: String,
    pub value: String,
    pub expands: bool,
}

impl Word {
    /// `NAME=value` as written, which the shell takes as a variable
    /// assignment when it comes before the command name.
    pub fn is_assignment(&self) -> bool {
        let Some((name, _)) = self.raw.split_once('=') else {
            return false;
        };
        let mut chars = name.chars();
        matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
            && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
    }

    pub(crate) fn push(&mut self, fragment: &Fragment) {
        self.raw.push_str(&fragment.raw);
        self.value.push_str(&fragment.text);
        self.expands |= fragment.expands;
    }
}

/// Commands that only exist inside the shell, or that change the shell itself.
const SHELL_BUILTINS: &[&str] = &[
    ".", ":", "alias", "bg", "break", "cd", "command", "continue", "eval", "exec", "exit",
    "export", "fg", "getopts", "hash", "jobs", "local", "read", "readonly", "return", "set",
    "shift", "source", "times", "trap", "type", "ulimit", "umask", "unalias", "unset", "wait",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Truncate,
    Append,
}

/// Where a file descriptor ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    File { path: Word, mode: FileMode },
    /// The stage's own descriptor as it was before any redirection.
    Fd(u32),
}

/// A simple command: argv plus its redirections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub(crate) argv: Vec<Word>,
    pub(crate) redirects: BTreeMap<u32, RedirectTarget>,
}

impl Command {
    pub fn argv(&self) -> &[Word] {
        &self.argv
    }

    /// Argument values after quote removal.
    pub fn args(&self) -> Vec<&str> {
        self.argv.iter().map(|w| w.value.as_str()).collect()
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(|w| w.value.as_str())
    }

    /// Final redirection per descriptor, after left-to-right resolution.
    pub fn redirects(&self) -> &BTreeMap<u32, RedirectTarget> {
        &self.redirects
    }

    pub fn redirect(&self, fd: u32) -> Option<&RedirectTarget> {
        self.redirects.get(&fd)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.argv.is_empty() && self.redirects.is_empty()
    }

    /// Whether spawning this command directly from argv would differ from
    /// what the shell would do with it.
    fn needs_shell(&self) -> bool {
        self.argv
            .first()
            .is_some_and(|w| w.is_assignment() || SHELL_BUILTINS.contains(&w.value.as_str()))
            || self.argv.iter().any(|w| w.expands)
            || self.redirects.iter().any(|(fd, target)| {
                *fd > 2
                    || match target {
                        RedirectTarget::Fd(_) => true,
                        RedirectTarget::File { path, .. } => path.expands,
                    }
            })
    }
}

/// One or more commands connected by `|`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub(crate) stages: Vec<Command>,
    pub(crate) line: String,
}

impl Pipeline {
    pub fn stages(&self) -> &[Command] {
        &self.stages
    }

    /// The rendered command line, valid input for `sh -c`.
    pub fn command_line(&self) -> &str {
        &self.line
    }

    /// True when the pipeline relies on expansion or fd plumbing that only a
    /// real shell provides, so it must run as `sh -c <command_line>`.
    pub fn requires_shell(&self) -> bool {
        self.stages.iter().any(Command::needs_shell)
    }

    /// True when any stage writes its stdout or stderr to a file.
    pub fn has_output_redirection(&self) -> bool {
        self.stages.iter().any(|stage| {
            stage.redirects.iter().any(|(fd, target)| {
                *fd != 0
                    && matches!(
                        target,
                        RedirectTarget::File {
                            mode: FileMode::Truncate | FileMode::Append,
                            ..
                        }
                    )
            })
        })
    }

    /// Cross-check the command line with the bash grammar.
    pub fn validate_syntax(&self) -> Result<(), crate::error::SyntaxError> {
        super::syntax::check(&self.line)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}
