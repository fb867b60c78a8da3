pub mod render;
pub mod shell;
pub mod syntax;
pub mod tokenize;
pub mod types;

pub use render::{RenderOptions, render, render_in, render_tokens, render_with, single_quote};
pub use shell::{compile, parse};
pub use tokenize::{lex, lex_str};
pub use types::{
    Command, Enclosing, FileMode, Fragment, Lexeme, Operator, Pipeline, QuoteState, RedirectKind,
    RedirectOp, RedirectTarget, Token, Word,
};
