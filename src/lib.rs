//! shl: injection-safe shell command templates.
//!
//! A [`Template`] mixes static shell syntax with runtime values ("holes").
//! The static text is lexed with full quote tracking, every hole is escaped
//! for the exact quote context it lands in, and the result is parsed into a
//! single [`Pipeline`] and run asynchronously. A hole value can never become
//! shell syntax: `echo {s}` prints `s` for every string `s`.
//!
//! ```no_run
//! # async fn demo() -> shl::Result<()> {
//! let file = "notes; rm -rf ~";
//! let result = shl::sh(shl::template!("wc -l < " {file})).text().await?;
//! println!("{} (exit {})", result.text.unwrap_or_default(), result.exit_code);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **[`template`]** — Template, Segment and hole Value types, `template!` macro.
//! - **[`parse`]** — Lexer with quote-state tracking, hole renderer, pipeline parser, tree-sitter-bash cross-check.
//! - **[`exec`]** — Async executor: direct argv spawning or `sh -c`, pipes, capture, process groups.
//! - **[`command`]** — The `sh(...)` builder tying it all together.
//! - **[`config`]** — Configuration loading: embedded defaults + user overlay merge.
//! - **[`logging`]** — Execution logging to `~/.local/share/shl/shl.log`.

/// Fluent command builder.
pub mod command;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Error types for each stage.
pub mod error;
/// Pipeline execution.
pub mod exec;
/// File-based execution logging.
pub mod logging;
/// Lexing, rendering and parsing of templates.
pub mod parse;
/// Templates and hole values.
pub mod template;

pub use command::{Sh, sh};
pub use error::{Error, Result};
pub use exec::{Capture, ExecOptions, ExecutionResult, StdinSource, execute};
pub use parse::{Pipeline, QuoteState, RenderOptions, compile};
pub use template::{Segment, Template, TemplateBuilder, Value};

/// Compile and run a template with options derived from configuration.
///
/// This is the main entry point for the CLI and simple usage.
pub async fn run(template: &Template, config: &config::Config) -> Result<ExecutionResult> {
    let pipeline = compile(template, &RenderOptions::from_config(config))?;
    Ok(execute(&pipeline, &ExecOptions::from_config(config)).await?)
}
