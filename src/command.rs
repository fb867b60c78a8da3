//! Caller-facing builder: `sh(template)` then options, then `.await`.
//!
//! ```no_run
//! # async fn demo() -> shl::Result<()> {
//! let name = "O'Brien";
//! let out = shl::sh(shl::template!("echo " {name})).text().await?;
//! assert_eq!(out.text.as_deref(), Some("O'Brien\n"));
//! # Ok(())
//! # }
//! ```

use std::future::{Future, IntoFuture};
use std::path::PathBuf;
use std::pin::Pin;

use crate::error::Result;
use crate::exec::{Capture, ExecOptions, ExecutionResult, StdinSource, execute};
use crate::parse::{Pipeline, RenderOptions, compile};
use crate::template::Template;

/// Start a command from a template or a plain string.
pub fn sh(template: impl Into<Template>) -> Sh {
    Sh::new(template.into())
}

/// A template plus the options it will run with.
#[derive(Debug, Clone)]
#[must_use = "a command does nothing until it is awaited"]
pub struct Sh {
    template: Template,
    render: RenderOptions,
    options: ExecOptions,
}

impl Sh {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            render: RenderOptions::default(),
            options: ExecOptions::default(),
        }
    }

    /// Replace all execution options at once, e.g. with
    /// [`ExecOptions::from_config`].
    pub fn options(mut self, options: ExecOptions) -> Self {
        self.options = options;
        self
    }

    pub fn render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    pub fn list_separator(mut self, separator: impl Into<String>) -> Self {
        self.render.list_separator = separator.into();
        self
    }

    /// Do not forward child output.
    pub fn quiet(mut self) -> Self {
        self.options.quiet = true;
        self
    }

    /// Capture stdout as UTF-8 text. Implies quiet.
    pub fn text(self) -> Self {
        self.text_encoding("utf-8")
    }

    /// Capture stdout decoded with `encoding`. Implies quiet.
    pub fn text_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.options.capture = Capture::Text(encoding.into());
        self.quiet()
    }

    /// Capture stdout as raw bytes. Implies quiet.
    pub fn bytes(mut self) -> Self {
        self.options.capture = Capture::Bytes;
        self.quiet()
    }

    pub fn capture_stderr(mut self) -> Self {
        self.options.capture_stderr = true;
        self
    }

    pub fn pipefail(mut self) -> Self {
        self.options.pipefail = true;
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin_bytes(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.options.stdin = StdinSource::Bytes(data.into());
        self
    }

    pub fn stdin_null(mut self) -> Self {
        self.options.stdin = StdinSource::Null;
        self
    }

    /// Interpreter used when the command line needs shell expansion.
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.options.shell = shell.into();
        self
    }

    pub fn exec_options(&self) -> &ExecOptions {
        &self.options
    }

    /// Lex, render and parse without running anything.
    pub fn compile(&self) -> Result<Pipeline> {
        compile(&self.template, &self.render)
    }

    pub async fn run(self) -> Result<ExecutionResult> {
        let pipeline = self.compile()?;
        Ok(execute(&pipeline, &self.options).await?)
    }
}

impl IntoFuture for Sh {
    type Output = Result<ExecutionResult>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}
