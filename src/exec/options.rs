use std::path::PathBuf;

use crate::config::{Config, expand_path};

/// What to buffer from the final stage's stdout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Capture {
    #[default]
    None,
    /// Buffer and decode with the named encoding (any WHATWG label).
    Text(String),
    Bytes,
}

impl Capture {
    pub fn is_some(&self) -> bool {
        !matches!(self, Capture::None)
    }
}

/// Where the first stage reads its input from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StdinSource {
    #[default]
    Inherit,
    Null,
    Bytes(Vec<u8>),
}

/// Immutable execution settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    /// Do not forward child output to our own stdout/stderr.
    pub quiet: bool,
    pub capture: Capture,
    /// Also buffer stderr of every stage.
    pub capture_stderr: bool,
    /// Report the rightmost failing stage instead of the last stage.
    ///
    /// A pipeline run through the shell has a single process, so
    /// `stage_codes` holds one entry and the shell's own `set -o pipefail`
    /// decides the status. Shells without that option ignore it and report
    /// the last stage.
    pub pipefail: bool,
    pub stdin: StdinSource,
    pub cwd: Option<PathBuf>,
    /// Added to the inherited environment.
    pub env: Vec<(String, String)>,
    /// Interpreter for pipelines that need real shell expansion.
    pub shell: String,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            quiet: false,
            capture: Capture::None,
            capture_stderr: false,
            pipefail: false,
            stdin: StdinSource::Inherit,
            cwd: None,
            env: Vec::new(),
            shell: "sh".into(),
        }
    }
}

impl ExecOptions {
    pub fn from_config(config: &Config) -> Self {
        let exec = &config.exec;
        let capture = match exec.capture.as_str() {
            "bytes" => Capture::Bytes,
            "text" => Capture::Text(exec.encoding.clone()),
            _ => Capture::None,
        };
        Self {
            quiet: exec.quiet,
            capture,
            capture_stderr: exec.capture_stderr,
            pipefail: exec.pipefail,
            stdin: StdinSource::Inherit,
            cwd: exec.cwd.as_deref().map(expand_path),
            env: exec
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            shell: exec.shell.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_forward_output() {
        let opts = ExecOptions::default();
        assert!(!opts.quiet);
        assert_eq!(opts.capture, Capture::None);
        assert_eq!(opts.stdin, StdinSource::Inherit);
        assert_eq!(opts.shell, "sh");
    }

    #[test]
    fn from_default_config() {
        let opts = ExecOptions::from_config(&Config::default_config());
        assert_eq!(opts, ExecOptions::default());
    }

    #[test]
    fn from_config_with_text_capture() {
        let config = Config::from_toml(
            r#"
[exec]
capture = "text"
encoding = "latin1"
pipefail = true
[exec.env]
LC_ALL = "C"
"#,
        )
        .unwrap();
        let opts = ExecOptions::from_config(&config);
        assert_eq!(opts.capture, Capture::Text("latin1".into()));
        assert!(opts.pipefail);
        assert_eq!(opts.env, vec![("LC_ALL".to_string(), "C".to_string())]);
    }
}
