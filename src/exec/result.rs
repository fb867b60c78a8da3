use std::borrow::Cow;
use std::process::ExitStatus;
use std::time::Duration;

/// Outcome of one pipeline run. A non-zero exit code is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Last stage's code, or the rightmost failure under pipefail.
    pub exit_code: i32,
    /// One code per spawned process, in pipeline order.
    pub stage_codes: Vec<i32>,
    /// Final stage's stdout, when captured.
    pub stdout: Option<Vec<u8>>,
    /// All stages' stderr, when captured.
    pub stderr: Option<Vec<u8>>,
    /// Decoded stdout, when captured as text.
    pub text: Option<String>,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Decoded text if available, else stdout read as lossy UTF-8.
    pub fn stdout_text(&self) -> Option<Cow<'_, str>> {
        match (&self.text, &self.stdout) {
            (Some(text), _) => Some(Cow::Borrowed(text.as_str())),
            (None, Some(bytes)) => Some(String::from_utf8_lossy(bytes)),
            (None, None) => None,
        }
    }

    pub fn stderr_text(&self) -> Option<Cow<'_, str>> {
        self.stderr.as_deref().map(String::from_utf8_lossy)
    }
}

/// Shell-style exit code: the exit status, or 128 + signal number.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Combine stage codes into the pipeline's code.
pub(crate) fn pipeline_code(codes: &[i32], pipefail: bool) -> i32 {
    if pipefail {
        codes.iter().rev().find(|c| **c != 0).copied().unwrap_or(0)
    } else {
        codes.last().copied().unwrap_or(0)
    }
}
