//! shl: run a command template described as JSON.
//!
//! Reads a request from stdin, runs it, writes the result to stdout as JSON
//! and exits with the command's exit code (2 if it could not be run).
//!
//! ```json
//! {"template": ["grep -c ", {"value": "needle"}, " ", {"value": ["a.txt", "b.txt"]}],
//!  "options": {"pipefail": true}}
//! ```
//!
//! A hole value is a string, number, bool, list of strings,
//! `{"raw": "..."}` or `{"join": [...], "sep": ","}`.

use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;
use serde_json::json;

use shl::config::Config;
use shl::{Capture, ExecOptions, ExecutionResult, RenderOptions, StdinSource, Template, Value};

// ─── Types ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Request {
    template: Vec<SegmentInput>,
    #[serde(default)]
    options: OptionsInput,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SegmentInput {
    Literal(String),
    Hole { value: HoleInput },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HoleInput {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
    Raw {
        raw: String,
    },
    Joined {
        join: Vec<String>,
        #[serde(default)]
        sep: String,
    },
}

impl From<HoleInput> for Value {
    fn from(hole: HoleInput) -> Self {
        match hole {
            HoleInput::Text(s) => Value::Str(s),
            HoleInput::Int(n) => n.into(),
            HoleInput::Float(n) => n.into(),
            HoleInput::Bool(b) => b.into(),
            HoleInput::List(items) => Value::List(items),
            HoleInput::Raw { raw } => Value::Raw(raw),
            HoleInput::Joined { join, sep } => Value::joined(join, sep),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct OptionsInput {
    quiet: Option<bool>,
    /// "none", "bytes" or "text".
    capture: Option<String>,
    encoding: Option<String>,
    pipefail: Option<bool>,
    capture_stderr: Option<bool>,
    cwd: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    stdin: Option<String>,
    shell: Option<String>,
    list_separator: Option<String>,
}

impl Request {
    fn template(self) -> (Template, OptionsInput) {
        let segments = self
            .template
            .into_iter()
            .map(|segment| match segment {
                SegmentInput::Literal(text) => shl::Segment::Literal(text),
                SegmentInput::Hole { value } => shl::Segment::Hole(value.into()),
            })
            .collect();
        (Template::from_segments(segments), self.options)
    }
}

impl OptionsInput {
    /// Layer request options over config. Our own stdin carried the request,
    /// so children get empty input unless the request supplies some, and
    /// stdout is always captured for the JSON reply.
    fn resolve(self, config: &Config) -> (RenderOptions, ExecOptions) {
        let mut render = RenderOptions::from_config(config);
        if let Some(sep) = self.list_separator {
            render.list_separator = sep;
        }

        let mut exec = ExecOptions::from_config(config);
        exec.stdin = match self.stdin {
            Some(data) => StdinSource::Bytes(data.into_bytes()),
            None => StdinSource::Null,
        };
        exec.quiet = self.quiet.unwrap_or(true);
        let encoding = self.encoding.unwrap_or_else(|| config.exec.encoding.clone());
        exec.capture = match self.capture.as_deref() {
            Some("bytes") => Capture::Bytes,
            Some("text") => Capture::Text(encoding),
            _ => match exec.capture {
                Capture::None | Capture::Text(_) => Capture::Text(encoding),
                Capture::Bytes => Capture::Bytes,
            },
        };
        if let Some(v) = self.pipefail {
            exec.pipefail = v;
        }
        if let Some(v) = self.capture_stderr {
            exec.capture_stderr = v;
        }
        if let Some(dir) = self.cwd {
            exec.cwd = Some(shl::config::expand_path(&dir));
        }
        if let Some(shell) = self.shell {
            exec.shell = shell;
        }
        exec.env.extend(self.env);
        (render, exec)
    }
}

/// Text when the bytes decode, otherwise the byte array.
fn output_json(text: Option<&str>, bytes: Option<&[u8]>) -> serde_json::Value {
    match (text, bytes) {
        (Some(text), _) => json!(text),
        (None, Some(bytes)) => match std::str::from_utf8(bytes) {
            Ok(text) => json!(text),
            Err(_) => json!(bytes),
        },
        (None, None) => serde_json::Value::Null,
    }
}

fn response(result: &ExecutionResult) -> serde_json::Value {
    json!({
        "exit_code": result.exit_code,
        "stage_codes": result.stage_codes,
        "stdout": output_json(result.text.as_deref(), result.stdout.as_deref()),
        "stderr": output_json(None, result.stderr.as_deref()),
        "duration_ms": result.duration.as_millis() as u64,
    })
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("shl: {message}");
    std::process::exit(2);
}

fn main() {
    let config = Config::load();
    shl::logging::init(&config.logging);

    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        fail(format!("failed to read stdin: {e}"));
    }

    let request: Request = match serde_json::from_str(&input) {
        Ok(v) => v,
        Err(e) => fail(format!("JSON parse error: {e}")),
    };
    let (template, options) = request.template();
    let (render, exec) = options.resolve(&config);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => fail(format!("cannot start runtime: {e}")),
    };
    let outcome = runtime.block_on(async {
        let pipeline = shl::compile(&template, &render)?;
        Ok::<_, shl::Error>(shl::execute(&pipeline, &exec).await?)
    });

    match outcome {
        Ok(result) => {
            println!("{}", response(&result));
            std::process::exit(result.exit_code.clamp(0, 255));
        }
        Err(e) => fail(e),
    }
}

// ─── Tests ───────────────────────────────────────────
