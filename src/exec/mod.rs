//! Running a parsed [`Pipeline`] as OS processes.
//!
//! Pipelines whose words need shell expansion are handed to the configured
//! shell as `<shell> -c <command line>`. Everything else is spawned directly
//! from argv, one process per stage, connected with OS pipes.

pub mod options;
pub mod process_group;
pub mod result;
pub mod stream;

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use encoding_rs::Encoding;
use log::{debug, warn};
use tokio::process::ChildStdout;
use tokio::task::JoinHandle;

use crate::error::{DecodeError, ExecError, SpawnError};
use crate::logging::log_execution;
use crate::parse::{FileMode, Pipeline, RedirectTarget};

pub use options::{Capture, ExecOptions, StdinSource};
pub use result::ExecutionResult;

use process_group::StageSet;
use result::{exit_code, pipeline_code};
use stream::{Tee, collect, feed};

/// One process to start.
#[derive(Debug)]
struct Launch {
    program: String,
    args: Vec<String>,
    files: BTreeMap<u32, (PathBuf, FileMode)>,
}

impl Launch {
    fn display(&self) -> String {
        let argv = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str));
        shlex::try_join(argv).unwrap_or_else(|_| self.program.clone())
    }
}

fn plan(pipeline: &Pipeline, options: &ExecOptions) -> Vec<Launch> {
    if pipeline.requires_shell() {
        if let Err(err) = pipeline.validate_syntax() {
            warn!("bash grammar disagrees with command line: {err}");
        }
        let mut script = pipeline.command_line().to_string();
        if options.pipefail {
            // Shells without the option would abort on a failing `set`.
            script.insert_str(0, "(set -o pipefail) 2>/dev/null && set -o pipefail; ");
            debug!(
                "pipefail delegated to `{}`; its status is the last stage's if it lacks the option",
                options.shell
            );
        }
        return vec![Launch {
            program: options.shell.clone(),
            args: vec!["-c".into(), script],
            files: BTreeMap::new(),
        }];
    }

    pipeline
        .stages()
        .iter()
        .map(|stage| {
            let mut argv = stage.argv().iter().map(|w| w.value.clone());
            let files = stage
                .redirects()
                .iter()
                .filter_map(|(fd, target)| match target {
                    RedirectTarget::File { path, mode } => {
                        Some((*fd, (PathBuf::from(&path.value), *mode)))
                    }
                    RedirectTarget::Fd(_) => None,
                })
                .collect();
            Launch {
                program: argv.next().unwrap_or_default(),
                args: argv.collect(),
                files,
            }
        })
        .collect()
}

fn open_file(path: &Path, mode: FileMode, cwd: Option<&Path>) -> Result<File, ExecError> {
    let full = match cwd {
        Some(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    };
    let mut opts = OpenOptions::new();
    match mode {
        FileMode::Read => opts.read(true),
        FileMode::Truncate => opts.write(true).create(true).truncate(true),
        FileMode::Append => opts.append(true).create(true),
    };
    opts.open(&full).map_err(|source| ExecError::Redirect { path: full, source })
}

/// Open the redirection files of one stage. A target repeated on several
/// fds (`> out 2>&1`) shares one open file, as in the shell.
fn open_files(launch: &Launch, cwd: Option<&Path>) -> Result<BTreeMap<u32, File>, ExecError> {
    let mut opened: BTreeMap<u32, File> = BTreeMap::new();
    for (fd, (path, mode)) in &launch.files {
        let shared = launch
            .files
            .iter()
            .find(|(other, (p, m))| *other < fd && p == path && m == mode)
            .and_then(|(other, _)| opened.get(other));
        let file = match shared {
            Some(file) => file.try_clone().map_err(|source| ExecError::Redirect {
                path: path.clone(),
                source,
            })?,
            None => open_file(path, *mode, cwd)?,
        };
        opened.insert(*fd, file);
    }
    Ok(opened)
}

fn use_process_group(options: &ExecOptions) -> bool {
    // A background group may not read from the controlling terminal.
    !(options.stdin == StdinSource::Inherit && io::stdin().is_terminal())
}

type Reader = JoinHandle<io::Result<Vec<u8>>>;

async fn join(handle: Option<Reader>) -> Result<Option<Vec<u8>>, ExecError> {
    let Some(handle) = handle else {
        return Ok(None);
    };
    let bytes = handle
        .await
        .map_err(|e| ExecError::Io {
            context: "output reader task failed",
            source: io::Error::other(e),
        })?
        .map_err(|source| ExecError::Io {
            context: "reading child output",
            source,
        })?;
    Ok(Some(bytes))
}

/// Run `pipeline` to completion.
///
/// Every stage is started before any is awaited. If a stage fails to spawn,
/// the stages already running are killed and reaped before the error is
/// returned. If the returned future is dropped, all stages are killed.
pub async fn execute(
    pipeline: &Pipeline,
    options: &ExecOptions,
) -> Result<ExecutionResult, ExecError> {
    let encoding = match &options.capture {
        Capture::Text(label) => Some(
            Encoding::for_label(label.as_bytes())
                .ok_or_else(|| ExecError::UnknownEncoding(label.clone()))?,
        ),
        Capture::None | Capture::Bytes => None,
    };

    let launches = plan(pipeline, options);
    let last = launches.len().saturating_sub(1);
    let cwd = options.cwd.as_deref();
    let started = Instant::now();

    let mut set = StageSet::new(use_process_group(options));
    let mut upstream: Option<ChildStdout> = None;
    let mut feeder = None;
    let mut stdout_reader = None;
    let mut stderr_readers = Vec::new();

    for (index, launch) in launches.iter().enumerate() {
        let previous = upstream.take();
        let mut files = match open_files(launch, cwd) {
            Ok(files) => files,
            Err(err) => {
                set.abort().await;
                return Err(err);
            }
        };

        let mut cmd = tokio::process::Command::new(&launch.program);
        cmd.args(&launch.args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        set.configure(&mut cmd);

        let stdin = match (files.remove(&0), previous) {
            (Some(file), _) => Stdio::from(file),
            (None, Some(pipe)) => match TryInto::<Stdio>::try_into(pipe) {
                Ok(stdio) => stdio,
                Err(source) => {
                    set.abort().await;
                    return Err(ExecError::Io {
                        context: "connecting pipeline stages",
                        source,
                    });
                }
            },
            (None, None) if index == 0 => match options.stdin {
                StdinSource::Inherit => Stdio::inherit(),
                StdinSource::Null => Stdio::null(),
                StdinSource::Bytes(_) => Stdio::piped(),
            },
            (None, None) => Stdio::null(),
        };
        let stdout = match files.remove(&1) {
            Some(file) => Stdio::from(file),
            None if index < last || options.capture.is_some() => Stdio::piped(),
            None if options.quiet => Stdio::null(),
            None => Stdio::inherit(),
        };
        let stderr = match files.remove(&2) {
            Some(file) => Stdio::from(file),
            None if options.capture_stderr => Stdio::piped(),
            None if options.quiet => Stdio::null(),
            None => Stdio::inherit(),
        };
        cmd.stdin(stdin).stdout(stdout).stderr(stderr);

        debug!("spawning stage {index}: {}", launch.display());
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                set.abort().await;
                return Err(SpawnError {
                    stage: index,
                    program: launch.program.clone(),
                    source,
                }
                .into());
            }
        };

        if let (Some(stdin), StdinSource::Bytes(data)) = (child.stdin.take(), &options.stdin) {
            feeder = Some(tokio::spawn(feed(stdin, data.clone())));
        }
        if let Some(out) = child.stdout.take() {
            if index < last {
                upstream = Some(out);
            } else {
                let tee = if options.quiet { Tee::None } else { Tee::Stdout };
                stdout_reader = Some(tokio::spawn(collect(out, tee)));
            }
        }
        if let Some(err) = child.stderr.take() {
            let tee = if options.quiet { Tee::None } else { Tee::Stderr };
            stderr_readers.push(tokio::spawn(collect(err, tee)));
        }
        set.push(child);
    }

    let statuses = set.wait_all().await.map_err(|source| ExecError::Io {
        context: "waiting for pipeline",
        source,
    })?;

    let stdout = join(stdout_reader).await?;
    let mut stderr = None;
    for reader in stderr_readers {
        if let Some(bytes) = join(Some(reader)).await? {
            stderr.get_or_insert_with(Vec::new).extend(bytes);
        }
    }
    if let Some(feeder) = feeder {
        match feeder.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("writing stdin failed: {err}"),
            Err(err) => warn!("stdin writer task failed: {err}"),
        }
    }

    let stage_codes: Vec<i32> = statuses.into_iter().map(exit_code).collect();
    let mut result = ExecutionResult {
        exit_code: pipeline_code(&stage_codes, options.pipefail),
        stage_codes,
        // Output redirected away from the capture pipe captures nothing.
        stdout: options
            .capture
            .is_some()
            .then(|| stdout.unwrap_or_default()),
        stderr: options.capture_stderr.then(|| stderr.unwrap_or_default()),
        text: None,
        duration: started.elapsed(),
    };
    log_execution(pipeline.command_line(), result.exit_code, result.duration);

    if let Some(encoding) = encoding {
        let decoded = result.stdout.as_deref().map(|bytes| {
            encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned())
        });
        match decoded {
            Some(Some(text)) => result.text = Some(text),
            Some(None) => return Err(DecodeError::new(encoding.name(), result).into()),
            None => {}
        }
    }
    Ok(result)
}
