use crate::scenarios::seed::split_command;
use crate::workspace::WorkingDirGuard;
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Interpreter candidates per script extension, tried in order on `PATH`.
const INTERPRETERS: &[(&str, &[&str])] = &[
    ("py", &["python3", "python"]),
    ("sh", &["sh"]),
    ("bash", &["bash"]),
    ("rb", &["ruby"]),
    ("js", &["node"]),
    ("pl", &["perl"]),
];

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured outcome of one script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Absent when the child was killed by a signal or timed out.
    pub exit_code: Option<i32>,
    pub exit_signal: Option<i32>,
    pub timed_out: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration_ms: u128,
    /// Shell-quoted command that was launched.
    pub command_line: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Knobs for a single execution.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions<'a> {
    /// Command string replacing extension-based interpreter selection.
    pub interpreter: Option<&'a str>,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub env: Option<&'a BTreeMap<String, String>>,
}

/// Run `script` as a child process with `workspace_root` as the working
/// directory and capture everything it wrote.
///
/// A non-zero exit is a normal result. Errors mean the child could not be
/// launched at all.
pub fn execute(
    script: &Path,
    workspace_root: &Path,
    options: &ExecOptions<'_>,
) -> Result<ExecutionResult> {
    if !script.is_file() {
        return Err(anyhow!("script {} does not exist", script.display()));
    }
    let launcher = resolve_launcher(script, options.interpreter)?;
    let script_arg = std::path::absolute(script)
        .with_context(|| format!("resolve {}", script.display()))?;

    let _cwd = WorkingDirGuard::enter(workspace_root)?;

    let (program, args) = launcher
        .split_first()
        .ok_or_else(|| anyhow!("empty launcher for {}", script.display()))?;
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.arg(&script_arg);
    if let Some(env) = options.env {
        cmd.envs(env);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    isolate_process_group(&mut cmd);

    let command_line = format_command_line(&launcher, &script_arg);
    tracing::debug!(
        command = %command_line,
        cwd = %workspace_root.display(),
        "launching scenario script"
    );
    let started = Instant::now();
    let child = cmd
        .spawn()
        .with_context(|| format!("launch {command_line}"))?;
    wait_with_output(child, options.timeout, started, command_line)
}

/// Program and leading arguments used to launch `script`.
pub fn resolve_launcher(script: &Path, interpreter: Option<&str>) -> Result<Vec<OsString>> {
    if let Some(interpreter) = interpreter {
        let mut argv = split_command(interpreter).context("parse interpreter")?;
        let program = which::which(&argv[0])
            .with_context(|| format!("interpreter {} not found on PATH", argv[0]))?;
        argv.remove(0);
        let mut launcher = vec![program.into_os_string()];
        launcher.extend(argv.into_iter().map(OsString::from));
        return Ok(launcher);
    }

    let ext = script
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    let candidates = ext
        .as_deref()
        .and_then(|ext| INTERPRETERS.iter().find(|(known, _)| *known == ext))
        .map(|(_, candidates)| *candidates);
    let Some(candidates) = candidates else {
        return Ok(vec![script_as_program(script)?]);
    };
    for candidate in candidates {
        if let Ok(program) = which::which(candidate) {
            return Ok(vec![program.into_os_string()]);
        }
    }
    Err(anyhow!(
        "no interpreter for {} found on PATH (tried {})",
        script.display(),
        candidates.join(", ")
    ))
}

fn script_as_program(script: &Path) -> Result<OsString> {
    let path: PathBuf = std::path::absolute(script)
        .with_context(|| format!("resolve {}", script.display()))?;
    Ok(path.into_os_string())
}

fn wait_with_output(
    mut child: Child,
    timeout: Option<Duration>,
    started: Instant,
    command_line: String,
) -> Result<ExecutionResult> {
    let stdout_handle = child.stdout.take().map(spawn_reader);
    let stderr_handle = child.stderr.take().map(spawn_reader);

    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.try_wait().context("poll scenario process")? {
            break status;
        }
        if let Some(timeout) = timeout {
            if started.elapsed() >= timeout {
                timed_out = true;
                kill_process_group(&mut child);
                break child.wait().context("reap timed out scenario process")?;
            }
        }
        thread::sleep(POLL_INTERVAL);
    };
    let duration_ms = started.elapsed().as_millis();
    if !timed_out {
        // Anything the script left running in its group would hold the output
        // pipes open and outlive the timeout.
        signal_process_group(child.id());
    }

    let stdout = join_reader(stdout_handle)?;
    let stderr = join_reader(stderr_handle)?;
    if timed_out {
        tracing::warn!(?timeout, "scenario process timed out and was killed");
    }

    Ok(ExecutionResult {
        exit_code: if timed_out { None } else { status.code() },
        exit_signal: exit_signal(&status),
        timed_out,
        stdout,
        stderr,
        duration_ms,
        command_line,
    })
}

fn spawn_reader<R: Read + Send + 'static>(
    mut reader: R,
) -> thread::JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_reader(handle: Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>> {
    let Some(handle) = handle else {
        return Ok(Vec::new());
    };
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
        .context("read scenario output")
}

// The script gets its own process group so everything it spawned can be
// killed together once it exits or times out.
#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_cmd: &mut Command) {}

fn kill_process_group(child: &mut Child) {
    signal_process_group(child.id());
    let _ = child.kill();
}

/// SIGKILL every process left in the group led by `pid`.
#[cfg(unix)]
fn signal_process_group(pid: u32) {
    if let Ok(pid) = libc::pid_t::try_from(pid) {
        // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
        // targets the group created for this child.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn signal_process_group(_pid: u32) {}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

fn format_command_line(launcher: &[OsString], script: &Path) -> String {
    let mut parts: Vec<String> = launcher
        .iter()
        .map(|part| part.to_string_lossy().to_string())
        .collect();
    parts.push(script.to_string_lossy().to_string());
    shell_words::join(parts)
}
