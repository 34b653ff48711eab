//! Shared child-process management for the compiler and the sandboxed
//! program.
//!
//! [`run_command`] spawns a prepared [`Command`], drains stdout and stderr
//! concurrently (each capped), hands every stderr line to a callback, and
//! enforces a wall-clock timeout.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};

/// Captured output of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub duration_ms: u64,
    /// True when either stream exceeded its cap and was cut.
    pub truncated: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Per-run knobs for [`run_command`].
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub timeout: Duration,
    pub max_stdout_bytes: usize,
    pub max_stderr_bytes: usize,
    /// Kill the child's whole process group on timeout or drop. Only valid
    /// when the child leads its own group (`setsid` in a `pre_exec` hook).
    pub kill_process_group: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("process timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error while waiting for process: {0}")]
    Io(#[from] std::io::Error),
}

/// Kills the process group of an unfinished child when dropped.
struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            if let Ok(pgid) = libc::pid_t::try_from(pid) {
                // SAFETY: plain syscall; a stale group id only yields ESRCH.
                unsafe {
                    libc::kill(-pgid, libc::SIGKILL);
                }
            }
        }
    }
}

/// Spawn `cmd`, capture its output, and enforce `options.timeout`.
///
/// The caller sets program, arguments, environment and working directory.
/// stdin is left to the caller as well; stdout and stderr are piped here.
pub async fn run_command<F>(
    cmd: &mut Command,
    options: RunOptions,
    mut on_stderr_line: F,
) -> Result<ProcessOutput, ProcessError>
where
    F: FnMut(&str),
{
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child: Child = cmd.spawn().map_err(ProcessError::Spawn)?;
    let mut guard = GroupGuard {
        pid: if options.kill_process_group {
            child.id()
        } else {
            None
        },
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let run = async {
        tokio::join!(
            child.wait(),
            read_capped(stdout, options.max_stdout_bytes),
            read_lines(stderr, options.max_stderr_bytes, &mut on_stderr_line),
        )
    };

    match tokio::time::timeout(options.timeout, run).await {
        Ok((Ok(status), (stdout, out_cut), (stderr, err_cut))) => {
            guard.disarm();
            Ok(ProcessOutput {
                stdout,
                stderr,
                exit_code: status.code(),
                signal: signal_of(status),
                duration_ms: start.elapsed().as_millis() as u64,
                truncated: out_cut || err_cut,
            })
        }
        Ok((Err(e), _, _)) => Err(ProcessError::Io(e)),
        // `guard` and `child` drop here and take the process (group) down.
        Err(_elapsed) => Err(ProcessError::Timeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
    }
}

#[cfg(unix)]
fn signal_of(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: ExitStatus) -> Option<i32> {
    None
}

/// Read a stream up to `cap` bytes, then drain the rest so the child never
/// blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>, cap: usize) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    let Some(mut h) = handle else {
        return (buf, false);
    };
    let _ = (&mut h).take(cap as u64).read_to_end(&mut buf).await;
    let rest = tokio::io::copy(&mut h, &mut tokio::io::sink())
        .await
        .unwrap_or(0);
    (buf, rest > 0)
}

/// Read a stream line by line, passing each line to `on_line` and keeping
/// the first `cap` bytes.
async fn read_lines<R, F>(handle: Option<R>, cap: usize, on_line: &mut F) -> (String, bool)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut kept = String::new();
    let mut truncated = false;
    let Some(h) = handle else {
        return (kept, truncated);
    };

    let mut reader = BufReader::new(h);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                on_line(text.trim_end());
                if kept.len() + text.len() <= cap {
                    kept.push_str(&text);
                } else {
                    truncated = true;
                }
            }
        }
    }
    (kept, truncated)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn options(timeout_ms: u64) -> RunOptions {
        RunOptions {
            timeout: Duration::from_millis(timeout_ms),
            max_stdout_bytes: 1024,
            max_stderr_bytes: 1024,
            kill_process_group: false,
        }
    }

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script).stdin(Stdio::null());
        cmd
    }

    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let mut lines = Vec::new();
        let out = run_command(
            &mut sh("echo out; echo first >&2; echo second >&2; exit 3"),
            options(5000),
            |l| lines.push(l.to_string()),
        )
        .await
        .unwrap();

        assert_eq!(out.stdout, b"out\n");
        assert_eq!(out.stderr, "first\nsecond\n");
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn stdout_is_capped_but_drained() {
        let out = run_command(
            &mut sh("head -c 5000 /dev/zero"),
            options(5000),
            |_| {},
        )
        .await
        .unwrap();
        assert_eq!(out.stdout.len(), 1024);
        assert!(out.truncated);
        assert!(out.success());
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let result = run_command(&mut sh("sleep 5"), options(200), |_| {}).await;
        assert_matches!(result, Err(ProcessError::Timeout { .. }));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let mut cmd = Command::new("/nonexistent/program");
        let result = run_command(&mut cmd, options(1000), |_| {}).await;
        assert_matches!(result, Err(ProcessError::Spawn(_)));
    }

    #[tokio::test]
    async fn signal_termination_has_no_exit_code() {
        let out = run_command(&mut sh("kill -9 $$"), options(5000), |_| {})
            .await
            .unwrap();
        assert_eq!(out.exit_code, None);
        assert_eq!(out.signal, Some(9));
    }
}
