//! Compilation of materialized sources.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::sandbox::SANDBOX_PATH;
use crate::subprocess::{run_command, ProcessError, ProcessOutput, RunOptions};

/// Cap on compiler diagnostics kept for the error message.
const MAX_DIAGNOSTIC_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Compiler executable, looked up on [`SANDBOX_PATH`] when not absolute.
    pub program: PathBuf,
    pub flags: Vec<String>,
    /// Directories holding the scaffold headers generated code includes.
    pub include_dirs: Vec<PathBuf>,
    pub timeout: Duration,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("g++"),
            flags: vec!["-std=c++17".to_string(), "-O2".to_string()],
            include_dirs: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl CompilerConfig {
    /// Full argument list for compiling `source` into `output`.
    pub fn args(&self, source: &Path, output: &Path) -> Vec<String> {
        let mut args = self.flags.clone();
        args.extend(
            self.include_dirs
                .iter()
                .map(|dir| format!("-I{}", dir.display())),
        );
        args.push("-o".to_string());
        args.push(output.display().to_string());
        args.push(source.display().to_string());
        args
    }

    /// Compile `source` into `output`, running inside `workdir`.
    ///
    /// Returns the compiler's output whether or not it succeeded; callers
    /// decide what a non-zero exit means.
    pub async fn compile(
        &self,
        source: &Path,
        output: &Path,
        workdir: &Path,
    ) -> Result<ProcessOutput, ProcessError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(source, output))
            .env_clear()
            .env("PATH", SANDBOX_PATH)
            .env("HOME", workdir)
            .current_dir(workdir)
            .stdin(Stdio::null());

        // The driver leads its own group so a timeout also reaches cc1plus and ld.
        // SAFETY: setsid is async-signal-safe and touches no shared state.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let options = RunOptions {
            timeout: self.timeout,
            max_stdout_bytes: MAX_DIAGNOSTIC_BYTES,
            max_stderr_bytes: MAX_DIAGNOSTIC_BYTES,
            kill_process_group: true,
        };

        tracing::debug!(program = %self.program.display(), source = %source.display(), "Compiling");
        run_command(&mut cmd, options, |_| {}).await
    }
}
