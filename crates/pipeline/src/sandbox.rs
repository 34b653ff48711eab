//! Resource-limited execution of untrusted programs.
//!
//! [`SandboxPolicy::apply`] prepares a [`Command`] so the child starts with
//! a scrubbed environment, null stdin, its own session, hard rlimits for CPU,
//! memory, file size and open files. On Linux it can also unshare user and
//! network namespaces (no network access) and confine the filesystem with
//! Landlock: read-write inside the workspace, read-only on the system
//! directories in [`SandboxPolicy::readable_paths`], nothing elsewhere. If any
//! of this cannot be set up the spawn fails; the program never runs
//! unconfined.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// `PATH` given to sandboxed and compiler processes.
pub const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// System directories a confined program may read and execute from.
pub const SYSTEM_READ_PATHS: [&str; 6] = ["/usr", "/bin", "/lib", "/lib64", "/etc", "/dev"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    /// Wall-clock budget for one run.
    pub wall_timeout: Duration,
    pub cpu_time_secs: u64,
    /// Address-space limit.
    pub memory_bytes: u64,
    /// Largest file the program may write.
    pub max_file_bytes: u64,
    pub max_open_files: u64,
    /// Unshare user and network namespaces (Linux only).
    pub isolate_namespaces: bool,
    /// Confine filesystem access with Landlock (Linux only).
    pub restrict_filesystem: bool,
    /// Read-only paths under a restricted filesystem. Missing ones are skipped.
    pub readable_paths: Vec<PathBuf>,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            wall_timeout: Duration::from_secs(120),
            cpu_time_secs: 60,
            memory_bytes: 1024 * 1024 * 1024,
            max_file_bytes: 64 * 1024 * 1024,
            max_open_files: 64,
            isolate_namespaces: true,
            restrict_filesystem: true,
            readable_paths: SYSTEM_READ_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl SandboxPolicy {
    /// Configure `cmd` to run confined inside `workdir`.
    pub fn apply(&self, cmd: &mut Command, workdir: &Path) -> std::io::Result<()> {
        if (self.isolate_namespaces || self.restrict_filesystem) && !cfg!(target_os = "linux") {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "namespace and filesystem isolation are only available on Linux",
            ));
        }

        cmd.env_clear()
            .env("PATH", SANDBOX_PATH)
            .env("HOME", workdir)
            .current_dir(workdir)
            .stdin(Stdio::null());

        let limits = [
            (libc::RLIMIT_CPU, self.cpu_time_secs),
            (libc::RLIMIT_AS, self.memory_bytes),
            (libc::RLIMIT_FSIZE, self.max_file_bytes),
            (libc::RLIMIT_NOFILE, self.max_open_files),
        ];
        let isolate = self.isolate_namespaces;
        // Built here so the child only has to enforce it.
        let mut confinement = if self.restrict_filesystem {
            Some(FilesystemConfinement::prepare(workdir, &self.readable_paths)?)
        } else {
            None
        };

        // SAFETY: the hook runs in the forked child before exec and only
        // issues async-signal-safe syscalls on data moved into the closure.
        unsafe {
            cmd.pre_exec(move || {
                for (resource, value) in limits {
                    let limit = libc::rlimit {
                        rlim_cur: value as libc::rlim_t,
                        rlim_max: value as libc::rlim_t,
                    };
                    if libc::setrlimit(resource, &limit) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                if isolate {
                    unshare_namespaces()?;
                }
                if let Some(confinement) = confinement.take() {
                    confinement.enforce()?;
                }
                Ok(())
            });
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn unshare_namespaces() -> std::io::Result<()> {
    // SAFETY: single-threaded child between fork and exec.
    if unsafe { libc::unshare(libc::CLONE_NEWUSER | libc::CLONE_NEWNET) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn unshare_namespaces() -> std::io::Result<()> {
    Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
}

/// A Landlock ruleset created in the parent and enforced in the child.
#[cfg(target_os = "linux")]
struct FilesystemConfinement(landlock::RulesetCreated);

#[cfg(target_os = "linux")]
impl FilesystemConfinement {
    fn prepare(workdir: &Path, readable: &[PathBuf]) -> std::io::Result<Self> {
        use landlock::{
            Access, AccessFs, PathBeneath, PathFd, Ruleset, RulesetAttr, RulesetCreatedAttr, ABI,
        };

        let abi = ABI::V2;
        let mut ruleset = Ruleset::default()
            .handle_access(AccessFs::from_all(abi))
            .and_then(Ruleset::create)
            .map_err(std::io::Error::other)?;

        for path in readable.iter().filter(|path| path.exists()) {
            let fd = PathFd::new(path).map_err(std::io::Error::other)?;
            ruleset = ruleset
                .add_rule(PathBeneath::new(fd, AccessFs::from_read(abi)))
                .map_err(std::io::Error::other)?;
        }

        let fd = PathFd::new(workdir).map_err(std::io::Error::other)?;
        let ruleset = ruleset
            .add_rule(PathBeneath::new(fd, AccessFs::from_all(abi)))
            .map_err(std::io::Error::other)?;
        Ok(Self(ruleset))
    }

    /// Restrict the calling process. Fails when the kernel cannot enforce
    /// the ruleset.
    fn enforce(self) -> std::io::Result<()> {
        let status = self
            .0
            .restrict_self()
            .map_err(|_| std::io::Error::last_os_error())?;
        if status.ruleset == landlock::RulesetStatus::NotEnforced {
            return Err(std::io::Error::from(std::io::ErrorKind::Unsupported));
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
struct FilesystemConfinement;

#[cfg(not(target_os = "linux"))]
impl FilesystemConfinement {
    fn prepare(_workdir: &Path, _readable: &[PathBuf]) -> std::io::Result<Self> {
        Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
    }

    fn enforce(self) -> std::io::Result<()> {
        Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
    }
}
