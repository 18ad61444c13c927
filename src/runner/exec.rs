use std::fs::{self, File};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::warn;
use wait_timeout::ChildExt;

use super::report::{CheckLogs, write_check_logs};
use crate::model::CheckSpec;

const EXIT_CODE_TIMEOUT: i32 = 124;
const EXIT_CODE_SPAWN_FAILED: i32 = 127;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

/// Executes one check and leaves its stdout and stderr in `logs`. Failures to
/// launch are reported through the output: a gate that cannot start is a failed
/// gate. Errors are reserved for the log files themselves.
pub trait CommandRunner {
    fn run(&self, spec: &CheckSpec, timeout: Duration, logs: &CheckLogs) -> Result<CommandOutput>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, spec: &CheckSpec, timeout: Duration, logs: &CheckLogs) -> Result<CommandOutput> {
        let started = Instant::now();
        let Some((program, args)) = spec.command.split_first() else {
            return launch_failure(
                logs,
                format!("check {} has an empty command\n", spec.id),
                started,
            );
        };

        let stdout_log = File::create(&logs.stdout)
            .with_context(|| format!("failed to create {}", logs.stdout.display()))?;
        let stderr_log = File::create(&logs.stderr)
            .with_context(|| format!("failed to create {}", logs.stderr.display()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_log))
            .stderr(Stdio::from(stderr_log));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own group, so a timeout reaches everything the check started.
            command.process_group(0);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(check = %spec.id, program = %program, error = %err, "failed to spawn check");
                return launch_failure(logs, format!("failed to spawn {program}: {err}\n"), started);
            }
        };

        let (status, timed_out) = match child.wait_timeout(timeout) {
            Ok(Some(status)) => (Some(status), false),
            Ok(None) => {
                warn!(check = %spec.id, timeout_ms = timeout.as_millis() as u64, "check timed out; killing process group");
                terminate(&mut child);
                (None, true)
            }
            Err(err) => {
                warn!(check = %spec.id, error = %err, "failed to wait for check");
                terminate(&mut child);
                (None, false)
            }
        };

        let exit_code = if timed_out {
            EXIT_CODE_TIMEOUT
        } else {
            status.and_then(|value| value.code()).unwrap_or(-1)
        };

        Ok(CommandOutput {
            exit_code,
            stdout: read_log(&logs.stdout)?,
            stderr: read_log(&logs.stderr)?,
            duration_ms: elapsed_ms(started),
            timed_out,
        })
    }
}

fn launch_failure(logs: &CheckLogs, message: String, started: Instant) -> Result<CommandOutput> {
    write_check_logs(logs, "", &message)?;
    Ok(CommandOutput {
        exit_code: EXIT_CODE_SPAWN_FAILED,
        stderr: message,
        duration_ms: elapsed_ms(started),
        ..CommandOutput::default()
    })
}

fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Ok(pid) = i32::try_from(child.id()) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn read_log(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
