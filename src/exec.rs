//! Running external tools with a time limit.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured output of a successful tool run.
#[derive(Debug, Clone, Default)]
pub(crate) struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `cmd` to completion, killing it after `timeout`.
///
/// Output is captured through anonymous temp files rather than pipes, so a
/// chatty tool cannot block on a full pipe while we poll for its exit.
pub(crate) fn run_with_timeout(tool: &str, cmd: &mut Command, timeout: Duration) -> Result<ToolOutput> {
    let mut stdout_file = tempfile::tempfile()?;
    let mut stderr_file = tempfile::tempfile()?;

    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file.try_clone()?))
        .stderr(Stdio::from(stderr_file.try_clone()?));

    log::debug!("running {tool}: {cmd:?}");

    let mut child = spawn(tool, cmd)?;

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::ToolTimeout {
                tool: tool.to_string(),
                seconds: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let output = ToolOutput {
        stdout: read_back(&mut stdout_file)?,
        stderr: read_back(&mut stderr_file)?,
    };

    if status.success() {
        Ok(output)
    } else {
        Err(Error::ToolFailed {
            tool: tool.to_string(),
            code: status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string()),
            stderr: output.stderr.trim().to_string(),
        })
    }
}

fn spawn(tool: &str, cmd: &mut Command) -> Result<Child> {
    // A script written moments ago can still be open in a concurrently forked child.
    let mut attempts = 0;
    loop {
        match cmd.spawn() {
            Ok(child) => return Ok(child),
            Err(e) if e.kind() == ErrorKind::ExecutableFileBusy && attempts < 5 => {
                attempts += 1;
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ToolMissing(tool.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        }
    }
}

fn read_back(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
