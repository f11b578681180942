//! Running git and streaming its stdout line by line.

use crate::config::LogConfig;
use crate::error::{LogError, Result};
use crate::query::QuerySpec;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Interval between exit checks; the child lock is only held per check
const WAIT_POLL: Duration = Duration::from_millis(10);

/// Executes queries; the seam that lets tests serve synthetic history
pub trait CommandRunner {
    fn run(&self, query: &QuerySpec) -> Result<Box<dyn QueryOutput>>;
}

/// Output of a running query.
///
/// Dropping it before [`QueryOutput::finish`] must release the process.
pub trait QueryOutput {
    /// Next stdout line without its terminator, `None` at end of output
    fn next_line(&mut self) -> Option<Result<String>>;

    /// Wait for the process to exit and report a failing status
    fn finish(&mut self) -> Result<()>;

    /// Handle that can terminate the process from another thread
    fn kill_handle(&self) -> Option<KillHandle> {
        None
    }
}

/// Terminates a spawned query process
#[derive(Debug, Clone)]
pub struct KillHandle {
    child: Arc<Mutex<Child>>,
}

impl KillHandle {
    pub fn kill(&self) {
        let mut child = lock(&self.child);
        if let Err(e) = child.kill() {
            debug!("kill of pid {} failed: {}", child.id(), e);
        }
    }
}

/// Spawns the git executable with a cleared environment
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    inherit_env: Vec<String>,
}

impl ProcessRunner {
    pub fn new(inherit_env: Vec<String>) -> Self {
        ProcessRunner { inherit_env }
    }

    pub fn from_config(config: &LogConfig) -> Self {
        Self::new(config.inherit_env.clone())
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::from_config(&LogConfig::default())
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, query: &QuerySpec) -> Result<Box<dyn QueryOutput>> {
        debug!(work_dir = %query.work_dir.display(), "running {}", query);

        let mut command = Command::new(&query.program);
        command
            .args(&query.args)
            .current_dir(&query.work_dir)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for name in &self.inherit_env {
            if let Some(value) = std::env::var_os(name) {
                command.env(name, value);
            }
        }

        let mut child = command.spawn().map_err(|source| LogError::ProcessSpawn {
            program: query.program.display().to_string(),
            work_dir: query.work_dir.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let child = Arc::new(Mutex::new(child));

        let output = ProcessOutput {
            child,
            stdout: stdout.map(BufReader::new),
            stderr: stderr.map(|mut pipe| {
                thread::spawn(move || {
                    let mut buf = Vec::new();
                    if let Err(e) = pipe.read_to_end(&mut buf) {
                        warn!("failed to read git stderr: {}", e);
                    }
                    String::from_utf8_lossy(&buf).into_owned()
                })
            }),
            finished: false,
        };
        // Dropping the guard kills and reaps the child
        if output.stdout.is_none() {
            return Err(LogError::Io(std::io::Error::other("stdout was not captured")));
        }
        Ok(Box::new(output))
    }
}

/// Guard over a running git process.
///
/// Stderr is drained on a helper thread so a chatty process never blocks on a
/// full pipe. Dropping the guard before `finish` kills and reaps the child.
pub struct ProcessOutput {
    child: Arc<Mutex<Child>>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
}

impl ProcessOutput {
    fn join_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

impl QueryOutput for ProcessOutput {
    fn next_line(&mut self) -> Option<Result<String>> {
        let reader = self.stdout.as_mut()?;
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => None,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                Some(Ok(decode_line(buf)))
            }
            Err(e) => Some(Err(e.into())),
        }
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }

        // Unread output would keep the child blocked on a full pipe
        if let Some(mut reader) = self.stdout.take() {
            std::io::copy(&mut reader, &mut std::io::sink())?;
        }

        let status = loop {
            let exited = lock(&self.child).try_wait()?;
            if let Some(status) = exited {
                break status;
            }
            thread::sleep(WAIT_POLL);
        };
        self.finished = true;
        let stderr = self.join_stderr();

        if status.success() {
            Ok(())
        } else {
            Err(LogError::ProcessExit {
                code: status.code(),
                stderr,
            })
        }
    }

    fn kill_handle(&self) -> Option<KillHandle> {
        Some(KillHandle {
            child: self.child.clone(),
        })
    }
}

impl Drop for ProcessOutput {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.stdout = None;
        {
            let mut child = lock(&self.child);
            if let Err(e) = child.kill() {
                debug!("kill of pid {} failed: {}", child.id(), e);
            }
            if let Err(e) = child.wait() {
                warn!("failed to reap git process {}: {}", child.id(), e);
            }
        }
        self.join_stderr();
    }
}

fn decode_line(buf: Vec<u8>) -> String {
    match String::from_utf8(buf) {
        Ok(line) => line,
        Err(e) => {
            let line = String::from_utf8_lossy(e.as_bytes()).into_owned();
            debug!("replaced invalid UTF-8 in output line {:?}", line);
            line
        }
    }
}

fn lock(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}
