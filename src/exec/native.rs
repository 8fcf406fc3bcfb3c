//! Native executor - runs a binary directly, with output capture and a hard timeout

use super::{CommandSpec, ExecutionResult, Executor};
use crate::error::ExecError;
use bytes::Bytes;
use log::{debug, warn};
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command as AsyncCommand};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

/// How long to keep reading pipes after the process is gone
const DEFAULT_DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8 * 1024;

/// Bytes captured from one stream
#[derive(Debug, Default)]
struct Capture {
    buf: Vec<u8>,
    truncated: bool,
}

impl Capture {
    fn push(&mut self, data: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.buf.len());
        if data.len() > room {
            self.truncated = true;
        }
        self.buf.extend_from_slice(&data[..data.len().min(room)]);
    }
}

/// Runs processes on the host
#[derive(Debug, Clone)]
pub struct NativeExecutor {
    max_output_bytes: usize,
    drain_grace: Duration,
}

impl NativeExecutor {
    /// Create a native executor capturing at most `max_output_bytes` per stream
    pub fn new(max_output_bytes: usize) -> Self {
        Self {
            max_output_bytes,
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Build the tokio command: no shell, no stdin, own process group
    fn build_command(&self, spec: &CommandSpec) -> AsyncCommand {
        let mut command = AsyncCommand::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        unsafe {
            // own process group, so a timeout can kill grandchildren too
            command.pre_exec(|| {
                libc::setpgid(0, 0);
                Ok(())
            });
        }

        command
    }

    /// Read a stream into a shared capture until EOF.
    /// Data past the limit is read and discarded so the child never blocks on a full pipe.
    async fn capture_stream<R>(mut reader: R, sink: Arc<Mutex<Capture>>, limit: usize, stream: &'static str)
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink.lock().await.push(&chunk[..n], limit),
                Err(e) => {
                    warn!("Failed to read {}: {}", stream, e);
                    break;
                }
            }
        }
    }

    fn spawn_capture<R>(&self, reader: Option<R>, stream: &'static str) -> (Arc<Mutex<Capture>>, Option<JoinHandle<()>>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let sink = Arc::new(Mutex::new(Capture::default()));
        let handle = reader.map(|reader| {
            tokio::spawn(Self::capture_stream(reader, Arc::clone(&sink), self.max_output_bytes, stream))
        });
        (sink, handle)
    }

    /// Wait for the reader tasks, but never longer than the drain grace
    async fn drain(&self, handles: Vec<Option<JoinHandle<()>>>) {
        for mut handle in handles.into_iter().flatten() {
            if timeout(self.drain_grace, &mut handle).await.is_err() {
                // a grandchild still holds the pipe; keep what was captured
                debug!("Output reader still open after {:?}, aborting it", self.drain_grace);
                handle.abort();
            }
        }
    }
}

/// Kill the child and its whole process group
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: killpg only sends a signal; the child leads its own group
            unsafe {
                libc::killpg(pid as libc::pid_t, libc::SIGKILL);
            }
        }
    }

    if let Err(e) = child.kill().await {
        debug!("kill after timeout returned: {}", e);
    }
}

fn spawn_error(program: &str, err: io::Error) -> ExecError {
    match err.kind() {
        io::ErrorKind::NotFound => ExecError::BinaryNotFound {
            program: program.to_string(),
        },
        _ => ExecError::Spawn(err),
    }
}

#[async_trait::async_trait]
impl Executor for NativeExecutor {
    async fn run(&self, spec: &CommandSpec, limit: Duration) -> Result<ExecutionResult, ExecError> {
        debug!("Executing {:?}", spec.argv());

        let start_time = Instant::now();
        let mut child = self
            .build_command(spec)
            .spawn()
            .map_err(|e| spawn_error(&spec.program, e))?;

        let (stdout_sink, stdout_task) = self.spawn_capture(child.stdout.take(), "stdout");
        let (stderr_sink, stderr_task) = self.spawn_capture(child.stderr.take(), "stderr");

        let (exit_code, timed_out) = match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => (status.code().unwrap_or(-1), false),
            Ok(Err(e)) => {
                warn!("Failed to wait for {}: {}", spec.program, e);
                terminate(&mut child).await;
                (-1, false)
            }
            Err(_) => {
                warn!("{} timed out after {:?}, terminating", spec.program, limit);
                terminate(&mut child).await;
                (-1, true)
            }
        };

        self.drain(vec![stdout_task, stderr_task]).await;

        let duration = start_time.elapsed();
        let mut stdout = stdout_sink.lock().await;
        let mut stderr = stderr_sink.lock().await;

        debug!(
            "{} finished in {:?} with exit code {} (timed out: {})",
            spec.program, duration, exit_code, timed_out
        );

        Ok(ExecutionResult {
            exit_code,
            stdout: Bytes::from(std::mem::take(&mut stdout.buf)),
            stderr: Bytes::from(std::mem::take(&mut stderr.buf)),
            timed_out,
            duration,
            output_truncated: stdout.truncated || stderr.truncated,
        })
    }

    fn name(&self) -> &str {
        "native"
    }
}
