//! Process channel - line-oriented I/O over a child process's stdio
//!
//! One pump thread per process performs the only blocking OS reads,
//! splits the byte stream into lines and forwards them with receive
//! timestamps. A read chunk that does not end in a line terminator is
//! kept as an incomplete tail and completed by the next chunk; a tail
//! left over at process exit is delivered with `complete == false`.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use arbiter_core::EngineError;

/// Grace period between a terminate request and a hard kill
const TERMINATE_GRACE: Duration = Duration::from_millis(1000);

/// How the line ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadError {
    /// Complete line
    None,
    /// The process exited; no more lines will arrive
    Terminated,
    /// Partial tail flushed at stream end, no terminator seen
    Incomplete,
}

/// One line read from the engine
#[derive(Clone, Debug, PartialEq)]
pub struct ReadLine {
    /// Line content without the terminator
    pub content: String,
    /// Receive timestamp, milliseconds since the channel started
    pub timestamp_ms: u64,
    /// Whether a terminator was seen
    pub complete: bool,
    /// Error classification
    pub error: ReadError,
}

/// Owns one external engine process
pub struct ProcessChannel {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<ReadLine>,
    anchor: Instant,
    terminated: bool,
    path: PathBuf,
}

impl ProcessChannel {
    /// Spawn the engine process and start the read pump
    pub fn start(path: &Path, working_dir: Option<&Path>) -> Result<Self, EngineError> {
        let mut command = Command::new(path);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        } else if let Some(dir) = path.parent() {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| EngineError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let anchor = Instant::now();

        let (tx, rx) = crossbeam_channel::unbounded();
        if let Some(stdout) = stdout {
            let pump_anchor = anchor;
            std::thread::Builder::new()
                .name(format!("pump-{}", path.display()))
                .spawn(move || pump_lines(stdout, tx, pump_anchor))
                .map_err(EngineError::Write)?;
        }

        Ok(Self {
            child,
            stdin,
            lines: rx,
            anchor,
            terminated: false,
            path: path.to_path_buf(),
        })
    }

    /// Milliseconds since the channel started
    pub fn now_ms(&self) -> u64 {
        self.anchor.elapsed().as_millis() as u64
    }

    /// Executable path this channel was started with
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Send one line; the terminator is appended here.
    /// Returns the send timestamp.
    pub fn write_line(&mut self, text: &str) -> Result<u64, EngineError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EngineError::Write(std::io::Error::from(std::io::ErrorKind::BrokenPipe)))?;
        stdin.write_all(text.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        tracing::trace!(engine = %self.path.display(), line = text, "sent");
        Ok(self.now_ms())
    }

    /// Block until a complete line arrives or the process terminates
    pub fn read_line_blocking(&self) -> ReadLine {
        match self.lines.recv() {
            Ok(line) => line,
            Err(_) => ReadLine {
                content: String::new(),
                timestamp_ms: self.now_ms(),
                complete: false,
                error: ReadError::Terminated,
            },
        }
    }

    /// Non-blocking read; `None` when no complete line is buffered yet
    /// while the process is still running
    pub fn try_read_line(&self) -> Option<ReadLine> {
        match self.lines.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(ReadLine {
                content: String::new(),
                timestamp_ms: self.now_ms(),
                complete: false,
                error: ReadError::Terminated,
            }),
        }
    }

    /// Terminate the process: close stdin, wait out the grace period,
    /// then hard-kill. Idempotent.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        // Closing stdin asks a well-behaved engine to exit
        self.stdin.take();

        let deadline = Instant::now() + TERMINATE_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!(engine = %self.path.display(), %status, "engine exited");
                    return;
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(err) => {
                    tracing::warn!(engine = %self.path.display(), %err, "wait failed");
                    break;
                }
            }
        }

        if let Err(err) = self.child.kill() {
            tracing::warn!(engine = %self.path.display(), %err, "kill failed");
        }
        let _ = self.child.wait();
    }

    /// Best-effort resident memory in bytes; never fatal
    pub fn memory_usage(&self) -> Option<u64> {
        let statm = std::fs::read_to_string(format!("/proc/{}/statm", self.child.id())).ok()?;
        let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(resident_pages * 4096)
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Read pump: chunked reads, line splitting, partial-tail buffering
fn pump_lines(mut stdout: impl Read, tx: Sender<ReadLine>, anchor: Instant) {
    let mut tail: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match stdout.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        let timestamp_ms = anchor.elapsed().as_millis() as u64;
        tail.extend_from_slice(&chunk[..n]);

        while let Some(pos) = tail.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = tail.drain(..=pos).collect();
            line.pop(); // terminator
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let sent = tx.send(ReadLine {
                content: String::from_utf8_lossy(&line).into_owned(),
                timestamp_ms,
                complete: true,
                error: ReadError::None,
            });
            if sent.is_err() {
                return;
            }
        }
    }

    // Flush any unterminated tail before the channel closes
    if !tail.is_empty() {
        let _ = tx.send(ReadLine {
            content: String::from_utf8_lossy(&tail).into_owned(),
            timestamp_ms: anchor.elapsed().as_millis() as u64,
            complete: false,
            error: ReadError::Incomplete,
        });
    }
}
