//! Event pipe reader.
//!
//! One reader task per followed pipe. It opens the pipe, splits it into
//! lines and forwards them, tagged with the generation it was started for,
//! to the session manager. Open failures are retried with exponential
//! backoff; they surface as messages, never as task errors.
//!
//! A named pipe is reopened after every writer disconnect. A regular file
//! is read once to its end, which keeps replaying a captured stream easy.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hud_core::ConnectionStatus;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest line kept; the remainder of a longer line is discarded.
pub const MAX_LINE_BYTES: u64 = 1024 * 1024;

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeMessage {
    Status(ConnectionStatus),
    /// The pipe could not be opened or read.
    Unavailable(String),
    /// One non-blank line, trimmed.
    Line(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeEnvelope {
    pub generation: u64,
    pub message: PipeMessage,
}

// ============================================================================
// Backoff
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn next_delay(&self, delay: Duration) -> Duration {
        let scaled = delay.as_secs_f64() * self.multiplier.max(1.0);
        Duration::try_from_secs_f64(scaled)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

// ============================================================================
// Reader Task
// ============================================================================

enum ReadOutcome {
    Eof,
    Stopped,
    Failed(io::Error),
}

struct Opened {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Reopen after EOF (named pipes only).
    follow: bool,
}

pub struct PipeReader {
    path: PathBuf,
    generation: u64,
    tx: mpsc::Sender<PipeEnvelope>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl PipeReader {
    pub fn new(
        path: PathBuf,
        generation: u64,
        tx: mpsc::Sender<PipeEnvelope>,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            path,
            generation,
            tx,
            retry,
            cancel,
        }
    }

    /// Runs until cancelled or the manager stops listening.
    pub async fn run(self) {
        let mut delay = self.retry.initial_delay;
        let mut reported = false;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match open(&self.path).await {
                Ok(Opened { reader, follow }) => {
                    delay = self.retry.initial_delay;
                    reported = false;
                    info!(path = %self.path.display(), generation = self.generation, "Event pipe opened");

                    if !self.send(PipeMessage::Status(ConnectionStatus::Connected)).await {
                        break;
                    }

                    match self.read_lines(reader).await {
                        ReadOutcome::Stopped => break,
                        ReadOutcome::Eof => {
                            if !self.send(PipeMessage::Status(ConnectionStatus::Disconnected)).await {
                                break;
                            }
                            if !follow {
                                info!(path = %self.path.display(), "Event file fully read");
                                self.cancel.cancelled().await;
                                break;
                            }
                            debug!("Pipe writer closed, reopening");
                        }
                        ReadOutcome::Failed(e) => {
                            warn!(path = %self.path.display(), error = %e, "Event pipe read failed");
                            if !self.send(PipeMessage::Unavailable(e.to_string())).await {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    // one report per failure streak
                    if reported {
                        debug!(path = %self.path.display(), error = %e, "Event pipe still unavailable");
                    } else {
                        warn!(path = %self.path.display(), error = %e, "Event pipe unavailable, will retry");
                        reported = true;
                        if !self.send(PipeMessage::Unavailable(e.to_string())).await {
                            break;
                        }
                    }
                }
            }

            tokio::select! {
                _ = sleep(delay) => {
                    delay = self.retry.next_delay(delay);
                }
                _ = self.cancel.cancelled() => break,
            }
        }

        debug!(generation = self.generation, "Pipe reader stopped");
    }

    async fn read_lines(&self, reader: Box<dyn AsyncRead + Send + Unpin>) -> ReadOutcome {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                res = read_line_capped(&mut reader, &mut buf) => res,
                _ = self.cancel.cancelled() => return ReadOutcome::Stopped,
            };

            match read {
                Ok(0) => return ReadOutcome::Eof,
                Ok(_) => {}
                Err(e) => return ReadOutcome::Failed(e),
            }

            let text = String::from_utf8_lossy(&buf);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }
            if !self.send(PipeMessage::Line(line.to_string())).await {
                return ReadOutcome::Stopped;
            }
        }
    }

    /// Returns `false` once the manager is gone or this reader is cancelled.
    async fn send(&self, message: PipeMessage) -> bool {
        let envelope = PipeEnvelope {
            generation: self.generation,
            message,
        };
        tokio::select! {
            res = self.tx.send(envelope) => res.is_ok(),
            _ = self.cancel.cancelled() => false,
        }
    }
}

/// Reads one line into `buf`, keeping at most [`MAX_LINE_BYTES`].
///
/// Returns the number of bytes consumed, including any discarded tail.
async fn read_line_capped<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut total = (&mut *reader)
        .take(MAX_LINE_BYTES)
        .read_until(b'\n', buf)
        .await?;
    if total == 0 || buf.last() == Some(&b'\n') {
        return Ok(total);
    }

    let mut scratch = Vec::new();
    loop {
        scratch.clear();
        let n = (&mut *reader)
            .take(MAX_LINE_BYTES)
            .read_until(b'\n', &mut scratch)
            .await?;
        total = total.saturating_add(n);
        if n == 0 || scratch.last() == Some(&b'\n') {
            return Ok(total);
        }
    }
}

async fn open(path: &Path) -> io::Result<Opened> {
    let meta = tokio::fs::metadata(path).await?;

    if is_fifo(&meta) {
        let receiver = open_fifo(path)?;
        return Ok(Opened {
            reader: Box::new(receiver),
            follow: true,
        });
    }

    let file = tokio::fs::File::open(path).await?;
    Ok(Opened {
        reader: Box::new(file),
        follow: false,
    })
}

#[cfg(unix)]
fn is_fifo(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    meta.file_type().is_fifo()
}

#[cfg(not(unix))]
fn is_fifo(_meta: &std::fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn open_fifo(path: &Path) -> io::Result<tokio::net::unix::pipe::Receiver> {
    let mut options = tokio::net::unix::pipe::OpenOptions::new();
    // holding a write end keeps the pipe from hitting EOF between writers
    #[cfg(target_os = "linux")]
    options.read_write(true);
    options.open_receiver(path)
}

#[cfg(not(unix))]
fn open_fifo(_path: &Path) -> io::Result<tokio::fs::File> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "named pipes are not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::time::timeout;

    fn retry() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            multiplier: 2.0,
        }
    }

    async fn next(rx: &mut mpsc::Receiver<PipeEnvelope>) -> PipeMessage {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
            .message
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = retry();
        let d1 = policy.next_delay(policy.initial_delay);
        assert_eq!(d1, Duration::from_millis(20));
        let d2 = policy.next_delay(d1);
        assert_eq!(d2, Duration::from_millis(40));
        assert_eq!(policy.next_delay(d2), Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_read_line_capped_discards_tail() {
        let mut long = vec![b'x'; usize::try_from(MAX_LINE_BYTES).unwrap() + 10];
        long.extend_from_slice(b"\nnext\n");
        let mut reader = BufReader::new(long.as_slice());

        let mut buf = Vec::new();
        read_line_capped(&mut reader, &mut buf).await.unwrap();
        assert_eq!(buf.len() as u64, MAX_LINE_BYTES);

        buf.clear();
        read_line_capped(&mut reader, &mut buf).await.unwrap();
        assert_eq!(buf, b"next\n");
    }

    #[tokio::test]
    async fn test_regular_file_lines_then_disconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "first").unwrap();
        writeln!(file, "   ").unwrap();
        write!(file, "second").unwrap();
        drop(file);

        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(PipeReader::new(path, 7, tx, retry(), cancel.clone()).run());

        assert_eq!(next(&mut rx).await, PipeMessage::Status(ConnectionStatus::Connected));
        assert_eq!(next(&mut rx).await, PipeMessage::Line("first".into()));
        assert_eq!(next(&mut rx).await, PipeMessage::Line("second".into()));
        assert_eq!(next(&mut rx).await, PipeMessage::Status(ConnectionStatus::Disconnected));

        cancel.cancel();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_missing_pipe_reported_once_then_opened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.jsonl");

        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(PipeReader::new(path.clone(), 1, tx, retry(), cancel.clone()).run());

        assert!(matches!(next(&mut rx).await, PipeMessage::Unavailable(_)));

        std::fs::write(&path, "hello\n").unwrap();
        assert_eq!(next(&mut rx).await, PipeMessage::Status(ConnectionStatus::Connected));
        assert_eq!(next(&mut rx).await, PipeMessage::Line("hello".into()));

        cancel.cancel();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }
}
