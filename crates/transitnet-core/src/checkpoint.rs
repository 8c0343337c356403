//! Operator checkpoints between provisioning phases.

use std::io::{BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{TransitNetError, TransitNetResult};

/// Decides whether provisioning continues after a phase.
#[async_trait]
pub trait Checkpoint: Send + Sync {
    /// Ask whether to continue after `message`. `Ok(false)` stops the run.
    async fn proceed(&self, message: &str) -> TransitNetResult<bool>;
}

/// Checkpoint that always continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl Checkpoint for AutoApprove {
    async fn proceed(&self, _message: &str) -> TransitNetResult<bool> {
        Ok(true)
    }
}

/// Interpret an operator answer: `n` or `no` (any case) stops, anything
/// else continues.
#[must_use]
pub fn parse_answer(input: &str) -> bool {
    !matches!(input.trim().to_ascii_lowercase().as_str(), "n" | "no")
}

/// Line-oriented checkpoint: writes the prompt to `W` and reads one answer
/// line from `R`. End of input stops the run.
///
/// The answer is read on a dedicated thread, so the waiting future can be
/// dropped (on interrupt) without blocking the runtime. An abandoned read
/// keeps its thread until input arrives or the process exits.
pub struct LineCheckpoint<R, W> {
    reader: Arc<Mutex<R>>,
    writer: Mutex<W>,
}

impl<R, W> std::fmt::Debug for LineCheckpoint<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineCheckpoint").finish_non_exhaustive()
    }
}

impl<R: BufRead, W: Write> LineCheckpoint<R, W> {
    /// Create a checkpoint reading from `reader` and prompting on `writer`.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Arc::new(Mutex::new(reader)),
            writer: Mutex::new(writer),
        }
    }

    /// Consume the checkpoint, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    fn prompt(&self, message: &str) -> std::io::Result<()> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{message}")?;
        write!(writer, "Press Y key to continue. N to stop: ")?;
        writer.flush()
    }
}

#[async_trait]
impl<R, W> Checkpoint for LineCheckpoint<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send,
{
    async fn proceed(&self, message: &str) -> TransitNetResult<bool> {
        self.prompt(message).map_err(TransitNetError::Checkpoint)?;

        let (tx, rx) = oneshot::channel();
        let reader = Arc::clone(&self.reader);
        std::thread::Builder::new()
            .name("checkpoint-input".to_owned())
            .spawn(move || {
                let mut answer = String::new();
                let read = reader.lock().read_line(&mut answer);
                let _ = tx.send(read.map(|n| (n, answer)));
            })
            .map_err(TransitNetError::Checkpoint)?;

        let (read, answer) = rx
            .await
            .map_err(|_| {
                TransitNetError::Checkpoint(std::io::Error::other("checkpoint reader stopped"))
            })?
            .map_err(TransitNetError::Checkpoint)?;
        if read == 0 {
            return Ok(false);
        }
        Ok(parse_answer(&answer))
    }
}
