//! The compile queue and the main-thread handoff

use crate::{Compiler, ReloadError, Result};
use hotswap_builder::BuiltModule;
use hotswap_command::ChangeBatch;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Result of compiling one changed file on the worker.
pub struct CompileOutcome {
    pub path: PathBuf,
    pub result: Result<BuiltModule>,
}

/// One worker thread compiling change batches strictly in order.
///
/// Batches submitted while a build is in flight queue behind it; the
/// worker never compiles two files concurrently, so generations come out
/// ordered and the build directory never sees interleaved writes. Load,
/// patch, and sweep are not the queue's business: outcomes are drained
/// by the thread that owns the [`crate::ReloadEngine`].
pub struct CompileQueue {
    tx: Option<Sender<ChangeBatch>>,
    rx: Receiver<CompileOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl CompileQueue {
    /// Start the worker. The compiler moves to the worker thread.
    pub fn spawn(compiler: Compiler) -> Result<Self> {
        let (tx, job_rx) = mpsc::channel::<ChangeBatch>();
        let (out_tx, rx) = mpsc::channel::<CompileOutcome>();

        let worker = std::thread::Builder::new()
            .name("hotswap-compile".to_string())
            .spawn(move || {
                while let Ok(batch) = job_rx.recv() {
                    let hint = batch.ide_hint.clone();
                    for path in batch.rebuildable() {
                        debug!(path = %path.display(), "worker picked up change");
                        let outcome = CompileOutcome {
                            path: path.clone(),
                            result: compiler.compile_with_hint(path, hint.as_deref()),
                        };
                        if out_tx.send(outcome).is_err() {
                            return;
                        }
                    }
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            rx,
            worker: Some(worker),
        })
    }

    /// Queue a batch behind whatever is already compiling.
    pub fn submit(&self, batch: ChangeBatch) -> Result<()> {
        self.tx
            .as_ref()
            .ok_or(ReloadError::QueueClosed)?
            .send(batch)
            .map_err(|_| ReloadError::QueueClosed)
    }

    /// Next finished compile, if one is waiting.
    pub fn try_next(&self) -> Option<CompileOutcome> {
        self.rx.try_recv().ok()
    }

    /// Block up to `timeout` for the next finished compile. `None` means
    /// the deadline passed or the worker is gone.
    pub fn next_timeout(&self, timeout: Duration) -> Option<CompileOutcome> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Stop accepting work and wait for the worker to drain.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for CompileQueue {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs patch/sweep work on the thread that owns the application's
/// objects. UI frameworks provide an executor that trampolines onto
/// their event loop; headless hosts and tests run jobs inline.
pub trait MainThreadHandoff {
    fn run<'a>(&self, job: Box<dyn FnOnce() + 'a>);
}

/// Executes handoff jobs immediately on the calling thread.
#[derive(Default)]
pub struct InlineHandoff;

impl MainThreadHandoff for InlineHandoff {
    fn run<'a>(&self, job: Box<dyn FnOnce() + 'a>) {
        job()
    }
}
