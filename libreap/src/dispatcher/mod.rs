//! Bounded-concurrency deletion.
//!
//! The [`Dispatcher`] owns a fixed pool of worker tasks that take
//! [`DeleteJob`]s from a shared bounded queue and report one
//! [`DeletionOutcome`] per job on a bounded result channel. The caller
//! submits jobs and periodically calls [`Dispatcher::sync`], which waits for
//! every outstanding outcome.
//!
//! A deletion the registry answers with "not found" counts as done; another
//! client got there first. Any other failure is returned by the next `sync`
//! once all outstanding jobs have reported.

use crate::client::{RegistryApi, cancellable};
use crate::error::{ReapError, Result};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};


/// Capacity of the result channel; also the most jobs left unsynchronized.
pub const RESULT_CAPACITY: usize = 100;

/// Default number of workers.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// What a job deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Tag,
    Manifest,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag => f.write_str("tag"),
            Self::Manifest => f.write_str("manifest"),
        }
    }
}

/// One deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteJob {
    pub kind: JobKind,
    pub repository: String,
    /// Tag name or manifest digest
    pub reference: String,
}

impl DeleteJob {
    pub fn tag(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Tag,
            repository: repository.into(),
            reference: tag.into(),
        }
    }

    pub fn manifest(repository: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Manifest,
            repository: repository.into(),
            reference: digest.into(),
        }
    }

    async fn execute(&self, registry: &dyn RegistryApi) -> Result<()> {
        match self.kind {
            JobKind::Tag => registry.delete_tag(&self.repository, &self.reference).await,
            JobKind::Manifest => {
                registry
                    .delete_manifest(&self.repository, &self.reference)
                    .await
            }
        }
    }
}

/// Result of one job. `error` is `None` on success, including "not found".
#[derive(Debug)]
pub struct DeletionOutcome {
    pub job: DeleteJob,
    pub error: Option<ReapError>,
}

impl DeletionOutcome {
    fn into_result(self) -> Result<DeleteJob> {
        match self.error {
            None => Ok(self.job),
            Some(ReapError::Cancelled) => Err(ReapError::Cancelled),
            Some(source) => Err(ReapError::DeletionFailed {
                kind: self.job.kind.to_string(),
                repository: self.job.repository,
                reference: self.job.reference,
                source: Box::new(source),
            }),
        }
    }
}

/// Lifecycle of the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Stopped,
    Started,
    Draining,
}

/// Successful deletions seen so far, per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionTotals {
    pub tags: usize,
    pub manifests: usize,
}

impl DeletionTotals {
    fn record(&mut self, kind: JobKind) {
        match kind {
            JobKind::Tag => self.tags += 1,
            JobKind::Manifest => self.manifests += 1,
        }
    }
}

/// Worker pool executing delete jobs against a registry.
pub struct Dispatcher {
    state: DispatcherState,
    jobs: Option<mpsc::Sender<DeleteJob>>,
    results: mpsc::Receiver<DeletionOutcome>,
    workers: Vec<JoinHandle<()>>,
    outstanding: usize,
    totals: DeletionTotals,
}

impl Dispatcher {
    /// Spawns `concurrency` workers on the current tokio runtime.
    pub fn start(
        registry: Arc<dyn RegistryApi>,
        concurrency: usize,
        token: CancellationToken,
    ) -> Result<Self> {
        if concurrency == 0 {
            return Err(ReapError::config("concurrency must be at least 1", None));
        }

        let (job_tx, job_rx) = mpsc::channel::<DeleteJob>(concurrency);
        let (result_tx, result_rx) = mpsc::channel::<DeletionOutcome>(RESULT_CAPACITY);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let workers = (0..concurrency)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&registry),
                    Arc::clone(&job_rx),
                    result_tx.clone(),
                    token.clone(),
                ))
            })
            .collect();

        debug!(concurrency, "deletion dispatcher started");

        Ok(Self {
            state: DispatcherState::Started,
            jobs: Some(job_tx),
            results: result_rx,
            workers,
            outstanding: 0,
            totals: DeletionTotals::default(),
        })
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Jobs submitted but not yet synchronized.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Successful deletions across every `sync` so far.
    pub fn totals(&self) -> DeletionTotals {
        self.totals
    }

    /// Queues a job, waiting while the queue is full.
    ///
    /// When the unsynchronized backlog reaches [`RESULT_CAPACITY`] this first
    /// performs a [`Dispatcher::sync`] and propagates its failure.
    pub async fn submit(&mut self, job: DeleteJob) -> Result<()> {
        if self.outstanding >= RESULT_CAPACITY {
            self.sync().await?;
        }

        let Some(jobs) = self.jobs.as_ref() else {
            return Err(ReapError::validation("dispatcher is not accepting jobs"));
        };

        trace!(
            kind = %job.kind,
            repository = %job.repository,
            reference = %job.reference,
            "submitting"
        );
        jobs.send(job)
            .await
            .map_err(|_| ReapError::validation("deletion workers have stopped"))?;
        self.outstanding += 1;
        Ok(())
    }

    /// Waits for every outstanding job and returns how many succeeded.
    ///
    /// If any job failed, all outstanding outcomes are still drained and the
    /// first failure is returned.
    pub async fn sync(&mut self) -> Result<usize> {
        let mut deleted = 0;
        let mut first_error = None;

        while self.outstanding > 0 {
            let Some(outcome) = self.results.recv().await else {
                self.outstanding = 0;
                return Err(ReapError::validation("deletion workers have stopped"));
            };
            self.outstanding -= 1;

            match outcome.into_result() {
                Ok(job) => {
                    self.totals.record(job.kind);
                    deleted += 1;
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    /// Closes the queue, lets in-flight jobs finish and joins the workers.
    ///
    /// Outcomes not yet synchronized are drained and counted; their failures
    /// are only logged.
    pub async fn shutdown(mut self) -> DeletionTotals {
        self.state = DispatcherState::Draining;
        self.jobs = None;

        if let Err(e) = self.sync().await {
            warn!("deletion failed while draining: {}", e);
        }

        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                warn!("deletion worker panicked: {}", e);
            }
        }

        self.state = DispatcherState::Stopped;
        debug!(
            tags = self.totals.tags,
            manifests = self.totals.manifests,
            "deletion dispatcher stopped"
        );
        self.totals
    }
}

async fn worker(
    id: usize,
    registry: Arc<dyn RegistryApi>,
    jobs: Arc<Mutex<mpsc::Receiver<DeleteJob>>>,
    results: mpsc::Sender<DeletionOutcome>,
    token: CancellationToken,
) {
    loop {
        let job = {
            let mut rx = jobs.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            break;
        };

        let error = match cancellable(&token, job.execute(registry.as_ref())).await {
            Ok(()) => None,
            Err(e) if e.is_not_found() => {
                debug!(worker = id, reference = %job.reference, "already deleted");
                None
            }
            Err(e) => Some(e),
        };

        if results.send(DeletionOutcome { job, error }).await.is_err() {
            break;
        }
    }
    trace!(worker = id, "worker exiting");
}
