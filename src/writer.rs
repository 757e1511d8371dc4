// Write path of the collector: accepted payloads go onto a bounded queue, a
// fixed set of writer tasks drains it, each job opening its own store connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::error::StoreWriteError;
use crate::models::Payload;
use crate::store::{Store, StoreConnector, WritePoint};

/// Stores (and optionally enriches) one ingested payload.
///
/// Called exactly once per accepted request. `Ok(true)` means the payload is
/// handled; `Ok(false)` means the enricher gave up without a hard error.
#[async_trait]
pub trait MetadataEnricher: Send + Sync {
    async fn enrich(
        &self,
        entry: &Payload,
        origin_ip: &str,
        store: &dyn Store,
    ) -> Result<bool, StoreWriteError>;
}

/// Default enricher: tag every record with `remote_ip` and write one batch per container.
#[derive(Debug, Clone, Default)]
pub struct DirectWrite {
    /// Log store failures and carry on instead of returning them.
    pub ignore_fail: bool,
}

impl DirectWrite {
    pub fn new(ignore_fail: bool) -> Self {
        Self { ignore_fail }
    }
}

#[async_trait]
impl MetadataEnricher for DirectWrite {
    async fn enrich(
        &self,
        entry: &Payload,
        origin_ip: &str,
        store: &dyn Store,
    ) -> Result<bool, StoreWriteError> {
        for (container, records) in entry {
            let points: Vec<WritePoint> = records
                .iter()
                .map(|r| WritePoint::from_record(r, origin_ip))
                .collect();
            if let Err(e) = store.write_points(&points).await {
                error!(container = %container, remote_ip = %origin_ip, error = %e, "store write failed");
                if !self.ignore_fail {
                    return Err(e);
                }
            }
        }
        Ok(true)
    }
}

/// One accepted request waiting to be written.
#[derive(Debug, Clone)]
pub struct WriteJob {
    pub payload: Payload,
    pub origin_ip: String,
}

/// Counters for the write path, logged at shutdown.
#[derive(Debug, Default)]
pub struct WriteStats {
    pub jobs_received: AtomicU64,
    pub jobs_completed: AtomicU64,
    pub jobs_failed: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct WritePoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

/// Cloneable handle the HTTP layer uses to enqueue jobs.
#[derive(Clone)]
pub struct WriteDispatcher {
    tx: mpsc::Sender<WriteJob>,
    stats: Arc<WriteStats>,
}

impl WriteDispatcher {
    /// Waits for queue space, never for the store. Fails only once the pool is gone.
    pub async fn dispatch(&self, job: WriteJob) -> Result<(), WriteJob> {
        self.tx.send(job).await.map_err(|e| e.0)?;
        self.stats.jobs_received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Fixed set of writer tasks sharing one job queue.
pub struct WritePool {
    dispatcher: WriteDispatcher,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<tokio::task::JoinHandle<()>>,
    stats: Arc<WriteStats>,
}

impl WritePool {
    pub fn spawn(
        config: WritePoolConfig,
        connector: Arc<dyn StoreConnector>,
        enricher: Arc<dyn MetadataEnricher>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<WriteJob>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(WriteStats::default());

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    rx.clone(),
                    shutdown_rx.clone(),
                    connector.clone(),
                    enricher.clone(),
                    stats.clone(),
                ))
            })
            .collect();

        Self {
            dispatcher: WriteDispatcher {
                tx,
                stats: stats.clone(),
            },
            shutdown_tx,
            workers,
            stats,
        }
    }

    pub fn dispatcher(&self) -> WriteDispatcher {
        self.dispatcher.clone()
    }

    pub fn stats(&self) -> Arc<WriteStats> {
        self.stats.clone()
    }

    /// Lets the workers finish the queue for up to `grace`, then aborts whatever
    /// is still running. Returns `true` when everything drained in time.
    pub async fn shutdown(self, grace: Duration) -> bool {
        let _ = self.shutdown_tx.send(true);
        let aborts: Vec<_> = self.workers.iter().map(|h| h.abort_handle()).collect();
        let drained =
            tokio::time::timeout(grace, futures_util::future::join_all(self.workers)).await;

        let completed = self.stats.jobs_completed.load(Ordering::Relaxed);
        let failed = self.stats.jobs_failed.load(Ordering::Relaxed);
        let received = self.stats.jobs_received.load(Ordering::Relaxed);
        match drained {
            Ok(_) => {
                info!(
                    jobs_received = received,
                    jobs_completed = completed,
                    jobs_failed = failed,
                    "write pool drained"
                );
                true
            }
            Err(_) => {
                for a in aborts {
                    a.abort();
                }
                warn!(
                    grace_secs = grace.as_secs(),
                    jobs_dropped = received.saturating_sub(completed + failed),
                    "write pool did not drain in time; aborted remaining writes"
                );
                false
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<WriteJob>>>,
    mut shutdown_rx: watch::Receiver<bool>,
    connector: Arc<dyn StoreConnector>,
    enricher: Arc<dyn MetadataEnricher>,
    stats: Arc<WriteStats>,
) {
    loop {
        // Queued jobs win over the shutdown signal, so the queue drains first.
        let job = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                job = rx.recv() => job,
                _ = shutdown_rx.wait_for(|stop| *stop) => None,
            }
        };
        let Some(job) = job else {
            break;
        };
        match write_job(&job, connector.as_ref(), enricher.as_ref()).await {
            Ok(_) => {
                stats.jobs_completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.jobs_failed.fetch_add(1, Ordering::Relaxed);
                error!(worker_id, remote_ip = %job.origin_ip, error = %e, "write job failed");
            }
        }
    }
    debug!(worker_id, "writer shutting down");
}

/// One writer invocation: fresh store connection, one enricher call.
pub async fn write_job(
    job: &WriteJob,
    connector: &dyn StoreConnector,
    enricher: &dyn MetadataEnricher,
) -> Result<bool, StoreWriteError> {
    debug!(
        remote_ip = %job.origin_ip,
        containers = job.payload.len(),
        "processing payload"
    );
    let store = connector.connect()?;
    enricher
        .enrich(&job.payload, &job.origin_ip, store.as_ref())
        .await
}
