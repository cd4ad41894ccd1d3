use std::fmt;
use std::sync::Arc;

use s3ds_types::Key;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::datastore::S3Datastore;
use crate::error::DatastoreResult;
use crate::traits::Datastore;

/// One unit of committed batch work.
#[derive(Clone, PartialEq, Eq)]
pub enum Job {
    /// Upload one value.
    Put { key: Key, value: Vec<u8> },
    /// Delete a chunk of object paths in one request.
    Delete { paths: Vec<String> },
}

impl Job {
    async fn run(self, store: &S3Datastore) -> DatastoreResult<()> {
        match self {
            Job::Put { key, value } => store.put(&key, &value).await,
            Job::Delete { paths } => store.delete_paths(&paths).await,
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Put { key, value } => write!(f, "put {key} ({} bytes)", value.len()),
            Job::Delete { paths } => write!(f, "delete {} objects", paths.len()),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Put { key, .. } => write!(f, "put {key}"),
            Job::Delete { paths } => match (paths.first(), paths.last()) {
                (Some(first), Some(last)) if paths.len() > 1 => {
                    write!(f, "delete {} objects ({first} .. {last})", paths.len())
                }
                (Some(only), _) => write!(f, "delete {only}"),
                _ => write!(f, "delete nothing"),
            },
        }
    }
}

/// Outcome of one job: `Err` carries the failure message.
type JobResult = Result<(), String>;

/// Number of workers for `jobs` jobs given a configured bound: never more
/// workers than jobs, never zero workers while there is work.
pub fn pool_size(configured: usize, jobs: usize) -> usize {
    configured.max(1).min(jobs)
}

/// Fixed-size pool of tasks draining one shared job queue.
///
/// [`WorkerPool::run`] returns only after every worker has exited, so no
/// task outlives the call and every job is accounted for exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    /// A pool for `jobs` jobs bounded by `configured` workers.
    pub fn sized_for(configured: usize, jobs: usize) -> Self {
        Self {
            size: pool_size(configured, jobs),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run every job to completion and return one message per failed job.
    pub async fn run(&self, store: &S3Datastore, jobs: Vec<Job>) -> Vec<String> {
        let num_jobs = jobs.len();
        if num_jobs == 0 {
            return Vec::new();
        }

        let (job_tx, job_rx) = mpsc::channel::<Job>(num_jobs);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<JobResult>(num_jobs);

        let mut workers = JoinSet::new();
        for id in 0..self.size {
            workers.spawn(worker(id, store.clone(), Arc::clone(&job_rx), result_tx.clone()));
        }
        drop(result_tx);
        debug!(workers = self.size, jobs = num_jobs, "worker pool started");

        for job in jobs {
            // The queue holds every job, so this only fails once all
            // workers are gone; the missing results are counted below.
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        let mut failures = Vec::new();
        let mut received = 0;
        while let Some(result) = result_rx.recv().await {
            received += 1;
            if let Err(msg) = result {
                failures.push(msg);
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "batch worker terminated abnormally");
            }
        }

        for _ in received..num_jobs {
            failures.push("job aborted: worker terminated before reporting".to_string());
        }
        failures
    }
}

async fn worker(
    id: usize,
    store: S3Datastore,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<JobResult>,
) {
    loop {
        let job = jobs.lock().await.recv().await;
        let Some(job) = job else { break };
        let label = job.to_string();
        // Each job runs in its own task so a panic fails that job only.
        let task_store = store.clone();
        let outcome = match tokio::spawn(async move { job.run(&task_store).await }).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(worker = id, job = %label, error = %e, "batch job failed");
                Err(format!("{label}: {e}"))
            }
            Err(e) => {
                warn!(worker = id, job = %label, error = %e, "batch job aborted");
                Err(format!("{label}: {}", if e.is_panic() { "panicked" } else { "cancelled" }))
            }
        };
        if results.send(outcome).await.is_err() {
            break;
        }
    }
}
