//! Fixed-size pool of tokio tasks pulling jobs from a shared queue.
//!
//! Workers take one job at a time, hand it to the `Processor` and push the job back together
//! with its error (if any) on the results channel. A panicking job is reported as
//! `JobError::Panicked` and its worker moves on. There is no cancellation: a job that never
//! finishes keeps its worker busy.

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, Instrument};

pub const DEFAULT_WORKERS: usize = 5;

#[async_trait]
pub trait Processor<J>: Send + Sync {
    type Error: Send;

    async fn process(&self, job: &J) -> Result<(), Self::Error>;
}

#[derive(Debug)]
pub enum JobError<E> {
    /// The processor returned an error.
    Failed(E),
    /// The processor panicked while handling the job.
    Panicked(String),
    /// The job never reached a worker.
    Unprocessed,
}

impl<E: fmt::Display> fmt::Display for JobError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::Failed(err) => err.fmt(f),
            JobError::Panicked(message) => write!(f, "worker panicked: {}", message),
            JobError::Unprocessed => f.write_str("no worker took the job"),
        }
    }
}

#[derive(Debug)]
pub struct JobResult<J, E> {
    pub job: J,
    pub error: Option<JobError<E>>,
}

impl<J, E> JobResult<J, E> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub struct WorkerPool<J, E> {
    jobs: mpsc::UnboundedSender<J>,
    results: mpsc::UnboundedReceiver<JobResult<J, E>>,
    handles: Vec<JoinHandle<()>>,
}

impl<J, E> WorkerPool<J, E>
where
    J: Send + Sync + 'static,
    E: Send + 'static,
{
    /// Spawns `size` workers (at least one) sharing `processor`.
    pub fn start<P>(size: usize, processor: Arc<P>) -> Self
    where
        P: Processor<J, Error = E> + 'static,
    {
        let (jobs, queue) = mpsc::unbounded_channel::<J>();
        let (sender, results) = mpsc::unbounded_channel();
        let queue = Arc::new(Mutex::new(queue));

        let handles = (0..size.max(1))
            .map(|id| {
                let queue = queue.clone();
                let sender = sender.clone();
                let processor = processor.clone();
                tokio::spawn(
                    work(queue, sender, processor).instrument(info_span!("worker", id)),
                )
            })
            .collect();

        WorkerPool {
            jobs,
            results,
            handles,
        }
    }

    /// Queues a job; hands it back when every worker is gone.
    pub fn submit(&self, job: J) -> Result<(), J> {
        self.jobs.send(job).map_err(|err| err.0)
    }

    /// Closes the queue and waits for exactly `expected` results.
    ///
    /// Fewer come back only when a worker task was aborted; that is logged and the missing jobs
    /// are absent from the returned list.
    pub async fn drain(self, expected: usize) -> Vec<JobResult<J, E>> {
        let WorkerPool {
            jobs,
            mut results,
            handles,
        } = self;
        drop(jobs);

        let mut collected = Vec::with_capacity(expected);
        while collected.len() < expected {
            match results.recv().await {
                Some(result) => collected.push(result),
                None => break,
            }
        }

        for outcome in join_all(handles).await {
            if let Err(err) = outcome {
                error!(error = %err, "worker stopped abnormally");
            }
        }
        if collected.len() < expected {
            error!(
                expected,
                received = collected.len(),
                "results missing after all workers stopped"
            );
        }

        collected
    }
}

async fn work<J, E, P>(
    queue: Arc<Mutex<mpsc::UnboundedReceiver<J>>>,
    results: mpsc::UnboundedSender<JobResult<J, E>>,
    processor: Arc<P>,
) where
    P: Processor<J, Error = E>,
{
    loop {
        let job = { queue.lock().await.recv().await };
        let Some(job) = job else {
            debug!("queue closed");
            break;
        };

        let outcome = AssertUnwindSafe(processor.process(&job))
            .catch_unwind()
            .await;
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(JobError::Failed(err)),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "job panicked");
                Some(JobError::Panicked(message))
            }
        };
        if results.send(JobResult { job, error }).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
