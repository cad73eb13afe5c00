//! # Dispatcher
//!
//! Runs a batch of [`MutationJob`]s on a bounded pool of OS threads.
//!
//! The pool has `min(pool_size, jobs.len())` named workers. Each job travels
//! through a `crossbeam_channel` queue together with its
//! [`CompletionToken`]; a worker takes one job at a time, applies the job's
//! delta once per repetition (one guard acquisition per iteration, never one
//! for the whole loop) and then drops the token. A token that never reaches a
//! worker, because the send failed or because every receiver died with jobs
//! still queued, is dropped along with the queue and signals all the same, so
//! the barrier always releases. [`Dispatcher::run`] returns only once the
//! [`CompletionBarrier`] has seen every job and the workers have been joined.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use tracing::{debug, error, warn};

use crate::error::{CoordinatorError, Result};
use crate::{CompletionBarrier, CompletionToken, MutationJob, SharedCounter};

type Delivery = (MutationJob, CompletionToken);
type WorkerBody = Box<dyn FnOnce() + Send + 'static>;
type Spawner = fn(String, WorkerBody) -> io::Result<JoinHandle<()>>;

fn spawn_os_thread(name: String, body: WorkerBody) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name(name).spawn(body)
}

/// What a completed [`Dispatcher::run`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub jobs_completed: usize,
    pub workers: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool_size: usize,
    timeout: Option<Duration>,
    spawn: Spawner,
}

impl Dispatcher {
    /// A dispatcher running at most `pool_size` jobs at once.
    pub fn new(pool_size: usize) -> Result<Self> {
        if pool_size == 0 {
            return Err(CoordinatorError::invalid("pool_size", "must be at least 1"));
        }
        Ok(Dispatcher {
            pool_size,
            timeout: None,
            spawn: spawn_os_thread,
        })
    }

    /// Bounds the wait on the completion barrier.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[cfg(test)]
    fn with_spawner(mut self, spawn: Spawner) -> Self {
        self.spawn = spawn;
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs every job against `counter` and blocks until all of them are done.
    ///
    /// On [`CoordinatorError::Timeout`] the workers are told to stop at their
    /// next iteration and detached; every other outcome joins them first.
    pub fn run(&self, counter: Arc<SharedCounter>, jobs: &[MutationJob]) -> Result<Dispatch> {
        if jobs.is_empty() {
            return Err(CoordinatorError::invalid("jobs", "at least one job is required"));
        }
        for job in jobs {
            job.validate()?;
        }

        let started = Instant::now();
        let barrier = Arc::new(CompletionBarrier::new(jobs.len()));
        let cancel = Arc::new(AtomicBool::new(false));
        let (queue, inbox) = unbounded::<Delivery>();

        let requested = self.pool_size.min(jobs.len());
        let mut workers = Vec::with_capacity(requested);
        for index in 0..requested {
            let body = worker_body(
                inbox.clone(),
                Arc::clone(&counter),
                Arc::clone(&cancel),
            );
            match (self.spawn)(format!("counter-worker-{index}"), body) {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    error!(requested, spawned = workers.len(), %source, "worker pool creation failed");
                    cancel.store(true, Ordering::Relaxed);
                    drop(queue);
                    // nothing was queued, so the spawned workers exit at once
                    if let Err(err) = join_all(workers) {
                        warn!(%err, "worker failed while the partial pool was torn down");
                    }
                    return Err(CoordinatorError::ResourceExhausted {
                        requested,
                        spawned: index,
                        source,
                    });
                }
            }
        }
        drop(inbox);

        for job in jobs {
            // fails only once every worker is gone: the returned token is
            // dropped here and signals, and the join below reports the panic
            let _ = queue.send((*job, barrier.token()));
        }
        drop(queue);

        let waited = match self.timeout {
            Some(limit) => barrier.wait_timeout(limit),
            None => {
                barrier.wait();
                Ok(())
            }
        };
        if let Err(err) = waited {
            warn!(%err, "abandoning workers");
            cancel.store(true, Ordering::Relaxed);
            return Err(err);
        }

        join_all(workers)?;

        let dispatch = Dispatch {
            jobs_completed: barrier.completed(),
            workers: requested,
            elapsed: started.elapsed(),
        };
        debug!(?dispatch, "dispatch finished");
        Ok(dispatch)
    }
}

fn worker_body(
    inbox: Receiver<Delivery>,
    counter: Arc<SharedCounter>,
    cancel: Arc<AtomicBool>,
) -> WorkerBody {
    Box::new(move || {
        for (job, _done) in inbox.iter() {
            let delta = job.direction.delta();
            debug!(direction = %job.direction, repetitions = job.repetitions, "job started");
            for _ in 0..job.repetitions {
                // cancelled jobs still drain so their tokens signal
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                counter.apply(delta);
            }
        }
    })
}

fn join_all(workers: Vec<JoinHandle<()>>) -> Result<()> {
    let mut first_panic = None;
    for handle in workers {
        let name = handle.thread().name().unwrap_or("counter-worker").to_owned();
        if handle.join().is_err() && first_panic.is_none() {
            first_panic = Some(name);
        }
    }
    match first_panic {
        Some(worker) => Err(CoordinatorError::WorkerPanicked { worker }),
        None => Ok(()),
    }
}
