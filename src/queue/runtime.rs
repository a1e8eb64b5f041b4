//! Queue runtime
//!
//! Each registered job kind gets its own lane: an unbounded channel of job
//! ids drained by a dispatcher task that admits at most `concurrency` jobs
//! at once. Every job runs in its own task under the kind's lock duration.
//! A job that outlives it is stalled: its task is aborted and the job is
//! failed. Stalled jobs are never retried.
//!
//! Finished jobs are handed to the observers and then dropped from the
//! store; results are only visible through [`QueueObserver`] hooks.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::activity::ActivityTracker;
use super::errors::{QueueError, QueueResult};
use super::intent::{EnqueueIntent, JobOutcome};
use super::job::{Job, JobName, QueueName};
use super::observer::QueueObserver;
use super::store::JobStore;
use crate::config::QueueSettings;
use crate::observability::Logger;

/// A stalled job is failed on its first stall
pub const MAX_STALLED_COUNT: u32 = 0;

/// Boxed future returned by job processors
pub type ProcessFuture<'a> = Pin<Box<dyn Future<Output = QueueResult<JobOutcome>> + Send + 'a>>;

/// Processes one job kind
pub trait JobProcessor: Send + Sync {
    fn process<'a>(&'a self, job: &'a Job) -> ProcessFuture<'a>;
}

/// Everything a lane needs to run one job
#[derive(Clone)]
struct Lane {
    job_name: JobName,
    settings: QueueSettings,
    processor: Arc<dyn JobProcessor>,
    store: Arc<JobStore>,
    observers: Arc<Vec<Arc<dyn QueueObserver>>>,
    intent_tx: Option<mpsc::UnboundedSender<EnqueueIntent>>,
    activity: Arc<ActivityTracker>,
}

impl Lane {
    async fn dispatch(self, mut rx: mpsc::UnboundedReceiver<Uuid>) {
        let permits = Arc::new(Semaphore::new(self.settings.concurrency));
        while let Some(id) = rx.recv().await {
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let lane = self.clone();
            tokio::spawn(async move {
                lane.run(id).await;
                drop(permit);
            });
        }
    }

    async fn run(&self, id: Uuid) {
        if let Err(e) = self.run_job(id).await {
            let id = id.to_string();
            let err = e.to_string();
            Logger::error(
                "JOB_RUNTIME_ERROR",
                &[
                    ("job_name", self.job_name.as_str()),
                    ("job_id", id.as_str()),
                    ("error", err.as_str()),
                ],
            );
        }
        self.activity.end();
    }

    async fn run_job(&self, id: Uuid) -> QueueResult<()> {
        // Obliterated while waiting
        let mut job = match self.store.get(&id)? {
            Some(job) => job,
            None => return Ok(()),
        };
        job.activate();
        self.store.upsert(&job)?;

        let processor = self.processor.clone();
        let input = job.clone();
        let mut handle = tokio::spawn(async move { processor.process(&input).await });

        match tokio::time::timeout(self.settings.lock_duration(), &mut handle).await {
            Ok(Ok(Ok(outcome))) => self.complete(job, outcome),
            Ok(Ok(Err(e))) => self.fail(job, &e.to_string()),
            Ok(Err(join_error)) => {
                self.fail(job, &format!("processor panicked: {}", join_error))
            }
            Err(_) => {
                handle.abort();
                self.stall(job)
            }
        }
    }

    fn complete(&self, mut job: Job, outcome: JobOutcome) -> QueueResult<()> {
        let JobOutcome {
            result,
            jobs_to_enqueue,
        } = outcome;
        job.complete(result.clone());
        for observer in self.observers.iter() {
            observer.on_completed(&job, &result);
        }
        self.forward(&job, jobs_to_enqueue);
        self.store.remove(&job.id)?;
        Ok(())
    }

    fn forward(&self, job: &Job, intents: Vec<EnqueueIntent>) {
        if intents.is_empty() {
            return;
        }
        let Some(tx) = &self.intent_tx else {
            let count = intents.len().to_string();
            Logger::warn(
                "JOB_INTENTS_DROPPED",
                &[
                    ("job_name", job.job_name.as_str()),
                    ("count", count.as_str()),
                ],
            );
            return;
        };

        for intent in intents {
            self.activity.begin();
            if let Err(mpsc::error::SendError(intent)) = tx.send(intent) {
                self.activity.end();
                Logger::error(
                    "JOB_INTENT_UNDELIVERED",
                    &[
                        ("job_name", job.job_name.as_str()),
                        ("next_job_name", intent.job_name.as_str()),
                    ],
                );
            }
        }
    }

    fn fail(&self, mut job: Job, error: &str) -> QueueResult<()> {
        job.fail(error);
        for observer in self.observers.iter() {
            observer.on_failed(&job, error);
        }
        self.store.remove(&job.id)?;
        Ok(())
    }

    fn stall(&self, job: Job) -> QueueResult<()> {
        for observer in self.observers.iter() {
            observer.on_stalled(&job);
        }
        let reason = format!(
            "job stalled: exceeded lock duration of {} ms (maxStalledCount {})",
            self.settings.lock_duration_ms, MAX_STALLED_COUNT
        );
        self.fail(job, &reason)
    }
}

/// A named queue with one lane per registered job kind
pub struct JobQueue {
    name: QueueName,
    store: Arc<JobStore>,
    lanes: HashMap<JobName, mpsc::UnboundedSender<Uuid>>,
    observers: Arc<Vec<Arc<dyn QueueObserver>>>,
    activity: Arc<ActivityTracker>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    pub fn builder(name: QueueName, store: Arc<JobStore>) -> JobQueueBuilder {
        JobQueueBuilder {
            name,
            store,
            processors: Vec::new(),
            observers: Vec::new(),
            intent_tx: None,
            activity: Arc::new(ActivityTracker::new()),
        }
    }

    pub fn name(&self) -> QueueName {
        self.name
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Enqueue a job of `job_name`
    pub fn add(&self, job_name: JobName, payload: Value) -> QueueResult<Uuid> {
        if job_name.queue() != self.name {
            return Err(QueueError::WrongQueue {
                job: job_name.as_str().to_string(),
                queue: self.name.as_str().to_string(),
            });
        }
        let lane = self
            .lanes
            .get(&job_name)
            .ok_or_else(|| QueueError::NoProcessor(job_name.as_str().to_string()))?;

        let job = Job::new(job_name, payload);
        self.store.upsert(&job)?;

        self.activity.begin();
        if lane.send(job.id).is_err() {
            self.activity.end();
            return Err(QueueError::Closed(self.name.as_str().to_string()));
        }
        for observer in self.observers.iter() {
            observer.on_enqueued(&job);
        }
        Ok(job.id)
    }

    /// Discard every stored job of this queue
    pub fn obliterate(&self) -> QueueResult<usize> {
        self.store.obliterate(self.name)
    }

    /// Stop dispatching. Jobs already running finish on their own.
    pub fn close(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.close();
    }
}

/// Registers processors and observers, then starts the lanes
pub struct JobQueueBuilder {
    name: QueueName,
    store: Arc<JobStore>,
    processors: Vec<(JobName, QueueSettings, Arc<dyn JobProcessor>)>,
    observers: Vec<Arc<dyn QueueObserver>>,
    intent_tx: Option<mpsc::UnboundedSender<EnqueueIntent>>,
    activity: Arc<ActivityTracker>,
}

impl JobQueueBuilder {
    pub fn processor(
        mut self,
        job_name: JobName,
        settings: QueueSettings,
        processor: Arc<dyn JobProcessor>,
    ) -> Self {
        self.processors.push((job_name, settings, processor));
        self
    }

    pub fn observer(mut self, observer: Arc<dyn QueueObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Where completed jobs' follow-up intents are sent
    pub fn intents(mut self, intent_tx: mpsc::UnboundedSender<EnqueueIntent>) -> Self {
        self.intent_tx = Some(intent_tx);
        self
    }

    pub fn activity(mut self, activity: Arc<ActivityTracker>) -> Self {
        self.activity = activity;
        self
    }

    /// Start one lane per processor. Must run inside a tokio runtime.
    pub fn build(self) -> QueueResult<JobQueue> {
        let observers = Arc::new(self.observers);
        let mut lanes = HashMap::new();
        let mut tasks = Vec::new();

        for (job_name, settings, processor) in self.processors {
            if job_name.queue() != self.name {
                return Err(QueueError::WrongQueue {
                    job: job_name.as_str().to_string(),
                    queue: self.name.as_str().to_string(),
                });
            }
            if settings.concurrency == 0 {
                return Err(QueueError::Internal(format!(
                    "concurrency for '{}' must be > 0",
                    job_name
                )));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let lane = Lane {
                job_name,
                settings,
                processor,
                store: self.store.clone(),
                observers: observers.clone(),
                intent_tx: self.intent_tx.clone(),
                activity: self.activity.clone(),
            };
            tasks.push(tokio::spawn(lane.dispatch(rx)));
            lanes.insert(job_name, tx);
        }

        Ok(JobQueue {
            name: self.name,
            store: self.store,
            lanes,
            observers,
            activity: self.activity,
            tasks: Mutex::new(tasks),
        })
    }
}
