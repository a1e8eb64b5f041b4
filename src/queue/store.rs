//! Shared job store

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::errors::{QueueError, QueueResult};
use super::job::{Job, JobState, QueueName};
use super::journal::{Journal, JournalRecord};

/// Journal length below which removals never trigger a compaction
pub const COMPACT_MIN_RECORDS: usize = 1024;

struct StoreInner {
    jobs: HashMap<Uuid, Job>,
    journal: Option<Journal>,
    /// Records in the journal file since it was last rewritten
    journal_records: usize,
}

/// Job store shared by both queues.
///
/// Jobs live in memory only while waiting or active; the runtime removes a
/// job once it finishes. When opened with a path every state change is also
/// appended to a checksummed journal, so a restarted worker can replay what
/// was recorded. Removals keep the journal bounded: once it holds more than
/// [`COMPACT_MIN_RECORDS`] and four records per live job, it is rewritten
/// with the live jobs only. The service obliterates both queues at startup.
pub struct JobStore {
    inner: Mutex<StoreInner>,
}

impl JobStore {
    /// Memory-only store
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                jobs: HashMap::new(),
                journal: None,
                journal_records: 0,
            }),
        }
    }

    /// Journal-backed store, replaying any existing records
    pub fn open(path: &Path) -> QueueResult<Self> {
        let records = Journal::replay(path)?;
        let journal_records = records.len();
        let mut jobs = HashMap::new();
        for record in records {
            match record {
                JournalRecord::Upsert(job) => {
                    jobs.insert(job.id, job);
                }
                JournalRecord::Remove(id) => {
                    jobs.remove(&id);
                }
            }
        }
        let journal = Journal::open(path)?;
        Ok(Self {
            inner: Mutex::new(StoreInner {
                jobs,
                journal: Some(journal),
                journal_records,
            }),
        })
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|_| QueueError::Internal("Lock poisoned".into()))
    }

    /// Insert or replace a job record
    pub fn upsert(&self, job: &Job) -> QueueResult<()> {
        let mut inner = self.lock()?;
        if let Some(journal) = inner.journal.as_mut() {
            journal.append(job)?;
            inner.journal_records += 1;
        }
        inner.jobs.insert(job.id, job.clone());
        Ok(())
    }

    /// Drop a job, returning it if it was stored
    pub fn remove(&self, id: &Uuid) -> QueueResult<Option<Job>> {
        let mut inner = self.lock()?;
        let removed = inner.jobs.remove(id);
        if removed.is_none() {
            return Ok(None);
        }

        let StoreInner {
            jobs,
            journal,
            journal_records,
        } = &mut *inner;
        if let Some(journal) = journal.as_mut() {
            if *journal_records >= COMPACT_MIN_RECORDS && *journal_records >= 4 * jobs.len() {
                journal.rewrite(jobs.values())?;
                *journal_records = jobs.len();
            } else {
                journal.append_removal(*id)?;
                *journal_records += 1;
            }
        }
        Ok(removed)
    }

    /// Jobs currently held, across both queues
    pub fn job_count(&self) -> QueueResult<usize> {
        Ok(self.lock()?.jobs.len())
    }

    pub fn get(&self, id: &Uuid) -> QueueResult<Option<Job>> {
        Ok(self.lock()?.jobs.get(id).cloned())
    }

    /// Jobs of one queue, oldest first
    pub fn jobs_in(&self, queue: QueueName) -> QueueResult<Vec<Job>> {
        let inner = self.lock()?;
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|job| job.queue_name == queue)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    pub fn count(&self, queue: QueueName, state: JobState) -> QueueResult<usize> {
        Ok(self
            .lock()?
            .jobs
            .values()
            .filter(|job| job.queue_name == queue && job.state == state)
            .count())
    }

    /// Discard every job of `queue`, returning how many were removed
    pub fn obliterate(&self, queue: QueueName) -> QueueResult<usize> {
        let mut inner = self.lock()?;
        let before = inner.jobs.len();
        inner.jobs.retain(|_, job| job.queue_name != queue);
        let removed = before - inner.jobs.len();

        let StoreInner {
            jobs,
            journal,
            journal_records,
        } = &mut *inner;
        if let Some(journal) = journal.as_mut() {
            journal.rewrite(jobs.values())?;
            *journal_records = jobs.len();
        }
        Ok(removed)
    }
}
