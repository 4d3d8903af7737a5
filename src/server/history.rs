use std::collections::{HashMap, VecDeque};

use crate::server::job::{Job, JobId};

/// Bounded, insertion-ordered store of recent jobs.
///
/// Holds up to `retain` records, the currently running job included.
/// Recording past capacity evicts the oldest entry and discards its output
/// and metadata entirely; a subsequent lookup for that id answers as
/// unknown. The running job is always the newest record, so it can never be
/// the eviction victim.
#[derive(Debug)]
pub struct HistoryStore {
    retain: usize,
    order: VecDeque<JobId>,
    jobs: HashMap<JobId, Job>,
}

impl HistoryStore {
    pub fn new(retain: usize) -> Self {
        Self {
            retain,
            order: VecDeque::with_capacity(retain),
            jobs: HashMap::with_capacity(retain),
        }
    }

    /// Insert a job at the newest position, evicting the oldest record if
    /// the store is at capacity.
    pub fn record(&mut self, job: Job) {
        if self.order.len() >= self.retain {
            if let Some(evicted) = self.order.pop_front() {
                self.jobs.remove(&evicted);
                tracing::debug!(id = %evicted, "Evicted oldest job from history");
            }
        }
        self.order.push_back(job.id.clone());
        self.jobs.insert(job.id.clone(), job);
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.get_mut(id)
    }

    /// Extend the stored output of a retained job. A miss is ignored; only
    /// the running job is ever appended to, and it cannot have been evicted.
    pub fn append_output(&mut self, id: &JobId, bytes: &[u8]) {
        if let Some(job) = self.jobs.get_mut(id.as_str()) {
            job.output.extend_from_slice(bytes);
        }
    }

    /// Retained ids in insertion (oldest-first) order.
    pub fn ids(&self) -> impl Iterator<Item = &JobId> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
