use crate::error::{ErrorKind, Result};
use crate::handle::{Job, JobContext, JobHandle, JobId, JobStatus};
use crate::queue::{JobQueue, Priority, QueuePolicy};
use exn::ResultExt;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::instrument;

pub(crate) struct Shared {
    queue: Mutex<JobQueue>,
    available: Condvar,
    stopping: AtomicBool,
    next_id: AtomicU64,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn remove(&self, id: JobId) {
        // The handle has already marked the job aborted; the closure is
        // dropped unrun.
        drop(self.queue.lock().remove(id));
    }

    fn next_job(&self) -> Option<Job> {
        let mut queue = self.queue.lock();
        loop {
            if self.stopping.load(Ordering::Acquire) {
                return None;
            }
            if let Some(job) = queue.pop() {
                return Some(job);
            }
            self.available.wait(&mut queue);
        }
    }
}

/// Fixed-size pool of worker threads.
///
/// Cloning is cheap and every clone drives the same pool. Workers keep
/// running until [`stop`](Self::stop) is called.
#[derive(Clone)]
pub struct JobManager {
    shared: Arc<Shared>,
}

impl JobManager {
    #[instrument(level = "debug")]
    pub fn new(workers: usize, policy: QueuePolicy) -> Result<Self> {
        if workers == 0 {
            exn::bail!(ErrorKind::NoWorkers);
        }
        let shared = Arc::new(Shared {
            queue: Mutex::new(JobQueue::new(policy)),
            available: Condvar::new(),
            stopping: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            workers: Mutex::new(Vec::with_capacity(workers)),
        });
        let manager = Self { shared };
        for index in 0..workers {
            let shared = Arc::clone(&manager.shared);
            let spawned = std::thread::Builder::new()
                .name(format!("mosaic-worker-{index}"))
                .spawn(move || {
                    while let Some(job) = shared.next_job() {
                        job.execute();
                    }
                    tracing::trace!("worker exiting");
                });
            match spawned {
                Ok(handle) => manager.shared.workers.lock().push(handle),
                Err(err) => {
                    manager.shutdown();
                    return Err(err).or_raise(|| ErrorKind::Spawn);
                },
            }
        }
        Ok(manager)
    }

    /// Queue `work`. After [`stop`](Self::stop) the job is dropped
    /// immediately and its closure never runs.
    pub fn submit<F>(&self, priority: Priority, work: F) -> JobHandle
    where
        F: FnOnce(&JobContext) + Send + 'static,
    {
        let id = JobId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (job, state) = Job::new(id, priority, work);
        {
            let mut queue = self.shared.queue.lock();
            if self.shared.stopping.load(Ordering::Acquire) {
                drop(queue);
                drop(job);
                return JobHandle::finished(state, JobStatus::Dropped);
            }
            queue.push(job);
        }
        self.shared.available.notify_one();
        tracing::trace!(job = %id, %priority, "submitted");
        JobHandle::new(state, Arc::downgrade(&self.shared))
    }

    /// Jobs queued and not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_stopping(&self) -> bool {
        self.shared.stopping.load(Ordering::Acquire)
    }

    /// Stop dispatching. Running jobs finish; queued jobs are dropped.
    pub fn stop(&self) {
        let dropped = {
            let mut queue = self.shared.queue.lock();
            self.shared.stopping.store(true, Ordering::Release);
            queue.drain()
        };
        self.shared.available.notify_all();
        if !dropped.is_empty() {
            tracing::debug!(dropped = dropped.len(), "dropping queued jobs");
        }
        for job in dropped {
            job.discard(JobStatus::Dropped);
        }
    }

    /// Wait for every worker thread to exit. Only returns once
    /// [`stop`](Self::stop) has been called.
    pub fn join(&self) {
        let workers = std::mem::take(&mut *self.shared.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }

    pub fn shutdown(&self) {
        self.stop();
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mailbox;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Occupy the only worker until the returned barrier is released.
    fn block_worker(manager: &JobManager) -> (JobHandle, Arc<Barrier>) {
        let started = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let (s, r) = (Arc::clone(&started), Arc::clone(&release));
        let handle = manager.submit(Priority::High, move |_| {
            s.wait();
            r.wait();
        });
        started.wait();
        (handle, release)
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = JobManager::new(0, QueuePolicy::Lifo).err().unwrap();
        assert_eq!(*err, ErrorKind::NoWorkers);
    }

    #[test]
    fn test_jobs_run_and_report_through_mailbox() {
        let manager = JobManager::new(4, QueuePolicy::Lifo).unwrap();
        let mailbox = Mailbox::new();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let mailbox = mailbox.clone();
                manager.submit(Priority::Normal, move |_| mailbox.post(i))
            })
            .collect();
        for handle in &handles {
            assert_eq!(handle.wait(), JobStatus::Finished);
        }
        let mut results = mailbox.drain();
        results.sort_unstable();
        assert_eq!(results, (0..16).collect::<Vec<_>>());
        manager.shutdown();
    }

    #[test]
    fn test_lifo_dispatch_order() {
        let manager = JobManager::new(1, QueuePolicy::Lifo).unwrap();
        let (_blocker, release) = block_worker(&manager);
        let mailbox = Mailbox::new();
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let mailbox = mailbox.clone();
                manager.submit(Priority::Normal, move |_| mailbox.post(i))
            })
            .collect();
        assert_eq!(manager.pending(), 3);
        release.wait();
        for handle in &handles {
            handle.wait();
        }
        assert_eq!(mailbox.drain(), vec![2, 1, 0]);
        manager.shutdown();
    }

    #[test]
    fn test_abort_before_start_never_runs() {
        let manager = JobManager::new(1, QueuePolicy::Lifo).unwrap();
        let (_blocker, release) = block_worker(&manager);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = manager.submit(Priority::Normal, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.abort();
        assert_eq!(handle.status(), JobStatus::Aborted);
        assert_eq!(manager.pending(), 0);
        release.wait();
        assert_eq!(handle.wait(), JobStatus::Aborted);
        manager.shutdown();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_abort_while_running_is_cooperative() {
        let manager = JobManager::new(1, QueuePolicy::Lifo).unwrap();
        let started = Arc::new(Barrier::new(2));
        let progress = Arc::new(AtomicUsize::new(0));
        let (s, p) = (Arc::clone(&started), Arc::clone(&progress));
        let handle = manager.submit(Priority::Normal, move |context| {
            s.wait();
            while !context.is_aborted() {
                p.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(1));
            }
        });
        started.wait();
        handle.abort();
        assert_eq!(handle.wait(), JobStatus::Aborted);
        assert!(handle.is_aborted());
        manager.shutdown();
    }

    #[test]
    fn test_stop_drops_queued_jobs() {
        let manager = JobManager::new(1, QueuePolicy::Fifo).unwrap();
        let (blocker, release) = block_worker(&manager);
        let queued = manager.submit(Priority::Low, |_| panic!("must not run"));
        manager.stop();
        assert_eq!(queued.status(), JobStatus::Dropped);
        release.wait();
        manager.join();
        // The in-flight job ran to completion.
        assert_eq!(blocker.status(), JobStatus::Finished);
        let late = manager.submit(Priority::High, |_| panic!("must not run"));
        assert_eq!(late.status(), JobStatus::Dropped);
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let manager = JobManager::new(1, QueuePolicy::Lifo).unwrap();
        let panicked = manager.submit(Priority::Normal, |_| panic!("boom"));
        assert_eq!(panicked.wait(), JobStatus::Panicked);
        let next = manager.submit(Priority::Normal, |_| {});
        assert_eq!(next.wait(), JobStatus::Finished);
        manager.shutdown();
    }

    #[test]
    fn test_signal_outlives_finished_job() {
        let manager = JobManager::new(1, QueuePolicy::Lifo).unwrap();
        let signals = Mailbox::new();
        let sender = signals.clone();
        let handle = manager.submit(Priority::Normal, move |context| sender.post(context.signal()));
        assert_eq!(handle.wait(), JobStatus::Finished);
        let signal = signals.recv_blocking().unwrap();
        assert_eq!(signal.job(), handle.id());
        assert!(!signal.is_aborted());
        handle.abort();
        assert!(signal.is_aborted());
        assert_eq!(handle.status(), JobStatus::Finished);
        manager.shutdown();
    }
}
