use crate::Priority;
use crate::manager::Shared;
use derive_more::Display;
use parking_lot::{Condvar, Mutex};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("job#{_0}")]
pub struct JobId(pub u64);

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum JobStatus {
    #[display("pending")]
    Pending,
    #[display("running")]
    Running,
    #[display("finished")]
    Finished,
    /// Aborted before it started (never ran), or while running.
    #[display("aborted")]
    Aborted,
    /// Discarded unstarted because the pool was stopped.
    #[display("dropped")]
    Dropped,
    #[display("panicked")]
    Panicked,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

pub(crate) struct JobState {
    id: JobId,
    priority: Priority,
    aborted: AtomicBool,
    status: Mutex<JobStatus>,
    done: Condvar,
}

impl JobState {
    fn finish(&self, status: JobStatus) {
        *self.status.lock() = status;
        self.done.notify_all();
    }
}

type Work = Box<dyn FnOnce(&JobContext) + Send + 'static>;

/// A queued unit of work.
pub(crate) struct Job {
    state: Arc<JobState>,
    work: Work,
}

impl Job {
    pub(crate) fn new(id: JobId, priority: Priority, work: impl FnOnce(&JobContext) + Send + 'static) -> (Self, Arc<JobState>) {
        let state = Arc::new(JobState {
            id,
            priority,
            aborted: AtomicBool::new(false),
            status: Mutex::new(JobStatus::Pending),
            done: Condvar::new(),
        });
        (Self { state: Arc::clone(&state), work: Box::new(work) }, state)
    }

    pub(crate) fn id(&self) -> JobId {
        self.state.id
    }

    pub(crate) fn priority(&self) -> Priority {
        self.state.priority
    }

    /// Mark the job as never going to run.
    pub(crate) fn discard(self, status: JobStatus) {
        self.state.finish(status);
    }

    /// Run on the current thread. A job aborted between being dequeued and
    /// getting here is skipped without calling its closure.
    pub(crate) fn execute(self) {
        {
            let mut status = self.state.status.lock();
            if *status != JobStatus::Pending {
                return;
            }
            *status = JobStatus::Running;
        }
        let context = JobContext { state: Arc::clone(&self.state) };
        let work = self.work;
        let outcome = catch_unwind(AssertUnwindSafe(|| work(&context)));
        let status = match outcome {
            Ok(()) if context.is_aborted() => JobStatus::Aborted,
            Ok(()) => JobStatus::Finished,
            Err(_) => {
                tracing::error!(job = %self.state.id, "job panicked");
                JobStatus::Panicked
            },
        };
        self.state.finish(status);
    }
}

/// Passed to a running job so it can poll for cancellation at safe points.
pub struct JobContext {
    state: Arc<JobState>,
}

impl JobContext {
    pub fn id(&self) -> JobId {
        self.state.id
    }

    pub fn priority(&self) -> Priority {
        self.state.priority
    }

    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::Acquire)
    }

    /// The job's abort flag, for follow-up work that should stop when this
    /// job is aborted, even after it has finished.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal { state: Arc::clone(&self.state) }
    }
}

/// Read-only view of one job's abort flag.
#[derive(Clone)]
pub struct AbortSignal {
    state: Arc<JobState>,
}

impl AbortSignal {
    pub fn job(&self) -> JobId {
        self.state.id
    }

    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal").field("job", &self.state.id).field("aborted", &self.is_aborted()).finish()
    }
}

/// Submitter's view of a job.
#[derive(Clone)]
pub struct JobHandle {
    state: Arc<JobState>,
    shared: Weak<Shared>,
}

impl JobHandle {
    pub(crate) fn new(state: Arc<JobState>, shared: Weak<Shared>) -> Self {
        Self { state, shared }
    }

    pub(crate) fn finished(state: Arc<JobState>, status: JobStatus) -> Self {
        state.finish(status);
        Self { state, shared: Weak::new() }
    }

    pub fn id(&self) -> JobId {
        self.state.id
    }

    pub fn priority(&self) -> Priority {
        self.state.priority
    }

    pub fn status(&self) -> JobStatus {
        *self.state.status.lock()
    }

    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::Acquire)
    }

    /// Cancel the job.
    ///
    /// A job that has not started is taken off the queue and its closure is
    /// never called. A running job only sees the flag through
    /// [`JobContext::is_aborted`] and stops whenever it next checks.
    pub fn abort(&self) {
        self.state.aborted.store(true, Ordering::Release);
        let unstarted = {
            let mut status = self.state.status.lock();
            let unstarted = *status == JobStatus::Pending;
            if unstarted {
                *status = JobStatus::Aborted;
            }
            unstarted
        };
        if unstarted {
            self.state.done.notify_all();
            if let Some(shared) = self.shared.upgrade() {
                shared.remove(self.state.id);
            }
        }
    }

    /// Block until the job reaches a terminal status.
    pub fn wait(&self) -> JobStatus {
        let mut status = self.state.status.lock();
        while !status.is_terminal() {
            self.state.done.wait(&mut status);
        }
        *status
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.state.id)
            .field("priority", &self.state.priority)
            .field("status", &self.status())
            .finish()
    }
}
