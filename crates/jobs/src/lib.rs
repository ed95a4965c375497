//! Fixed-size worker pool for generation work.
//!
//! Jobs are closures submitted with a [`Priority`]. Within a priority lane the
//! [`QueuePolicy`] decides order; the default is most-recent-first, because the
//! most recently requested tile is usually the one on screen. Results travel
//! back through a [`Mailbox`] rather than by calling into the submitter from a
//! worker thread.

pub mod error;
mod handle;
mod mailbox;
mod manager;
mod queue;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::handle::{AbortSignal, JobContext, JobHandle, JobId, JobStatus};
pub use crate::mailbox::Mailbox;
pub use crate::manager::JobManager;
pub use crate::queue::{Priority, QueuePolicy};
