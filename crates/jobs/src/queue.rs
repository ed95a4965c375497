use crate::handle::{Job, JobId};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Scheduling hint. Higher priorities are always dispatched first.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Background work such as finishing full pyramids.
    #[display("low")]
    Low,
    #[display("normal")]
    Normal,
    /// Work the user is waiting on right now.
    #[display("high")]
    High,
}

impl Priority {
    const LANES: usize = 3;

    fn lane(self) -> usize {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::High => 2,
        }
    }
}

/// Order within one priority lane.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePolicy {
    /// Most recently submitted first.
    #[default]
    #[display("lifo")]
    Lifo,
    /// Oldest first.
    #[display("fifo")]
    Fifo,
}

pub(crate) struct JobQueue {
    lanes: [VecDeque<Job>; Priority::LANES],
    policy: QueuePolicy,
}

impl JobQueue {
    pub(crate) fn new(policy: QueuePolicy) -> Self {
        Self { lanes: Default::default(), policy }
    }

    pub(crate) fn push(&mut self, job: Job) {
        self.lanes[job.priority().lane()].push_back(job);
    }

    pub(crate) fn pop(&mut self) -> Option<Job> {
        let lane = self.lanes.iter_mut().rev().find(|lane| !lane.is_empty())?;
        match self.policy {
            QueuePolicy::Lifo => lane.pop_back(),
            QueuePolicy::Fifo => lane.pop_front(),
        }
    }

    pub(crate) fn remove(&mut self, id: JobId) -> Option<Job> {
        for lane in &mut self.lanes {
            if let Some(index) = lane.iter().position(|job| job.id() == id) {
                return lane.remove(index);
            }
        }
        None
    }

    pub(crate) fn drain(&mut self) -> Vec<Job> {
        self.lanes.iter_mut().flat_map(|lane| lane.drain(..)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn queue_of(policy: QueuePolicy, jobs: &[(u64, Priority)]) -> JobQueue {
        let mut queue = JobQueue::new(policy);
        for (id, priority) in jobs {
            queue.push(Job::new(JobId(*id), *priority, |_| {}).0);
        }
        queue
    }

    fn order(mut queue: JobQueue) -> Vec<u64> {
        std::iter::from_fn(|| queue.pop()).map(|job| job.id().0).collect()
    }

    #[rstest]
    #[case(QueuePolicy::Lifo, vec![3, 2, 1])]
    #[case(QueuePolicy::Fifo, vec![1, 2, 3])]
    fn test_policy_within_lane(#[case] policy: QueuePolicy, #[case] expected: Vec<u64>) {
        let queue = queue_of(policy, &[(1, Priority::Normal), (2, Priority::Normal), (3, Priority::Normal)]);
        assert_eq!(order(queue), expected);
    }

    #[test]
    fn test_priority_beats_recency() {
        let queue = queue_of(QueuePolicy::Lifo, &[(1, Priority::High), (2, Priority::Low), (3, Priority::Normal), (4, Priority::High)]);
        assert_eq!(order(queue), vec![4, 1, 3, 2]);
    }

    #[test]
    fn test_remove() {
        let mut queue = queue_of(QueuePolicy::Fifo, &[(1, Priority::Low), (2, Priority::High)]);
        assert!(queue.remove(JobId(1)).is_some());
        assert!(queue.remove(JobId(1)).is_none());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain().len(), 1);
        assert_eq!(queue.len(), 0);
    }
}
