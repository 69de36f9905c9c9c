use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::DispatchError;
use crate::worker::WorkerId;

/// First id handed out by a fresh dispatcher.
pub const FIRST_JOB_ID: u64 = 10_000;

/// Order identifier. Allocated monotonically and never reused, even when an
/// order is rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        digits
            .parse()
            .map(JobId)
            .map_err(|_| DispatchError::InvalidId(s.to_string()))
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Ordered priority tier. Queue placement only looks at [`Priority::rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    Vip,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Priority::Normal => 0,
            Priority::Vip => 1,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Normal => write!(f, "normal"),
            Priority::Vip => write!(f, "vip"),
        }
    }
}

impl FromStr for Priority {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Priority::Normal),
            "vip" => Ok(Priority::Vip),
            _ => Err(DispatchError::InvalidPriority(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::InProgress => write!(f, "in-progress"),
            JobState::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub priority: Priority,
    pub state: JobState,
    pub assigned_worker: Option<WorkerId>,
    /// Bot that ran the order to completion
    pub completed_by: Option<WorkerId>,
    /// Times this order was pulled back off a removed bot
    pub rollbacks: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: JobId, priority: Priority) -> Self {
        Self {
            id,
            priority,
            state: JobState::Pending,
            assigned_worker: None,
            completed_by: None,
            rollbacks: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_vip(&self) -> bool {
        self.priority == Priority::Vip
    }

    pub(crate) fn start(&mut self, worker: WorkerId) {
        self.state = JobState::InProgress;
        self.assigned_worker = Some(worker);
    }

    /// Back to pending, keeping id and priority.
    pub(crate) fn roll_back(&mut self) {
        self.state = JobState::Pending;
        self.assigned_worker = None;
        self.rollbacks += 1;
    }

    pub(crate) fn complete(&mut self) {
        self.state = JobState::Completed;
        self.completed_by = self.assigned_worker.take();
        self.completed_at = Some(Utc::now());
    }
}
