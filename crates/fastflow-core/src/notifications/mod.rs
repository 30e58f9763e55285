//! Declarative notification descriptors and the platform seam that delivers
//! them.
//!
//! The core never talks to an OS notification API. It computes descriptors
//! and hands them to a [`NotificationGateway`]; delivery is best effort.

pub mod planner;

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NotificationError;

pub use planner::plan;

pub const DEFAULT_SOUND: &str = "default";

/// Every descriptor id belongs to exactly one category range, so a
/// replanning pass replaces like with like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    FastEndingSoon,
    FastComplete,
    Hydration,
    PhaseTransition,
    SchedulerStart,
    SchedulerEnd,
}

impl NotificationCategory {
    pub const ALL: [NotificationCategory; 6] = [
        Self::FastEndingSoon,
        Self::FastComplete,
        Self::Hydration,
        Self::PhaseTransition,
        Self::SchedulerStart,
        Self::SchedulerEnd,
    ];

    pub fn id_range(self) -> Range<u32> {
        match self {
            Self::FastEndingSoon => 1..2,
            Self::FastComplete => 2..3,
            Self::Hydration => planner::HYDRATION_BASE_ID
                ..planner::HYDRATION_BASE_ID + planner::MAX_HYDRATION_REMINDERS,
            Self::PhaseTransition => planner::PHASE_BASE_ID
                ..planner::PHASE_BASE_ID + planner::MAX_PHASE_REMINDERS,
            Self::SchedulerStart => crate::scheduler::START_NOTIFICATION_ID
                ..crate::scheduler::START_NOTIFICATION_ID + 1,
            Self::SchedulerEnd => crate::scheduler::END_NOTIFICATION_ID
                ..crate::scheduler::END_NOTIFICATION_ID + 1,
        }
    }

    pub fn for_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id_range().contains(&id))
    }
}

/// What tapping a scheduler reminder asks the app to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerAction {
    Start,
    End,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_action: Option<SchedulerAction>,
}

/// One local notification to be scheduled by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDescriptor {
    pub id: u32,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
    pub sound: String,
    pub category: NotificationCategory,
    #[serde(default)]
    pub extra: NotificationExtra,
}

/// Platform capability that enqueues and cancels OS-level notifications.
pub trait NotificationGateway: Send {
    /// `Ok` if notifications can currently be delivered.
    fn check_permission(&self) -> Result<(), NotificationError>;

    fn schedule(&mut self, batch: &[NotificationDescriptor]) -> Result<(), NotificationError>;

    fn cancel(&mut self, ids: &[u32]) -> Result<(), NotificationError>;

    fn cancel_all(&mut self) -> Result<(), NotificationError>;
}

/// A gateway call as observed by [`MemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOp {
    Schedule(Vec<u32>),
    Cancel(Vec<u32>),
    CancelAll,
}

#[derive(Debug, Default)]
struct MemoryGatewayInner {
    pending: BTreeMap<u32, NotificationDescriptor>,
    ops: Vec<GatewayOp>,
    unavailable: Option<NotificationError>,
}

/// In-process gateway that keeps pending notifications in memory.
///
/// Clones share state, so a host can hand one clone to the service and keep
/// another to inspect what is pending.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    inner: Arc<Mutex<MemoryGatewayInner>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that reports `reason` for every call.
    pub fn unavailable(reason: NotificationError) -> Self {
        let gateway = Self::default();
        gateway.lock().unavailable = Some(reason);
        gateway
    }

    fn lock(&self) -> MutexGuard<'_, MemoryGatewayInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn pending(&self) -> Vec<NotificationDescriptor> {
        self.lock().pending.values().cloned().collect()
    }

    pub fn pending_ids(&self) -> Vec<u32> {
        self.lock().pending.keys().copied().collect()
    }

    pub fn ops(&self) -> Vec<GatewayOp> {
        self.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    fn guard(&self) -> Result<MutexGuard<'_, MemoryGatewayInner>, NotificationError> {
        let inner = self.lock();
        if let Some(reason) = inner.unavailable.clone() {
            return Err(reason);
        }
        Ok(inner)
    }
}

impl NotificationGateway for MemoryGateway {
    fn check_permission(&self) -> Result<(), NotificationError> {
        self.guard().map(|_| ())
    }

    fn schedule(&mut self, batch: &[NotificationDescriptor]) -> Result<(), NotificationError> {
        let mut inner = self.guard()?;
        inner
            .ops
            .push(GatewayOp::Schedule(batch.iter().map(|n| n.id).collect()));
        for notification in batch {
            inner.pending.insert(notification.id, notification.clone());
        }
        Ok(())
    }

    fn cancel(&mut self, ids: &[u32]) -> Result<(), NotificationError> {
        let mut inner = self.guard()?;
        inner.ops.push(GatewayOp::Cancel(ids.to_vec()));
        for id in ids {
            inner.pending.remove(id);
        }
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<(), NotificationError> {
        let mut inner = self.guard()?;
        inner.ops.push(GatewayOp::CancelAll);
        inner.pending.clear();
        Ok(())
    }
}
