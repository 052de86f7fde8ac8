//! Family instance tracker: per-family task records and status changes.

use std::sync::Arc;

use casework_store::CaseworkStore;
use casework_types::{FamilyTaskInstance, TaskStatus, TaskStatusChanged};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::events::EventPublisher;

/// A committed status update and the event published for it.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub instance: FamilyTaskInstance,
    pub event: TaskStatusChanged,
}

/// Owns the family task lifecycle and announces every committed change.
#[derive(Clone)]
pub struct InstanceTracker {
    store: Arc<CaseworkStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for InstanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceTracker").finish_non_exhaustive()
    }
}

impl InstanceTracker {
    pub fn new(store: Arc<CaseworkStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Give the family one `not_started` instance per active template.
    ///
    /// Safe to call any number of times; returns how many were created.
    pub fn initialize_family_tasks(&self, family_id: &str) -> Result<usize> {
        Ok(self.store.initialize_family_tasks(family_id)?)
    }

    /// Set an instance's status (and notes, when given), then publish.
    ///
    /// The event goes out only after the commit. Any transition is allowed,
    /// including moving a completed task back, which clears `completed_at`.
    pub fn update_status(
        &self,
        instance_id: &str,
        status: TaskStatus,
        notes: Option<&str>,
    ) -> Result<StatusUpdate> {
        let (old_status, instance) =
            self.store
                .update_instance_status(instance_id, status, notes)?;

        let event = TaskStatusChanged::new(
            &instance.id,
            &instance.family_id,
            &instance.task_id,
            old_status,
            status,
        );
        info!(
            family_id = %instance.family_id,
            task_id = %instance.task_id,
            old = %old_status,
            new = %status,
            event_id = %event.event_id,
            "Task status changed"
        );
        self.publisher.publish(&event);

        Ok(StatusUpdate { instance, event })
    }

    pub fn get_instance(&self, instance_id: &str) -> Result<FamilyTaskInstance> {
        Ok(self.store.get_instance(instance_id)?)
    }

    pub fn instance_for(
        &self,
        family_id: &str,
        task_id: &str,
    ) -> Result<Option<FamilyTaskInstance>> {
        Ok(self.store.instance_for(family_id, task_id)?)
    }

    pub fn instances_for_family(&self, family_id: &str) -> Result<Vec<FamilyTaskInstance>> {
        Ok(self.store.instances_for_family(family_id)?)
    }
}
