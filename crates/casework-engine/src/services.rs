//! Services facade.
//!
//! Wires the store, event bus and notifier into the graph, tracker,
//! readiness and rule services. This is the single entry point callers
//! construct; there is no process-wide instance.

use std::sync::Arc;

use casework_store::CaseworkStore;
use tracing::info;

use crate::events::{DEFAULT_EVENT_CAPACITY, EventBus, EventPublisher};
use crate::graph::DependencyGraph;
use crate::notify::{LogNotifier, Notifier};
use crate::readiness::ReadinessEvaluator;
use crate::rules::RuleEngine;
use crate::tracker::InstanceTracker;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many undelivered status events a subscriber may fall behind by.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Unified access to every casework service.
#[derive(Clone)]
pub struct CaseworkServices {
    store: Arc<CaseworkStore>,
    events: EventBus,
    graph: DependencyGraph,
    tracker: InstanceTracker,
    readiness: ReadinessEvaluator,
    rules: Arc<RuleEngine>,
}

impl std::fmt::Debug for CaseworkServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseworkServices")
            .field("subscribers", &self.events.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl CaseworkServices {
    /// Build the services over `store`, delivering notifications to `notifier`.
    pub fn new(store: Arc<CaseworkStore>, notifier: Arc<dyn Notifier>, config: EngineConfig) -> Self {
        info!(event_capacity = config.event_capacity, "Initializing casework services");

        let events = EventBus::new(config.event_capacity);
        let publisher: Arc<dyn EventPublisher> = Arc::new(events.clone());

        let graph = DependencyGraph::new(store.clone());
        let tracker = InstanceTracker::new(store.clone(), publisher);
        let readiness = ReadinessEvaluator::new(store.clone());
        let rules = Arc::new(RuleEngine::new(
            store.clone(),
            tracker.clone(),
            readiness.clone(),
            notifier,
        ));

        Self {
            store,
            events,
            graph,
            tracker,
            readiness,
            rules,
        }
    }

    /// Services with default tuning and log-only notifications.
    pub fn with_defaults(store: Arc<CaseworkStore>) -> Self {
        Self::new(store, Arc::new(LogNotifier), EngineConfig::default())
    }

    pub fn store(&self) -> &Arc<CaseworkStore> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn tracker(&self) -> &InstanceTracker {
        &self.tracker
    }

    pub fn readiness(&self) -> &ReadinessEvaluator {
        &self.readiness
    }

    pub fn rules(&self) -> &Arc<RuleEngine> {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_types::{DependencyType, RuleAction, RuleDraft, TaskStatus, TaskTemplate};

    #[test]
    fn test_services_share_one_store() {
        let store = Arc::new(CaseworkStore::open_in_memory().unwrap());
        let services = CaseworkServices::with_defaults(store);
        services
            .store()
            .seed_templates(&[TaskTemplate::new("a", "A", 1), TaskTemplate::new("b", "B", 2)])
            .unwrap();

        services
            .graph()
            .add_dependency("b", "a", DependencyType::Required)
            .unwrap();
        services.tracker().initialize_family_tasks("fam").unwrap();

        let ready = services.readiness().ready_tasks_for_family("fam").unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].task_id, "a");
    }

    #[tokio::test]
    async fn test_spawned_rule_engine_reacts_to_updates() {
        let store = Arc::new(CaseworkStore::open_in_memory().unwrap());
        store
            .seed_templates(&[TaskTemplate::new("a", "A", 1), TaskTemplate::new("b", "B", 2)])
            .unwrap();
        let services = CaseworkServices::with_defaults(store);
        services
            .rules()
            .register(RuleDraft::on_completed("a", RuleAction::AutoEnable).targeting_task("b"))
            .unwrap();
        services.tracker().initialize_family_tasks("fam").unwrap();

        let handle = Arc::clone(services.rules()).spawn(services.events().subscribe());
        let a = services.tracker().instance_for("fam", "a").unwrap().unwrap();
        services
            .tracker()
            .update_status(&a.id, TaskStatus::Completed, None)
            .unwrap();

        let mut status = TaskStatus::NotStarted;
        for _ in 0..100 {
            status = services
                .tracker()
                .instance_for("fam", "b")
                .unwrap()
                .unwrap()
                .status;
            if status == TaskStatus::InProgress {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(status, TaskStatus::InProgress);
        handle.abort();
    }
}
