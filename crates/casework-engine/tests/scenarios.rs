//! End-to-end scenarios over an on-disk store.

use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use casework_engine::{BoardColumn, CaseworkServices, DependencyGraph, EngineError};
use casework_store::CaseworkStore;
use casework_types::{DependencyType, RuleAction, RuleDraft, TaskStatus, TaskTemplate, User};

/// Services over a fresh database holding templates T1..T3.
fn test_services(dir: &Path) -> CaseworkServices {
    let store = CaseworkStore::open(&dir.join("casework.db")).expect("store open failed");
    store
        .seed_templates(&[
            TaskTemplate::new("T1", "Intake interview", 1).with_category("intake"),
            TaskTemplate::new("T2", "Home visit", 2).with_category("assessment"),
            TaskTemplate::new("T3", "Resource packet", 3).with_category("support"),
        ])
        .unwrap();
    CaseworkServices::with_defaults(Arc::new(store))
}

fn ready_ids(services: &CaseworkServices, family: &str) -> Vec<String> {
    services
        .readiness()
        .ready_tasks_for_family(family)
        .unwrap()
        .into_iter()
        .map(|r| r.task_id)
        .collect()
}

fn set_status(services: &CaseworkServices, family: &str, task: &str, status: TaskStatus) {
    let inst = services
        .tracker()
        .instance_for(family, task)
        .unwrap()
        .expect("instance missing");
    services.tracker().update_status(&inst.id, status, None).unwrap();
}

#[test]
fn test_required_and_optional_readiness_walkthrough() {
    let dir = tempfile::tempdir().unwrap();
    let services = test_services(dir.path());
    let graph = services.graph();
    graph.add_dependency("T2", "T1", DependencyType::Required).unwrap();
    graph.add_dependency("T3", "T1", DependencyType::Optional).unwrap();

    services.tracker().initialize_family_tasks("fam-1").unwrap();
    // T3 only has an optional dependency on T1, and optional edges never block.
    assert_eq!(ready_ids(&services, "fam-1"), vec!["T1", "T3"]);

    // T3 is startable but its optional dependency is still open.
    let check = services.readiness().validate_dependencies("T3", "fam-1").unwrap();
    assert!(check.can_start);
    assert_eq!(check.missing_optional, vec!["Intake interview"]);

    let check = services.readiness().validate_dependencies("T2", "fam-1").unwrap();
    assert!(!check.can_start);
    assert_eq!(check.missing_required, vec!["Intake interview"]);

    set_status(&services, "fam-1", "T1", TaskStatus::Completed);
    assert_eq!(ready_ids(&services, "fam-1"), vec!["T2", "T3"]);

    set_status(&services, "fam-1", "T2", TaskStatus::Completed);
    assert_eq!(ready_ids(&services, "fam-1"), vec!["T3"]);
}

#[test]
fn test_two_node_cycle_rejected_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let services = test_services(dir.path());
    services
        .graph()
        .add_dependency("T2", "T1", DependencyType::Required)
        .unwrap();

    let err = services
        .graph()
        .add_dependency("T1", "T2", DependencyType::Optional)
        .unwrap_err();
    match err {
        EngineError::CircularDependency { path } => {
            assert_eq!(path.first(), path.last());
            assert_eq!(path.len(), 3);
            assert!(path.contains(&"T1".to_string()));
            assert!(path.contains(&"T2".to_string()));
        }
        other => panic!("expected CircularDependency, got {other:?}"),
    }
    assert_eq!(services.graph().load_all_edges().unwrap().len(), 1);
}

#[test]
fn test_concurrent_opposite_edges_admit_one() {
    let dir = tempfile::tempdir().unwrap();
    test_services(dir.path());
    let db = dir.path().join("casework.db");

    for round in 0..10 {
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [("T1", "T2"), ("T2", "T1")]
            .into_iter()
            .map(|(task, depends_on)| {
                let store = CaseworkStore::open(&db).unwrap();
                let graph = DependencyGraph::new(Arc::new(store));
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    graph.add_dependency(task, depends_on, DependencyType::Required)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        let cycles = results
            .iter()
            .filter(|r| matches!(r, Err(EngineError::CircularDependency { .. })))
            .count();
        assert_eq!((accepted, cycles), (1, 1), "round {round}: {results:?}");

        let graph = DependencyGraph::new(Arc::new(CaseworkStore::open(&db).unwrap()));
        assert_eq!(graph.load_all_edges().unwrap().len(), 1);
        for (task, depends_on) in [("T1", "T2"), ("T2", "T1")] {
            graph.remove_dependency(task, depends_on, None).unwrap();
        }
    }
}

#[test]
fn test_three_node_cycle_and_self_dependency() {
    let dir = tempfile::tempdir().unwrap();
    let services = test_services(dir.path());
    let graph = services.graph();
    graph.add_dependency("T1", "T2", DependencyType::Required).unwrap();
    graph.add_dependency("T2", "T3", DependencyType::Required).unwrap();

    let err = graph
        .add_dependency("T3", "T1", DependencyType::Required)
        .unwrap_err();
    let EngineError::CircularDependency { path } = err else {
        panic!("expected a cycle");
    };
    for id in ["T1", "T2", "T3"] {
        assert!(path.iter().any(|p| p == id), "{id} missing from {path:?}");
    }

    assert!(matches!(
        graph.add_dependency("T1", "T1", DependencyType::Optional),
        Err(EngineError::SelfDependency { .. })
    ));
}

#[test]
fn test_initialize_is_idempotent_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let services = test_services(dir.path());
        assert_eq!(services.tracker().initialize_family_tasks("fam").unwrap(), 3);
    }
    let store = CaseworkStore::open(&dir.path().join("casework.db")).unwrap();
    let services = CaseworkServices::with_defaults(Arc::new(store));
    assert_eq!(services.tracker().initialize_family_tasks("fam").unwrap(), 0);
    assert_eq!(services.tracker().instances_for_family("fam").unwrap().len(), 3);
}

#[test]
fn test_retired_dependency_never_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let services = test_services(dir.path());
    services
        .graph()
        .add_dependency("T2", "T1", DependencyType::Required)
        .unwrap();
    services.tracker().initialize_family_tasks("fam").unwrap();
    assert_eq!(ready_ids(&services, "fam"), vec!["T1", "T3"]);

    services.store().set_template_active("T1", false).unwrap();
    assert_eq!(ready_ids(&services, "fam"), vec!["T2", "T3"]);
}

#[test]
fn test_rules_cascade_and_board() {
    let dir = tempfile::tempdir().unwrap();
    let services = test_services(dir.path());
    services.store().upsert_user(&User::new("cw-7", "Case worker")).unwrap();
    services
        .graph()
        .add_dependency("T2", "T1", DependencyType::Required)
        .unwrap();

    let rules = services.rules();
    rules
        .register(RuleDraft::on_completed("T1", RuleAction::AutoEnable).targeting_task("T2"))
        .unwrap();
    rules
        .register(RuleDraft::on_completed("T1", RuleAction::AssignUser).targeting_user("cw-7"))
        .unwrap();

    let invalid = RuleDraft::on_completed("T1", RuleAction::AutoEnable)
        .with_target_type(casework_types::TargetType::User)
        .targeting_user("cw-7");
    assert!(matches!(
        rules.register(invalid),
        Err(EngineError::ReferentialIntegrity { .. })
    ));
    assert_eq!(rules.list_rules().unwrap().len(), 2);

    services.tracker().initialize_family_tasks("fam").unwrap();
    let mut rx = services.events().subscribe();
    set_status(&services, "fam", "T1", TaskStatus::Completed);
    let report = rules.drain(&mut rx).unwrap();
    assert_eq!(report.executed, 2);

    let board = services.readiness().task_board("fam").unwrap();
    let columns: Vec<_> = board.iter().map(|e| (e.task_id.as_str(), e.column)).collect();
    assert_eq!(
        columns,
        vec![
            ("T1", BoardColumn::Completed),
            ("T2", BoardColumn::InProgress),
            ("T3", BoardColumn::Ready),
        ]
    );

    // Regression reopens T1 and makes T2's dependency unmet again, without
    // touching T2's own status.
    set_status(&services, "fam", "T1", TaskStatus::InProgress);
    rules.drain(&mut rx).unwrap();
    let t1 = services.tracker().instance_for("fam", "T1").unwrap().unwrap();
    assert!(t1.completed_at.is_none());
    assert_eq!(
        services.tracker().instance_for("fam", "T2").unwrap().unwrap().status,
        TaskStatus::InProgress
    );
}
