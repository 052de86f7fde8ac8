//! Task dependency graph and workflow automation for family casework.
//!
//! - [`DependencyGraph`]: administrator edits to the template graph, each
//!   insertion guarded by the cycle detector inside one write-locked
//!   transaction.
//! - [`InstanceTracker`]: per-family task instances and their status
//!   changes, announced on the [`EventBus`] after commit.
//! - [`ReadinessEvaluator`]: which not-started tasks a family can begin, in
//!   two batched reads.
//! - [`RuleEngine`]: validated trigger/action rules fired at most once per
//!   (rule, event).
//!
//! [`CaseworkServices`] wires them together over one [`CaseworkStore`].
//!
//! [`CaseworkStore`]: casework_store::CaseworkStore

pub mod cycle;
pub mod error;
pub mod events;
pub mod graph;
pub mod notify;
pub mod readiness;
pub mod rules;
pub mod services;
pub mod tracker;

pub use error::{EngineError, Result, RuleViolation};
pub use events::{EventBus, EventPublisher, ObserverError, StatusObserver};
pub use graph::DependencyGraph;
pub use notify::{LogNotifier, NotificationKind, NotificationPayload, Notifier, NotifyError};
pub use readiness::{BoardColumn, BoardEntry, DependencyCheck, ReadinessEvaluator, ReadyTask};
pub use rules::{FiringReport, RuleEngine};
pub use services::{CaseworkServices, EngineConfig};
pub use tracker::{InstanceTracker, StatusUpdate};
