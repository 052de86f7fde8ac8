//! SQLite persistence for the casework engine.
//!
//! One database holds the task catalog, the dependency edges between
//! templates, each family's task instances, the workflow rules and the
//! rule-firing ledger. The store offers point lookups, bulk scans keyed by a
//! foreign key, and atomic writes; graph and readiness logic live in
//! `casework-engine`.

pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{CaseworkStore, EdgeWriter, FiringOutcome, RuleFiring, TemplateRow};
