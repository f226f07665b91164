//! Core judgment pipeline for GitHub credential audits.
//!
//! Enumeration collaborators feed this crate already-structured snapshots
//! of what a credential can reach; the modules here turn that raw
//! enumeration into a prioritized security judgment: weighted risk
//! scoring, drift detection against persisted history, compliance
//! evaluation against named framework rule sets, and concrete remediation
//! suggestions. The core performs no network I/O and owns no state beyond
//! the snapshot history.

pub mod compliance;
pub mod drift;
pub mod remediation;
pub mod report;
pub mod risk;
pub mod snapshot;
pub mod store;

pub use report::{AuditInputs, AuditReport, Auditor};
pub use risk::{RiskLevel, RiskWeights};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
