//! Vigil - Oversight Approval Workflow Engine
//!
//! Vigil intercepts agent-proposed actions (trades, prescriptions, large
//! payments) that exceed a risk or value threshold, routes them to human
//! reviewers under configurable quorum policies, enforces escalation and
//! expiry on timeout, and keeps an append-only audit trail of every state
//! transition.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture
//! principles:
//!
//! - **Domain Layer** (`domain`): Pure models, ports, and errors
//! - **Service Layer** (`services`): Aggregation, lifecycle, facade,
//!   escalation monitor, notification dispatch
//! - **Infrastructure Layer** (`infrastructure`): SQLite persistence,
//!   configuration, channel adapters
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use vigil::services::{AdmissionRequest, OversightService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Wire repositories, admit a request, record decisions.
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    ActionType, ApprovalDecision, AutoApprovalRule, DecisionKind, EscalationRule,
    EscalationTarget, OversightRequest, QuorumConfig, RequestPriority, RequestStatus,
    RequiredReviewer, ReviewerRef, ReviewerRequirement, RiskAssessment, RiskLevel,
    StateTransition, VigilConfig,
};
pub use domain::ports::{
    AuditLog, Clock, NotificationChannel, PendingFilters, PolicyStore, RequestRepository,
    SystemClock,
};
pub use domain::OversightError;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::database::DatabaseConnection;
pub use services::{
    AdmissionRequest, DecisionAggregator, EscalationMonitor, NotificationDispatcher,
    OversightService, ReviewerSpec, Verdict,
};
