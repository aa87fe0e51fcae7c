//! Domain models for the oversight engine.

pub mod config;
pub mod decision;
pub mod escalation;
pub mod notification;
pub mod policy;
pub mod request;
pub mod transition;

pub use config::{
    DatabaseConfig, LoggingConfig, MonitorConfig, NotificationConfig, VigilConfig,
};
pub use decision::{
    ApprovalDecision, DecisionKind, RequiredReviewer, ReviewerRef, ReviewerRequirement,
};
pub use escalation::{EscalationRule, EscalationTarget};
pub use notification::{
    idempotency_key, DeliveryReceipt, DeliveryStatus, NotificationEvent, NotificationEventKind,
    NotificationRecord,
};
pub use policy::{AutoApprovalRule, QuorumConfig};
pub use request::{
    ActionType, OversightRequest, RequestPriority, RequestStatus, RiskAssessment, RiskLevel,
};
pub use transition::{Actor, ActorKind, StateTransition};
