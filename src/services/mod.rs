//! Engine services: aggregation, lifecycle, facade, monitor, dispatch.

pub mod aggregator;
pub mod dispatcher;
pub mod escalation_monitor;
pub mod lifecycle;
pub mod oversight;

pub use aggregator::{DecisionAggregator, Verdict};
pub use dispatcher::{NotificationDispatcher, RetryPolicy};
pub use escalation_monitor::{EscalationMonitor, EscalationMonitorConfig};
pub use lifecycle::RequestLifecycle;
pub use oversight::{AdmissionRequest, OversightService, ReviewerSpec};
