//! Time-driven escalation and expiry.
//!
//! A single background loop sweeps open requests on each tick: overdue
//! requests transition to `expired`, and escalation rules whose delay has
//! elapsed fire (at most once per request) through the same serialized
//! service entry points human decisions use. The monitor keeps no state
//! of its own - deadlines and firings are re-read from the store every
//! tick, so a crash/restart needs no recovery logic and at-least-once
//! tick delivery is harmless.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::models::EscalationRule;
use crate::domain::ports::{Clock, PolicyStore, RequestRepository};
use crate::services::oversight::OversightService;

/// Configuration for the escalation monitor.
#[derive(Debug, Clone)]
pub struct EscalationMonitorConfig {
    /// Sweep interval in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for EscalationMonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
        }
    }
}

pub struct EscalationMonitor {
    service: Arc<OversightService>,
    repo: Arc<dyn RequestRepository>,
    policies: Arc<dyn PolicyStore>,
    clock: Arc<dyn Clock>,
    config: EscalationMonitorConfig,
    running: Arc<AtomicBool>,
}

impl EscalationMonitor {
    pub fn new(
        service: Arc<OversightService>,
        repo: Arc<dyn RequestRepository>,
        policies: Arc<dyn PolicyStore>,
        clock: Arc<dyn Clock>,
        config: EscalationMonitorConfig,
    ) -> Self {
        Self {
            service,
            repo,
            policies,
            clock,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run one sweep. Public so tests and operators can drive sweeps
    /// without the background loop.
    pub async fn tick(&self) {
        let now = self.clock.now();

        // Expiry sweep. expire() re-checks the deadline under the request
        // lock, so a stale listing or a duplicate tick cannot
        // double-transition.
        match self.repo.list_overdue(now).await {
            Ok(overdue) => {
                for request in overdue {
                    match self.service.expire(request.id).await {
                        Ok(true) => debug!(request_id = %request.id, "request expired"),
                        Ok(false) => {}
                        Err(e) => {
                            warn!(request_id = %request.id, error = %e, "expiry sweep failed")
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "overdue listing failed"),
        }

        // Escalation sweep.
        let open = match self.repo.list_open().await {
            Ok(open) => open,
            Err(e) => {
                warn!(error = %e, "open listing failed");
                return;
            }
        };

        // Rules are read-mostly; load once per organization per tick.
        let mut rules_by_org: HashMap<String, Vec<EscalationRule>> = HashMap::new();
        for request in open {
            if !rules_by_org.contains_key(&request.organization_id) {
                match self
                    .policies
                    .list_escalation_rules(&request.organization_id)
                    .await
                {
                    Ok(rules) => {
                        rules_by_org.insert(request.organization_id.clone(), rules);
                    }
                    Err(e) => {
                        warn!(
                            organization = %request.organization_id,
                            error = %e,
                            "escalation rule listing failed"
                        );
                        continue;
                    }
                }
            }
            let rules = rules_by_org
                .get(&request.organization_id)
                .cloned()
                .unwrap_or_default();

            for rule in &rules {
                if !rule.covers(request.action_type) || !rule.is_due(request.created_at, now) {
                    continue;
                }
                match self.service.apply_escalation(request.id, rule).await {
                    Ok(true) => {
                        debug!(request_id = %request.id, rule = %rule.name, "escalation fired");
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(
                            request_id = %request.id,
                            rule = %rule.name,
                            error = %e,
                            "escalation failed"
                        );
                    }
                }
            }
        }
    }

    /// Start the background sweep loop. Returns a JoinHandle.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let monitor = Arc::clone(self);
        let interval = Duration::from_millis(self.config.tick_interval_ms);

        tokio::spawn(async move {
            while monitor.running.load(Ordering::SeqCst) {
                tokio::time::sleep(interval).await;
                monitor.tick().await;
            }
        })
    }

    /// Stop the sweep loop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
