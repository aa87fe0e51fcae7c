//! Decision aggregation.
//!
//! A pure function of (reviewer slots, recorded decisions, quorum policy).
//! No clock, no randomness, no interior state: the same inputs always
//! produce the same verdict.

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::models::{ApprovalDecision, DecisionKind, QuorumConfig, RequiredReviewer};

/// Outcome of evaluating a request's decisions against its quorum policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not enough decisions either way.
    Pending,
    /// The approval threshold is met.
    Approved,
    /// A rejection resolved the request, or approval became unreachable.
    Rejected,
}

/// Evaluates recorded approvals against a request's bound quorum policy.
pub struct DecisionAggregator;

impl DecisionAggregator {
    /// Compute the verdict for one request.
    ///
    /// `reviewers` is the fixed slot set captured at admission;
    /// `decisions` is everything recorded so far, each at most one per
    /// reviewer.
    pub fn evaluate(
        reviewers: &[RequiredReviewer],
        decisions: &[ApprovalDecision],
        config: &QuorumConfig,
    ) -> Verdict {
        let reject_count = decisions
            .iter()
            .filter(|d| d.decision == DecisionKind::Reject)
            .count();

        if config.any_rejection_rejects && reject_count > 0 {
            return Verdict::Rejected;
        }

        let satisfied: HashSet<Uuid> = decisions.iter().filter_map(|d| d.slot_id).collect();
        let all_decided = reviewers.iter().all(|r| satisfied.contains(&r.id));

        if config.require_unanimous {
            if !all_decided {
                return Verdict::Pending;
            }
            if reject_count > 0 {
                return Verdict::Rejected;
            }
            if decisions.iter().all(|d| d.decision == DecisionKind::Approve) {
                return Verdict::Approved;
            }
            // All slots decided but abstentions kept it short of unanimity.
            return Verdict::Pending;
        }

        let approve_weight: u64 = decisions
            .iter()
            .filter(|d| d.decision == DecisionKind::Approve)
            .map(|d| u64::from(d.weight))
            .sum();
        let approve_count = decisions
            .iter()
            .filter(|d| d.decision == DecisionKind::Approve)
            .count() as u64;
        let unsatisfied_weight: u64 = reviewers
            .iter()
            .filter(|r| !satisfied.contains(&r.id))
            .map(|r| u64::from(r.weight))
            .sum();
        let unsatisfied_count = reviewers
            .iter()
            .filter(|r| !satisfied.contains(&r.id))
            .count() as u64;

        match config.required_weight {
            Some(threshold) => {
                let threshold = u64::from(threshold);
                if approve_weight >= threshold {
                    Verdict::Approved
                } else if approve_weight + unsatisfied_weight < threshold {
                    // Even if every undecided slot approves at full weight,
                    // the threshold can no longer be reached.
                    Verdict::Rejected
                } else {
                    Verdict::Pending
                }
            }
            None => {
                let threshold = u64::from(config.required_approvals);
                if approve_count >= threshold {
                    Verdict::Approved
                } else if approve_count + unsatisfied_count < threshold {
                    Verdict::Rejected
                } else {
                    Verdict::Pending
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DecisionKind;
    use chrono::Utc;

    fn slots(request_id: Uuid, weights: &[u32]) -> Vec<RequiredReviewer> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| {
                RequiredReviewer::user(request_id, format!("reviewer-{i}")).with_weight(*w)
            })
            .collect()
    }

    fn decide(
        slot: &RequiredReviewer,
        kind: DecisionKind,
    ) -> ApprovalDecision {
        ApprovalDecision::new(
            slot.request_id,
            slot.requirement.value(),
            kind,
            slot.weight,
            Utc::now(),
        )
        .with_slot(slot.id)
    }

    #[test]
    fn test_count_quorum_progression() {
        let request_id = Uuid::new_v4();
        let reviewers = slots(request_id, &[1, 1]);
        let config = QuorumConfig::new("acme", "two-of-two").with_required_approvals(2);

        let verdict = DecisionAggregator::evaluate(&reviewers, &[], &config);
        assert_eq!(verdict, Verdict::Pending);

        let first = decide(&reviewers[0], DecisionKind::Approve);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[first.clone()], &config);
        assert_eq!(verdict, Verdict::Pending);

        let second = decide(&reviewers[1], DecisionKind::Approve);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[first, second], &config);
        assert_eq!(verdict, Verdict::Approved);
    }

    #[test]
    fn test_any_rejection_rejects_short_circuits() {
        let request_id = Uuid::new_v4();
        let reviewers = slots(request_id, &[1, 1]);
        let config = QuorumConfig::new("acme", "strict").with_required_approvals(2);
        assert!(config.any_rejection_rejects);

        let reject = decide(&reviewers[1], DecisionKind::Reject);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[reject], &config);
        assert_eq!(verdict, Verdict::Rejected);
    }

    #[test]
    fn test_tolerant_quorum_survives_minority_rejection() {
        let request_id = Uuid::new_v4();
        let reviewers = slots(request_id, &[1, 1, 1]);
        let config = QuorumConfig::new("acme", "two-of-three")
            .with_required_approvals(2)
            .with_any_rejection_rejects(false);

        let reject = decide(&reviewers[0], DecisionKind::Reject);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[reject.clone()], &config);
        assert_eq!(verdict, Verdict::Pending, "2 of 3 still reachable");

        let a1 = decide(&reviewers[1], DecisionKind::Approve);
        let a2 = decide(&reviewers[2], DecisionKind::Approve);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[reject, a1, a2], &config);
        assert_eq!(verdict, Verdict::Approved);
    }

    #[test]
    fn test_unreachable_threshold_rejects() {
        let request_id = Uuid::new_v4();
        let reviewers = slots(request_id, &[1, 1, 1]);
        let config = QuorumConfig::new("acme", "two-of-three")
            .with_required_approvals(2)
            .with_any_rejection_rejects(false);

        // Two rejections leave only one possible approval: 2-of-3 is dead.
        let r1 = decide(&reviewers[0], DecisionKind::Reject);
        let r2 = decide(&reviewers[1], DecisionKind::Reject);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[r1, r2], &config);
        assert_eq!(verdict, Verdict::Rejected);
    }

    #[test]
    fn test_weight_quorum() {
        let request_id = Uuid::new_v4();
        let reviewers = slots(request_id, &[3, 2, 1]);
        let config = QuorumConfig::new("acme", "weighted")
            .with_required_weight(4)
            .with_any_rejection_rejects(false);

        let senior = decide(&reviewers[0], DecisionKind::Approve);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[senior.clone()], &config);
        assert_eq!(verdict, Verdict::Pending, "3 of 4 weight");

        let junior = decide(&reviewers[2], DecisionKind::Approve);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[senior, junior], &config);
        assert_eq!(verdict, Verdict::Approved);
    }

    #[test]
    fn test_weight_quorum_unreachable() {
        let request_id = Uuid::new_v4();
        let reviewers = slots(request_id, &[3, 2, 1]);
        let config = QuorumConfig::new("acme", "weighted")
            .with_required_weight(4)
            .with_any_rejection_rejects(false);

        // The weight-3 slot rejects: remaining 2 + 1 < 4.
        let r = decide(&reviewers[0], DecisionKind::Reject);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[r], &config);
        assert_eq!(verdict, Verdict::Rejected);
    }

    #[test]
    fn test_unanimity() {
        let request_id = Uuid::new_v4();
        let reviewers = slots(request_id, &[1, 1]);
        let config = QuorumConfig::new("acme", "unanimous")
            .with_unanimity()
            .with_any_rejection_rejects(false);

        let a1 = decide(&reviewers[0], DecisionKind::Approve);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[a1.clone()], &config);
        assert_eq!(verdict, Verdict::Pending, "one slot still undecided");

        let a2 = decide(&reviewers[1], DecisionKind::Approve);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[a1.clone(), a2], &config);
        assert_eq!(verdict, Verdict::Approved);

        let r2 = decide(&reviewers[1], DecisionKind::Reject);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[a1.clone(), r2], &config);
        assert_eq!(verdict, Verdict::Rejected, "rejection surfaces once all decided");

        // An abstention keeps a unanimous policy short of approval.
        let abstain = decide(&reviewers[1], DecisionKind::Abstain);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[a1, abstain], &config);
        assert_eq!(verdict, Verdict::Pending);
    }

    #[test]
    fn test_non_weighted_decisions_satisfy_slots_without_weight() {
        let request_id = Uuid::new_v4();
        let reviewers = slots(request_id, &[1, 1]);
        let config = QuorumConfig::new("acme", "two-of-two")
            .with_required_approvals(2)
            .with_any_rejection_rejects(false);

        // Abstain consumes a slot: 2 approvals can never arrive.
        let abstain = decide(&reviewers[0], DecisionKind::Abstain);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[abstain], &config);
        assert_eq!(verdict, Verdict::Rejected);
    }

    #[test]
    fn test_extra_role_decision_counts_toward_threshold() {
        let request_id = Uuid::new_v4();
        let slot = RequiredReviewer::role(request_id, "physician");
        let reviewers = vec![slot.clone()];
        let config = QuorumConfig::new("acme", "two-physicians")
            .with_required_approvals(2)
            .with_any_rejection_rejects(false);

        let first = ApprovalDecision::new(request_id, "dr-a", DecisionKind::Approve, 1, Utc::now())
            .with_slot(slot.id);
        // Second physician shares the role; the slot is taken, the vote
        // still counts.
        let second =
            ApprovalDecision::new(request_id, "dr-b", DecisionKind::Approve, 1, Utc::now());

        let verdict = DecisionAggregator::evaluate(&reviewers, &[first.clone()], &config);
        assert_eq!(verdict, Verdict::Pending);
        let verdict = DecisionAggregator::evaluate(&reviewers, &[first, second], &config);
        assert_eq!(verdict, Verdict::Approved);
    }

    #[test]
    fn test_determinism() {
        let request_id = Uuid::new_v4();
        let reviewers = slots(request_id, &[2, 1, 1]);
        let config = QuorumConfig::new("acme", "weighted")
            .with_required_weight(3)
            .with_any_rejection_rejects(false);

        let decisions = vec![
            decide(&reviewers[0], DecisionKind::Approve),
            decide(&reviewers[1], DecisionKind::Abstain),
            decide(&reviewers[2], DecisionKind::Approve),
        ];

        let first = DecisionAggregator::evaluate(&reviewers, &decisions, &config);
        for _ in 0..100 {
            assert_eq!(
                DecisionAggregator::evaluate(&reviewers, &decisions, &config),
                first
            );
        }
    }
}
