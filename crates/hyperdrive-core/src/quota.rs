//! Quota Tracker
//!
//! Metered usage against the subscription plan. Counters are monotonic
//! within a billing cycle and reset exactly once at the cycle boundary;
//! the rollover is detected lazily on the next check or consume, guarded
//! so concurrent callers reset only once.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use hyperdrive_domain::error::{Error, Result};
use hyperdrive_domain::value_objects::{BillingCycle, QuotaPolicy, ResourceKind, UsageSnapshot};
use std::sync::RwLock;
use tracing::{info, warn};

fn cycle_length(cycle: BillingCycle) -> ChronoDuration {
    // Calendar-exact boundaries are the billing system's concern; the
    // tracker uses fixed-length cycles
    match cycle {
        BillingCycle::Monthly => ChronoDuration::days(30),
        BillingCycle::Quarterly => ChronoDuration::days(91),
        BillingCycle::Yearly => ChronoDuration::days(365),
    }
}

/// Tracks metered usage against the quota policy
pub struct QuotaTracker {
    policy: RwLock<QuotaPolicy>,
    usage: DashMap<ResourceKind, u64>,
    /// Alert thresholds already fired this cycle, keyed like the alert list
    fired_alerts: DashMap<(ResourceKind, u64), ()>,
    cycle_started: RwLock<DateTime<Utc>>,
}

impl QuotaTracker {
    /// Create a tracker with a validated policy
    pub fn new(policy: QuotaPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy: RwLock::new(policy),
            usage: DashMap::new(),
            fired_alerts: DashMap::new(),
            cycle_started: RwLock::new(Utc::now()),
        })
    }

    /// Current quota policy
    pub fn policy(&self) -> QuotaPolicy {
        self.policy.read().expect("policy lock poisoned").clone()
    }

    /// Replace the quota policy (full-document PUT semantics)
    pub fn set_policy(&self, policy: QuotaPolicy) -> Result<()> {
        policy.validate()?;
        *self.policy.write().expect("policy lock poisoned") = policy;
        Ok(())
    }

    /// Fail with `QuotaExceeded` if one more unit of the resource would
    /// exceed the plan limit
    pub fn check(&self, resource: ResourceKind) -> Result<()> {
        self.maybe_roll_cycle();
        let snapshot = self.usage_snapshot(resource);
        if snapshot.exhausted() {
            return Err(Error::quota_exceeded(
                resource.to_string(),
                format!(
                    "{} of {} used this cycle",
                    snapshot.used,
                    snapshot.limit.unwrap_or(0)
                ),
            ));
        }
        Ok(())
    }

    /// Consume units of a resource, firing configured usage alerts
    pub fn consume(&self, resource: ResourceKind, units: u64) {
        self.maybe_roll_cycle();
        let used = {
            let mut counter = self.usage.entry(resource).or_insert(0);
            *counter += units;
            *counter
        };

        let policy = self.policy.read().expect("policy lock poisoned");
        if let Some(limit) = policy.limit(resource) {
            for alert in policy.alerts.iter().filter(|a| a.resource == resource) {
                let threshold_units = (alert.threshold * limit as f64).ceil() as u64;
                let key = (resource, threshold_units);
                if used >= threshold_units && !self.fired_alerts.contains_key(&key) {
                    self.fired_alerts.insert(key, ());
                    warn!(
                        "Usage alert: {} at {}/{} ({}% threshold)",
                        resource,
                        used,
                        limit,
                        (alert.threshold * 100.0) as u64
                    );
                }
            }
        }
    }

    /// Point-in-time usage for a resource
    pub fn usage_snapshot(&self, resource: ResourceKind) -> UsageSnapshot {
        let used = self.usage.get(&resource).map(|c| *c).unwrap_or(0);
        let limit = self.policy.read().expect("policy lock poisoned").limit(resource);
        UsageSnapshot { used, limit }
    }

    /// Usage for every metered resource
    pub fn all_usage(&self) -> Vec<(ResourceKind, UsageSnapshot)> {
        let resources = [
            ResourceKind::Requests,
            ResourceKind::Replications,
            ResourceKind::Failovers,
            ResourceKind::StorageGb,
        ];
        resources
            .into_iter()
            .map(|r| (r, self.usage_snapshot(r)))
            .collect()
    }

    /// Reset counters when the billing cycle boundary has passed
    ///
    /// The write lock guarantees exactly one reset per boundary even under
    /// concurrent callers.
    fn maybe_roll_cycle(&self) {
        let cycle = self.policy.read().expect("policy lock poisoned").cycle;
        let boundary = {
            let started = self.cycle_started.read().expect("cycle lock poisoned");
            *started + cycle_length(cycle)
        };
        if Utc::now() < boundary {
            return;
        }
        let mut started = self.cycle_started.write().expect("cycle lock poisoned");
        // Re-check under the write lock: another caller may have rolled
        if Utc::now() >= *started + cycle_length(cycle) {
            *started = Utc::now();
            self.usage.clear();
            self.fired_alerts.clear();
            info!("Billing cycle rolled; usage counters reset");
        }
    }

    #[cfg(test)]
    fn backdate_cycle(&self, by: ChronoDuration) {
        let mut started = self.cycle_started.write().expect("cycle lock poisoned");
        *started -= by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperdrive_domain::value_objects::{PlanType, UsageAlert};
    use std::collections::BTreeMap;

    fn policy_with_limit(resource: ResourceKind, limit: u64) -> QuotaPolicy {
        QuotaPolicy {
            plan: PlanType::Basic,
            cycle: BillingCycle::Monthly,
            limits: BTreeMap::from([(resource, limit)]),
            alerts: Vec::new(),
        }
    }

    #[test]
    fn unmetered_resources_never_exhaust() {
        let tracker = QuotaTracker::new(QuotaPolicy::default()).unwrap();
        tracker.consume(ResourceKind::Requests, 1_000_000);
        assert!(tracker.check(ResourceKind::Requests).is_ok());
    }

    #[test]
    fn limit_is_enforced() {
        let tracker = QuotaTracker::new(policy_with_limit(ResourceKind::Requests, 3)).unwrap();
        for _ in 0..3 {
            assert!(tracker.check(ResourceKind::Requests).is_ok());
            tracker.consume(ResourceKind::Requests, 1);
        }
        let err = tracker.check(ResourceKind::Requests).unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { .. }));
    }

    #[test]
    fn counters_are_monotonic_within_cycle() {
        let tracker = QuotaTracker::new(policy_with_limit(ResourceKind::Replications, 100)).unwrap();
        tracker.consume(ResourceKind::Replications, 5);
        tracker.consume(ResourceKind::Replications, 7);
        assert_eq!(tracker.usage_snapshot(ResourceKind::Replications).used, 12);
    }

    #[test]
    fn cycle_boundary_resets_exactly_once() {
        let tracker = QuotaTracker::new(policy_with_limit(ResourceKind::Requests, 10)).unwrap();
        tracker.consume(ResourceKind::Requests, 10);
        assert!(tracker.check(ResourceKind::Requests).is_err());

        tracker.backdate_cycle(ChronoDuration::days(31));
        assert!(tracker.check(ResourceKind::Requests).is_ok());
        assert_eq!(tracker.usage_snapshot(ResourceKind::Requests).used, 0);

        // A second check does not reset again mid-cycle
        tracker.consume(ResourceKind::Requests, 4);
        assert!(tracker.check(ResourceKind::Requests).is_ok());
        assert_eq!(tracker.usage_snapshot(ResourceKind::Requests).used, 4);
    }

    #[test]
    fn invalid_alert_threshold_is_rejected() {
        let mut policy = policy_with_limit(ResourceKind::Requests, 10);
        policy.alerts.push(UsageAlert {
            resource: ResourceKind::Requests,
            threshold: 1.5,
        });
        assert!(QuotaTracker::new(policy).is_err());
    }
}
