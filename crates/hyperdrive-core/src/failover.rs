//! Failover State Machine
//!
//! Per-provider circuit state (Healthy → Degraded → Isolated → Recovering),
//! driven by rule-engine escalation actions and live call results. No other
//! component mutates circuit state. Every transition is recorded with the
//! triggering rule and its evaluation inputs in a bounded audit ring.
//!
//! Isolated → Recovering happens lazily when the cool-down elapses, checked
//! on every state read (the same pattern the circuit keeps per provider —
//! no timer task per circuit).

use chrono::Utc;
use dashmap::DashMap;
use hyperdrive_domain::value_objects::{
    CircuitState, CircuitTransition, EscalationAction, EscalationLevel, ProviderType,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// State machine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Consecutive probe successes required for Recovering → Healthy
    pub probe_success_threshold: u32,
    /// Capacity of the transition audit ring
    pub audit_capacity: usize,
    /// Fallback cool-down when an action carries none
    pub default_cooldown_secs: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            probe_success_threshold: 3,
            audit_capacity: 256,
            default_cooldown_secs: 60,
        }
    }
}

struct CircuitEntry {
    state: CircuitState,
    /// When an Isolated provider may start recovering
    isolated_until: Option<Instant>,
    /// Until when further triggers for this provider are suppressed
    suppressed_until: Option<Instant>,
    probe_successes: u32,
    last_cooldown: Duration,
}

impl CircuitEntry {
    fn new() -> Self {
        Self {
            state: CircuitState::Healthy,
            isolated_until: None,
            suppressed_until: None,
            probe_successes: 0,
            last_cooldown: Duration::ZERO,
        }
    }
}

/// Per-provider circuit state machine with audit trail
pub struct FailoverStateMachine {
    config: FailoverConfig,
    entries: DashMap<ProviderType, CircuitEntry>,
    audit: Mutex<VecDeque<CircuitTransition>>,
}

impl FailoverStateMachine {
    /// Create a machine with the given tuning
    pub fn new(config: FailoverConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            audit: Mutex::new(VecDeque::new()),
        }
    }

    /// Current circuit state for a provider
    ///
    /// Applies the lazy Isolated → Recovering transition when the cool-down
    /// has elapsed. Unknown providers are Healthy.
    pub fn state(&self, provider: ProviderType) -> CircuitState {
        let mut entry = self.entries.entry(provider).or_insert_with(CircuitEntry::new);
        self.check_cooldown_elapsed(provider, &mut entry);
        entry.state
    }

    /// Circuit states for every provider the machine has seen
    pub fn all_states(&self) -> Vec<(ProviderType, CircuitState)> {
        let providers: Vec<ProviderType> = self.entries.iter().map(|e| *e.key()).collect();
        providers.into_iter().map(|p| (p, self.state(p))).collect()
    }

    /// Apply an escalation action produced by the rule engine
    ///
    /// Ignored while the provider's trigger suppression cool-down is
    /// running (first match per evaluation pass wins; later triggers wait).
    /// Returns whether a transition actually happened.
    pub fn apply(&self, provider: ProviderType, action: &EscalationAction) -> bool {
        let mut entry = self.entries.entry(provider).or_insert_with(CircuitEntry::new);
        self.check_cooldown_elapsed(provider, &mut entry);

        if let Some(until) = entry.suppressed_until {
            if Instant::now() < until {
                return false;
            }
        }

        let cooldown = if action.cooldown_secs > 0 {
            Duration::from_secs(action.cooldown_secs)
        } else {
            Duration::from_secs(self.config.default_cooldown_secs)
        };

        let from = entry.state;
        let to = match (from, action.level) {
            // Critical isolates regardless of the current state
            (_, EscalationLevel::Critical) => CircuitState::Isolated,
            (CircuitState::Healthy, _) => CircuitState::Degraded,
            (CircuitState::Degraded, _) => CircuitState::Isolated,
            // Already out of rotation; nothing further to escalate
            (CircuitState::Isolated | CircuitState::Recovering, _) => return false,
        };

        entry.state = to;
        entry.suppressed_until = Some(Instant::now() + cooldown);
        entry.last_cooldown = cooldown;
        if to == CircuitState::Isolated {
            entry.isolated_until = Some(Instant::now() + cooldown);
            entry.probe_successes = 0;
        }
        drop(entry);

        warn!(
            "Circuit {} -> {} for {} (trigger {}, {})",
            from, to, provider, action.trigger_id, action.inputs
        );
        self.push_audit(provider, from, to, &action.trigger_id, &action.inputs);
        true
    }

    /// Record the outcome of a probe call against a Recovering provider
    ///
    /// N consecutive successes promote to Healthy; any failure demotes back
    /// to Isolated for another cool-down.
    pub fn record_probe(&self, provider: ProviderType, success: bool) {
        let mut entry = self.entries.entry(provider).or_insert_with(CircuitEntry::new);
        self.check_cooldown_elapsed(provider, &mut entry);
        if entry.state != CircuitState::Recovering {
            return;
        }

        if success {
            entry.probe_successes += 1;
            if entry.probe_successes >= self.config.probe_success_threshold {
                entry.state = CircuitState::Healthy;
                entry.probe_successes = 0;
                entry.isolated_until = None;
                let successes = self.config.probe_success_threshold;
                drop(entry);
                info!("Circuit recovering -> healthy for {}", provider);
                self.push_audit(
                    provider,
                    CircuitState::Recovering,
                    CircuitState::Healthy,
                    "probe-success",
                    &format!("consecutive_probe_successes={successes}"),
                );
            }
        } else {
            let cooldown = if entry.last_cooldown.is_zero() {
                Duration::from_secs(self.config.default_cooldown_secs)
            } else {
                entry.last_cooldown
            };
            entry.state = CircuitState::Isolated;
            entry.probe_successes = 0;
            entry.isolated_until = Some(Instant::now() + cooldown);
            drop(entry);
            warn!("Probe failed; circuit recovering -> isolated for {}", provider);
            self.push_audit(
                provider,
                CircuitState::Recovering,
                CircuitState::Isolated,
                "probe-failure",
                "probe call failed",
            );
        }
    }

    /// Force-isolate a provider ahead of a predicted failure
    ///
    /// The preventive-failover path; only invoked for providers the caller
    /// explicitly opted in.
    pub fn force_isolate(&self, provider: ProviderType, inputs: &str) {
        let mut entry = self.entries.entry(provider).or_insert_with(CircuitEntry::new);
        let from = entry.state;
        if from == CircuitState::Isolated {
            return;
        }
        let cooldown = Duration::from_secs(self.config.default_cooldown_secs);
        entry.state = CircuitState::Isolated;
        entry.isolated_until = Some(Instant::now() + cooldown);
        entry.suppressed_until = Some(Instant::now() + cooldown);
        entry.last_cooldown = cooldown;
        entry.probe_successes = 0;
        drop(entry);

        warn!("Preventive isolation of {} ({})", provider, inputs);
        self.push_audit(provider, from, CircuitState::Isolated, "preventive", inputs);
    }

    /// Providers currently in Recovering state, i.e. eligible for probes
    pub fn recovering_providers(&self) -> Vec<ProviderType> {
        self.all_states()
            .into_iter()
            .filter(|(_, state)| *state == CircuitState::Recovering)
            .map(|(provider, _)| provider)
            .collect()
    }

    /// Whether trigger evaluation for a provider is currently suppressed
    pub fn is_suppressed(&self, provider: ProviderType) -> bool {
        self.entries
            .get(&provider)
            .and_then(|entry| entry.suppressed_until)
            .is_some_and(|until| Instant::now() < until)
    }

    /// The most recent `n` transitions, oldest first
    pub fn audit_tail(&self, n: usize) -> Vec<CircuitTransition> {
        let audit = self.audit.lock().expect("audit lock poisoned");
        audit.iter().rev().take(n).rev().cloned().collect()
    }

    fn check_cooldown_elapsed(&self, provider: ProviderType, entry: &mut CircuitEntry) {
        if entry.state == CircuitState::Isolated {
            if let Some(until) = entry.isolated_until {
                if Instant::now() >= until {
                    entry.state = CircuitState::Recovering;
                    entry.probe_successes = 0;
                    info!("Circuit isolated -> recovering for {}", provider);
                    self.push_audit(
                        provider,
                        CircuitState::Isolated,
                        CircuitState::Recovering,
                        "cooldown-elapsed",
                        "cool-down elapsed",
                    );
                }
            }
        }
    }

    fn push_audit(
        &self,
        provider: ProviderType,
        from: CircuitState,
        to: CircuitState,
        cause: &str,
        inputs: &str,
    ) {
        let mut audit = self.audit.lock().expect("audit lock poisoned");
        if audit.len() >= self.config.audit_capacity {
            audit.pop_front();
        }
        audit.push_back(CircuitTransition {
            provider,
            from,
            to,
            cause: cause.to_string(),
            inputs: inputs.to_string(),
            at: Utc::now(),
        });
    }
}

impl Default for FailoverStateMachine {
    fn default() -> Self {
        Self::new(FailoverConfig::default())
    }
}
