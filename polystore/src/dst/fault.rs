//! Fault rules for the simulated engines.
//!
//! Simulated clients name every call they make (`kv_set`, `wc_create_table`,
//! `it_get_all`, ...). Before doing the work they ask the shared
//! [`FaultInjector`] whether that call fails, and how. A [`FaultConfig`]
//! applies to a call when its filter is a substring of the call name.
//!
//! Rules are fixed once the injector is built; only their counters move.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::rng::DeterministicRng;
use crate::constants::DST_FAULT_PROBABILITY_MAX;

/// How a simulated engine misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    /// The engine is not reachable.
    ConnectionRefused,
    /// The call stalls for `SimConfig::latency_ms`.
    Latency,
    /// Drop/create statements are refused.
    SchemaRejected,
    /// Inserts and upserts are refused.
    WriteRejected,
    /// Reads are refused.
    ReadRejected,
    /// A stored payload reads back garbled.
    Corruption,
}

impl FaultType {
    /// Name used in logs and simulated error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => "connection_refused",
            Self::Latency => "latency",
            Self::SchemaRejected => "schema_rejected",
            Self::WriteRejected => "write_rejected",
            Self::ReadRejected => "read_rejected",
            Self::Corruption => "corruption",
        }
    }
}

/// One fault rule.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// What goes wrong when the rule fires.
    pub fault_type: FaultType,
    /// Chance of firing on an eligible call.
    pub probability: f64,
    /// Substring a call name must contain; `None` matches every call.
    pub operation_filter: Option<String>,
    /// Cap on how often the rule fires; `None` is unbounded.
    pub max_injections: Option<u64>,
    /// Matching calls that pass untouched before the rule is eligible.
    pub skip_first: u64,
}

impl FaultConfig {
    /// Rule that may fire on any call with the given probability.
    ///
    /// # Panics
    /// Panics if `probability` lies outside `[0, 1]`.
    #[must_use]
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        assert!(
            (0.0..=DST_FAULT_PROBABILITY_MAX).contains(&probability),
            "probability must be in [0, {DST_FAULT_PROBABILITY_MAX}], got {probability}"
        );

        Self {
            fault_type,
            probability,
            operation_filter: None,
            max_injections: None,
            skip_first: 0,
        }
    }

    /// Only consider calls whose name contains `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.operation_filter = Some(filter.into());
        self
    }

    /// Stop firing after `max` injections.
    ///
    /// # Panics
    /// Panics if `max` is zero.
    #[must_use]
    pub fn with_max_injections(mut self, max: u64) -> Self {
        assert!(max > 0, "max_injections must be positive");
        self.max_injections = Some(max);
        self
    }

    /// Let `count` matching calls through first, so a load fails partway.
    #[must_use]
    pub fn after(mut self, count: u64) -> Self {
        self.skip_first = count;
        self
    }

    fn applies_to(&self, operation: &str) -> bool {
        self.operation_filter
            .as_deref()
            .map_or(true, |filter| operation.contains(filter))
    }
}

#[derive(Debug)]
struct Rule {
    config: FaultConfig,
    seen: AtomicU64,
    fired: AtomicU64,
}

impl Rule {
    fn eligible(&self, operation: &str) -> bool {
        if !self.config.applies_to(operation) {
            return false;
        }
        if self.seen.fetch_add(1, Ordering::Relaxed) < self.config.skip_first {
            return false;
        }
        self.config
            .max_injections
            .map_or(true, |max| self.fired.load(Ordering::Relaxed) < max)
    }
}

/// Decides which simulated calls fail. Shared by all engines of a run.
#[derive(Debug)]
pub struct FaultInjector {
    rng: Mutex<DeterministicRng>,
    rules: Vec<Rule>,
}

impl FaultInjector {
    /// Injector without rules; every call succeeds.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            rules: Vec::new(),
        }
    }

    /// The fault to apply to `operation`, if any. Rules are tried in the
    /// order they were added and the first one to fire wins.
    ///
    /// # Panics
    /// Panics if the RNG mutex is poisoned.
    pub fn should_inject(&self, operation: &str) -> Option<FaultType> {
        let rule = self.rules.iter().find(|rule| {
            rule.eligible(operation)
                && self
                    .rng
                    .lock()
                    .unwrap()
                    .next_bool(rule.config.probability)
        })?;
        rule.fired.fetch_add(1, Ordering::Relaxed);
        Some(rule.config.fault_type)
    }

    /// Faults fired so far across all rules.
    #[must_use]
    pub fn total_injections(&self) -> u64 {
        self.rules
            .iter()
            .map(|rule| rule.fired.load(Ordering::Relaxed))
            .sum()
    }
}

/// Collects rules, then freezes them into a [`FaultInjector`].
pub struct FaultInjectorBuilder {
    rng: DeterministicRng,
    configs: Vec<FaultConfig>,
}

impl FaultInjectorBuilder {
    /// Start with no rules.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng,
            configs: Vec::new(),
        }
    }

    /// Add a rule.
    #[must_use]
    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Freeze the rules.
    #[must_use]
    pub fn build(self) -> FaultInjector {
        let rules = self
            .configs
            .into_iter()
            .map(|config| Rule {
                config,
                seen: AtomicU64::new(0),
                fired: AtomicU64::new(0),
            })
            .collect();
        FaultInjector {
            rng: Mutex::new(self.rng),
            rules,
        }
    }
}
