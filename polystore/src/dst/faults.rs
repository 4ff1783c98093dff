//! SimFaults - Fault Hook for Simulated Engines
//!
//! `TigerStyle`: Every simulated client call passes through one checkpoint.

use std::sync::Arc;
use std::time::Duration;

use super::config::SimConfig;
use super::fault::{FaultInjector, FaultType};
use super::rng::DeterministicRng;
use crate::storage::{ClientError, ClientResult};

/// Fault checkpoint shared by the simulated engines.
#[derive(Debug, Clone)]
pub struct SimFaults {
    injector: Arc<FaultInjector>,
    latency: Duration,
}

impl SimFaults {
    /// Checkpoint with no faults registered.
    #[must_use]
    pub fn none(config: SimConfig) -> Self {
        Self::shared(config, Arc::new(FaultInjector::new(DeterministicRng::new(config.seed()))))
    }

    /// Checkpoint over an injector shared with a `Simulation`.
    #[must_use]
    pub fn shared(config: SimConfig, injector: Arc<FaultInjector>) -> Self {
        Self {
            injector,
            latency: Duration::from_millis(config.latency_ms()),
        }
    }

    /// The underlying injector.
    #[must_use]
    pub fn injector(&self) -> &Arc<FaultInjector> {
        &self.injector
    }

    /// Fail (or stall) `operation` if a fault fires.
    ///
    /// `Latency` stalls for the configured latency and then lets the call
    /// proceed; the caller's timeout is expected to fire first.
    ///
    /// # Errors
    /// Returns the `ClientError` matching the injected fault.
    pub async fn check(&self, operation: &str) -> ClientResult<()> {
        let Some(fault) = self.injector.should_inject(operation) else {
            return Ok(());
        };

        tracing::debug!(operation, fault = fault.as_str(), "injecting fault");
        match fault {
            FaultType::ConnectionRefused => Err(ClientError::Unreachable(format!(
                "simulated connection refused during {operation}"
            ))),
            FaultType::Latency => {
                tokio::time::sleep(self.latency).await;
                Ok(())
            }
            FaultType::SchemaRejected | FaultType::WriteRejected | FaultType::ReadRejected => Err(
                ClientError::rejected(format!("simulated {} during {operation}", fault.as_str())),
            ),
            FaultType::Corruption => Err(ClientError::Codec(format!(
                "simulated corruption during {operation}"
            ))),
        }
    }
}
