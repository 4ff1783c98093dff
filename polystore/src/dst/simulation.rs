//! Simulation harness.
//!
//! `TigerStyle`: One seed, one fault injector, every simulated engine.

use std::future::Future;
use std::sync::Arc;

use super::config::SimConfig;
use super::fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
use super::rng::DeterministicRng;
use crate::config::{ConfigError, PolystoreConfig};
use crate::facade::{QueryFacade, QueryFacadeBuilder};
use crate::source::CsvSource;
use crate::storage::{
    BackendKind, DocumentAdapter, FlatFileAdapter, IndexedTableAdapter, KeyValueAdapter,
    SimDocumentClient, SimIndexedTableClient, SimKvClient, SimWideColumnClient, WideColumnAdapter,
};

/// Engines and shared fault state of one simulation run.
///
/// The engine handles are clones sharing state with whatever adapters
/// [`SimEnvironment::create_facade`] builds, so a test can load through the
/// facade and then inspect the engine directly.
pub struct SimEnvironment {
    /// Settings the run was built from
    pub config: SimConfig,
    /// Deterministic RNG for test data
    pub rng: DeterministicRng,
    /// Fault injector shared by every engine
    pub faults: Arc<FaultInjector>,
    /// Simulated key-value engine
    pub kv: SimKvClient,
    /// Simulated document engine
    pub document: SimDocumentClient,
    /// Simulated wide-column engine
    pub wide_column: SimWideColumnClient,
    /// Simulated indexed document-table engine
    pub indexed_table: SimIndexedTableClient,
}

impl SimEnvironment {
    /// Facade over `source` with all five backends registered under their
    /// default identifiers, wired to this environment's engines.
    ///
    /// # Errors
    /// Returns `ConfigError` if `config` fails validation.
    pub fn create_facade(
        &self,
        source: CsvSource,
        config: &PolystoreConfig,
    ) -> Result<QueryFacade, ConfigError> {
        Ok(QueryFacadeBuilder::new(source.clone())
            .with_adapter(
                BackendKind::KeyValue.id(),
                Arc::new(KeyValueAdapter::new(self.kv.clone(), config)),
            )
            .with_adapter(
                BackendKind::Document.id(),
                Arc::new(DocumentAdapter::new(self.document.clone(), config)),
            )
            .with_adapter(
                BackendKind::WideColumn.id(),
                Arc::new(WideColumnAdapter::new(self.wide_column.clone(), config)?),
            )
            .with_adapter(
                BackendKind::IndexedTable.id(),
                Arc::new(IndexedTableAdapter::new(self.indexed_table.clone(), config)?),
            )
            .with_adapter(
                BackendKind::FlatFile.id(),
                Arc::new(FlatFileAdapter::new(source)),
            )
            .build())
    }
}

/// Seeded run over the four simulated engines.
///
/// ```rust
/// use polystore::dst::{FaultConfig, FaultType, SimConfig, Simulation};
///
/// #[tokio::main]
/// async fn main() {
///     Simulation::new(SimConfig::with_seed(42))
///         .with_fault(FaultConfig::new(FaultType::WriteRejected, 0.1).with_filter("kv_set"))
///         .run(|env| async move {
///             assert_eq!(env.config.seed(), 42);
///             Ok::<(), std::convert::Infallible>(())
///         })
///         .await
///         .unwrap();
/// }
/// ```
pub struct Simulation {
    config: SimConfig,
    rules: Vec<FaultConfig>,
}

impl Simulation {
    /// Run with no faults yet.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            rules: Vec::new(),
        }
    }

    /// Add a fault rule shared by every engine.
    #[must_use]
    pub fn with_fault(mut self, rule: FaultConfig) -> Self {
        self.rules.push(rule);
        self
    }

    /// Refuse connections on every engine with `probability`.
    #[must_use]
    pub fn with_connection_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::ConnectionRefused, probability))
    }

    /// Reject writes on every engine with `probability`.
    #[must_use]
    pub fn with_write_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::WriteRejected, probability))
    }

    /// Build the environment, hand it to `body`, and log how many faults
    /// fired once `body` completes.
    ///
    /// # Errors
    /// Whatever `body` returns.
    pub async fn run<F, Fut, E>(self, body: F) -> Result<(), E>
    where
        F: FnOnce(SimEnvironment) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let seed = self.config.seed();
        let env = self.build();
        let faults = Arc::clone(&env.faults);

        let outcome = body(env).await;
        tracing::info!(seed, injected = faults.total_injections(), "simulation done");
        outcome
    }

    /// The environment on its own, for tests that drive it directly.
    #[must_use]
    pub fn build(self) -> SimEnvironment {
        let Self { config, rules } = self;
        let mut rng = DeterministicRng::new(config.seed());
        let faults = Arc::new(
            rules
                .into_iter()
                .fold(FaultInjectorBuilder::new(rng.fork()), FaultInjectorBuilder::with_fault)
                .build(),
        );
        let shared = || Arc::clone(&faults);

        SimEnvironment {
            kv: SimKvClient::with_fault_injector(config, shared()),
            document: SimDocumentClient::with_fault_injector(config, shared()),
            wide_column: SimWideColumnClient::with_fault_injector(config, shared()),
            indexed_table: SimIndexedTableClient::with_fault_injector(config, shared()),
            faults,
            config,
            rng,
        }
    }
}

/// Simulation seeded with `seed`, or from `DST_SEED`/random when `None`.
#[must_use]
pub fn create_simulation(seed: Option<u64>) -> Simulation {
    Simulation::new(seed.map_or_else(SimConfig::from_env_or_random, SimConfig::with_seed))
}
