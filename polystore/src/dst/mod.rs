//! DST - Deterministic Simulation Testing
//!
//! `TigerStyle`: Every simulated engine draws faults from one seeded
//! injector, so a failing run replays exactly with the same `DST_SEED`.
//!
//! # Usage
//!
//! ```rust
//! use polystore::dst::{FaultConfig, FaultType, SimConfig, Simulation};
//!
//! let env = Simulation::new(SimConfig::with_seed(42))
//!     .with_fault(FaultConfig::new(FaultType::SchemaRejected, 1.0).with_filter("wc_create_table"))
//!     .build();
//! assert_eq!(env.config.seed(), 42);
//! ```

mod config;
mod fault;
mod faults;
mod rng;
mod simulation;

pub use config::{SimConfig, DST_SEED_ENV};
pub use fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
pub use faults::SimFaults;
pub use rng::DeterministicRng;
pub use simulation::{create_simulation, SimEnvironment, Simulation};
