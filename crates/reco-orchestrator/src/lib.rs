//! Reco Orchestrator - long-running request orchestration
//!
//! Exposes listing, requirement checks and apply as start/poll pairs:
//! - [`RequestLedger`] tracks in-flight requests per (requester, request id)
//! - [`RequestHandle`] implementations run the work and report progress
//! - [`Orchestrator`] owns the ledgers and is the single entry point
//!
//! # Example
//!
//! ```rust,ignore
//! use reco_orchestrator::{Orchestrator, OrchestratorConfig, Poll};
//!
//! # async fn example(service: std::sync::Arc<dyn reco_core::CloudService>) {
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default());
//! let id = orchestrator.start_listing("alice@example.com", service, vec!["project-a".into()]);
//!
//! if let Ok(Poll::Done(result)) = orchestrator.poll_listing("alice@example.com", &id) {
//!     println!("{:?}", result);
//! }
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod handle;
pub mod ledger;
pub mod orchestrator;
pub mod simulator;
pub mod telemetry;

pub use config::{ConfigError, OrchestratorConfig};
pub use handle::{ApplyHandle, ListingHandle, Poll, RequestHandle, RequirementsHandle};
pub use ledger::{generate_request_id, RequestKey, RequestLedger, SharedHandle};
pub use orchestrator::{ApplyStatus, Orchestrator};
pub use simulator::{run_simulator, SimulatorConfig, SimulatorReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
