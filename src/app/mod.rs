//! Network lifecycle control.
//!
//! ```text
//! run:
//!     start network ─▶ arm StopGuard ─▶ register termination source
//!         ─▶ spawn ShutdownCoordinator ─▶ bounded health wait
//!         ─▶ wait for shutdown-complete ─▶ release StopGuard
//!
//! coordinator:
//!     first termination request ─▶ stop network ─▶ deregister source
//!         ─▶ fulfil shutdown-complete
//! ```

mod guard;
mod orchestrator;
mod readiness;
mod runtime;
mod shutdown;
mod signals;
mod startup;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use guard::StopGuard;
pub use orchestrator::NetworkController;
pub use readiness::wait_until_healthy;
pub use shutdown::{CoordinatorHandle, ShutdownCoordinator};
pub use signals::{TerminationSender, TerminationSource};
pub use state::RunStateHandle;
pub use types::{ReadinessOutcome, RunState, ShutdownReason};
