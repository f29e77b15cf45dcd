//! Runtime core: polling, delta computation, remediation and lifecycle.
//!
//! Internal modules:
//! - [`scheduler`]: the poll → compute → emit loop;
//! - [`delta`]: per-producer counter state and increase events;
//! - [`remediation`]: one-shot failover and deregistration;
//! - [`supervisor`]: spawns every task, handles shutdown and the grace period;
//! - [`shutdown`]: cross-platform shutdown signal handling;
//! - [`alive`]: which tasks are still running.

mod alive;
mod builder;
mod delta;
pub(crate) mod remediation;
mod scheduler;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use delta::DeltaEngine;
pub use remediation::{ManagementActions, RegisterProducer, RemediationManager, RemediationState};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use supervisor::Supervisor;
