//! HealthSupervisor (§4.5): periodic health evaluation and cooldown-gated
//! remediation actions.

pub mod config;
pub mod supervisor;

pub use config::HealthSupervisorConfig;
pub use supervisor::{
    HealthSupervisor, RemediationActionKind, RemediationOutcome, RemediationStatus, ServiceStatus,
    SystemHealthStatus,
};
