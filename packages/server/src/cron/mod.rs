//! `CronEngine` (§4.3): schedules, runs, and retries named `CronJob`s, with
//! a self-healing health-bucket policy and crash recovery on restart.

pub mod config;
pub mod engine;
pub mod errors;

pub use config::CronEngineConfig;
pub use engine::{CronEngine, CronJobState, JobFailure, JobHealth, JobOutput};
pub use errors::CronError;
