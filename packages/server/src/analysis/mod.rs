//! AnalysisOrchestrator (§4.4): ensures fresh inputs, invokes
//! `AnalysisBackend`, validates output quality, and persists results.

pub mod config;
pub mod errors;
pub mod orchestrator;

pub use config::AnalysisConfig;
pub use errors::AnalysisError;
pub use orchestrator::{AnalysisOrchestrator, AnalysisResult, MonitorResult, TriggerOptions};
