//! Azure DevOps agent pool client for the agent autoscaler.

mod client;
pub mod config;
pub mod retry_after;

pub use client::DevOpsClient;
pub use config::DevOpsConfig;
