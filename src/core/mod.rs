pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
