//! HTTP API handlers for curio-ai
//!
//! Thin JSON surface over the job orchestrator and the project store.

pub mod health;
pub mod jobs;
pub mod projects;

pub use health::health_routes;
pub use jobs::job_routes;
pub use projects::project_routes;
