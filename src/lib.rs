pub mod branch_protection;
pub mod cli;
pub mod error;
pub mod fixtures;
pub mod ghas;
pub mod github_provider;
pub mod logging;
pub mod mocks;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod provider;
pub mod report;
pub mod secret_scanning;
pub mod step;
pub mod transfer;
pub mod worker;
pub mod workflows;
