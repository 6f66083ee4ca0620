pub mod config;
pub mod logging;

// Update pipeline, leaf-first.
pub mod catalog;
pub mod checksum;
pub mod error;
pub mod fetcher;
pub mod installer;
pub mod manifest;
pub mod orchestrator;
pub mod retry;
pub mod shell;
pub mod version;
pub mod version_manager;
