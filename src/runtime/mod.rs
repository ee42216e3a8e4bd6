pub mod callbacks;
pub mod logging;
pub mod orchestrator;
pub mod service;
pub mod sqlite;
pub mod types;
