//! I/O for crew: config, processes, stores and collaborator backends.

pub mod agent_process;
pub mod config;
pub mod event_store;
pub mod executor;
pub mod init;
pub mod process;
pub mod prompt;
pub mod search;
