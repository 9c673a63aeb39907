//! Block Topology Commands
//!
//! This crate turns the structural edits of `topo-core` into commands:
//! - Command: status machine, transaction log and script text
//! - History: undo and redo stacks with a bounded depth
//! - CommandManager: admission queue, worker dispatch and notifications
//! - ManagerConfig: execution policy loaded from RON

pub mod command;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod manager;

pub use command::*;
pub use commands::*;
pub use config::*;
pub use error::*;
pub use history::*;
pub use manager::*;
