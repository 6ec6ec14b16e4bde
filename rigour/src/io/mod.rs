//! Side-effecting adapters: filesystem state, git, and subprocesses.

pub mod agent;
pub mod artifacts;
pub mod config;
pub mod discovery;
pub mod git;
pub mod handoffs;
pub mod history;
pub mod init;
pub mod process;
pub mod store;
