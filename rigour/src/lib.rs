//! Quality gates and governance for AI-agent code changes.
//!
//! A change is verified by a [`pipeline::GatePipeline`] that runs every gate,
//! scores the findings and, on failure, hands the agent a fix packet. The
//! architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (scoring, drift, file guard, fix packets).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, git, process execution).
//!   Isolated behind small traits so tests can script them.
//!
//! [`gates`] and [`governance`] build on both; [`supervisor`] drives an agent
//! in a loop around the pipeline.

pub mod core;
pub mod exit_codes;
pub mod gates;
pub mod governance;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod supervisor;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
