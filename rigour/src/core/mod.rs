//! Deterministic, pure logic shared by gates, the pipeline, and the supervisor.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod drift;
pub mod file_guard;
pub mod packet;
pub mod scope;
pub mod scoring;
pub mod types;
