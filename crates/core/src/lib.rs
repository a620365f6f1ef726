//! Domain types for the perfscope analysis service.
//!
//! This crate has no I/O. The store, HTTP server and poller crates all build
//! on the job model and state machine defined here.

pub mod analysis;
pub mod error;
pub mod job;
pub mod report;
pub mod types;
