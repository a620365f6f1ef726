//! Client side of the analysis job protocol.
//!
//! [`api::AnalysisClient`] talks to the HTTP API; [`poller::Poller`] drives
//! a submitted job to a terminal state with bounded attempts.

pub mod api;
pub mod poller;

pub use api::{AnalysisClient, ClientError};
pub use poller::{JobSource, PollError, PollState, Poller, PollerConfig};
