//! Job execution engine.
//!
//! The submit handler pushes an [`AnalysisTask`] onto the [`AnalysisQueue`]
//! and returns; the [`AnalysisRunner`] owns the receiving end, performs the
//! analysis out-of-band and finalises the job in the store.

pub mod analyzer;
pub mod queue;
pub mod runner;

pub use analyzer::{Analyzer, AnalyzerError, SimulatedAnalyzer};
pub use queue::{AnalysisQueue, AnalysisTask, EnqueueError};
pub use runner::AnalysisRunner;
