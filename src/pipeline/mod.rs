//! The retrieval pipeline.
//!
//! A run moves through routing, primary retrieval, a sufficiency check,
//! optional secondary retrieval, fusion, final grading, and generation.
//! Questions that only ask for a URL summary bypass retrieval entirely.

pub mod ephemeral;
pub mod fusion;
pub mod generate;
pub mod grading;
pub mod graph;
pub mod intent;
pub mod orchestrator;
pub mod state;
pub mod vector;

pub use generate::FALLBACK_ANSWER;
pub use grading::Grade;
pub use intent::UrlIntent;
pub use orchestrator::Pipeline;
pub use state::{PipelineStage, RagRequest, RagResponse, RetrievalMode};
