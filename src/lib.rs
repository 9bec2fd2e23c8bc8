//! Hand analyzer.
//!
//! Upload one image, send it to a vision-language model, and show the
//! model's finger count and hand description.

pub mod client;
pub mod config;
pub mod encoder;
pub mod error;
pub mod server;
pub mod ui;
pub mod workflow;

pub use client::{AnalysisClient, AnalysisRequest, AnalysisResult, GeminiClient};
pub use config::Config;
pub use encoder::{encode, ImageAsset, SelectedFile};
pub use error::{AnalysisError, EncodeError, WorkflowError};
pub use workflow::{Snapshot, Status, Workflow, WorkflowHandle, WorkflowState};
