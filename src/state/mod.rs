/// State management module
///
/// This module handles all application state, including:
/// - Shared data structures (data.rs)
/// - The upload workflow state machine (workflow.rs)
/// - Async batch legs: loading, previews, processing (batch.rs)

pub mod batch;
pub mod data;
pub mod workflow;
