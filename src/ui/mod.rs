/// UI building blocks
///
/// This module holds the widget-level code for both pages:
/// - The upload page: picker, previews, results (upload.rs)
/// - The polygon annotation canvas (annotation.rs)

pub mod annotation;
pub mod upload;
