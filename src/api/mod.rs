/// Backend HTTP client module
///
/// This module handles all communication with the segmentation backend:
/// - Request/response body definitions (types.rs)
/// - The reqwest-based client itself (client.rs)
/// - Error classification for failed requests (error.rs)

pub mod client;
pub mod error;
pub mod types;

pub use client::ApiClient;
pub use error::ApiError;
