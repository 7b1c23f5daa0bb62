//! Utility modules for the todosync client.
//!
//! - [`url`] - Media URL normalization against the configured API origin

pub mod url;

pub use url::{normalize_image_url, ImageUrlNormalizer};
