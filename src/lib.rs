//! Save Image (Extended) - a terminal output node for node-graph image hosts
//!
//! Persists batches of generated images as PNG, JPEG, or WebP with the
//! generation prompt and workflow graph embedded as metadata, and reads
//! that metadata back out of previously saved files.

pub mod batch;
pub mod error;
pub mod exif;
pub mod models;
pub mod node;
pub mod paths;
pub mod policy;
pub mod save;
pub mod workflow;

pub use error::{Error, Result};
