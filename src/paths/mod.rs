//! Output path resolution
//!
//! Decides where saved images land: prefix token substitution,
//! subfolder splitting, and the incrementing counter derived from what
//! is already on disk. Kept behind a trait so a host can supply its
//! own directory layout.

pub mod mock;
pub mod resolver;

pub use mock::MockPathService;
pub use resolver::OutputPathResolver;

use std::path::PathBuf;

use crate::Result;

/// Everything the save loop needs to place one batch of files.
#[derive(Debug, Clone, PartialEq)]
pub struct SavePathParts {
    /// Directory files are written into. Exists by the time it is
    /// handed out.
    pub folder: PathBuf,
    /// Filename part ahead of the counter.
    pub stem: String,
    /// Counter for the first file of the batch.
    pub counter: u32,
    /// Folder relative to the output root, as reported back to the UI.
    pub subfolder: String,
    /// The prefix after token substitution. Part of the host contract,
    /// unused by the save loop itself.
    pub prefix: String,
}

pub trait SavePathService: Send + Sync {
    /// Resolves a filename prefix plus the dimensions of the batch's
    /// first image into concrete path parts.
    fn resolve(&self, filename_prefix: &str, width: u32, height: u32) -> Result<SavePathParts>;
}
