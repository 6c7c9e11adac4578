use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::{SavePathParts, SavePathService};
use crate::Result;

/// Path service with canned parts. Hands the folder out as-is, so
/// point it at a directory that exists (a TempDir in tests).
#[derive(Clone)]
pub struct MockPathService {
    folder: PathBuf,
    stem: String,
    counter: u32,
    subfolder: String,
    resolve_count: Arc<Mutex<usize>>,
}

impl MockPathService {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            stem: "ComfyUI".to_string(),
            counter: 0,
            subfolder: String::new(),
            resolve_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_stem(mut self, stem: &str) -> Self {
        self.stem = stem.to_string();
        self
    }

    pub fn with_counter(mut self, counter: u32) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_subfolder(mut self, subfolder: &str) -> Self {
        self.subfolder = subfolder.to_string();
        self
    }

    pub fn get_resolve_count(&self) -> usize {
        *self.resolve_count.lock().unwrap()
    }
}

impl SavePathService for MockPathService {
    fn resolve(&self, filename_prefix: &str, _width: u32, _height: u32) -> Result<SavePathParts> {
        let mut count = self.resolve_count.lock().unwrap();
        *count += 1;

        Ok(SavePathParts {
            folder: self.folder.clone(),
            stem: self.stem.clone(),
            counter: self.counter,
            subfolder: self.subfolder.clone(),
            prefix: filename_prefix.to_string(),
        })
    }
}
