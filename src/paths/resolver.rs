use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, Timelike};

use super::{SavePathParts, SavePathService};
use crate::{Error, Result};

/// Filesystem-backed path service rooted at one output directory.
pub struct OutputPathResolver {
    output_dir: PathBuf,
}

impl OutputPathResolver {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl SavePathService for OutputPathResolver {
    /// No locking: two concurrent calls with the same prefix can hand
    /// out the same counter, and the later write wins.
    fn resolve(&self, filename_prefix: &str, width: u32, height: u32) -> Result<SavePathParts> {
        let prefix = substitute_tokens(filename_prefix, width, height);
        if prefix.starts_with('/') {
            return Err(Error::OutsideOutputDirectory(prefix));
        }

        let mut parts: Vec<&str> = Vec::new();
        for component in prefix.split('/') {
            match component {
                "" | "." => continue,
                ".." => {
                    if parts.pop().is_none() {
                        return Err(Error::OutsideOutputDirectory(prefix.clone()));
                    }
                }
                other => parts.push(other),
            }
        }
        let stem = parts.pop().unwrap_or_default().to_string();
        let subfolder = parts.join("/");

        let folder = if subfolder.is_empty() {
            self.output_dir.clone()
        } else {
            self.output_dir.join(&subfolder)
        };
        std::fs::create_dir_all(&folder)?;
        let counter = next_counter(&folder, &stem)?;

        Ok(SavePathParts {
            folder,
            stem,
            counter,
            subfolder,
            prefix,
        })
    }
}

/// Expands `%width%`/`%height%` and the local-time tokens inside a
/// filename prefix.
fn substitute_tokens(prefix: &str, width: u32, height: u32) -> String {
    let now = Local::now();
    prefix
        .replace("%width%", &width.to_string())
        .replace("%height%", &height.to_string())
        .replace("%year%", &now.year().to_string())
        .replace("%month%", &format!("{:02}", now.month()))
        .replace("%day%", &format!("{:02}", now.day()))
        .replace("%hour%", &format!("{:02}", now.hour()))
        .replace("%minute%", &format!("{:02}", now.minute()))
        .replace("%second%", &format!("{:02}", now.second()))
}

/// Scans the folder for `{stem}_{digits}_...` names and picks the next
/// counter: highest seen plus one, or 0 for an untouched folder.
fn next_counter(folder: &Path, stem: &str) -> Result<u32> {
    let mut next = 0;
    for entry in std::fs::read_dir(folder)? {
        let name = entry?.file_name();
        if let Some(digits) = name.to_str().and_then(|n| counter_digits(n, stem)) {
            next = next.max(digits.saturating_add(1));
        }
    }
    Ok(next)
}

fn counter_digits(name: &str, stem: &str) -> Option<u32> {
    let rest = name.strip_prefix(stem)?.strip_prefix('_')?;
    rest.split('_').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_folder_starts_at_zero() {
        let temp = TempDir::new().unwrap();
        let resolver = OutputPathResolver::new(temp.path());

        let parts = resolver.resolve("Test", 64, 64).unwrap();
        assert_eq!(parts.counter, 0);
        assert_eq!(parts.stem, "Test");
        assert_eq!(parts.subfolder, "");
        assert_eq!(parts.folder, temp.path());
        assert_eq!(parts.prefix, "Test");
    }

    #[test]
    fn test_counter_continues_past_existing_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Test_00004_.png"), b"x").unwrap();
        std::fs::write(temp.path().join("Test_00001_.png"), b"x").unwrap();

        let resolver = OutputPathResolver::new(temp.path());
        let parts = resolver.resolve("Test", 64, 64).unwrap();
        assert_eq!(parts.counter, 5);
    }

    #[test]
    fn test_counter_ignores_foreign_names() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Other_00009_.png"), b"x").unwrap();
        std::fs::write(temp.path().join("Test_abc_.png"), b"x").unwrap();
        std::fs::write(temp.path().join("Test2_00007_.png"), b"x").unwrap();
        std::fs::write(temp.path().join("Test_00002_.png"), b"x").unwrap();

        let resolver = OutputPathResolver::new(temp.path());
        let parts = resolver.resolve("Test", 64, 64).unwrap();
        assert_eq!(parts.counter, 3);
    }

    #[test]
    fn test_subfolder_split_and_creation() {
        let temp = TempDir::new().unwrap();
        let resolver = OutputPathResolver::new(temp.path());

        let parts = resolver.resolve("renders/final/Test", 64, 64).unwrap();
        assert_eq!(parts.subfolder, "renders/final");
        assert_eq!(parts.stem, "Test");
        assert_eq!(parts.folder, temp.path().join("renders/final"));
        assert!(parts.folder.is_dir());
    }

    #[test]
    fn test_dimension_tokens() {
        let temp = TempDir::new().unwrap();
        let resolver = OutputPathResolver::new(temp.path());

        let parts = resolver.resolve("%width%x%height%/img", 512, 768).unwrap();
        assert_eq!(parts.subfolder, "512x768");
        assert_eq!(parts.stem, "img");
        assert_eq!(parts.prefix, "512x768/img");
    }

    #[test]
    fn test_time_tokens() {
        let temp = TempDir::new().unwrap();
        let resolver = OutputPathResolver::new(temp.path());

        let parts = resolver.resolve("%year%/Test", 64, 64).unwrap();
        let year = Local::now().year().to_string();
        assert_eq!(parts.subfolder, year);
    }

    #[test]
    fn test_parent_components_collapse() {
        let temp = TempDir::new().unwrap();
        let resolver = OutputPathResolver::new(temp.path());

        let parts = resolver.resolve("a/../b/Test", 64, 64).unwrap();
        assert_eq!(parts.subfolder, "b");
        assert_eq!(parts.stem, "Test");
    }

    #[test]
    fn test_escape_attempts_rejected() {
        let temp = TempDir::new().unwrap();
        let resolver = OutputPathResolver::new(temp.path());

        match resolver.resolve("../outside", 64, 64) {
            Err(Error::OutsideOutputDirectory(_)) => {}
            other => panic!("expected traversal rejection, got {:?}", other),
        }
        assert!(resolver.resolve("/etc/passwd", 64, 64).is_err());
        assert!(resolver.resolve("a/../../outside", 64, 64).is_err());
    }

    #[test]
    fn test_counter_digit_parsing() {
        assert_eq!(counter_digits("Test_00004_.png", "Test"), Some(4));
        assert_eq!(counter_digits("Test_12_extra_.png", "Test"), Some(12));
        assert_eq!(counter_digits("Test_x_.png", "Test"), None);
        assert_eq!(counter_digits("Test2_00004_.png", "Test"), None);
        assert_eq!(counter_digits("Test.png", "Test"), None);
    }
}
