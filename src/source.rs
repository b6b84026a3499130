//! Access to source files and header classification
//!
//! The builder never touches the filesystem itself. Anything that needs a
//! file goes through [`SourceFiles`]: [`FileSystem`] for real runs and
//! [`InMemoryFiles`] for tests.

use crate::options::BuildOptions;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

pub trait SourceFiles {
    /// Contents of `path`, or `None` if it cannot be read.
    fn read_source_file(&self, path: &Path) -> Option<String>;

    fn exists(&self, path: &Path) -> bool;
}

/// Reads from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystem;

impl SourceFiles for FileSystem {
    fn read_source_file(&self, path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(source) => Some(source),
            Err(e) => {
                trace!(path = %path.display(), error = %e, "cannot read source file");
                None
            }
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// A fixed set of files held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFiles {
    files: FxHashMap<PathBuf, String>,
}

impl InMemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, source: impl Into<String>) {
        self.files.insert(path.into(), source.into());
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }
}

impl SourceFiles for InMemoryFiles {
    fn read_source_file(&self, path: &Path) -> Option<String> {
        self.files.get(path).cloned()
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

/// Decide the filename and system flag of an `#include` argument as written
/// (`<vector>`, `"util.h"` or a bare macro name).
///
/// A header found under a system search directory is a system header, one
/// found under a non-system directory is local; otherwise the bracket form
/// decides. Returns `None` for an unterminated `<...` or `"...`.
pub fn classify_include(
    spelled: &str,
    options: &BuildOptions,
    files: Option<&dyn SourceFiles>,
) -> Option<(String, bool)> {
    let filename = spelled.trim_matches(|c| matches!(c, '<' | '>' | '"'));

    if let Some(files) = files {
        let found_in = |dirs: &[PathBuf]| dirs.iter().any(|dir| files.exists(&dir.join(filename)));
        if found_in(&options.system_includes) {
            return Some((filename.to_string(), true));
        }
        if found_in(&options.nonsystem_includes) {
            return Some((filename.to_string(), false));
        }
    }

    match spelled.chars().next() {
        Some(open @ ('<' | '"')) => {
            let close = if open == '<' { '>' } else { '"' };
            if spelled.len() < 2 || !spelled.ends_with(close) {
                return None;
            }
            Some((spelled[1..spelled.len() - 1].to_string(), open == '<'))
        }
        _ => Some((spelled.to_string(), true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_form_decides_without_files() {
        let options = BuildOptions::new();
        assert_eq!(
            classify_include("<vector>", &options, None),
            Some(("vector".to_string(), true))
        );
        assert_eq!(
            classify_include("\"util.h\"", &options, None),
            Some(("util.h".to_string(), false))
        );
        assert_eq!(
            classify_include("CONFIG_HEADER", &options, None),
            Some(("CONFIG_HEADER".to_string(), true))
        );
        assert_eq!(classify_include("<vector", &options, None), None);
    }

    #[test]
    fn test_search_directories_win() {
        let files = InMemoryFiles::new()
            .with_file("/sdk/include/sdk.h", "")
            .with_file("src/local.h", "");
        let options = BuildOptions::new()
            .with_system_include("/sdk/include")
            .with_nonsystem_include("src");

        assert_eq!(
            classify_include("\"sdk.h\"", &options, Some(&files)),
            Some(("sdk.h".to_string(), true))
        );
        assert_eq!(
            classify_include("<local.h>", &options, Some(&files)),
            Some(("local.h".to_string(), false))
        );
    }

    #[test]
    fn test_in_memory_files() {
        let mut files = InMemoryFiles::new();
        files.insert("a.h", "int a;");
        assert_eq!(files.read_source_file(Path::new("a.h")).as_deref(), Some("int a;"));
        assert!(files.exists(Path::new("a.h")));
        assert!(!files.exists(Path::new("b.h")));
    }
}
