//! Builder configuration

use std::path::PathBuf;

/// Settings shared by a builder and every nested class-body builder it
/// spawns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Directories whose headers are system headers.
    pub system_includes: Vec<PathBuf>,
    /// Directories whose headers belong to the project.
    pub nonsystem_includes: Vec<PathBuf>,
    /// Suppress per-file failure warnings in batch runs.
    pub quiet: bool,
}

impl BuildOptions {
    pub const fn new() -> Self {
        BuildOptions {
            system_includes: Vec::new(),
            nonsystem_includes: Vec::new(),
            quiet: false,
        }
    }

    pub fn with_system_include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.system_includes.push(dir.into());
        self
    }

    pub fn with_nonsystem_include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.nonsystem_includes.push(dir.into());
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_setters() {
        let options = BuildOptions::new()
            .with_system_include("/usr/include")
            .with_nonsystem_include("src")
            .with_quiet(true);
        assert_eq!(options.system_includes, vec![PathBuf::from("/usr/include")]);
        assert_eq!(options.nonsystem_includes, vec![PathBuf::from("src")]);
        assert!(options.quiet);
        assert_eq!(BuildOptions::new(), BuildOptions::default());
    }
}
