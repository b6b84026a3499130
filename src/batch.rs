//! Multi-file scanning
//!
//! Each file is scanned on its own. A file that cannot be read or parsed
//! produces a [`FileError`] for that file only; the rest of the batch runs
//! to completion.

use crate::options::BuildOptions;
use crate::parser::{line_number, Builder, Error, Node};
use crate::source::SourceFiles;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Why one file produced no nodes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FileError {
    #[error("{}: cannot read file", path.display())]
    NotFound { path: PathBuf },

    #[error("{}:{line}: {source}", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        source: Error,
    },
}

impl FileError {
    pub fn path(&self) -> &Path {
        match self {
            FileError::NotFound { path } | FileError::Syntax { path, .. } => path,
        }
    }
}

/// The outcome of scanning one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub result: Result<Vec<Node>, FileError>,
}

/// Scan one source buffer to completion.
pub fn parse_source(
    source: &str,
    filename: &str,
    options: &BuildOptions,
    files: Option<&dyn SourceFiles>,
) -> Result<Vec<Node>, Error> {
    let mut builder = Builder::with_options(source, filename, options);
    if let Some(files) = files {
        builder = builder.with_source_files(files);
    }
    builder.collect()
}

/// Scan every path in order, reading through `files`.
pub fn parse_files<P>(paths: &[P], files: &dyn SourceFiles, options: &BuildOptions) -> Vec<ParsedFile>
where
    P: AsRef<Path>,
{
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let result = parse_file(path, files, options);
            if let Err(e) = &result {
                if !options.quiet {
                    warn!("{}", e);
                }
            }
            ParsedFile {
                path: path.to_path_buf(),
                result,
            }
        })
        .collect()
}

fn parse_file(path: &Path, files: &dyn SourceFiles, options: &BuildOptions) -> Result<Vec<Node>, FileError> {
    let source = files.read_source_file(path).ok_or_else(|| FileError::NotFound {
        path: path.to_path_buf(),
    })?;

    let filename = path.display().to_string();
    let nodes = parse_source(&source, &filename, options, Some(files)).map_err(|e| FileError::Syntax {
        path: path.to_path_buf(),
        line: e.offset().map_or(0, |offset| line_number(&source, offset)),
        source: e,
    })?;
    debug!(file = %filename, nodes = nodes.len(), "scanned");
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryFiles;

    #[test]
    fn test_parse_source() {
        let nodes = parse_source("int x;", "x.cc", &BuildOptions::new(), None).unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_syntax_error_carries_line() {
        let files = InMemoryFiles::new().with_file("bad.h", "int ok;\n\nint f() ? ;\n");
        let parsed = parse_files(&["bad.h"], &files, &BuildOptions::new().with_quiet(true));
        match &parsed[0].result {
            Err(FileError::Syntax { line, .. }) => assert_eq!(*line, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_display() {
        let err = FileError::NotFound {
            path: PathBuf::from("gone.h"),
        };
        assert_eq!(err.to_string(), "gone.h: cannot read file");
        assert_eq!(err.path(), Path::new("gone.h"));
    }
}
