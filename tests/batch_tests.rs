// Integration tests for per-file failure isolation

use cppscan::parser::Error;
use cppscan::{parse_files, BuildOptions, FileError, InMemoryFiles};
use std::path::Path;

fn quiet() -> BuildOptions {
    BuildOptions::new().with_quiet(true)
}

#[test]
fn test_malformed_file_does_not_abort_batch() {
    let files = InMemoryFiles::new()
        .with_file("first.h", "class First;\nint first_value;\n")
        .with_file("second.h", "int ok;\nint broken() ? ;\n")
        .with_file("third.h", "namespace third { void run(); }\n");

    let parsed = parse_files(&["first.h", "second.h", "third.h"], &files, &quiet());
    assert_eq!(parsed.len(), 3);

    let first = parsed[0].result.as_ref().expect("first.h failed");
    assert_eq!(first.len(), 2);

    match &parsed[1].result {
        Err(FileError::Syntax { path, line, source }) => {
            assert_eq!(path, Path::new("second.h"));
            assert_eq!(*line, 2);
            assert!(matches!(source, Error::Parse(_)), "{:?}", source);
        }
        other => panic!("unexpected {:?}", other),
    }

    let third = parsed[2].result.as_ref().expect("third.h failed");
    assert_eq!(third[0].full_name().as_deref(), Some("third::run"));
}

#[test]
fn test_tokenize_error_is_isolated() {
    let files = InMemoryFiles::new()
        .with_file("bad.h", "int a;\nint b = @;\n")
        .with_file("good.h", "int c;\n");

    let parsed = parse_files(&["bad.h", "good.h"], &files, &quiet());
    match &parsed[0].result {
        Err(FileError::Syntax { line, source, .. }) => {
            assert_eq!(*line, 2);
            assert!(matches!(source, Error::Tokenize(_)), "{:?}", source);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(parsed[1].result.is_ok());
}

#[test]
fn test_missing_file() {
    let files = InMemoryFiles::new().with_file("present.h", "int x;\n");
    let parsed = parse_files(&["absent.h", "present.h"], &files, &quiet());

    let err = parsed[0].result.as_ref().expect_err("absent.h should fail");
    assert!(matches!(err, FileError::NotFound { .. }));
    assert_eq!(err.path(), Path::new("absent.h"));
    assert_eq!(err.to_string(), "absent.h: cannot read file");
    assert!(parsed[1].result.is_ok());
}

#[test]
fn test_error_message_names_file_and_line() {
    let files = InMemoryFiles::new().with_file("src/widget.h", "\n\nreturn 1;\n");
    let parsed = parse_files(&["src/widget.h"], &files, &quiet());
    let err = parsed[0].result.as_ref().expect_err("widget.h should fail");
    assert!(err.to_string().starts_with("src/widget.h:3: "), "{}", err);
}
