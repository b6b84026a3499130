//! Property-based tests for the C++ lexer.
//!
//! 1. **Lexer never panics** on arbitrary input
//! 2. **Lexer is deterministic**: same input, same tokens and spans
//! 3. **Spans cover their text**: `source[start..end] == text`, within bounds
//! 4. **Valid fragments lex cleanly**

use cppscan::parser::{Lexer, Token, TokenKind};
use proptest::prelude::*;

const VALID_FRAGMENTS: &[&str] = &[
    "int x = 42;",
    "std::vector<std::vector<int>> grid;",
    "const char* name = \"shape\";",
    "x >>= 3;",
    "a <<= b;",
    "auto f = [&](int y) { return y * 2; };",
    "#include <vector>",
    "#define MAX(a, b) ((a) > (b) ? (a) : (b))",
    "char c = '\\n';",
    "double d = .5e-3;",
    "unsigned long long n = 0xFFull;",
    "auto s = R\"raw(a \" b)raw\";",
    "/* block */ int y; // line",
    "#if 0\n@ ` $\n#endif",
    "class Foo : public Bar<T> { ~Foo(); };",
];

fn valid_fragment() -> impl Strategy<Value = String> {
    prop::sample::select(VALID_FRAGMENTS).prop_map(|s| s.to_string())
}

/// A run of fragments joined by newlines.
fn valid_source() -> impl Strategy<Value = String> {
    prop::collection::vec(valid_fragment(), 1..8).prop_map(|parts| parts.join("\n"))
}

/// Tokens up to the first error, with the normalized source they refer to.
fn lex_prefix(input: &str) -> (String, Vec<Token>) {
    let lexer = Lexer::new(input);
    let source = lexer.source().to_string();
    let tokens = lexer.map_while(Result::ok).collect();
    (source, tokens)
}

fn proptest_config() -> ProptestConfig {
    let default = ProptestConfig::default();
    ProptestConfig {
        cases: default.cases.max(512),
        ..default
    }
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn lexer_never_panics(input in "\\PC{0,300}") {
        let _ = Lexer::new(&input).tokenize();
    }

    #[test]
    fn lexer_never_panics_on_cpp_alphabet(input in "[a-z_0-9 <>:;(){}\\[\\]*&=+\\-/\"'#\\\\\n.,~!?]{0,200}") {
        let _ = Lexer::new(&input).tokenize();
    }

    #[test]
    fn lexer_is_deterministic(input in "\\PC{0,300}") {
        let first = Lexer::new(&input).tokenize();
        let second = Lexer::new(&input).tokenize();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn spans_cover_token_text(input in "\\PC{0,300}") {
        let (source, tokens) = lex_prefix(&input);
        prop_assert!(source.len() <= input.len() + 1);
        for token in &tokens {
            let (start, end) = (token.start as usize, token.end as usize);
            prop_assert!(start < end, "empty span for {:?}", token);
            prop_assert!(end <= source.len(), "{:?} ends past {}", token, source.len());
            prop_assert_eq!(&source[start..end], token.text.as_str());
        }
    }

    #[test]
    fn spans_are_ordered(input in "\\PC{0,300}") {
        let (_, tokens) = lex_prefix(&input);
        for pair in tokens.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn valid_fragments_lex_cleanly(input in valid_source()) {
        let tokens = Lexer::new(&input).tokenize();
        prop_assert!(tokens.is_ok(), "{:?} failed: {:?}", input, tokens);
        let tokens = tokens.unwrap_or_default();
        prop_assert!(tokens.iter().all(|t| t.kind != TokenKind::Unknown));
    }
}
