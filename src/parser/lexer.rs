//! Lexer (tokenizer) for C++ source code
//!
//! Converts raw source text into a lazy stream of classified [`Token`]s with
//! byte-offset spans. The lexer knows nothing about grammar: every decision is
//! driven by the class of the current character.
//!
//! # Notable rules
//!
//! - `>` never merges with a following `>`, so `vector<vector<int>>` yields two
//!   closing tokens. `<<` and `<<=` do merge.
//! - Comments are dropped. Preprocessor directives become a single
//!   [`TokenKind::Preprocessor`] token spanning the whole logical line.
//! - `#if 0` style blocks are suppressed: nothing inside them is yielded and
//!   nothing inside them can raise an error.
//! - The source is normalized to end with `'\n'`, so spans may reach one byte
//!   past the original input.

use std::fmt;
use thiserror::Error;
use tracing::trace;

/// Classification of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Name,
    Syntax,
    Constant,
    Preprocessor,
    Unknown,
}

/// A classified lexical unit with its byte span in the normalized source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: u32,
    pub end: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
            end,
        }
    }

    /// True if this token has exactly the given text, whatever its kind.
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }

    /// True if this is a syntax token with the given text.
    pub fn is_syntax(&self, text: &str) -> bool {
        self.kind == TokenKind::Syntax && self.text == text
    }

    pub fn is_name(&self) -> bool {
        self.kind == TokenKind::Name
    }

    pub fn is_preprocessor(&self) -> bool {
        self.kind == TokenKind::Preprocessor
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' at {}..{}", self.text, self.start, self.end)
    }
}

/// Lexer error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unexpected character {ch:?} at offset {offset} near {context:?}")]
    UnexpectedChar {
        ch: char,
        offset: usize,
        context: String,
    },
    #[error("unterminated block comment starting at offset {offset}")]
    UnterminatedComment { offset: usize },
}

impl LexError {
    /// Byte offset of the failure in the normalized source.
    pub fn offset(&self) -> usize {
        match self {
            LexError::UnexpectedChar { offset, .. } | LexError::UnterminatedComment { offset } => {
                *offset
            }
        }
    }
}

/// Map a byte offset to a 1-based line number.
pub fn line_number(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    1 + source.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count()
}

const STRING_PREFIXES: &[&str] = &["R", "u8", "u8R", "u", "uR", "U", "UR", "L", "LR"];
const INTEGER_SUFFIXES: &[&str] = &["ull", "llu", "ll", "ul", "lu", "l", "u"];

/// Lazy tokenizer over one source buffer.
///
/// Implements `Iterator<Item = Result<Token, LexError>>`; the iterator stops
/// after the first error.
pub struct Lexer {
    source: String,
    position: usize,
    if_depth: usize,
    finished: bool,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str) -> Self {
        let mut source = input.to_string();
        if !source.ends_with('\n') {
            source.push('\n');
        }
        Self {
            source,
            position: 0,
            if_depth: 0,
            finished: false,
        }
    }

    /// The normalized source the token spans refer to.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Tokenize the entire input
    pub fn tokenize(self) -> Result<Vec<Token>, LexError> {
        self.collect()
    }

    fn suppressed(&self) -> bool {
        self.if_depth > 0
    }

    /// Get next token
    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        let bytes = self.source.as_bytes();
        let end = bytes.len();
        let mut i = self.position;

        loop {
            while i < end && is_space(bytes[i]) {
                i += 1;
            }
            if i >= end {
                self.position = end;
                return Ok(None);
            }

            let start = i;
            let c = bytes[i];
            let kind;

            if is_ident_start(c) {
                kind = TokenKind::Name;
                while i < end && is_ident_char(bytes[i]) {
                    i += 1;
                }
                let word = &self.source[start..i];
                let quote = peek(bytes, i);
                if (quote == b'"' || quote == b'\'') && STRING_PREFIXES.contains(&word) {
                    let close = if quote == b'"' && word.ends_with('R') {
                        scan_raw_string(bytes, i)
                    } else if quote == b'"' {
                        scan_string(bytes, i)
                    } else {
                        scan_char(bytes, i)
                    };
                    // An unterminated literal leaves the prefix as a plain name.
                    if let Some(close) = close {
                        i = close;
                        if self.suppressed() {
                            continue;
                        }
                        self.position = i;
                        return Ok(Some(self.make(TokenKind::Constant, start, i)));
                    }
                }
            } else if c == b'/' && peek(bytes, i + 1) == b'/' {
                i = find_byte(bytes, i, b'\n').unwrap_or(end);
                continue;
            } else if c == b'/' && peek(bytes, i + 1) == b'*' {
                match find_seq(bytes, i + 2, b"*/") {
                    Some(close) => i = close + 2,
                    None if self.suppressed() => i = end,
                    None => {
                        self.position = end;
                        return Err(LexError::UnterminatedComment { offset: start });
                    }
                }
                continue;
            } else if c == b'<' || c == b'>' {
                kind = TokenKind::Syntax;
                i += 1;
                if c == b'<' && peek(bytes, i) == b'<' {
                    i += 1;
                }
                if peek(bytes, i) == b'=' {
                    i += 1;
                }
            } else if b":+-&|=".contains(&c) {
                kind = TokenKind::Syntax;
                i += 1;
                let next = peek(bytes, i);
                if next == c || (c == b'-' && next == b'>') || (c != b':' && next == b'=') {
                    i += 1;
                }
            } else if b"!*^%/".contains(&c) {
                kind = TokenKind::Syntax;
                i += 1;
                if peek(bytes, i) == b'=' {
                    i += 1;
                }
            } else if b"()[]{}~?;.,".contains(&c) {
                i += 1;
                if c == b'.' && peek(bytes, i).is_ascii_digit() {
                    kind = TokenKind::Constant;
                    i = scan_number_tail(bytes, i, true);
                } else {
                    kind = TokenKind::Syntax;
                }
            } else if c.is_ascii_digit() {
                kind = TokenKind::Constant;
                if c == b'0' && matches!(peek(bytes, i + 1), b'x' | b'X') {
                    i += 2;
                    while peek(bytes, i).is_ascii_hexdigit() {
                        i += 1;
                    }
                    i = scan_suffix(bytes, i, INTEGER_SUFFIXES);
                } else {
                    i = scan_number_tail(bytes, i, false);
                }
            } else if c == b'"' || c == b'\'' {
                let close = if c == b'"' {
                    scan_string(bytes, i)
                } else {
                    scan_char(bytes, i)
                };
                match close {
                    Some(close) => {
                        kind = TokenKind::Constant;
                        i = close;
                    }
                    None => {
                        kind = TokenKind::Unknown;
                        i += 1;
                    }
                }
            } else if c == b'#' {
                kind = TokenKind::Preprocessor;
                let keyword = directive_keyword(&self.source, i);
                if self.if_depth > 0 && keyword == "endif" {
                    self.if_depth -= 1;
                    if self.if_depth == 0 {
                        i = skip_to_keyword_end(bytes, i);
                        trace!(offset = start, "leaving suppressed block");
                        continue;
                    }
                }
                i = match scan_directive(bytes, i) {
                    Ok(close) => close,
                    Err(_) if self.suppressed() => end,
                    Err(open) => {
                        self.position = end;
                        return Err(LexError::UnterminatedComment { offset: open });
                    }
                };
                if keyword.starts_with("if") {
                    let text = &self.source[start..i];
                    if self.if_depth > 0 || is_always_false(keyword, text) {
                        if self.if_depth == 0 {
                            trace!(offset = start, directive = text, "entering suppressed block");
                        }
                        self.if_depth += 1;
                    }
                }
            } else if c == b'\\' {
                i += 1;
                continue;
            } else if self.suppressed() {
                i += 1;
                continue;
            } else {
                self.position = end;
                let ch = self.source.get(i..).and_then(|s| s.chars().next()).unwrap_or('\u{fffd}');
                let context_end = find_byte(bytes, i, b'\n').unwrap_or(end);
                let context_start = self.source[..i].rfind('\n').map_or(0, |p| p + 1);
                return Err(LexError::UnexpectedChar {
                    ch,
                    offset: i,
                    context: self.source.get(context_start..context_end).unwrap_or("").to_string(),
                });
            }

            if self.suppressed() {
                continue;
            }
            self.position = i;
            return Ok(Some(self.make(kind, start, i)));
        }
    }

    fn make(&self, kind: TokenKind, start: usize, end: usize) -> Token {
        Token::new(kind, &self.source[start..end], start as u32, end as u32)
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

// ===== Character scanning helpers =====

fn peek(bytes: &[u8], i: usize) -> u8 {
    bytes.get(i).copied().unwrap_or(0)
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_char(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes.get(from..)?.iter().position(|&b| b == needle).map(|p| p + from)
}

fn find_seq(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Number of consecutive backslashes immediately before `at`, not reaching past `floor`.
fn backslashes_before(bytes: &[u8], at: usize, floor: usize) -> usize {
    let mut count = 0;
    let mut k = at;
    while k > floor && bytes[k - 1] == b'\\' {
        count += 1;
        k -= 1;
    }
    count
}

/// Scan a `"..."` literal whose opening quote is at `open`. Returns the offset
/// just past the closing quote, or `None` if the logical line ends first.
fn scan_string(bytes: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' if backslashes_before(bytes, i, open + 1) % 2 == 0 => return Some(i + 1),
            b'\n' if backslashes_before(bytes, i, open + 1) % 2 == 0 => return None,
            _ => i += 1,
        }
    }
    None
}

/// Scan a `'...'` literal. Character literals never span lines.
fn scan_char(bytes: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() && bytes[i] != b'\n' {
        if bytes[i] == b'\'' && backslashes_before(bytes, i, open + 1) % 2 == 0 {
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// Scan `R"delim(...)delim"`, where `open` is the position of the quote.
fn scan_raw_string(bytes: &[u8], open: usize) -> Option<usize> {
    let paren = find_byte(bytes, open + 1, b'(')?;
    let delimiter = &bytes[open + 1..paren];
    if delimiter.iter().any(|&b| is_space(b) || b == b')' || b == b'\\') {
        return scan_string(bytes, open);
    }
    let mut closing = Vec::with_capacity(delimiter.len() + 2);
    closing.push(b')');
    closing.extend_from_slice(delimiter);
    closing.push(b'"');
    find_seq(bytes, paren + 1, &closing).map(|p| p + closing.len())
}

/// Consume the rest of a decimal or floating literal, including its suffix.
fn scan_number_tail(bytes: &[u8], mut i: usize, mut float: bool) -> usize {
    loop {
        let b = peek(bytes, i);
        if b.is_ascii_digit() {
            i += 1;
        } else if b == b'.' {
            float = true;
            i += 1;
        } else if (b == b'e' || b == b'E') && !float_exponent_done(bytes, i) {
            float = true;
            i += 1;
            if matches!(peek(bytes, i), b'+' | b'-') {
                i += 1;
            }
        } else {
            break;
        }
    }
    if float {
        scan_suffix(bytes, i, &["l", "f"])
    } else {
        scan_suffix(bytes, i, INTEGER_SUFFIXES)
    }
}

// An exponent marker must be followed by a digit or sign to belong to the number.
fn float_exponent_done(bytes: &[u8], i: usize) -> bool {
    let next = peek(bytes, i + 1);
    !(next.is_ascii_digit() || next == b'+' || next == b'-')
}

fn scan_suffix(bytes: &[u8], i: usize, suffixes: &[&str]) -> usize {
    if !peek(bytes, i).is_ascii_alphabetic() {
        return i;
    }
    for suffix in suffixes {
        let len = suffix.len();
        if let Some(candidate) = bytes.get(i..i + len) {
            if candidate.eq_ignore_ascii_case(suffix.as_bytes()) {
                return i + len;
            }
        }
    }
    i
}

/// The directive word after `#` and optional horizontal whitespace.
fn directive_keyword(source: &str, hash: usize) -> &str {
    let rest = &source[hash + 1..];
    let rest = rest.trim_start_matches([' ', '\t']);
    let len = rest
        .bytes()
        .position(|b| !(b.is_ascii_alphanumeric() || b == b'_'))
        .unwrap_or(rest.len());
    &rest[..len]
}

fn skip_to_keyword_end(bytes: &[u8], hash: usize) -> usize {
    let mut i = hash + 1;
    while matches!(peek(bytes, i), b' ' | b'\t') {
        i += 1;
    }
    while peek(bytes, i).is_ascii_alphanumeric() || peek(bytes, i) == b'_' {
        i += 1;
    }
    i
}

/// Find the end of a directive starting at `hash`. Block comments and quoted
/// strings inside the directive are stepped over; a trailing backslash
/// continues the directive onto the next line. A line comment ends it.
///
/// Returns `Err(offset)` for an unterminated block comment.
fn scan_directive(bytes: &[u8], hash: usize) -> Result<usize, usize> {
    let mut i = hash + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                let continued = (i > 0 && bytes[i - 1] == b'\\')
                    || (i > 1 && bytes[i - 1] == b'\r' && bytes[i - 2] == b'\\');
                if !continued {
                    return Ok(i);
                }
                i += 1;
            }
            b'/' if peek(bytes, i + 1) == b'/' => return Ok(i),
            b'/' if peek(bytes, i + 1) == b'*' => match find_seq(bytes, i + 2, b"*/") {
                Some(close) => i = close + 2,
                None => return Err(i),
            },
            b'"' => i = scan_string(bytes, i).unwrap_or(i + 1),
            _ => i += 1,
        }
    }
    Ok(bytes.len())
}

/// Conditions that are known to be false without evaluating macros.
fn is_always_false(keyword: &str, directive: &str) -> bool {
    let expression = directive
        .trim_start_matches('#')
        .trim_start()
        .trim_start_matches(keyword);
    let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
    match keyword {
        "if" => {
            let mut expr = compact.as_str();
            while let Some(inner) = expr.strip_prefix('(').and_then(|e| e.strip_suffix(')')) {
                expr = inner;
            }
            matches!(
                expr,
                "0" | "false" | "__OBJC__" | "defined(__OBJC__)" | "defined__OBJC__"
            )
        }
        "ifdef" => compact == "__OBJC__",
        _ => false,
    }
}
