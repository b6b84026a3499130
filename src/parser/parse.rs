//! Main builder coordinator
//!
//! This module provides the [`Builder`] struct and core infrastructure,
//! including error types, token queue helpers, and the top-level generation
//! loop.
//!
//! # Builder Architecture
//!
//! The Builder is a heuristic recursive-descent parser over a lazy token
//! stream, organized as follows:
//! - This module: Builder struct, pushback queue, bracket matching, and the
//!   brace-driven namespace bookkeeping of the top-level loop
//! - `declarations`: per-token dispatch, variables, functions and methods
//! - `classes`: class/struct/union/enum bodies, base lists and templates
//! - `handlers`: namespace, using, typedef, friend and the other keywords
//! - `directives`: `#include`, `#define` and `#undef`
//!
//! # Implementation
//!
//! Builder methods are split across multiple files using `impl Builder`
//! blocks, allowing each module to extend the Builder with related
//! functionality while maintaining access to the shared builder state.
//!
//! Lookahead uses a LIFO pushback queue: [`Builder::push_back`] returns one
//! token, [`Builder::push_back_all`] returns a run so that it is read again in
//! its original order. Class bodies are parsed by a fresh nested builder over
//! the body's tokens, seeded with the enclosing namespace path.

use crate::options::BuildOptions;
use crate::parser::ast::{NamespacePath, Node};
use crate::parser::lexer::{LexError, Lexer, Token, TokenKind};
use crate::source::SourceFiles;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::trace;

/// Parser error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected token {token}: {message}")]
    UnexpectedToken {
        token: Token,
        message: String,
        /// Tokens waiting in the pushback queue, next first.
        context: Vec<Token>,
    },
    #[error("unexpected end of input: {message}")]
    UnexpectedEof { message: String },
    #[error("malformed declaration: {message}")]
    Malformed { message: String },
}

impl ParseError {
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::UnexpectedToken { token, .. } => Some(token.start as usize),
            _ => None,
        }
    }

    pub(crate) fn eof(message: impl Into<String>) -> Self {
        ParseError::UnexpectedEof {
            message: message.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ParseError::Malformed {
            message: message.into(),
        }
    }
}

/// Any failure while turning source text into nodes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Tokenize(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Error {
    /// Byte offset of the failure in the normalized source, when known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::Tokenize(e) => Some(e.offset()),
            Error::Parse(e) => e.offset(),
        }
    }
}

const CONTEXT_TOKENS: usize = 8;

// ===== Token sources =====

/// Anything tokens can be pulled from one at a time.
pub(crate) trait TokenSource {
    fn pull(&mut self) -> Result<Option<Token>, Error>;
}

/// A token source over an already collected run.
pub(crate) struct SliceTokens<'t> {
    tokens: &'t [Token],
    position: usize,
}

impl<'t> SliceTokens<'t> {
    pub(crate) fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }
}

impl TokenSource for SliceTokens<'_> {
    fn pull(&mut self) -> Result<Option<Token>, Error> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        Ok(token)
    }
}

/// Read through the `close` that balances an already consumed `open`. The
/// closing token is the last element of the result.
pub(crate) fn read_matching<S>(source: &mut S, open: &str, close: &str) -> Result<Vec<Token>, Error>
where
    S: TokenSource + ?Sized,
{
    let mut tokens = Vec::new();
    let mut depth = 1usize;
    while depth > 0 {
        let token = source
            .pull()?
            .ok_or_else(|| ParseError::eof(format!("expected '{}' to close '{}'", close, open)))?;
        if token.kind == TokenKind::Syntax {
            if token.text == open {
                depth += 1;
            } else if token.text == close {
                depth -= 1;
            }
        }
        tokens.push(token);
    }
    Ok(tokens)
}

/// Read a possibly qualified, possibly templated name such as
/// `std::vector<int>::iterator`. Stops before a second bare name in a row.
/// Returns the name tokens and the token that ended the name.
pub(crate) fn read_name<S>(source: &mut S) -> Result<(Vec<Token>, Option<Token>), Error>
where
    S: TokenSource + ?Sized,
{
    let mut tokens = Vec::new();
    let mut last_was_name = false;
    let mut next = source.pull()?;
    while let Some(token) = next.take() {
        let continues = token.kind == TokenKind::Name
            || (token.kind == TokenKind::Syntax && (token.text == "::" || token.text == "<"));
        if !continues || (last_was_name && token.kind == TokenKind::Name) {
            next = Some(token);
            break;
        }
        last_was_name = token.kind == TokenKind::Name;
        let opens_template = token.text == "<";
        tokens.push(token);
        if opens_template {
            tokens.extend(read_matching(source, "<", ">")?);
            last_was_name = true;
        }
        next = source.pull()?;
    }
    Ok((tokens, next))
}

type TokenStream<'a> = Box<dyn Iterator<Item = Result<Token, LexError>> + 'a>;

static DEFAULT_OPTIONS: BuildOptions = BuildOptions::new();

/// Declaration-level AST builder over one token stream.
///
/// Yields top-level nodes lazily; stops after the first error.
pub struct Builder<'a> {
    tokens: TokenStream<'a>,
    pub(crate) queue: Vec<Token>,
    pub(crate) filename: String,
    pub(crate) options: &'a BuildOptions,
    pub(crate) files: Option<&'a dyn SourceFiles>,
    pub(crate) namespace_stack: NamespacePath,
    /// One entry per open brace: how many namespace names it pushed.
    pub(crate) namespaces: Vec<usize>,
    /// Names of function-like macros seen so far.
    pub(crate) defines: FxHashSet<String>,
    pub(crate) in_class: Option<String>,
    pub(crate) handling_typedef: bool,
    pub(crate) handling_const: bool,
    finished: bool,
}

impl Builder<'static> {
    /// Build from source text with default options.
    pub fn new(source: &str, filename: &str) -> Self {
        Builder::with_options(source, filename, &DEFAULT_OPTIONS)
    }
}

impl<'a> Builder<'a> {
    pub fn with_options(source: &str, filename: &str, options: &'a BuildOptions) -> Self {
        Builder::from_stream(Box::new(Lexer::new(source)), filename, options)
    }

    /// Build from an already tokenized run.
    pub fn from_tokens<I>(tokens: I, filename: &str, options: &'a BuildOptions) -> Self
    where
        I: IntoIterator<Item = Token>,
        I::IntoIter: 'a,
    {
        Builder::from_stream(Box::new(tokens.into_iter().map(Ok)), filename, options)
    }

    fn from_stream(tokens: TokenStream<'a>, filename: &str, options: &'a BuildOptions) -> Self {
        Self {
            tokens,
            queue: Vec::new(),
            filename: filename.to_string(),
            options,
            files: None,
            namespace_stack: Vec::new(),
            namespaces: Vec::new(),
            defines: FxHashSet::default(),
            in_class: None,
            handling_typedef: false,
            handling_const: false,
            finished: false,
        }
    }

    /// Use `files` to decide whether included headers are system headers.
    pub fn with_source_files(mut self, files: &'a dyn SourceFiles) -> Self {
        self.files = Some(files);
        self
    }

    /// A builder for a class body. The body's closing `}` is expected as its
    /// last token, so one brace marker is pre-seeded.
    pub(crate) fn nested(&self, body: Vec<Token>, class_name: &str) -> Builder<'a> {
        trace!(file = %self.filename, class = class_name, tokens = body.len(), "entering class body");
        let mut builder = Builder::from_tokens(body, &self.filename, self.options);
        builder.files = self.files;
        builder.namespace_stack = self.namespace_stack.clone();
        builder.defines = self.defines.clone();
        builder.in_class = Some(class_name.to_string());
        builder.namespaces.push(0);
        builder
    }

    // ===== Helper methods =====

    pub(crate) fn try_next_token(&mut self) -> Result<Option<Token>, Error> {
        if let Some(token) = self.queue.pop() {
            return Ok(Some(token));
        }
        self.tokens.next().transpose().map_err(Error::from)
    }

    pub(crate) fn next_token(&mut self) -> Result<Token, Error> {
        self.try_next_token()?
            .ok_or_else(|| ParseError::eof("expected more tokens").into())
    }

    pub(crate) fn push_back(&mut self, token: Token) {
        self.queue.push(token);
    }

    /// Return a run of tokens so they are read again in their original order.
    pub(crate) fn push_back_all(&mut self, tokens: Vec<Token>) {
        self.queue.extend(tokens.into_iter().rev());
    }

    pub(crate) fn unexpected(&self, token: &Token, message: impl Into<String>) -> Error {
        ParseError::UnexpectedToken {
            token: token.clone(),
            message: message.into(),
            context: self.queue.iter().rev().take(CONTEXT_TOKENS).cloned().collect(),
        }
        .into()
    }

    pub(crate) fn expect_syntax(&self, token: &Token, text: &str) -> Result<(), Error> {
        if token.is_syntax(text) {
            Ok(())
        } else {
            Err(self.unexpected(token, format!("expected '{}'", text)))
        }
    }

    /// Tokens before the next `expected`, which is consumed.
    pub(crate) fn tokens_up_to(&mut self, expected: &str) -> Result<Vec<Token>, Error> {
        Ok(self.var_tokens_up_to(false, &[expected])?.0)
    }

    pub(crate) fn ignore_up_to(&mut self, expected: &str) -> Result<(), Error> {
        self.tokens_up_to(expected).map(|_| ())
    }

    /// Collect tokens up to the first syntax token in `expected` that is not
    /// nested in `[...]` (or in `<...>` when `skip_bracket_content` is set).
    /// Returns the collected run and the terminating token.
    ///
    /// Preprocessor tokens are dropped, and so are invocations of known
    /// function-like macros together with their arguments.
    pub(crate) fn var_tokens_up_to(
        &mut self,
        skip_bracket_content: bool,
        expected: &[&str],
    ) -> Result<(Vec<Token>, Token), Error> {
        let mut skip_angles = skip_bracket_content;
        let mut last = self.next_token()?;
        let mut tokens = Vec::new();
        let mut square_depth = 0i32;
        let mut angle_depth = 0i32;

        while square_depth != 0
            || angle_depth != 0
            || last.kind != TokenKind::Syntax
            || !expected.contains(&last.text.as_str())
        {
            match last.text.as_str() {
                "[" => square_depth += 1,
                "]" => square_depth -= 1,
                _ => {}
            }
            if skip_angles && square_depth == 0 {
                match last.text.as_str() {
                    "operator" => skip_angles = false,
                    // a `<` in the initializer is a comparison
                    "=" if angle_depth == 0 => skip_angles = false,
                    "<" if last.kind == TokenKind::Syntax => angle_depth += 1,
                    ">" if last.kind == TokenKind::Syntax => angle_depth = (angle_depth - 1).max(0),
                    _ => {}
                }
            }

            let mut next = self.next_token()?;
            if next.is_syntax("(") && last.is_name() && self.defines.contains(&last.text) {
                trace!(file = %self.filename, name = %last.text, "skipping macro invocation");
                self.parameters()?;
                next = self.next_token()?;
            } else if !last.is_preprocessor() {
                tokens.push(last);
            }
            last = next;
        }
        Ok((tokens, last))
    }

    /// Like [`Builder::var_tokens_up_to`], but keeps reading through the
    /// signature inside `std::function<R(Args)>`.
    pub(crate) fn var_tokens_up_to_with_function(
        &mut self,
        skip_bracket_content: bool,
        expected: &[&str],
    ) -> Result<(Vec<Token>, Token), Error> {
        let (mut tokens, mut last) = self.var_tokens_up_to(skip_bracket_content, expected)?;
        let count = |text: &str| tokens.iter().filter(|t| t.text == text).count();
        let unbalanced = count("<") != count(">");
        let single_function = count("function") == 1;
        if expected.contains(&"(") && unbalanced && single_function && last.is_syntax("(") {
            let opens_template = tokens
                .iter()
                .position(|t| t.text == "function")
                .and_then(|i| tokens.get(i + 1))
                .is_some_and(|t| t.text == "<");
            if opens_template {
                let (rest, new_last) = self.var_tokens_up_to(false, &["(", ";"])?;
                tokens.push(last);
                tokens.extend(rest);
                last = new_last;
            }
        }
        Ok((tokens, last))
    }

    pub(crate) fn matching(&mut self, open: &str, close: &str) -> Result<Vec<Token>, Error> {
        read_matching(self, open, close)
    }

    /// Tokens through the `)` matching an already consumed `(`.
    pub(crate) fn parameters(&mut self) -> Result<Vec<Token>, Error> {
        self.matching("(", ")")
    }

    /// Tokens through the `}` matching an already consumed `{`.
    pub(crate) fn scope(&mut self) -> Result<Vec<Token>, Error> {
        self.matching("{", "}")
    }

    /// Read a qualified name and the token following it.
    pub(crate) fn get_name(&mut self) -> Result<(Vec<Token>, Token), Error> {
        let (tokens, next) = read_name(self)?;
        let next = next.ok_or_else(|| ParseError::eof("expected a token after a name"))?;
        Ok((tokens, next))
    }

    /// One step of the top-level loop.
    fn generate_next(&mut self) -> Result<Option<Node>, Error> {
        while let Some(token) = self.try_next_token()? {
            if token.is_syntax("{") {
                self.namespaces.push(0);
                continue;
            }
            if token.is_syntax("}") {
                if let Some(pushed) = self.namespaces.pop() {
                    let keep = self.namespace_stack.len().saturating_sub(pushed);
                    self.namespace_stack.truncate(keep);
                }
                continue;
            }
            if let Some(node) = self.generate_one(token)? {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }
}

impl TokenSource for Builder<'_> {
    fn pull(&mut self) -> Result<Option<Token>, Error> {
        self.try_next_token()
    }
}

impl Iterator for Builder<'_> {
    type Item = Result<Node, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.generate_next() {
            Ok(Some(node)) => Some(Ok(node)),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::tests::tokens;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_push_back_order() {
        let mut builder = Builder::new("a b c", "test.h");
        let a = builder.next_token().unwrap();
        let b = builder.next_token().unwrap();
        builder.push_back_all(vec![a, b]);
        let mut seen = Vec::new();
        while let Some(t) = builder.try_next_token().unwrap() {
            seen.push(t.text);
        }
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_var_tokens_up_to_skips_templates() {
        let mut builder = Builder::new("std::map<int, int(*)(char)> x; rest", "test.h");
        let (tokens, last) = builder.var_tokens_up_to(true, &["(", ";", "{"]).unwrap();
        assert_eq!(texts(&tokens).join(""), "std::map<int,int(*)(char)>x");
        assert_eq!(last.text, ";");
    }

    #[test]
    fn test_var_tokens_up_to_comparison_in_initializer() {
        let mut builder = Builder::new("const bool small = 1 < 2; int after;", "test.h");
        let (tokens, last) = builder.var_tokens_up_to(true, &["(", ";", "{"]).unwrap();
        assert_eq!(texts(&tokens), vec!["const", "bool", "small", "=", "1", "<", "2"]);
        assert_eq!(last.text, ";");
        assert_eq!(builder.next_token().unwrap().text, "int");
    }

    #[test]
    fn test_var_tokens_up_to_skips_macro_calls() {
        let mut builder = Builder::new("int DEPRECATED(\"x\") foo;", "test.h");
        builder.defines.insert("DEPRECATED".to_string());
        let (tokens, last) = builder.var_tokens_up_to(true, &["(", ";"]).unwrap();
        assert_eq!(texts(&tokens), vec!["int", "foo"]);
        assert_eq!(last.text, ";");
    }

    #[test]
    fn test_matching_nested() {
        let mut builder = Builder::new("a (b) c) d", "test.h");
        let tokens = builder.parameters().unwrap();
        assert_eq!(texts(&tokens), vec!["a", "(", "b", ")", "c", ")"]);
        assert_eq!(builder.next_token().unwrap().text, "d");
    }

    #[test]
    fn test_matching_eof_is_error() {
        let mut builder = Builder::new("a ( b", "test.h");
        let err = builder.parameters().unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_read_name_stops_at_second_name() {
        let run = tokens("std::vector<Foo<int>>::iterator it = x");
        let mut source = SliceTokens::new(&run);
        let (name, next) = read_name(&mut source).unwrap();
        assert_eq!(texts(&name).join(""), "std::vector<Foo<int>>::iterator");
        assert_eq!(next.map(|t| t.text).as_deref(), Some("it"));
    }

    #[test]
    fn test_unexpected_carries_queue_context() {
        let mut builder = Builder::new("x", "test.h");
        let token = builder.next_token().unwrap();
        builder.push_back(Token::new(TokenKind::Syntax, ";", 1, 2));
        match builder.unexpected(&token, "boom") {
            Error::Parse(ParseError::UnexpectedToken { context, .. }) => {
                assert_eq!(texts(&context), vec![";"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
