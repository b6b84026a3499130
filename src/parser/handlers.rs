//! Keyword handlers that do not open a class or template
//!
//! - `namespace`: pushes names for the enclosing brace scope
//! - `using`: namespace imports and type aliases
//! - `typedef`: including function pointer and array typedefs
//! - `friend`, `virtual`, `const`, `explicit` and the access specifiers

use crate::parser::ast::*;
use crate::parser::keywords;
use crate::parser::lexer::{Token, TokenKind};
use crate::parser::parse::{Builder, Error, ParseError};
use crate::parser::types;
use tracing::debug;

impl<'a> Builder<'a> {
    /// `namespace [A[::B...]] { ... }` or `namespace X = Y;`. Produces no
    /// node; the names stay on the stack until the matching `}`.
    pub(crate) fn handle_namespace(&mut self) -> Result<Option<Node>, Error> {
        let mut token = self.next_token()?;
        let mut names = Vec::new();
        if token.kind == TokenKind::Name {
            names.push(Namespace::Named(token.text.clone()));
            token = self.next_token()?;
            while token.is_syntax("::") {
                let segment = self.next_token()?;
                if segment.is("inline") {
                    continue;
                }
                names.push(Namespace::Named(segment.text));
                token = self.next_token()?;
            }
        }
        if token.kind != TokenKind::Syntax {
            return Err(self.unexpected(&token, "expected '{' or '=' after a namespace name"));
        }

        if token.is("=") {
            let (target, next) = self.get_name()?;
            self.expect_syntax(&next, ";")?;
            debug!(file = %self.filename, alias = %join_texts(&target, ""), "ignoring namespace alias");
            return Ok(None);
        }

        self.expect_syntax(&token, "{")?;
        if names.is_empty() {
            names.push(Namespace::Anonymous);
        }
        self.namespaces.push(names.len());
        self.namespace_stack.extend(names);
        Ok(None)
    }

    /// `using namespace X;` becomes a [`Using`]; every other form is an alias
    /// and becomes a [`Typedef`].
    pub(crate) fn handle_using(&mut self) -> Result<Node, Error> {
        let tokens = self.tokens_up_to(";")?;
        let first = tokens
            .first()
            .cloned()
            .ok_or_else(|| ParseError::malformed("empty using declaration"))?;

        if first.is("namespace") {
            return Ok(Node::Using(Using {
                start: first.start,
                end: first.end,
                names: tokens,
            }));
        }

        let (name, alias) = match tokens.iter().position(|t| t.is("=")) {
            Some(eq) => (join_texts(&tokens[..eq], ""), types::to_type(&tokens[eq + 1..])),
            None => {
                let alias = types::to_type(&tokens);
                let name = alias.first().map(|t| t.name.clone()).unwrap_or_default();
                (name, alias)
            }
        };
        Ok(Node::Typedef(Typedef {
            start: first.start,
            end: first.end,
            name,
            alias: alias.into_iter().map(Node::Type).collect(),
            namespace: self.namespace_stack.clone(),
        }))
    }

    pub(crate) fn handle_typedef(&mut self) -> Result<Node, Error> {
        let token = self.next_token()?;
        let mut lead = None;
        let mut tokens = Vec::new();

        if token.kind == TokenKind::Name && keywords::is_builtin_other_modifiers(&token.text) {
            let kind = match token.text.as_str() {
                "enum" => None,
                "union" => Some(ClassKind::Union),
                "struct" => Some(ClassKind::Struct),
                _ => Some(ClassKind::Class),
            };
            self.handling_typedef = true;
            let result = match kind {
                Some(kind) => self.handle_class(kind, token),
                None => self.handle_enum(),
            };
            self.handling_typedef = false;
            lead = Some(result?);
        } else {
            tokens.push(token);
        }
        tokens.extend(self.tokens_up_to(";")?);

        let mut name = tokens
            .pop()
            .ok_or_else(|| ParseError::malformed("typedef without a name"))?;

        if name.is(")") {
            // function type: the name is just before the trailing parameter list
            tokens.push(name);
            let (start, end, found) = function_typedef_name(&tokens)
                .ok_or_else(|| ParseError::malformed("unbalanced parentheses in typedef"))?;
            name = found;
            tokens.drain(start..=end);
        } else if name.is("]") && tokens.len() + usize::from(lead.is_some()) >= 2 {
            // array: `typedef int Name[N];`
            tokens.push(name);
            let index = if lead.is_some() { 0 } else { 1 };
            name = tokens.remove(index);
        }

        let mut alias: Vec<Node> = lead.into_iter().collect();
        alias.extend(types::to_type(&tokens).into_iter().map(Node::Type));
        Ok(Node::Typedef(Typedef {
            start: name.start,
            end: name.end,
            name: name.text,
            alias,
            namespace: self.namespace_stack.clone(),
        }))
    }

    /// `friend class X;` or a friend function declaration.
    pub(crate) fn handle_friend(&mut self) -> Result<Node, Error> {
        let (mut tokens, last) = self.var_tokens_up_to(false, &["(", ";"])?;
        let entity = if last.is("(") {
            tokens.push(last);
            self.push_back_all(tokens);
            let mut token = self.next_token()?;
            while token.is("inline") || token.is("typename") || token.is("::") {
                token = self.next_token()?;
            }
            let position = token.clone();
            self.generate_one(token)?
                .ok_or_else(|| self.unexpected(&position, "expected a friend declaration"))?
        } else {
            if tokens.first().is_some_and(|t| t.is("class") || t.is("struct")) {
                tokens.remove(0);
            }
            let friend = types::to_type(&tokens)
                .into_iter()
                .next()
                .ok_or_else(|| self.unexpected(&last, "expected a friend type"))?;
            Node::Type(friend)
        };

        let (start, end) = entity.span();
        Ok(Node::Friend(Friend {
            start,
            end,
            entity: Box::new(entity),
            namespace: self.namespace_stack.clone(),
        }))
    }

    /// What follows `virtual` must be a method.
    pub(crate) fn handle_virtual(&mut self) -> Result<Node, Error> {
        let mut token = self.next_token()?;
        if token.is("inline") {
            token = self.next_token()?;
        }
        if token.is_syntax("~") {
            return self.get_method(FunctionModifier::Virtual | FunctionModifier::Dtor, None);
        }
        let mut tokens = self.tokens_up_to("(")?;
        tokens.insert(0, token);
        self.build_method(tokens, FunctionModifier::Virtual.into(), None, false)
    }

    /// Reached for `const struct {...} x;`, where the struct handler needs
    /// to know the instance is const.
    pub(crate) fn handle_const(&mut self) -> Result<Option<Node>, Error> {
        self.handling_const = true;
        let result = self.next_token().and_then(|token| self.generate_one(token));
        self.handling_const = false;
        result
    }

    pub(crate) fn handle_access(&mut self, keyword: &Token) -> Result<Option<Node>, Error> {
        if self.in_class.is_none() {
            return Err(self.unexpected(keyword, "access specifier outside a class"));
        }
        Ok(None)
    }

    /// `explicit` always introduces a constructor.
    pub(crate) fn handle_explicit(&mut self, keyword: &Token) -> Result<Node, Error> {
        if self.in_class.is_none() {
            return Err(self.unexpected(keyword, "explicit outside a class"));
        }
        self.get_method(FunctionModifier::Ctor.into(), None)
    }
}

/// Locate the name in a function typedef such as `void (*Name)(int)` or
/// `int Name(char)`. Returns the range to remove and the name token.
fn function_typedef_name(tokens: &[Token]) -> Option<(usize, usize, Token)> {
    let mut end = tokens.len().checked_sub(2)?;
    let mut depth = 1;
    while depth > 0 {
        let token = tokens.get(end)?;
        if token.is("(") {
            depth -= 1;
        } else if token.is(")") {
            depth += 1;
        }
        end = end.checked_sub(1)?;
    }

    let mut start = end;
    if tokens[start].is(")") {
        let name = tokens.get(start.checked_sub(1)?)?.clone();
        while !tokens[start].is("(") {
            start = start.checked_sub(1)?;
        }
        Some((start, end, name))
    } else {
        Some((start, end, tokens[start].clone()))
    }
}
