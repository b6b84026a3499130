//! Declaration parsing implementation
//!
//! This module handles everything that starts with an ordinary name or a
//! builtin type:
//!
//! - Keyword dispatch: `class`, `template`, `namespace`, ... to their handlers
//! - Variables: `int x = 5;`, `std::map<K, V> table;`
//! - Functions and methods: `Ret name(params) tail-modifiers body-or-;`
//! - Function-pointer variables: `void (*callback)(int);`
//!
//! # Shape of a function
//!
//! ```text
//! function ::= return_type name "(" params ")" tail* [-> type] [":" inits] ("{" body "}" | "= 0" ";" | ";")
//! tail     ::= const | override | final | noexcept[(..)] | throw(..) | __attribute__(..) | UPPER_CASE[(..)]
//! ```
//!
//! All methods are implemented as `pub(crate)` methods on the [`Builder`] struct.

use crate::parser::ast::*;
use crate::parser::keywords;
use crate::parser::lexer::{Token, TokenKind};
use crate::parser::parse::{read_name, Builder, Error, ParseError, SliceTokens};
use crate::parser::types;
use indexmap::IndexMap;
use tracing::{debug, trace};

/// What a keyword at the start of a construct is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handler {
    Class(ClassKind),
    Enum,
    Const,
    Virtual,
    Access,
    Friend,
    Typedef,
    Template,
    Namespace,
    Using,
    Explicit,
    /// `inline`, `extern`, `typename` and `operator` carry no structure of their own.
    Ignored,
}

impl Handler {
    /// Keywords without a handler (`return`, `sizeof`, casts, ...) are not
    /// expected at declaration level.
    pub(crate) fn for_keyword(text: &str) -> Option<Handler> {
        let handler = match text {
            "class" => Handler::Class(ClassKind::Class),
            "struct" => Handler::Class(ClassKind::Struct),
            "union" => Handler::Class(ClassKind::Union),
            "enum" => Handler::Enum,
            "const" => Handler::Const,
            "virtual" => Handler::Virtual,
            "public" | "protected" | "private" => Handler::Access,
            "friend" => Handler::Friend,
            "typedef" => Handler::Typedef,
            "template" => Handler::Template,
            "namespace" => Handler::Namespace,
            "using" => Handler::Using,
            "explicit" => Handler::Explicit,
            "inline" | "extern" | "typename" | "operator" => Handler::Ignored,
            _ => return None,
        };
        Some(handler)
    }
}

fn synthetic_semicolon() -> Token {
    Token::new(TokenKind::Syntax, ";", 0, 0)
}

impl<'a> Builder<'a> {
    /// Turn one token (and whatever follows it) into at most one node.
    pub(crate) fn generate_one(&mut self, token: Token) -> Result<Option<Node>, Error> {
        match token.kind {
            TokenKind::Name => {
                if keywords::is_keyword(&token.text) && !keywords::is_builtin_type(&token.text) {
                    let handler = Handler::for_keyword(&token.text)
                        .ok_or_else(|| self.unexpected(&token, "keyword not expected here"))?;
                    return self.run_handler(handler, token);
                }
                self.handle_declaration(token)
            }
            TokenKind::Syntax if token.is("~") && self.in_class.is_some() => {
                let name = self.next_token()?;
                let node = self.build_method(vec![name], FunctionModifier::Dtor.into(), None, true)?;
                Ok(Some(node))
            }
            TokenKind::Preprocessor => self.handle_directive(&token),
            _ => Ok(None),
        }
    }

    pub(crate) fn run_handler(&mut self, handler: Handler, keyword: Token) -> Result<Option<Node>, Error> {
        match handler {
            Handler::Class(kind) => self.handle_class(kind, keyword).map(Some),
            Handler::Enum => self.handle_enum().map(Some),
            Handler::Const => self.handle_const(),
            Handler::Virtual => self.handle_virtual().map(Some),
            Handler::Access => self.handle_access(&keyword),
            Handler::Friend => self.handle_friend().map(Some),
            Handler::Typedef => self.handle_typedef().map(Some),
            Handler::Template => self.handle_template(),
            Handler::Namespace => self.handle_namespace(),
            Handler::Using => self.handle_using().map(Some),
            Handler::Explicit => self.handle_explicit(&keyword).map(Some),
            Handler::Ignored => Ok(None),
        }
    }

    /// A construct led by an ordinary name or builtin type.
    fn handle_declaration(&mut self, first: Token) -> Result<Option<Node>, Error> {
        if self.defines.contains(&first.text) {
            match self.try_next_token()? {
                Some(open) if open.is_syntax("(") => {
                    trace!(file = %self.filename, name = %first.text, "skipping macro invocation");
                    self.parameters()?;
                    return Ok(None);
                }
                Some(other) => self.push_back(other),
                None => {}
            }
        }

        let (mut temp, mut last) = self.var_tokens_up_to(true, &["(", ";", "{"])?;
        temp.insert(0, first);

        if last.is_syntax("(") || last.is_syntax("{") {
            match temp.last().map(|t| t.text.as_str()) {
                Some("static_assert") => {
                    debug!(file = %self.filename, "skipping static_assert");
                    self.ignore_up_to(";")?;
                    return Ok(None);
                }
                Some("__declspec") => {
                    self.parameters()?;
                    return Ok(None);
                }
                Some("__attribute__") => {
                    self.parameters()?;
                    let (more, new_last) = self.var_tokens_up_to(true, &["(", ";", "{"])?;
                    temp.pop();
                    temp.extend(more);
                    last = new_last;
                }
                _ => {}
            }

            // An assignment before the paren makes the paren part of an expression.
            let assignment = temp
                .iter()
                .enumerate()
                .rev()
                .any(|(i, t)| t.is("=") && !(i > 0 && temp[i - 1].is("operator")));
            if assignment {
                temp.push(last);
                let (more, new_last) = self.var_tokens_up_to(false, &[";"])?;
                temp.extend(more);
                last = new_last;
            }
        }

        if last.is_syntax(";") {
            return self.get_variable(&temp).map(Some);
        }

        if last.is_syntax("{") {
            self.push_back(last);
            let mut rest = temp.into_iter();
            let Some(head) = rest.next() else {
                return Ok(None);
            };
            self.push_back_all(rest.collect());
            return match Handler::for_keyword(&head.text) {
                Some(handler) => self.run_handler(handler, head),
                None => Ok(None),
            };
        }

        self.build_method(temp, FunctionModifiers::NONE, None, false).map(Some)
    }

    pub(crate) fn get_variable(&mut self, tokens: &[Token]) -> Result<Node, Error> {
        let first = tokens
            .first()
            .ok_or_else(|| ParseError::malformed("empty variable declaration"))?;
        let parts = types::declaration_to_parts(tokens, true);

        let declarator_end = tokens.iter().position(|t| t.is("=")).unwrap_or(tokens.len());
        let mut names: Vec<String> = tokens[..declarator_end].iter().map(|t| t.text.clone()).collect();
        if !parts.templated_types.is_empty() {
            if let Some((start, end)) = types::template_indices(&names) {
                names.drain(start..end);
            }
        }

        let var_type = Type::new(parts.type_name)
            .with_span(first.start, first.end)
            .with_templated_types(parts.templated_types)
            .with_modifiers(parts.modifiers)
            .with_markers(&names);
        let value = join_texts(&parts.default, "");
        Ok(self.variable(first, parts.name.unwrap_or_default(), var_type, value))
    }

    pub(crate) fn variable(&self, position: &Token, name: String, var_type: Type, value: String) -> Node {
        Node::VariableDeclaration(VariableDeclaration {
            start: position.start,
            end: position.end,
            name,
            var_type,
            initial_value: value,
            namespace: self.namespace_stack.clone(),
        })
    }

    /// Read the return type and name up to `(`, then build the function.
    pub(crate) fn get_method(
        &mut self,
        modifiers: FunctionModifiers,
        templated_types: Option<TemplateParams>,
    ) -> Result<Node, Error> {
        let (tokens, _) = self.var_tokens_up_to_with_function(false, &["("])?;
        self.build_method(tokens, modifiers, templated_types, false)
    }

    /// Build a function, method or function-pointer variable from its return
    /// type and name. The opening `(` has been consumed unless `get_paren`.
    pub(crate) fn build_method(
        &mut self,
        mut return_type_and_name: Vec<Token>,
        mut modifiers: FunctionModifiers,
        templated_types: Option<TemplateParams>,
        get_paren: bool,
    ) -> Result<Node, Error> {
        let mut specializations = Vec::new();
        if get_paren {
            let mut token = self.next_token()?;
            if token.is_syntax("<") {
                // templated destructor
                specializations = self.matching("<", ">")?;
                specializations.pop();
                token = self.next_token()?;
            }
            self.expect_syntax(&token, "(")?;
        }

        let mut name = return_type_and_name
            .pop()
            .ok_or_else(|| ParseError::malformed("function without a name"))?;
        let rtn = &mut return_type_and_name;
        let len = rtn.len();

        if len > 2 && rtn[len - 1].is(">") && rtn[len - 2].is("operator") && (name.is(">=") || name.is(">")) {
            if let Some(gt) = rtn.pop() {
                name = Token::new(TokenKind::Syntax, format!("{}{}", gt.text, name.text), gt.start, name.end);
            }
        }

        let ends_with = |rtn: &Vec<Token>, text: &str| rtn.last().is_some_and(|t| t.is(text));
        if rtn.len() > 1 && (ends_with(rtn, "operator") || ends_with(rtn, "~")) {
            if let Some(op) = rtn.pop() {
                name = Token::new(TokenKind::Name, format!("{}{}", op.text, name.text), op.start, name.end);
            }
        } else if name.is(">") {
            // templated constructor: Foo<T>(...)
            let mut depth = 1;
            let mut index = rtn.len();
            while depth > 0 && index > 0 {
                index -= 1;
                if rtn[index].is("<") {
                    depth -= 1;
                } else if rtn[index].is(">") {
                    depth += 1;
                }
            }
            specializations = rtn.split_off(index);
            if !specializations.is_empty() {
                specializations.remove(0);
            }
            name = rtn
                .pop()
                .ok_or_else(|| ParseError::malformed("template arguments without a name"))?;
        } else if name.is("]") && rtn.len() >= 2 {
            let split = rtn.len() - 2;
            let seq = rtn.split_off(split);
            name = Token::new(TokenKind::Name, format!("{}[]", seq[0].text), seq[0].start, name.end);
        }

        let mut return_type = return_type_and_name;
        let position = return_type.first().cloned().unwrap_or_else(|| name.clone());

        if self.in_class.as_deref() == Some(name.text.as_str()) && modifiers.is_empty() {
            modifiers |= FunctionModifier::Ctor;
        }

        let mut parameters = self.parameters()?;
        let closing = parameters
            .pop()
            .ok_or_else(|| ParseError::malformed("missing closing parenthesis"))?;

        if name.is("operator") && parameters.is_empty() {
            let token = self.next_token()?;
            self.expect_syntax(&token, "(")?;
            name = Token::new(TokenKind::Name, "operator()", name.start, closing.end);
            parameters = self.parameters()?;
            parameters.pop();
        }

        let mut token = self.next_or_semicolon()?;
        while token.is_name() || token.is_preprocessor() {
            let optional_parens;
            if token.is_preprocessor() {
                optional_parens = false;
            } else if token.is("const") || token.is("override") || token.is("final") {
                modifiers |= FunctionModifier::Specifier;
                optional_parens = false;
            } else if token.is("noexcept") {
                modifiers |= FunctionModifier::Specifier;
                optional_parens = true;
            } else if token.is("__attribute__") || token.is("throw") {
                modifiers |= if token.is("throw") {
                    FunctionModifier::Throw
                } else {
                    FunctionModifier::Attribute
                };
                let open = self.next_token()?;
                self.expect_syntax(&open, "(")?;
                self.parameters()?;
                optional_parens = false;
            } else if token.text == token.text.to_uppercase() {
                // assumed to be a macro
                modifiers |= FunctionModifier::UnknownAnnotation;
                optional_parens = true;
            } else {
                self.push_back(token);
                token = synthetic_semicolon();
                break;
            }

            token = self.next_or_semicolon()?;
            if optional_parens && token.is_syntax("(") {
                self.parameters()?;
                token = self.next_or_semicolon()?;
            }
        }

        // ref-qualifier
        if token.is("&") || token.is("&&") {
            token = self.next_token()?;
        }

        if token.is("->") {
            let (trailing, next) = self.var_tokens_up_to(false, &["{", ";"])?;
            return_type = trailing;
            token = next;
        }

        if token.is("}") || token.is_preprocessor() {
            self.push_back(token);
            token = synthetic_semicolon();
        }

        if token.kind != TokenKind::Syntax {
            return Err(self.unexpected(&token, "expected punctuation after a parameter list"));
        }

        let mut initializers = IndexMap::new();
        if token.is(":") {
            while !token.is(";") && !token.is("{") {
                let (member, next) = self.get_name()?;
                let member = member
                    .into_iter()
                    .next()
                    .ok_or_else(|| self.unexpected(&next, "expected a member name in an initializer list"))?;
                if next.is("(") || next.is("{") {
                    let close = if next.is("{") { "}" } else { ")" };
                    let values: Vec<Token> = self
                        .matching(&next.text, close)?
                        .into_iter()
                        .filter(|t| !t.is(",") && !t.is(close))
                        .collect();
                    initializers.insert(member.text, values);
                }
                token = self.next_token()?;
            }
        }

        if token.is("(") {
            // pointer to function: `Ret (*name)(args)`
            let mut markers: Vec<String> = return_type.iter().map(|t| t.text.clone()).collect();
            markers.extend(parameters.iter().map(|t| t.text.clone()));
            return_type.push(name);
            while parameters.last().is_some_and(|t| t.is("(") || t.is(")")) {
                parameters.pop();
            }
            // `(*name[N])`
            if parameters.last().is_some_and(|t| t.is("]")) {
                if let Some(open) = parameters.iter().rposition(|t| t.is("[")) {
                    parameters.truncate(open);
                }
            }
            let variable_name = parameters
                .last()
                .cloned()
                .ok_or_else(|| ParseError::malformed("function pointer without a name"))?;
            self.parameters()?;
            token = self.next_or_semicolon()?;

            if !token.is("{") {
                let default = if token.is("=") {
                    self.tokens_up_to(";")?
                } else {
                    Vec::new()
                };
                let var_type = Type::new(position.text.clone())
                    .with_span(position.start, position.end)
                    .with_markers(&markers);
                return Ok(self.variable(&position, variable_name.text, var_type, join_texts(&default, "")));
            }
            name = variable_name;
        }

        let body = if token.is("{") {
            let mut body = self.scope()?;
            body.pop();
            Some(body)
        } else {
            if token.is("=") {
                token = self.next_token()?;
                if token.is("0") {
                    modifiers |= FunctionModifier::PureVirtual;
                }
                token = self.next_or_semicolon()?;
            }

            if token.is("[") {
                self.matching("[", "]")?;
                token = self.next_or_semicolon()?;
            }

            if token.is("*") || token.is("&") {
                // the "parameters" were a declarator, e.g. `char (&name(args))[N]`
                let (rest, last) = self.var_tokens_up_to(false, &["(", ";"])?;
                let mut tokens = parameters;
                tokens.push(token);
                tokens.extend(rest);
                if last.is("(") {
                    return self.build_method(tokens, FunctionModifiers::NONE, None, false);
                }
                return self.get_variable(&tokens);
            }

            if !token.is(";") {
                return Err(self.unexpected(&token, "expected ';' after a function declaration"));
            }
            None
        };

        let function = Function {
            start: position.start,
            end: position.end,
            name: name.text,
            return_type: None,
            parameters: types::to_parameters(&parameters),
            specializations: types::to_type(&specializations),
            modifiers,
            templated_types,
            body,
            namespace: self.namespace_stack.clone(),
            initializers,
        };

        if return_type.len() > 1 && return_type.last().is_some_and(|t| t.is("::")) {
            let (return_type, in_class) = return_type_and_class_name(&return_type)?;
            return Ok(Node::Method(Method {
                function: Function {
                    return_type: types::create_return_type(&return_type),
                    ..function
                },
                in_class,
            }));
        }
        Ok(Node::Function(Function {
            return_type: types::create_return_type(&return_type),
            ..function
        }))
    }

    /// Next token, with end of input read as the end of the declaration.
    fn next_or_semicolon(&mut self) -> Result<Token, Error> {
        Ok(self.try_next_token()?.unwrap_or_else(synthetic_semicolon))
    }
}

/// Split `Ret::Type Class::` into the return type and the owning class. The
/// last qualified name is taken as the class, so a qualified return type
/// with no other separator is ambiguous.
pub(crate) fn return_type_and_class_name(seq: &[Token]) -> Result<(Vec<Token>, Vec<Token>), Error> {
    let end = seq.len().saturating_sub(1);
    let mut copy = seq[..end].to_vec();
    copy.push(Token::new(TokenKind::Syntax, "", 0, 0));

    let mut names: Vec<Vec<Token>> = Vec::new();
    let mut i = 0;
    while i < end {
        let mut source = SliceTokens::new(&copy[i..]);
        let (mut name, next) = read_name(&mut source)?;
        if let Some(next) = next.filter(|t| t.kind == TokenKind::Syntax) {
            name.push(next);
        }
        i += name.len().max(1);
        names.push(name);
    }

    let mut class_name = names.pop().unwrap_or_default();
    if class_name.last().is_some_and(|t| t.text.is_empty()) {
        class_name.pop();
    }
    let return_type = names.into_iter().flatten().collect();
    Ok((return_type, class_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::tests::tokens;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    fn parse(source: &str) -> Vec<Node> {
        Builder::new(source, "test.h").collect::<Result<Vec<_>, _>>().unwrap()
    }

    fn only_function(source: &str) -> Function {
        let nodes = parse(source);
        assert_eq!(nodes.len(), 1, "{:?}", nodes);
        match nodes.into_iter().next() {
            Some(Node::Function(f)) => f,
            other => panic!("expected a function, got {:?}", other),
        }
    }

    #[test]
    fn test_handler_table() {
        assert_eq!(Handler::for_keyword("struct"), Some(Handler::Class(ClassKind::Struct)));
        assert_eq!(Handler::for_keyword("private"), Some(Handler::Access));
        assert_eq!(Handler::for_keyword("inline"), Some(Handler::Ignored));
        assert_eq!(Handler::for_keyword("return"), None);
        assert_eq!(Handler::for_keyword("Foo"), None);
    }

    #[test]
    fn test_return_type_and_class_name() {
        let (rt, class) = return_type_and_class_name(&tokens("void Foo::")).unwrap();
        assert_eq!(texts(&rt), vec!["void"]);
        assert_eq!(texts(&class), vec!["Foo"]);

        let (rt, class) = return_type_and_class_name(&tokens("inline void EVM::VH<T>::")).unwrap();
        assert_eq!(texts(&rt), vec!["inline", "void"]);
        assert_eq!(texts(&class).join(""), "EVM::VH<T>");

        let (rt, class) = return_type_and_class_name(&tokens("Foo* Bar::")).unwrap();
        assert_eq!(texts(&rt), vec!["Foo", "*"]);
        assert_eq!(texts(&class), vec!["Bar"]);
    }

    #[test]
    fn test_qualified_return_type_and_class() {
        let (rt, class) = return_type_and_class_name(&tokens("ns::Result outer::Widget::")).unwrap();
        assert_eq!(texts(&rt).join(""), "ns::Result");
        assert_eq!(texts(&class).join(""), "outer::Widget");
    }

    #[test]
    fn test_last_name_is_class() {
        // With nothing separating them, a qualified chain is all class.
        let (rt, class) = return_type_and_class_name(&tokens("ns::Result::Widget::")).unwrap();
        assert!(rt.is_empty());
        assert_eq!(texts(&class).join(""), "ns::Result::Widget");
    }

    #[test]
    fn test_function_declaration() {
        let f = only_function("int add(int a, int b);");
        assert_eq!(f.name, "add");
        assert_eq!(f.return_type.as_ref().map(|t| t.name.as_str()), Some("int"));
        assert_eq!(f.parameters.len(), 2);
        assert!(f.body.is_none());
        assert!(f.is_declaration());
    }

    #[test]
    fn test_function_definition_body_is_flat() {
        let f = only_function("void run() { if (x) { y(); } }");
        let body = f.body.unwrap();
        assert_eq!(texts(&body), vec!["if", "(", "x", ")", "{", "y", "(", ")", ";", "}"]);
    }

    #[test]
    fn test_tail_modifiers() {
        let f = only_function("int get() const noexcept(true) __attribute__((pure)) LOCKS(mu) throw();");
        assert!(f.modifiers.contains(FunctionModifier::Specifier));
        assert!(f.modifiers.contains(FunctionModifier::Attribute));
        assert!(f.modifiers.contains(FunctionModifier::UnknownAnnotation));
        assert!(f.modifiers.contains(FunctionModifier::Throw));
    }

    #[test]
    fn test_trailing_return_type() {
        let f = only_function("auto make() -> std::vector<int>;");
        let rt = f.return_type.unwrap();
        assert_eq!(rt.name, "std::vector");
        assert_eq!(rt.templated_types.len(), 1);
    }

    #[test]
    fn test_function_at_end_of_input() {
        let f = only_function("DECLARE_THING(Foo)");
        assert_eq!(f.name, "DECLARE_THING");
    }

    #[test]
    fn test_function_pointer_variable() {
        let nodes = parse("void (*callback)(int, char);");
        match &nodes[0] {
            Node::VariableDeclaration(v) => {
                assert_eq!(v.name, "callback");
                assert_eq!(v.var_type.name, "void");
                assert!(v.var_type.pointer);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_function_pointer_array() {
        let nodes = parse("int (*handlers[3])(int);\nint after;");
        assert_eq!(nodes.len(), 2);
        match &nodes[0] {
            Node::VariableDeclaration(v) => {
                assert_eq!(v.name, "handlers");
                assert_eq!(v.var_type.name, "int");
                assert!(v.var_type.pointer);
                assert!(v.var_type.array);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(nodes[1].name(), Some("after"));
    }

    #[test]
    fn test_variable_with_call_initializer() {
        let nodes = parse("int x = compute(1, 2);");
        match &nodes[0] {
            Node::VariableDeclaration(v) => {
                assert_eq!(v.name, "x");
                assert_eq!(v.initial_value, "compute(1,2)");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_static_assert_skipped() {
        let nodes = parse("static_assert(sizeof(int) == 4, \"size\"); int y;");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name(), Some("y"));
    }

    #[test]
    fn test_operator_names() {
        let names: Vec<String> = parse(
            "bool operator==(const A&, const A&);\n\
             Out& operator>>(Out& o, int v);\n\
             Out& operator>>=(Out& o, int v);\n\
             int operator()(int);",
        )
        .iter()
        .filter_map(|n| n.name().map(str::to_string))
        .collect();
        assert_eq!(names, vec!["operator==", "operator>>", "operator>>=", "operator()"]);
    }

    #[test]
    fn test_leading_macro_invocation_skipped() {
        let nodes = parse("#define DEPRECATED(msg)\nDEPRECATED(\"old\") int legacy();");
        let names: Vec<&str> = nodes.iter().filter_map(|n| n.name()).collect();
        assert_eq!(names, vec!["DEPRECATED", "legacy"]);
    }

    #[test]
    fn test_unsupported_keyword_is_error() {
        let result: Result<Vec<_>, _> = Builder::new("return 5;", "test.h").collect();
        assert!(matches!(result, Err(Error::Parse(ParseError::UnexpectedToken { .. }))));
    }

    #[test]
    fn test_missing_semicolon_is_error() {
        let result: Result<Vec<_>, _> = Builder::new("int foo() ? ;", "test.h").collect();
        let err = result.unwrap_err();
        match err {
            Error::Parse(ParseError::UnexpectedToken { token, .. }) => assert_eq!(token.text, "?"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
