//! Class, struct, union, enum and template parsing
//!
//! A class body is handed to a nested [`Builder`] over the body's tokens, so
//! members come back as ordinary nodes (fields, methods, nested classes).
//! After the body, constructor initializers that set a member to a single
//! token are copied onto the matching field's initial value.

use crate::parser::ast::*;
use crate::parser::keywords;
use crate::parser::lexer::{Token, TokenKind};
use crate::parser::parse::{read_name, Builder, Error, ParseError, SliceTokens};
use crate::parser::types;
use tracing::trace;

const BASE_SPECIFIERS: &[&str] = &["public", "protected", "private", "virtual"];

impl<'a> Builder<'a> {
    /// `class`/`struct`/`union` seen in declaration position. Decides
    /// between a class definition, a variable of the class type and a
    /// function returning it.
    pub(crate) fn handle_class(&mut self, kind: ClassKind, keyword: Token) -> Result<Node, Error> {
        if self.handling_typedef {
            return self.get_class(kind, None);
        }

        let (name_tokens, var_token) = self.get_name()?;
        if var_token.kind == TokenKind::Name || var_token.is("*") || var_token.is("&") {
            let (rest, last) = self.var_tokens_up_to(false, &["(", ";", "{"])?;
            let mut tokens = name_tokens;
            tokens.push(var_token);
            tokens.extend(rest);

            if last.is("{") {
                self.push_back(last);
                self.push_back_all(tokens);
                return self.get_class(kind, None);
            }
            tokens.insert(0, keyword);
            if last.is("(") {
                return self.build_method(tokens, FunctionModifiers::NONE, None, false);
            }
            return self.get_variable(&tokens);
        }

        self.push_back(var_token);
        self.push_back_all(name_tokens);
        self.get_class(kind, None)
    }

    pub(crate) fn get_class(
        &mut self,
        kind: ClassKind,
        templated_types: Option<TemplateParams>,
    ) -> Result<Node, Error> {
        let class_token = self.next_token()?;
        let mut name_tokens = Vec::new();
        let mut class_name = None;
        let mut token;

        if class_token.kind != TokenKind::Name {
            if class_token.kind != TokenKind::Syntax {
                return Err(self.unexpected(&class_token, "expected a class name or body"));
            }
            token = class_token.clone();
        } else {
            self.push_back(class_token.clone());
            (name_tokens, token) = self.get_name()?;

            if self.handling_typedef {
                // typedef to pointer
                if token.is("*") || token.is("&") {
                    name_tokens.push(token);
                    token = self.next_token()?;
                }
            } else if token.kind == TokenKind::Name {
                // `class EXPORT_MACRO Name` or `class Name final`
                self.push_back(token);
                let (attribute, next) = self.get_name()?;
                token = next;
                let is_final = attribute.len() == 1 && attribute[0].is("final");
                if !attribute.is_empty() && !is_final {
                    name_tokens = attribute;
                }
            }

            let name = types::to_type(&name_tokens)
                .into_iter()
                .next()
                .map(|t| t.name)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| self.unexpected(&class_token, "expected a class name"))?;
            class_name = Some(name);
        }

        if token.is_preprocessor() {
            token = self.next_token()?;
        }

        let mut bases = Vec::new();
        if token.kind == TokenKind::Syntax {
            if token.is(";") {
                return Ok(Node::Class(Class {
                    start: class_token.start,
                    end: class_token.end,
                    kind,
                    name: class_name,
                    templated_types,
                    definition: None,
                    namespace: self.namespace_stack.clone(),
                }));
            }

            if token.is("*") || token.is("&") {
                // inline forward declaration: data or a method
                let name_token = self.next_token()?;
                let next = self.next_token()?;
                if next.is(";") {
                    let var_type = Type {
                        modifiers: vec![kind.keyword().to_string()],
                        ..Type::new(class_name.unwrap_or_default())
                    }
                    .with_span(class_token.start, class_token.end)
                    .with_markers([token.text.as_str()]);
                    return Ok(self.variable(&class_token, name_token.text, var_type, String::new()));
                }
                self.push_back_all(vec![class_token, token, name_token, next]);
                return self.get_method(FunctionModifiers::NONE, None);
            }

            if token.is(":") {
                let (parsed, next) = self.get_bases()?;
                bases = parsed;
                token = next;
            }
        }

        if !token.is_syntax("{") {
            if self.handling_typedef {
                self.push_back(token);
                return Ok(Node::Class(Class {
                    start: class_token.start,
                    end: class_token.end,
                    kind,
                    name: class_name,
                    templated_types,
                    definition: None,
                    namespace: self.namespace_stack.clone(),
                }));
            }
            if token.is_syntax("(") {
                name_tokens.insert(0, class_token);
                return self.build_method(name_tokens, FunctionModifiers::NONE, None, false);
            }
            return Err(self.unexpected(&token, "expected a class body"));
        }

        let scope_name = class_name.clone().unwrap_or_else(|| "__unnamed__".to_string());
        let scope = self.scope()?;
        let mut body = self
            .nested(scope, &scope_name)
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(name) = &class_name {
            merge_constructor_initializers(&mut body, name);
        }

        let class = Class {
            start: class_token.start,
            end: class_token.end,
            kind,
            name: class_name.clone(),
            templated_types,
            definition: Some(ClassBody { bases, body }),
            namespace: self.namespace_stack.clone(),
        };

        if self.handling_typedef {
            return Ok(Node::Class(class));
        }

        // `};`, or an instance declared after the body: `} name;`
        let mut token = self.next_or_end()?;
        let mut markers = Vec::new();
        while token.is("*") || token.is("&") {
            markers.push(token.text.clone());
            token = self.next_token()?;
        }
        if token.kind != TokenKind::Name {
            if token.is(";") && markers.is_empty() {
                return Ok(Node::Class(class));
            }
            return Err(self.unexpected(&token, "expected ';' after a class definition"));
        }
        if keywords::is_builtin_type(&token.text) {
            token = self.next_token()?;
        }
        self.ignore_up_to(";")?;

        let class = Class {
            templated_types: None,
            ..class
        };
        let mut var_type = Type::new(class_name.unwrap_or_default())
            .with_span(class_token.start, class_token.end)
            .with_markers(&markers)
            .with_definition(Node::Class(class));
        if self.handling_const {
            var_type.modifiers.push("const".to_string());
        }
        Ok(self.variable(&class_token, token.text, var_type, String::new()))
    }

    fn next_or_end(&mut self) -> Result<Token, Error> {
        Ok(self
            .try_next_token()?
            .unwrap_or_else(|| Token::new(TokenKind::Syntax, ";", 0, 0)))
    }

    /// Base classes up to the `{` that opens the body. Access specifiers
    /// and `virtual` are consumed and dropped.
    pub(crate) fn get_bases(&mut self) -> Result<(Vec<Type>, Token), Error> {
        let mut bases = Vec::new();
        loop {
            let token = self.next_token()?;
            if BASE_SPECIFIERS.contains(&token.text.as_str()) || token.is_preprocessor() {
                continue;
            }
            self.push_back(token);

            let (mut base, mut next) = self.get_name()?;
            let qualified_macro = base.len() > 2
                && base[base.len() - 2].is("::")
                && next.kind == TokenKind::Name
                && !BASE_SPECIFIERS.contains(&next.text.as_str());
            if qualified_macro {
                self.push_back(next);
                let (rest, after) = self.get_name()?;
                base.pop();
                base.extend(rest);
                next = after;
            }

            let mut converted = types::to_type(&base);
            if converted.len() == 1 {
                bases.extend(converted.pop());
            }

            if next.is(")") {
                next = self.next_token()?;
            }
            while next.is_preprocessor() {
                next = self.next_token()?;
            }
            if next.is_syntax("{") {
                return Ok((bases, next));
            }
            if next.is_syntax(";") {
                return Err(self.unexpected(&next, "expected a class body after the base list"));
            }
        }
    }

    /// `enum`, `enum class` and `enum struct`, with or without a body.
    pub(crate) fn handle_enum(&mut self) -> Result<Node, Error> {
        let token = self.next_token()?;
        if !token.is("class") && !token.is("struct") {
            self.push_back(token);
        }

        let (mut name_tokens, mut token) = self.get_name()?;
        let name = (!name_tokens.is_empty()).then(|| join_texts(&name_tokens, ""));

        if token.kind == TokenKind::Name {
            if self.handling_typedef {
                self.push_back(token.clone());
                return Ok(self.enum_node(&token, name, None));
            }
            let next = self.next_token()?;
            if next.is_syntax("(") {
                name_tokens.push(token);
                return self.build_method(name_tokens, FunctionModifiers::NONE, None, false);
            }
            self.push_back(next);
            let var_type = Type::new(name.unwrap_or_default()).with_span(token.start, token.end);
            return self.enum_variable(token, var_type);
        }

        // underlying type
        if token.is_syntax(":") {
            token = self.var_tokens_up_to(false, &["{", ";"])?.1;
        }

        if token.is_syntax(";") {
            return Ok(self.enum_node(&token, name, None));
        }

        if !token.is_syntax("{") {
            return Err(self.unexpected(&token, "expected an enum body"));
        }

        let mut fields = self.matching("{", "}")?;
        fields.pop();
        let enum_node = self.enum_node(&token, name.clone(), Some(fields));

        let Some(next) = self.try_next_token()? else {
            return Ok(enum_node);
        };
        if next.kind != TokenKind::Name {
            if !next.is(";") {
                self.push_back(next);
            }
            return Ok(enum_node);
        }
        if self.handling_typedef {
            self.push_back(next);
            return Ok(enum_node);
        }

        // anonymous or named enum with an instance: `enum { A } value;`
        let var_type = Type::new(name.unwrap_or_default())
            .with_span(token.start, token.end)
            .with_definition(enum_node);
        self.enum_variable(next, var_type)
    }

    fn enum_node(&self, position: &Token, name: Option<String>, fields: Option<Vec<Token>>) -> Node {
        Node::Enum(Enum {
            start: position.start,
            end: position.end,
            name,
            fields,
            namespace: self.namespace_stack.clone(),
        })
    }

    fn enum_variable(&mut self, name: Token, var_type: Type) -> Result<Node, Error> {
        let rest = self.tokens_up_to(";")?;
        let value = match rest.split_first() {
            Some((first, value)) if first.is("=") => join_texts(value, ""),
            _ => String::new(),
        };
        Ok(self.variable(&name, name.text.clone(), var_type, value))
    }

    /// `template <...>` followed by a class, friend, alias, nested template
    /// or function.
    pub(crate) fn handle_template(&mut self) -> Result<Option<Node>, Error> {
        let mut token = self.next_token()?;
        let mut templated_types = None;
        if token.is_syntax("<") {
            templated_types = Some(self.get_templated_types()?);
            token = self.next_token()?;
        }
        while token.is_preprocessor() {
            token = self.next_token()?;
        }

        if token.kind == TokenKind::Name {
            match token.text.as_str() {
                "class" => return self.get_class(ClassKind::Class, templated_types).map(Some),
                "struct" => return self.get_class(ClassKind::Struct, templated_types).map(Some),
                "union" => return self.get_class(ClassKind::Union, templated_types).map(Some),
                "friend" => return self.handle_friend().map(Some),
                "template" => return self.handle_template(),
                "using" => return self.handle_using().map(Some),
                _ => {}
            }
        }

        self.push_back(token);
        let (mut tokens, last) = self.var_tokens_up_to_with_function(false, &["(", ";"])?;
        let is_function = last.is("(");
        tokens.push(last);
        self.push_back_all(tokens);
        if is_function {
            return self.get_method(FunctionModifiers::NONE, templated_types).map(Some);
        }
        // a variable template; parsed again as a plain declaration
        trace!(file = %self.filename, "template variable");
        Ok(None)
    }

    /// The parameter list of a `template <...>`, with the `<` consumed.
    pub(crate) fn get_templated_types(&mut self) -> Result<TemplateParams, Error> {
        let tokens = self.matching("<", ">")?;
        let len = tokens.len().saturating_sub(1);
        let mut result = TemplateParams::new();

        let mut i = 0;
        while i < len {
            let mut key = tokens[i].text.clone();
            i += 1;
            // `...` arrives as three `.` tokens
            if keywords::is_keyword(&key) || key == "," || key == "." {
                continue;
            }

            let mut param = TemplateParam::default();
            if i < len {
                i += 1;
                if tokens[i - 1].is("=") {
                    if i >= len {
                        return Err(ParseError::malformed(format!("template parameter '{}' has no default", key)).into());
                    }
                    let mut source = SliceTokens::new(&tokens[i..len]);
                    let (mut default, _) = read_name(&mut source)?;
                    if default.is_empty() {
                        default.push(tokens[i].clone());
                    }
                    i += default.len();
                    param.default = Some(default);
                } else if !tokens[i - 1].is(",") {
                    // `Concept Name`
                    key = tokens[i - 1].text.clone();
                    param.constraint = Some(tokens[i - 2].clone());
                }
            }
            result.insert(key, param);
        }
        Ok(result)
    }
}

/// Copy single-token constructor initializers onto the fields they set.
fn merge_constructor_initializers(body: &mut [Node], class_name: &str) {
    let initializers = body.iter().find_map(|member| match member {
        Node::Function(f) if f.name == class_name => Some(f.initializers.clone()),
        _ => None,
    });
    let Some(initializers) = initializers else {
        return;
    };

    for member in body.iter_mut() {
        if let Node::VariableDeclaration(var) = member {
            if let Some([value]) = initializers.get(&var.name).map(Vec::as_slice) {
                var.initial_value = value.text.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Node> {
        Builder::new(source, "test.h").collect::<Result<Vec<_>, _>>().unwrap()
    }

    fn only_class(source: &str) -> Class {
        match parse(source).into_iter().next() {
            Some(Node::Class(class)) => class,
            other => panic!("expected a class, got {:?}", other),
        }
    }

    #[test]
    fn test_forward_declaration() {
        let class = only_class("class Foo;");
        assert_eq!(class.name.as_deref(), Some("Foo"));
        assert!(class.is_declaration());
    }

    #[test]
    fn test_export_macro_is_dropped() {
        let class = only_class("class EXPORT_API Widget { };");
        assert_eq!(class.name.as_deref(), Some("Widget"));
        let class = only_class("struct Leaf final { };");
        assert_eq!(class.name.as_deref(), Some("Leaf"));
    }

    #[test]
    fn test_bases() {
        let class = only_class("class D : public virtual B1, protected ns::B2<int> { };");
        let bases: Vec<String> = class.bases().unwrap().iter().map(|b| b.to_string()).collect();
        assert_eq!(bases, vec!["B1", "ns::B2<int>"]);
    }

    #[test]
    fn test_members_are_nested_nodes() {
        let class = only_class("struct P { int x; int y; void move(int dx); };");
        let body = class.body().unwrap();
        assert_eq!(body.len(), 3);
        assert!(matches!(&body[2], Node::Function(f) if f.name == "move"));
    }

    #[test]
    fn test_constructor_initializers_back_patched() {
        let class = only_class("class C { C() : count(0), name(a, b) {} int count; int name; };");
        let body = class.body().unwrap();
        let ctor = body[0].as_function().unwrap();
        assert!(ctor.modifiers.contains(FunctionModifier::Ctor));
        match (&body[1], &body[2]) {
            (Node::VariableDeclaration(count), Node::VariableDeclaration(name)) => {
                assert_eq!(count.initial_value, "0");
                assert_eq!(name.initial_value, "");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_instance_after_body() {
        let nodes = parse("struct { int a; } origin;");
        match &nodes[0] {
            Node::VariableDeclaration(v) => {
                assert_eq!(v.name, "origin");
                assert!(matches!(v.var_type.definition.as_deref(), Some(Node::Class(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pointer_instance_after_body() {
        let nodes = parse("struct Node { int v; } *head;");
        match &nodes[0] {
            Node::VariableDeclaration(v) => {
                assert_eq!(v.name, "head");
                assert!(v.var_type.pointer);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_elaborated_variable() {
        let nodes = parse("struct stat info;");
        match &nodes[0] {
            Node::VariableDeclaration(v) => {
                assert_eq!(v.name, "info");
                assert_eq!(v.var_type.name, "stat");
                assert_eq!(v.var_type.modifiers, vec!["struct"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_enum_forms() {
        let nodes = parse(
            "enum Color { Red, Green };\n\
             enum class Mode : unsigned char { A, B };\n\
             enum Forward;\n\
             enum { X, Y } anon;",
        );
        assert_eq!(nodes.len(), 4);
        match &nodes[0] {
            Node::Enum(e) => {
                assert_eq!(e.name.as_deref(), Some("Color"));
                let fields: Vec<&str> = e.fields.as_ref().unwrap().iter().map(|t| t.text.as_str()).collect();
                assert_eq!(fields, vec!["Red", ",", "Green"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(nodes[1].name(), Some("Mode"));
        assert!(nodes[2].is_declaration());
        match &nodes[3] {
            Node::VariableDeclaration(v) => {
                assert_eq!(v.name, "anon");
                assert!(matches!(v.var_type.definition.as_deref(), Some(Node::Enum(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_templated_types() {
        let class = only_class("template <typename T, int N = 4, class Alloc = std::allocator<T>> class Buf {};");
        let params = class.templated_types.unwrap();
        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["T", "N", "Alloc"]);
        assert_eq!(params["N"].default.as_ref().map(|d| d[0].text.as_str()), Some("4"));
        assert_eq!(params["Alloc"].default.as_ref().map(|d| d.len()), Some(6));
    }

    #[test]
    fn test_constrained_template_parameter() {
        let nodes = parse("template <Integral T> T twice(T v);");
        let f = nodes[0].as_function().unwrap();
        let params = f.templated_types.as_ref().unwrap();
        assert_eq!(params["T"].constraint.as_ref().map(|t| t.text.as_str()), Some("Integral"));
    }

    #[test]
    fn test_variadic_template_parameter() {
        let nodes = parse("template <typename... Args> void log(Args... args);");
        let f = nodes[0].as_function().unwrap();
        let params = f.templated_types.as_ref().unwrap();
        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Args"]);
        assert_eq!(params["Args"], TemplateParam::default());

        let class = only_class("template <class T, class... Rest> struct Tuple {};");
        let params = class.templated_types.unwrap();
        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["T", "Rest"]);
        assert!(params["Rest"].constraint.is_none());
    }
}
