//! Conversion of raw token runs into [`Type`] and [`Parameter`] values
//!
//! Shared by every builder routine that needs to interpret a declaration
//! fragment: parameter lists, return types, base classes, typedef targets and
//! variable types. Template argument lists are depth-counted, which relies on
//! the lexer never merging `>>`.

use crate::parser::ast::{Parameter, Type};
use crate::parser::keywords;
use crate::parser::lexer::{Token, TokenKind};

/// A declaration fragment split into its parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclarationParts {
    pub name: Option<String>,
    pub type_name: String,
    pub templated_types: Vec<Type>,
    pub modifiers: Vec<String>,
    pub default: Vec<Token>,
    pub other_tokens: Vec<Token>,
}

fn is_marker(text: &str) -> bool {
    matches!(text, "*" | "&" | "&&")
}

/// Return the tokens of a template argument list starting just after its `<`,
/// and the index just past the matching `>`.
pub fn template_end(tokens: &[Token], start: usize) -> (&[Token], usize) {
    let mut depth = 1;
    let mut end = start;
    while end < tokens.len() {
        match tokens[end].text.as_str() {
            "<" => depth += 1,
            ">" => depth -= 1,
            _ => {}
        }
        end += 1;
        if depth == 0 {
            return (&tokens[start..end - 1], end);
        }
    }
    (&tokens[start..], end)
}

/// Indices of the first `<` and one past the last `>` in `names`.
pub fn template_indices(names: &[String]) -> Option<(usize, usize)> {
    let start = names.iter().position(|n| n == "<")?;
    let end = names.iter().rposition(|n| n == ">")?;
    (end >= start).then_some((start, end + 1))
}

/// Convert a comma separated run of type expressions, e.g. the inside of a
/// template argument list.
pub fn to_type(tokens: &[Token]) -> Vec<Type> {
    let mut result = Vec::new();
    let mut name_tokens: Vec<&Token> = Vec::new();
    let mut templated: &[Token] = &[];
    let mut reference = false;
    let mut pointer = false;
    let mut array = false;
    let mut inside_array = false;
    let mut empty_array = true;

    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        match token.text.as_str() {
            "]" => {
                inside_array = false;
                if empty_array {
                    pointer = true;
                } else {
                    array = true;
                }
            }
            _ if inside_array => empty_array = false,
            "<" => {
                let (inner, next) = template_end(tokens, i + 1);
                templated = inner;
                i = next;
                continue;
            }
            "," | "(" => {
                push_type(&mut result, &name_tokens, templated, [reference, pointer, array]);
                name_tokens.clear();
                templated = &[];
                reference = false;
                pointer = false;
                array = false;
                empty_array = true;
            }
            "*" => pointer = true,
            "&" | "&&" => reference = true,
            "[" => inside_array = true,
            ")" => {}
            _ => name_tokens.push(token),
        }
        i += 1;
    }
    push_type(&mut result, &name_tokens, templated, [reference, pointer, array]);
    result
}

fn push_type(result: &mut Vec<Type>, name_tokens: &[&Token], templated: &[Token], flags: [bool; 3]) {
    let (Some(first), Some(last)) = (name_tokens.first(), name_tokens.last()) else {
        return;
    };
    let mut names = String::new();
    let mut modifiers = Vec::new();
    for t in name_tokens {
        if keywords::is_keyword(&t.text) {
            modifiers.push(t.text.clone());
        } else {
            names.push_str(&t.text);
        }
    }
    let [reference, pointer, array] = flags;
    let mut ty = Type::new(names)
        .with_span(first.start, last.end)
        .with_templated_types(to_type(templated))
        .with_modifiers(modifiers);
    ty.reference = reference;
    ty.pointer = pointer;
    ty.array = array;
    result.push(ty);
}

/// Split a declaration fragment such as `const std::string& name = "x"`.
///
/// When `needs_name_removed` is set and the fragment holds more than one name,
/// the last name is taken as the declared identifier, unless it is itself a
/// builtin type (`unsigned int` declares nothing).
pub fn declaration_to_parts(parts: &[Token], needs_name_removed: bool) -> DeclarationParts {
    let mut other_tokens = Vec::new();
    let mut default = Vec::new();
    let mut parts = parts;
    let mut array_begin = None;
    let mut array_end = None;
    let mut assignment = None;

    for (i, t) in parts.iter().enumerate() {
        match t.text.as_str() {
            "[" if array_begin.is_none() => {
                array_begin = Some(i);
                other_tokens.push(t.clone());
            }
            "]" => {
                array_end = Some(i);
                other_tokens.push(t.clone());
            }
            "=" => {
                assignment = Some(i);
                break;
            }
            _ => {}
        }
    }
    if let Some(i) = assignment {
        default = parts[i + 1..].to_vec();
        parts = &parts[..i];
    }

    let owned: Vec<Token>;
    if let (Some(begin), Some(end)) = (array_begin, array_end) {
        if begin < end && end < parts.len() {
            owned = parts[..begin]
                .iter()
                .chain(&parts[end + 1..])
                .cloned()
                .collect();
            parts = &owned;
        }
    }

    let mut modifiers = Vec::new();
    let mut type_name = vec![String::new()];
    let mut templated_types = Vec::new();
    let mut last_kind = TokenKind::Syntax;

    let mut i = 0;
    while i < parts.len() {
        let p = &parts[i];
        if keywords::is_builtin_modifiers(&p.text) {
            modifiers.push(p.text.clone());
        } else if p.text == "<" {
            let (inner, next) = template_end(parts, i + 1);
            templated_types = to_type(inner);
            i = next;
            continue;
        } else if !is_marker(&p.text) {
            if last_kind == TokenKind::Name && p.kind == TokenKind::Name {
                type_name.push(String::new());
            }
            if let Some(current) = type_name.last_mut() {
                current.push_str(&p.text);
            }
            last_kind = p.kind;
        } else {
            other_tokens.push(p.clone());
        }
        i += 1;
    }

    let mut needs_name_removed = needs_name_removed;
    if type_name.len() == 1 || type_name.last().is_some_and(|n| keywords::is_builtin_type(n)) {
        needs_name_removed = false;
    }
    let name = if needs_name_removed {
        type_name.pop()
    } else {
        None
    };

    DeclarationParts {
        name,
        type_name: type_name.join(" "),
        templated_types,
        modifiers,
        default,
        other_tokens,
    }
}

/// Convert the tokens between a function's parentheses.
pub fn to_parameters(tokens: &[Token]) -> Vec<Parameter> {
    struct Pending<'t> {
        tokens: Vec<Token>,
        first: Option<&'t Token>,
        pointer: bool,
        reference: bool,
        array: bool,
        default: Option<Vec<Token>>,
    }

    impl Pending<'_> {
        fn empty() -> Self {
            Pending {
                tokens: Vec::new(),
                first: None,
                pointer: false,
                reference: false,
                array: false,
                default: None,
            }
        }

        fn push(&mut self, token: &Token) {
            match &mut self.default {
                Some(default) => default.push(token.clone()),
                None => self.tokens.push(token.clone()),
            }
        }

        fn finish(self) -> Option<Parameter> {
            let first = self.first?;
            let end = self.tokens.last()?.end;
            let parts = declaration_to_parts(&self.tokens, true);
            if parts.type_name.is_empty() {
                return None;
            }
            let mut param_type = Type::new(parts.type_name)
                .with_span(first.start, first.end)
                .with_templated_types(parts.templated_types)
                .with_modifiers(parts.modifiers);
            param_type.pointer = self.pointer;
            param_type.reference = self.reference;
            param_type.array = self.array;
            Some(Parameter {
                start: first.start,
                end,
                name: parts.name,
                param_type,
                default: self.default.unwrap_or_default(),
            })
        }
    }

    let mut result = Vec::new();
    let mut pending = Pending::empty();
    let mut template_depth = 0i32;

    for token in tokens {
        if pending.first.is_none() {
            pending.first = Some(token);
        }
        match token.text.as_str() {
            "<" => template_depth += 1,
            ">" => template_depth -= 1,
            _ => {}
        }
        if template_depth > 0 {
            pending.push(token);
            continue;
        }

        if token.text == "," {
            let done = std::mem::replace(&mut pending, Pending::empty());
            result.extend(done.finish());
        } else if pending.default.is_some() {
            pending.push(token);
        } else {
            match token.text.as_str() {
                "*" => pending.pointer = true,
                "&" | "&&" => pending.reference = true,
                "[" => pending.array = true,
                "]" => {}
                "=" => pending.default = Some(Vec::new()),
                _ => pending.push(token),
            }
        }
    }
    result.extend(pending.finish());
    result
}

/// Convert a function's return type tokens.
pub fn create_return_type(tokens: &[Token]) -> Option<Type> {
    let (first, last) = (tokens.first()?, tokens.last()?);
    let parts = declaration_to_parts(tokens, false);
    let markers: Vec<&str> = parts.other_tokens.iter().map(|t| t.text.as_str()).collect();
    Some(
        Type::new(parts.type_name)
            .with_span(first.start, last.end)
            .with_templated_types(parts.templated_types)
            .with_modifiers(parts.modifiers)
            .with_markers(markers),
    )
}
