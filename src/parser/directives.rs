//! Preprocessor directive handling
//!
//! Only `#include` (with `#include_next` and `#import`), `#define` and
//! `#undef` are interpreted. Conditional directives were already dealt with
//! by the lexer; everything else is dropped.

use crate::parser::ast::{Define, Include, Node};
use crate::parser::lexer::Token;
use crate::parser::parse::{Builder, Error};
use crate::source::classify_include;
use tracing::trace;

impl<'a> Builder<'a> {
    pub(crate) fn handle_directive(&mut self, token: &Token) -> Result<Option<Node>, Error> {
        let text = strip_block_comments(&token.text);
        let directive = text.trim_start_matches('#').trim_start();
        let keyword_len = directive
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(directive.len());
        let (keyword, rest) = directive.split_at(keyword_len);
        let rest = strip_continuation(rest.trim());

        match keyword {
            "include" | "include_next" | "import" => self.handle_include(token, rest).map(Some),
            "define" => self.handle_define(token, rest).map(Some),
            "undef" => {
                if rest.is_empty() {
                    return Err(self.unexpected(token, "#undef without a name"));
                }
                self.defines.remove(rest);
                Ok(None)
            }
            _ => {
                trace!(file = %self.filename, directive = keyword, "ignoring directive");
                Ok(None)
            }
        }
    }

    fn handle_include(&self, token: &Token, spelled: &str) -> Result<Node, Error> {
        if spelled.is_empty() {
            return Err(self.unexpected(token, "#include without a filename"));
        }
        let (filename, system) = classify_include(spelled, self.options, self.files)
            .ok_or_else(|| self.unexpected(token, "unterminated #include filename"))?;
        Ok(Node::Include(Include {
            start: token.start,
            end: token.end,
            filename,
            system,
        }))
    }

    /// Split `NAME value` or `NAME(args) value`. Function-like macro names
    /// are remembered so later invocations can be skipped.
    fn handle_define(&mut self, token: &Token, text: &str) -> Result<Node, Error> {
        if text.is_empty() {
            return Err(self.unexpected(token, "#define without a name"));
        }

        let mut name = text;
        let mut value = "";
        let mut paren = None;
        for (i, c) in text.char_indices() {
            if paren.is_none() && c.is_whitespace() {
                name = &text[..i];
                value = text[i..].trim_start();
                break;
            }
            if c == ')' {
                if let Some(open) = paren {
                    name = &text[..open];
                    value = text[i + 1..].trim_start();
                    self.defines.insert(name.to_string());
                    break;
                }
            }
            if c == '(' && paren.is_none() {
                paren = Some(i);
            }
        }

        Ok(Node::Define(Define {
            start: token.start,
            end: token.end,
            name: name.to_string(),
            definition: strip_continuation(value).to_string(),
        }))
    }
}

/// Drop a leading `\` left by a line continuation right after the keyword.
fn strip_continuation(text: &str) -> &str {
    match text.strip_prefix('\\') {
        Some(rest) => rest.trim(),
        None => text,
    }
}

/// Remove `/* ... */` comments that are not inside a quoted string.
fn strip_block_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    let mut quote = None;
    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '/' && text[i..].starts_with("/*") => {
                let end = text[i + 2..].find("*/").map_or(text.len(), |e| i + 2 + e + 2);
                while chars.peek().is_some_and(|&(j, _)| j < end) {
                    chars.next();
                }
                out.push(' ');
            }
            None => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Node> {
        Builder::new(source, "test.h").collect::<Result<Vec<_>, _>>().unwrap()
    }

    fn define(node: &Node) -> (&str, &str) {
        match node {
            Node::Define(d) => (d.name.as_str(), d.definition.as_str()),
            other => panic!("expected a define, got {:?}", other),
        }
    }

    #[test]
    fn test_include_forms() {
        let nodes = parse("#include <vector>\n#include \"util.h\"\n#  include_next <stdio.h>\n#import \"x.h\"\n");
        let includes: Vec<(String, bool)> = nodes
            .iter()
            .map(|n| match n {
                Node::Include(i) => (i.filename.clone(), i.system),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            includes,
            vec![
                ("vector".to_string(), true),
                ("util.h".to_string(), false),
                ("stdio.h".to_string(), true),
                ("x.h".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_include_on_continuation_line() {
        let nodes = parse("#include \\\n  \"next_line.h\"\n");
        assert!(matches!(&nodes[0], Node::Include(i) if i.filename == "next_line.h" && !i.system));
    }

    #[test]
    fn test_include_with_comment() {
        let nodes = parse("#include <map> /* ordered */\n");
        assert!(matches!(&nodes[0], Node::Include(i) if i.filename == "map"));
    }

    #[test]
    fn test_unterminated_include_is_error() {
        let result: Result<Vec<_>, _> = Builder::new("#include <vector\n", "test.h").collect();
        assert!(result.is_err());
    }

    #[test]
    fn test_define_forms() {
        let nodes = parse(
            "#define EMPTY\n\
             #define SIZE 42\n\
             #define MAX(a, b) ((a) > (b) ? (a) : (b))\n\
             #define NOTE /* why */ 1\n",
        );
        assert_eq!(define(&nodes[0]), ("EMPTY", ""));
        assert_eq!(define(&nodes[1]), ("SIZE", "42"));
        assert_eq!(define(&nodes[2]), ("MAX", "((a) > (b) ? (a) : (b))"));
        assert_eq!(define(&nodes[3]), ("NOTE", "1"));
    }

    #[test]
    fn test_function_like_macro_is_skipped_later() {
        let nodes = parse("#define EXPORT(x) x\nint EXPORT(api) value;\n");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].name(), Some("value"));
    }

    #[test]
    fn test_undef_forgets_macro() {
        let mut builder = Builder::new("#define F(x) x\n#undef F\n", "test.h");
        assert!(builder.next().is_some());
        assert!(builder.next().is_none());
        assert!(builder.defines.is_empty());
    }

    #[test]
    fn test_other_directives_ignored() {
        assert!(parse("#pragma once\n#error nope\n#line 4\n").is_empty());
    }

    #[test]
    fn test_strip_block_comments() {
        assert_eq!(strip_block_comments("a /* b */ c"), "a   c");
        assert_eq!(strip_block_comments("\"/* kept */\""), "\"/* kept */\"");
    }
}
