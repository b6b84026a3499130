// AST node definitions for the declaration-level C++ model

use crate::parser::lexer::Token;
use indexmap::IndexMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// One entry of a namespace path. An anonymous namespace is kept as an
/// explicit marker so it never collapses into "no namespace".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Named(String),
    Anonymous,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Named(name) => write!(f, "{}", name),
            Namespace::Anonymous => write!(f, "<anonymous>"),
        }
    }
}

/// Outermost namespace first.
pub type NamespacePath = Vec<Namespace>;

/// Trailing and leading qualifiers recorded on a [`Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FunctionModifier {
    Specifier = 0x01, // const, override, final, noexcept
    Virtual = 0x02,
    PureVirtual = 0x04,
    Ctor = 0x08,
    Dtor = 0x10,
    Attribute = 0x20,
    UnknownAnnotation = 0x40,
    Throw = 0x80,
}

impl FunctionModifier {
    pub const ALL: [FunctionModifier; 8] = [
        FunctionModifier::Specifier,
        FunctionModifier::Virtual,
        FunctionModifier::PureVirtual,
        FunctionModifier::Ctor,
        FunctionModifier::Dtor,
        FunctionModifier::Attribute,
        FunctionModifier::UnknownAnnotation,
        FunctionModifier::Throw,
    ];
}

/// A combinable set of [`FunctionModifier`]s.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionModifiers(u16);

impl FunctionModifiers {
    pub const NONE: FunctionModifiers = FunctionModifiers(0);

    pub fn contains(self, modifier: FunctionModifier) -> bool {
        self.0 & modifier as u16 != 0
    }

    pub fn insert(&mut self, modifier: FunctionModifier) {
        self.0 |= modifier as u16;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn iter(self) -> impl Iterator<Item = FunctionModifier> {
        FunctionModifier::ALL
            .into_iter()
            .filter(move |m| self.contains(*m))
    }
}

impl From<FunctionModifier> for FunctionModifiers {
    fn from(modifier: FunctionModifier) -> Self {
        FunctionModifiers(modifier as u16)
    }
}

impl BitOr for FunctionModifier {
    type Output = FunctionModifiers;

    fn bitor(self, rhs: FunctionModifier) -> FunctionModifiers {
        FunctionModifiers(self as u16 | rhs as u16)
    }
}

impl BitOr<FunctionModifier> for FunctionModifiers {
    type Output = FunctionModifiers;

    fn bitor(self, rhs: FunctionModifier) -> FunctionModifiers {
        FunctionModifiers(self.0 | rhs as u16)
    }
}

impl BitOrAssign<FunctionModifier> for FunctionModifiers {
    fn bitor_assign(&mut self, rhs: FunctionModifier) {
        self.insert(rhs);
    }
}

/// Constraint and default of one template parameter. Both are absent for
/// the common `template <typename T>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateParam {
    pub constraint: Option<Token>,
    pub default: Option<Vec<Token>>,
}

/// Template parameters in declaration order.
pub type TemplateParams = IndexMap<String, TemplateParam>;

/// Queries every node answers.
pub trait AstNode {
    fn span(&self) -> (u32, u32);

    /// A pure forward declaration with no body.
    fn is_declaration(&self) -> bool {
        false
    }

    /// Has a body or is inherently a definition.
    fn is_definition(&self) -> bool {
        false
    }

    /// Visible across translation units.
    fn is_exportable(&self) -> bool {
        false
    }
}

/// `#include`
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub start: u32,
    pub end: u32,
    pub filename: String,
    pub system: bool,
}

/// `#define`
#[derive(Debug, Clone, PartialEq)]
pub struct Define {
    pub start: u32,
    pub end: u32,
    pub name: String,
    pub definition: String,
}

/// `using namespace X;`
#[derive(Debug, Clone, PartialEq)]
pub struct Using {
    pub start: u32,
    pub end: u32,
    pub names: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Typedef {
    pub start: u32,
    pub end: u32,
    pub name: String,
    pub alias: Vec<Node>,
    pub namespace: NamespacePath,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub start: u32,
    pub end: u32,
    pub name: Option<String>,
    pub fields: Option<Vec<Token>>, // None for a forward declaration
    pub namespace: NamespacePath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Struct,
    Union,
}

impl ClassKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ClassKind::Class => "class",
            ClassKind::Struct => "struct",
            ClassKind::Union => "union",
        }
    }
}

/// Bases and members of a defined class. A class without one is a forward
/// declaration, so bases and body are present or absent together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassBody {
    pub bases: Vec<Type>,
    pub body: Vec<Node>,
}

/// `class`, `struct` or `union`
#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub start: u32,
    pub end: u32,
    pub kind: ClassKind,
    pub name: Option<String>,
    pub templated_types: Option<TemplateParams>,
    pub definition: Option<ClassBody>,
    pub namespace: NamespacePath,
}

impl Class {
    pub fn bases(&self) -> Option<&[Type]> {
        self.definition.as_ref().map(|d| d.bases.as_slice())
    }

    pub fn body(&self) -> Option<&[Node]> {
        self.definition.as_ref().map(|d| d.body.as_slice())
    }
}

/// A use of a type: parameter, return value, base class, variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Type {
    pub start: u32,
    pub end: u32,
    pub name: String,
    pub templated_types: Vec<Type>,
    pub modifiers: Vec<String>,
    pub reference: bool,
    pub pointer: bool,
    pub array: bool,
    /// Set when the type is an inline definition, e.g. `struct { int a; } x;`.
    pub definition: Option<Box<Node>>,
}

impl Type {
    pub fn new(name: impl Into<String>) -> Self {
        Type {
            name: name.into(),
            ..Type::default()
        }
    }

    pub fn with_span(mut self, start: u32, end: u32) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_templated_types(mut self, templated_types: Vec<Type>) -> Self {
        self.templated_types = templated_types;
        self
    }

    /// A type spelled only with keywords (`unsigned`) takes the last one as its name.
    pub fn with_modifiers(mut self, mut modifiers: Vec<String>) -> Self {
        if self.name.is_empty() {
            if let Some(last) = modifiers.pop() {
                self.name = last;
            }
        }
        self.modifiers = modifiers;
        self
    }

    pub fn with_reference(mut self) -> Self {
        self.reference = true;
        self
    }

    pub fn with_pointer(mut self) -> Self {
        self.pointer = true;
        self
    }

    /// Set pointer/reference/array flags from the texts of a declarator.
    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for marker in markers {
            match marker.as_ref() {
                "*" => self.pointer = true,
                "&" | "&&" => self.reference = true,
                "[" => self.array = true,
                _ => {}
            }
        }
        self
    }

    pub fn with_definition(mut self, node: Node) -> Self {
        self.definition = Some(Box::new(node));
        self
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{} ", modifier)?;
        }
        write!(f, "{}", self.name)?;
        if !self.templated_types.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.templated_types.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        if self.pointer {
            write!(f, "*")?;
        }
        if self.reference {
            write!(f, "&")?;
        }
        if self.array {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub start: u32,
    pub end: u32,
    pub name: Option<String>,
    pub param_type: Type,
    pub default: Vec<Token>,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.param_type)?;
        if let Some(name) = &self.name {
            write!(f, " {}", name)?;
        }
        if !self.default.is_empty() {
            write!(f, " = {}", join_texts(&self.default, " "))?;
        }
        Ok(())
    }
}

/// Free function, or the shared part of a [`Method`].
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub start: u32,
    pub end: u32,
    pub name: String,
    pub return_type: Option<Type>,
    pub parameters: Vec<Parameter>,
    pub specializations: Vec<Type>,
    pub modifiers: FunctionModifiers,
    pub templated_types: Option<TemplateParams>,
    pub body: Option<Vec<Token>>, // flat token run, never parsed
    pub namespace: NamespacePath,
    pub initializers: IndexMap<String, Vec<Token>>,
}

/// A function whose qualified name places it in a class, e.g. `Foo::bar()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub function: Function,
    pub in_class: Vec<Token>,
}

impl Method {
    pub fn class_name(&self) -> String {
        join_texts(&self.in_class, "")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Friend {
    pub start: u32,
    pub end: u32,
    pub entity: Box<Node>,
    pub namespace: NamespacePath,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub start: u32,
    pub end: u32,
    pub name: String,
    pub var_type: Type,
    pub initial_value: String,
    pub namespace: NamespacePath,
}

impl VariableDeclaration {
    /// Rebuild `type name[ = value]`.
    pub fn to_declaration_string(&self) -> String {
        let mut out = format!("{} {}", self.var_type, self.name);
        if !self.initial_value.is_empty() {
            out.push_str(" = ");
            out.push_str(&self.initial_value);
        }
        out
    }
}

/// Any top-level or class-member node produced by the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Include(Include),
    Define(Define),
    Using(Using),
    Typedef(Typedef),
    Enum(Enum),
    Class(Class),
    Type(Type),
    Parameter(Parameter),
    Function(Function),
    Method(Method),
    Friend(Friend),
    VariableDeclaration(VariableDeclaration),
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Include(_) => "Include",
            Node::Define(_) => "Define",
            Node::Using(_) => "Using",
            Node::Typedef(_) => "Typedef",
            Node::Enum(_) => "Enum",
            Node::Class(class) => match class.kind {
                ClassKind::Class => "Class",
                ClassKind::Struct => "Struct",
                ClassKind::Union => "Union",
            },
            Node::Type(_) => "Type",
            Node::Parameter(_) => "Parameter",
            Node::Function(_) => "Function",
            Node::Method(_) => "Method",
            Node::Friend(_) => "Friend",
            Node::VariableDeclaration(_) => "VariableDeclaration",
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Include(_) | Node::Using(_) | Node::Friend(_) => None,
            Node::Define(n) => Some(&n.name),
            Node::Typedef(n) => Some(&n.name),
            Node::Enum(n) => n.name.as_deref(),
            Node::Class(n) => n.name.as_deref(),
            Node::Type(n) => Some(&n.name),
            Node::Parameter(n) => n.name.as_deref(),
            Node::Function(n) => Some(&n.name),
            Node::Method(n) => Some(&n.function.name),
            Node::VariableDeclaration(n) => Some(&n.name),
        }
    }

    pub fn namespace(&self) -> Option<&[Namespace]> {
        match self {
            Node::Typedef(n) => Some(&n.namespace),
            Node::Enum(n) => Some(&n.namespace),
            Node::Class(n) => Some(&n.namespace),
            Node::Function(n) => Some(&n.namespace),
            Node::Method(n) => Some(&n.function.namespace),
            Node::Friend(n) => Some(&n.namespace),
            Node::VariableDeclaration(n) => Some(&n.namespace),
            _ => None,
        }
    }

    /// The name qualified by its named enclosing namespaces.
    pub fn full_name(&self) -> Option<String> {
        let name = self.name()?;
        let mut parts: Vec<&str> = self
            .namespace()
            .unwrap_or_default()
            .iter()
            .filter_map(|ns| match ns {
                Namespace::Named(n) => Some(n.as_str()),
                Namespace::Anonymous => None,
            })
            .collect();
        parts.push(name);
        Some(parts.join("::"))
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Node::Function(f) => Some(f),
            Node::Method(m) => Some(&m.function),
            _ => None,
        }
    }
}

fn in_anonymous(namespace: &[Namespace]) -> bool {
    namespace.contains(&Namespace::Anonymous)
}

impl AstNode for Include {
    fn span(&self) -> (u32, u32) {
        (self.start, self.end)
    }
}

impl AstNode for Define {
    fn span(&self) -> (u32, u32) {
        (self.start, self.end)
    }

    fn is_definition(&self) -> bool {
        true
    }

    fn is_exportable(&self) -> bool {
        true
    }
}

impl AstNode for Using {
    fn span(&self) -> (u32, u32) {
        (self.start, self.end)
    }
}

impl AstNode for Typedef {
    fn span(&self) -> (u32, u32) {
        (self.start, self.end)
    }

    fn is_definition(&self) -> bool {
        true
    }

    fn is_exportable(&self) -> bool {
        true
    }
}

impl AstNode for Enum {
    fn span(&self) -> (u32, u32) {
        (self.start, self.end)
    }

    fn is_declaration(&self) -> bool {
        self.fields.is_none()
    }

    fn is_definition(&self) -> bool {
        self.fields.is_some()
    }

    fn is_exportable(&self) -> bool {
        true
    }
}

impl AstNode for Class {
    fn span(&self) -> (u32, u32) {
        (self.start, self.end)
    }

    fn is_declaration(&self) -> bool {
        self.definition.is_none()
    }

    fn is_definition(&self) -> bool {
        self.definition.is_some()
    }

    fn is_exportable(&self) -> bool {
        true
    }
}

impl AstNode for Type {
    fn span(&self) -> (u32, u32) {
        (self.start, self.end)
    }
}

impl AstNode for Parameter {
    fn span(&self) -> (u32, u32) {
        (self.start, self.end)
    }
}

impl AstNode for Function {
    fn span(&self) -> (u32, u32) {
        (self.start, self.end)
    }

    fn is_declaration(&self) -> bool {
        self.body.is_none()
    }

    fn is_definition(&self) -> bool {
        self.body.is_some()
    }

    fn is_exportable(&self) -> bool {
        let file_local = self.return_type.as_ref().is_some_and(|rt| {
            rt.modifiers
                .iter()
                .any(|m| m == "static" || m == "constexpr")
        });
        !file_local && !in_anonymous(&self.namespace)
    }
}

impl AstNode for Method {
    fn span(&self) -> (u32, u32) {
        self.function.span()
    }

    fn is_declaration(&self) -> bool {
        self.function.is_declaration()
    }

    fn is_definition(&self) -> bool {
        self.function.is_definition()
    }

    fn is_exportable(&self) -> bool {
        self.function.is_exportable()
    }
}

impl AstNode for Friend {
    fn span(&self) -> (u32, u32) {
        (self.start, self.end)
    }
}

impl AstNode for VariableDeclaration {
    fn span(&self) -> (u32, u32) {
        (self.start, self.end)
    }

    fn is_declaration(&self) -> bool {
        self.var_type.modifiers.iter().any(|m| m == "extern")
    }

    fn is_definition(&self) -> bool {
        !self.is_declaration()
    }

    fn is_exportable(&self) -> bool {
        let file_local = self
            .var_type
            .modifiers
            .iter()
            .any(|m| m == "static" || m == "constexpr");
        !file_local && !in_anonymous(&self.namespace)
    }
}

impl Node {
    fn inner(&self) -> &dyn AstNode {
        match self {
            Node::Include(n) => n,
            Node::Define(n) => n,
            Node::Using(n) => n,
            Node::Typedef(n) => n,
            Node::Enum(n) => n,
            Node::Class(n) => n,
            Node::Type(n) => n,
            Node::Parameter(n) => n,
            Node::Function(n) => n,
            Node::Method(n) => n,
            Node::Friend(n) => n,
            Node::VariableDeclaration(n) => n,
        }
    }
}

impl AstNode for Node {
    fn span(&self) -> (u32, u32) {
        self.inner().span()
    }

    fn is_declaration(&self) -> bool {
        self.inner().is_declaration()
    }

    fn is_definition(&self) -> bool {
        self.inner().is_definition()
    }

    fn is_exportable(&self) -> bool {
        self.inner().is_exportable()
    }
}

pub(crate) fn join_texts(tokens: &[Token], separator: &str) -> String {
    tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}

fn write_function(f: &mut fmt::Formatter<'_>, function: &Function, qualifier: &str) -> fmt::Result {
    if let Some(rt) = &function.return_type {
        write!(f, "{} ", rt)?;
    }
    write!(f, "{}{}(", qualifier, function.name)?;
    for (i, param) in function.parameters.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", param)?;
    }
    write!(f, ")")?;
    let flags: Vec<String> = function
        .modifiers
        .iter()
        .map(|m| format!("{:?}", m).to_lowercase())
        .collect();
    if !flags.is_empty() {
        write!(f, " [{}]", flags.join(", "))?;
    }
    if let Some(body) = &function.body {
        write!(f, " {{{} tokens}}", body.len())?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start, end) = self.span();
        write!(f, "{}({}, {}, ", self.kind_name(), start, end)?;
        match self {
            Node::Include(n) if n.system => write!(f, "<{}>", n.filename)?,
            Node::Include(n) => write!(f, "\"{}\"", n.filename)?,
            Node::Define(n) => write!(f, "{} {}", n.name, n.definition)?,
            Node::Using(n) => write!(f, "{}", join_texts(&n.names, " "))?,
            Node::Typedef(n) => {
                write!(f, "{} =", n.name)?;
                for alias in &n.alias {
                    match alias {
                        Node::Type(t) => write!(f, " {}", t)?,
                        other => write!(f, " {}", other)?,
                    }
                }
            }
            Node::Enum(n) => {
                write!(f, "{}", n.name.as_deref().unwrap_or("<anonymous>"))?;
                if let Some(fields) = &n.fields {
                    write!(f, " {{{}}}", join_texts(fields, " "))?;
                }
            }
            Node::Class(n) => {
                write!(f, "{}", n.name.as_deref().unwrap_or("<anonymous>"))?;
                match &n.definition {
                    None => write!(f, " forward")?,
                    Some(def) => {
                        if !def.bases.is_empty() {
                            let bases: Vec<String> = def.bases.iter().map(|b| b.to_string()).collect();
                            write!(f, " : {}", bases.join(", "))?;
                        }
                        write!(f, " {{{} members}}", def.body.len())?;
                    }
                }
            }
            Node::Type(n) => write!(f, "{}", n)?,
            Node::Parameter(n) => write!(f, "{}", n)?,
            Node::Function(n) => write_function(f, n, "")?,
            Node::Method(n) => write_function(f, &n.function, &format!("{}::", n.class_name()))?,
            Node::Friend(n) => write!(f, "{}", n.entity)?,
            Node::VariableDeclaration(n) => write!(f, "{}", n.to_declaration_string())?,
        }
        write!(f, ")")?;
        if let Some(namespace) = self.namespace().filter(|ns| !ns.is_empty()) {
            let path: Vec<String> = namespace.iter().map(|ns| ns.to_string()).collect();
            write!(f, " in {}", path.join("::"))?;
        }
        Ok(())
    }
}
