//! Static keyword classification
//!
//! Membership tests used by the builder on every `Name` token to decide
//! whether it starts a special construct or an ordinary declaration.

/// Built-in primitive type names.
pub const TYPES: &[&str] = &[
    "bool", "char", "char16_t", "char32_t", "int", "long", "short", "double", "float", "void",
    "wchar_t", "unsigned", "signed", "size_t", "auto", "asm",
];

/// Storage and cv modifiers that may precede or follow a type.
pub const TYPE_MODIFIERS: &[&str] = &[
    "register",
    "const",
    "constexpr",
    "extern",
    "static",
    "volatile",
    "mutable",
];

/// Elaborated type specifiers.
pub const OTHER_MODIFIERS: &[&str] = &["class", "struct", "union", "enum"];

pub const ACCESS: &[&str] = &["public", "protected", "private", "friend"];

pub const CASTS: &[&str] = &[
    "static_cast",
    "const_cast",
    "dynamic_cast",
    "reinterpret_cast",
];

pub const OTHERS: &[&str] = &[
    "true", "false", "namespace", "using", "explicit", "this", "operator", "sizeof", "new",
    "delete", "typedef", "typeid", "typename", "template", "virtual", "inline",
];

pub const CONTROL: &[&str] = &["case", "switch", "default", "if", "else", "return", "goto"];

pub const EXCEPTION: &[&str] = &["try", "catch", "throw"];

pub const LOOP: &[&str] = &["while", "do", "for", "break", "continue"];

const ALL: &[&[&str]] = &[
    TYPES,
    TYPE_MODIFIERS,
    OTHER_MODIFIERS,
    ACCESS,
    CASTS,
    OTHERS,
    CONTROL,
    EXCEPTION,
    LOOP,
];

/// Any reserved word.
pub fn is_keyword(text: &str) -> bool {
    ALL.iter().any(|group| group.contains(&text))
}

/// A primitive type name or a type modifier (`int`, `const`, `static`, ...).
pub fn is_builtin_type(text: &str) -> bool {
    TYPES.contains(&text) || TYPE_MODIFIERS.contains(&text)
}

/// A type modifier or an elaborated type specifier.
pub fn is_builtin_modifiers(text: &str) -> bool {
    TYPE_MODIFIERS.contains(&text) || OTHER_MODIFIERS.contains(&text)
}

/// One of `class`, `struct`, `union`, `enum`.
pub fn is_builtin_other_modifiers(text: &str) -> bool {
    OTHER_MODIFIERS.contains(&text)
}
