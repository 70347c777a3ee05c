//! Normalized method definitions: `name(T1,T2)` keeping only parameter
//! types worth cross-referencing.
//!
//! Primitives, their boxed forms and `String` are dropped. Generic arguments
//! and package qualifiers are erased; arrays and varargs become `[]`.

const PRIMITIVES: [&str; 8] = [
    "byte", "short", "int", "long", "float", "double", "boolean", "char",
];

const BOXED: [&str; 8] = [
    "Byte",
    "Short",
    "Integer",
    "Long",
    "Float",
    "Double",
    "Boolean",
    "Character",
];

pub fn normalize_definition<S: AsRef<str>>(name: &str, parameter_types: &[S]) -> String {
    let kept: Vec<String> = parameter_types
        .iter()
        .map(|t| erase_type(t.as_ref()))
        .filter(|t| !t.is_empty() && !is_trivial_type(t))
        .collect();
    format!("{name}({})", kept.join(","))
}

/// `final java.util.List<com.acme.Order>` -> `List`, `com.acme.Order...` -> `Order[]`
pub fn erase_type(raw: &str) -> String {
    let mut depth = 0usize;
    let mut base = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => base.push(c),
            _ => {}
        }
    }

    let tokens: Vec<&str> = base
        .split_whitespace()
        .filter(|t| *t != "final" && !t.starts_with('@'))
        .collect();
    let joined = tokens.concat();

    let dims = joined.matches("[]").count() + usize::from(joined.ends_with("..."));
    let element = joined
        .trim_end_matches("...")
        .replace("[]", "")
        .replace(['[', ']'], "");
    let simple = element.rsplit('.').next().unwrap_or(&element).to_string();
    if simple.is_empty() {
        return String::new();
    }
    format!("{simple}{}", "[]".repeat(dims))
}

pub fn is_trivial_type(erased: &str) -> bool {
    let element = erased.trim_end_matches("[]");
    PRIMITIVES.contains(&element) || BOXED.contains(&element) || element == "String"
}

pub fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if depth == 0 && (c == sep || (sep == ' ' && c.is_whitespace())) => {
                let piece = current.trim();
                if !piece.is_empty() {
                    parts.push(piece.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let piece = current.trim();
    if !piece.is_empty() {
        parts.push(piece.to_string());
    }
    parts
}
