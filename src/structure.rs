use tree_sitter::{Node, Parser};

use crate::detail::{ClassKind, MethodInfo};
use crate::signature::normalize_definition;

#[derive(Debug, Clone)]
pub struct SourceStructure {
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub kind: ClassKind,
    pub declaration: String,
    pub fields: Vec<String>,
    pub methods: Vec<MethodInfo>,
}

const CONTROL_KEYWORDS: [&str; 9] = [
    "if",
    "for",
    "while",
    "switch",
    "catch",
    "synchronized",
    "return",
    "new",
    "throw",
];

/// Parses `source` and extracts the type named by the last segment of
/// `class_name`, nested types included. Anonymous and local classes have no
/// matching declaration and yield `None`.
pub fn parse_class_structure(source: &str, class_name: &str) -> Option<SourceStructure> {
    if source.trim().is_empty() {
        return None;
    }

    let stripped = strip_comments(source);
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .ok()?;
    let tree = parser.parse(&stripped, None)?;
    let root = tree.root_node();
    let bytes = stripped.as_bytes();

    let mut package = None;
    let mut imports = Vec::new();
    let mut types = Vec::new();

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "package_declaration" => {
                package = extract_package(&child, bytes);
            }
            "import_declaration" => {
                if let Some(imp) = extract_import(&child, bytes) {
                    imports.push(imp);
                }
            }
            kind if is_type_declaration(kind) => types.push(child),
            _ => {}
        }
    }

    let wanted = simple_type_name(class_name);
    let target = find_type(&types, wanted, bytes)?;

    let mut fields = Vec::new();
    let mut methods = Vec::new();
    extract_members(&target, bytes, &mut fields, &mut methods);

    Some(SourceStructure {
        package,
        imports,
        kind: ClassKind::from_declaration(target.kind()),
        declaration: extract_class_declaration(&target, bytes),
        fields,
        methods,
    })
}

fn simple_type_name(class_name: &str) -> &str {
    class_name
        .rsplit(['.', '$'])
        .next()
        .unwrap_or(class_name)
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration"
    )
}

fn find_type<'a>(nodes: &[Node<'a>], wanted: &str, source: &[u8]) -> Option<Node<'a>> {
    for node in nodes {
        if let Some(name) = node.child_by_field_name("name")
            && node_text(&name, source) == wanted
        {
            return Some(*node);
        }
    }
    for node in nodes {
        let nested = nested_types(node);
        if let Some(found) = find_type(&nested, wanted, source) {
            return Some(found);
        }
    }
    None
}

fn nested_types<'a>(node: &Node<'a>) -> Vec<Node<'a>> {
    let Some(body) = find_body(node) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        if is_type_declaration(child.kind()) {
            out.push(child);
        } else if child.kind() == "enum_body_declarations" {
            let mut inner = child.walk();
            out.extend(
                child
                    .children(&mut inner)
                    .filter(|c| is_type_declaration(c.kind())),
            );
        }
    }
    out
}

fn extract_package(node: &Node, source: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "scoped_identifier" || child.kind() == "identifier" {
            return Some(node_text(&child, source).to_string());
        }
    }
    None
}

fn extract_import(node: &Node, source: &[u8]) -> Option<String> {
    let mut path = String::new();
    let mut wildcard = false;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "scoped_identifier" | "identifier" => {
                path = node_text(&child, source).to_string();
            }
            "asterisk" => wildcard = true,
            _ => {}
        }
    }

    if path.is_empty() {
        None
    } else if wildcard {
        Some(format!("{path}.*"))
    } else {
        Some(path)
    }
}

fn extract_class_declaration(node: &Node, source: &[u8]) -> String {
    let mut result = String::new();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_body"
            | "interface_body"
            | "enum_body"
            | "annotation_type_body"
            | "record_declaration_body" => break,
            _ => {
                let text = node_text(&child, source);
                if !result.is_empty() && !needs_no_leading_space(child.kind()) {
                    result.push(' ');
                }
                result.push_str(text);
            }
        }
    }

    normalize_whitespace(&result)
}

fn extract_members(
    node: &Node,
    source: &[u8],
    fields: &mut Vec<String>,
    methods: &mut Vec<MethodInfo>,
) {
    let Some(body) = find_body(node) else {
        return;
    };

    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "field_declaration" | "constant_declaration" => {
                fields.push(field_text(&child, source));
            }
            "enum_constant" => {
                fields.push(enum_constant_text(&child, source));
            }
            "method_declaration"
            | "constructor_declaration"
            | "compact_constructor_declaration"
            | "annotation_type_element_declaration" => {
                if let Some(method) = extract_method(&child, source) {
                    methods.push(method);
                }
            }
            "enum_body_declarations" => {
                let mut inner_cursor = child.walk();
                for inner in child.children(&mut inner_cursor) {
                    match inner.kind() {
                        "field_declaration" => {
                            fields.push(field_text(&inner, source));
                        }
                        "method_declaration" | "constructor_declaration" => {
                            if let Some(method) = extract_method(&inner, source) {
                                methods.push(method);
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

fn find_body<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_body"
            | "interface_body"
            | "enum_body"
            | "annotation_type_body"
            | "record_declaration_body" => {
                return Some(child);
            }
            _ => {}
        }
    }
    None
}

fn field_text(node: &Node, source: &[u8]) -> String {
    normalize_whitespace(node_text(node, source))
        .trim_end_matches(';')
        .trim_end()
        .to_string()
}

fn enum_constant_text(node: &Node, source: &[u8]) -> String {
    let Some(name) = node.child_by_field_name("name") else {
        return normalize_whitespace(node_text(node, source));
    };
    let mut text = node_text(&name, source).to_string();
    if let Some(args) = node.child_by_field_name("arguments") {
        text.push_str(&normalize_whitespace(node_text(&args, source)));
    }
    text
}

fn extract_method(node: &Node, source: &[u8]) -> Option<MethodInfo> {
    let name = node_text(&node.child_by_field_name("name")?, source).to_string();
    if CONTROL_KEYWORDS.contains(&name.as_str()) {
        return None;
    }
    let signature = if node.kind() == "annotation_type_element_declaration" {
        field_text(node, source)
    } else {
        extract_method_signature(node, source)?
    };

    let parameter_types = node
        .child_by_field_name("parameters")
        .map(|p| parameter_types(&p, source))
        .unwrap_or_default();
    let return_type = node
        .child_by_field_name("type")
        .map(|t| normalize_whitespace(node_text(&t, source)));

    Some(MethodInfo {
        normalized_definition: normalize_definition(&name, &parameter_types),
        name,
        signature,
        parameter_types,
        return_type,
        raw_declaration: Some(node_text(node, source).to_string()),
    })
}

fn parameter_types(params: &Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for param in params.children(&mut cursor) {
        match param.kind() {
            "formal_parameter" => {
                let Some(ty) = param.child_by_field_name("type") else {
                    continue;
                };
                let mut text = normalize_whitespace(node_text(&ty, source));
                if let Some(dims) = param.child_by_field_name("dimensions") {
                    text.push_str(node_text(&dims, source));
                }
                out.push(text);
            }
            "spread_parameter" => {
                let mut inner = param.walk();
                let ty = param
                    .children(&mut inner)
                    .find(|c| !matches!(c.kind(), "modifiers" | "..."));
                if let Some(ty) = ty {
                    out.push(format!("{}...", normalize_whitespace(node_text(&ty, source))));
                }
            }
            _ => {}
        }
    }
    out
}

fn extract_method_signature(node: &Node, source: &[u8]) -> Option<String> {
    let mut result = String::new();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "block" | "constructor_body" => break,
            ";" => continue,
            _ => {
                let text = node_text(&child, source);
                if !result.is_empty() && !needs_no_leading_space(child.kind()) {
                    result.push(' ');
                }
                result.push_str(text);
            }
        }
    }

    let sig = normalize_whitespace(&result);
    if sig.is_empty() { None } else { Some(sig) }
}

fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn needs_no_leading_space(kind: &str) -> bool {
    matches!(
        kind,
        "type_parameters" | "formal_parameters" | "type_arguments"
    )
}

/// Blanks out `//` and `/* */` comments while leaving string and character
/// literals alone. Newlines inside block comments are kept so positions in
/// the remaining text stay on the same line.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                out.push(c);
                let quote = c;
                while let Some(n) = chars.next() {
                    out.push(n);
                    if n == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if n == quote || n == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&n) = chars.peek() {
                    if n == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    if n == '\n' {
                        out.push('\n');
                    }
                    prev = n;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}
