//! `javap -p -s` as a last-resort member listing when neither a sources jar
//! nor a decompiler can produce source text.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::detail::{ClassKind, MethodInfo};
use crate::signature::{normalize_definition, split_top_level};

const MODIFIERS: [&str; 12] = [
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "synchronized",
    "native",
    "default",
    "strictfp",
    "transient",
    "volatile",
];

#[derive(Debug, Clone)]
pub struct Javap {
    program: PathBuf,
}

impl Javap {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    pub fn disassemble(&self, jar_path: &Path, class_name: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("-p")
            .arg("-s")
            .arg("-cp")
            .arg(jar_path)
            .arg(class_name)
            .output()
            .with_context(|| format!("Failed to execute {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("javap failed: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub kind: ClassKind,
    pub declaration: String,
    pub fields: Vec<String>,
    pub methods: Vec<MethodInfo>,
}

pub fn parse_listing(text: &str) -> Listing {
    let mut listing = Listing::default();

    for line in text.lines().map(str::trim) {
        if line.is_empty()
            || line == "}"
            || line.starts_with("Compiled from")
            || line.starts_with("descriptor:")
            || line.starts_with("Package")
            || line == "static {};"
        {
            continue;
        }

        if line.ends_with('{') && listing.declaration.is_empty() {
            let header = line.trim_end_matches('{').trim();
            listing.kind = header_kind(header);
            listing.declaration = header.to_string();
            continue;
        }

        if line.contains('(') && line.contains(')') {
            if let Some(method) = parse_method_line(line) {
                listing.methods.push(method);
            }
        } else if let Some(field) = line.strip_suffix(';') {
            listing.fields.push(field.trim().to_string());
        }
    }

    listing
}

fn header_kind(header: &str) -> ClassKind {
    let tokens = split_top_level(header, ' ');
    let has = |word: &str| tokens.iter().any(|t| t == word);
    if has("interface") {
        if header.contains("java.lang.annotation.Annotation") {
            ClassKind::Annotation
        } else {
            ClassKind::Interface
        }
    } else if has("enum") || header.contains("extends java.lang.Enum<") {
        ClassKind::Enum
    } else if header.contains("extends java.lang.Record") {
        ClassKind::Record
    } else if has("class") {
        ClassKind::Class
    } else {
        ClassKind::Unknown
    }
}

/// `public java.util.List<com.acme.Order> find(java.lang.String, int) throws X;`
fn parse_method_line(line: &str) -> Option<MethodInfo> {
    let signature = line.trim_end_matches(';').trim().to_string();
    let open = signature.find('(')?;
    let close = signature.rfind(')')?;
    if close < open {
        return None;
    }

    let head = split_top_level(&signature[..open], ' ');
    let qualified = head.last()?;
    let name = qualified.rsplit('.').next().unwrap_or(qualified).to_string();
    let parameter_types = split_top_level(&signature[open + 1..close], ',');

    let return_type = match head.len() {
        0 | 1 => None,
        n => {
            let candidate = &head[n - 2];
            let is_type = !MODIFIERS.contains(&candidate.as_str()) && !candidate.starts_with('<');
            is_type.then(|| candidate.clone())
        }
    };

    Some(MethodInfo {
        normalized_definition: normalize_definition(&name, &parameter_types),
        name,
        signature,
        parameter_types,
        return_type,
        raw_declaration: None,
    })
}
