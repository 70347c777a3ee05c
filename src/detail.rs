//! Structured description of one class: kind, members and the text they
//! were read from.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::javap::parse_listing;
use crate::probe::jar_contains_entry;
use crate::scan::class_name_to_class_path;
use crate::source::{RecoveredSource, SourceChain, SourceOrigin};
use crate::structure::parse_class_structure;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
    #[default]
    Unknown,
}

impl ClassKind {
    pub fn from_declaration(kind: &str) -> Self {
        match kind {
            "class_declaration" => ClassKind::Class,
            "interface_declaration" => ClassKind::Interface,
            "enum_declaration" => ClassKind::Enum,
            "record_declaration" => ClassKind::Record,
            "annotation_type_declaration" => ClassKind::Annotation,
            _ => ClassKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodInfo {
    pub name: String,
    pub signature: String,
    pub normalized_definition: String,
    pub parameter_types: Vec<String>,
    pub return_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_declaration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Unavailable {
    #[error("source unavailable")]
    SourceUnavailable,
    #[error("archive not found")]
    ArchiveNotFound,
    #[error("archive unreadable: {message}")]
    ArchiveCorrupt { message: String },
    #[error("class not found")]
    ClassNotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassDetail {
    pub class_name: String,
    pub package: Option<String>,
    pub kind: ClassKind,
    pub declaration: String,
    pub imports: Vec<String>,
    pub fields: Vec<String>,
    pub methods: Vec<MethodInfo>,
    pub jar_path: Option<PathBuf>,
    pub origin: Option<SourceOrigin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Unavailable>,
}

impl ClassDetail {
    pub fn unavailable(class_name: &str, jar_path: Option<&Path>, reason: Unavailable) -> Self {
        Self {
            class_name: class_name.to_string(),
            package: package_of(class_name),
            kind: ClassKind::Unknown,
            declaration: String::new(),
            imports: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            jar_path: jar_path.map(Path::to_path_buf),
            origin: None,
            raw_source: None,
            error: Some(reason),
        }
    }

    pub fn is_available(&self) -> bool {
        self.error.is_none()
    }

    pub fn simple_name(&self) -> &str {
        self.class_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.class_name)
    }
}

fn package_of(class_name: &str) -> Option<String> {
    class_name
        .rsplit_once('.')
        .map(|(pkg, _)| pkg.to_string())
        .filter(|p| !p.is_empty())
}

pub struct ClassDetailExtractor {
    chain: SourceChain,
    cache: Mutex<HashMap<String, Arc<ClassDetail>>>,
}

impl ClassDetailExtractor {
    pub fn new(chain: SourceChain) -> Self {
        Self {
            chain,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached(&self, class_name: &str) -> Option<Arc<ClassDetail>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class_name)
            .cloned()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Never fails: problems are reported through [`ClassDetail::error`].
    pub fn inspect(&self, jar: &Path, class_name: &str) -> Arc<ClassDetail> {
        if let Some(hit) = self.cached(class_name) {
            return hit;
        }

        let detail = Arc::new(self.build(jar, class_name));
        if detail.is_available() {
            self.cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(class_name.to_string(), Arc::clone(&detail));
        }
        detail
    }

    fn build(&self, jar: &Path, class_name: &str) -> ClassDetail {
        if !jar.is_file() {
            return ClassDetail::unavailable(class_name, Some(jar), Unavailable::ArchiveNotFound);
        }
        match jar_contains_entry(jar, &class_name_to_class_path(class_name)) {
            Ok(true) => {}
            Ok(false) => {
                return ClassDetail::unavailable(class_name, Some(jar), Unavailable::ClassNotFound);
            }
            Err(e) => {
                tracing::warn!(jar = %jar.display(), error = %format!("{e:#}"), "unreadable jar");
                return ClassDetail::unavailable(
                    class_name,
                    Some(jar),
                    Unavailable::ArchiveCorrupt {
                        message: format!("{e:#}"),
                    },
                );
            }
        }

        let Some(recovered) = self.chain.recover(jar, class_name) else {
            return ClassDetail::unavailable(class_name, Some(jar), Unavailable::SourceUnavailable);
        };
        analyze(jar, class_name, recovered)
    }
}

fn analyze(jar: &Path, class_name: &str, recovered: RecoveredSource) -> ClassDetail {
    let mut detail = ClassDetail {
        class_name: class_name.to_string(),
        package: package_of(class_name),
        kind: ClassKind::Unknown,
        declaration: String::new(),
        imports: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        jar_path: Some(jar.to_path_buf()),
        origin: Some(recovered.origin),
        raw_source: None,
        error: None,
    };

    match recovered.origin {
        SourceOrigin::Disassembly => {
            let listing = parse_listing(&recovered.text);
            detail.kind = listing.kind;
            detail.declaration = listing.declaration;
            detail.fields = listing.fields;
            detail.methods = listing.methods;
        }
        SourceOrigin::SourcesJar | SourceOrigin::Decompiler => {
            if let Some(structure) = parse_class_structure(&recovered.text, class_name) {
                if structure.package.is_some() {
                    detail.package = structure.package;
                }
                detail.kind = structure.kind;
                detail.declaration = structure.declaration;
                detail.imports = structure.imports;
                detail.fields = structure.fields;
                detail.methods = structure.methods;
            } else {
                tracing::debug!(class = class_name, "recovered source declares no type by that name");
            }
        }
    }

    detail.raw_source = Some(recovered.text);
    detail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceProvider, SourcesJarProvider};
    use crate::testutil::{class_bytes, temp_path, write_jar};
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ORDERS_JAVA: &str = r#"
package com.acme;

import java.util.List;

public class Orders {
    private final List<Order> open;

    public void place(OrderDto order, int qty) {
        if (qty > 0) {
            open.add(order.toOrder());
        }
    }

    public List<Order> open() {
        return open;
    }
}
"#;

    fn orders_jar(name: &str) -> Result<(PathBuf, PathBuf)> {
        let base = temp_path(name);
        let jar = base.join("orders-1.0.jar");
        write_jar(
            &jar,
            &[("com/acme/Orders.class", &class_bytes("com/acme/Orders", &["place", "open"]))],
        )?;
        write_jar(
            &base.join("orders-1.0-sources.jar"),
            &[("com/acme/Orders.java", ORDERS_JAVA.as_bytes())],
        )?;
        Ok((base, jar))
    }

    struct Counting(&'static AtomicUsize);

    impl SourceProvider for Counting {
        fn origin(&self) -> SourceOrigin {
            SourceOrigin::Decompiler
        }
        fn fetch(&self, _: &Path, _: &str) -> Result<Option<String>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[test]
    fn sources_jar_detail_has_members() -> Result<()> {
        let (base, jar) = orders_jar("detail_sources")?;
        let extractor =
            ClassDetailExtractor::new(SourceChain::new(vec![Box::new(SourcesJarProvider)]));

        let detail = extractor.inspect(&jar, "com.acme.Orders");
        assert!(detail.is_available());
        assert_eq!(detail.origin, Some(SourceOrigin::SourcesJar));
        assert_eq!(detail.package.as_deref(), Some("com.acme"));
        assert_eq!(detail.simple_name(), "Orders");
        assert_eq!(detail.kind, ClassKind::Class);
        assert_eq!(detail.imports, vec!["java.util.List"]);
        assert_eq!(detail.fields, vec!["private final List<Order> open"]);
        let defs: Vec<&str> = detail
            .methods
            .iter()
            .map(|m| m.normalized_definition.as_str())
            .collect();
        assert_eq!(defs, vec!["place(OrderDto)", "open()"]);
        assert!(detail.raw_source.as_deref().is_some_and(|s| s.contains("class Orders")));

        let again = extractor.inspect(&jar, "com.acme.Orders");
        assert!(Arc::ptr_eq(&detail, &again));

        let _ = std::fs::remove_dir_all(base);
        Ok(())
    }

    #[test]
    fn no_providers_means_source_unavailable() -> Result<()> {
        let (base, jar) = orders_jar("detail_no_providers")?;
        let extractor = ClassDetailExtractor::new(SourceChain::default());

        let detail = extractor.inspect(&jar, "com.acme.Orders");
        assert_eq!(detail.error, Some(Unavailable::SourceUnavailable));
        assert!(detail.methods.is_empty());
        assert_eq!(extractor.cached_len(), 0);

        let _ = std::fs::remove_dir_all(base);
        Ok(())
    }

    #[test]
    fn archive_problems_are_reported_not_raised() -> Result<()> {
        let (base, jar) = orders_jar("detail_archive")?;
        let extractor =
            ClassDetailExtractor::new(SourceChain::new(vec![Box::new(SourcesJarProvider)]));

        let missing = extractor.inspect(&base.join("gone.jar"), "com.acme.Orders");
        assert_eq!(missing.error, Some(Unavailable::ArchiveNotFound));

        let absent = extractor.inspect(&jar, "com.acme.Invoices");
        assert_eq!(absent.error, Some(Unavailable::ClassNotFound));

        let corrupt = base.join("corrupt.jar");
        std::fs::write(&corrupt, b"definitely not a zip")?;
        let detail = extractor.inspect(&corrupt, "com.acme.Orders");
        assert!(matches!(detail.error, Some(Unavailable::ArchiveCorrupt { .. })));

        let _ = std::fs::remove_dir_all(base);
        Ok(())
    }

    #[test]
    fn disassembly_listing_is_parsed() -> Result<()> {
        struct Listing;
        impl SourceProvider for Listing {
            fn origin(&self) -> SourceOrigin {
                SourceOrigin::Disassembly
            }
            fn fetch(&self, _: &Path, _: &str) -> Result<Option<String>> {
                Ok(Some(
                    "public class com.acme.Orders {\n  public void place(com.acme.OrderDto, int);\n    descriptor: (Lcom/acme/OrderDto;I)V\n}\n"
                        .to_string(),
                ))
            }
        }

        let (base, jar) = orders_jar("detail_javap")?;
        let extractor = ClassDetailExtractor::new(SourceChain::new(vec![Box::new(Listing)]));
        let detail = extractor.inspect(&jar, "com.acme.Orders");
        assert_eq!(detail.origin, Some(SourceOrigin::Disassembly));
        assert_eq!(detail.package.as_deref(), Some("com.acme"));
        assert_eq!(detail.methods.len(), 1);
        assert_eq!(detail.methods[0].normalized_definition, "place(OrderDto)");

        let _ = std::fs::remove_dir_all(base);
        Ok(())
    }

    #[test]
    fn failures_are_not_cached() -> Result<()> {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let (base, jar) = orders_jar("detail_retry")?;
        let extractor =
            ClassDetailExtractor::new(SourceChain::new(vec![Box::new(Counting(&CALLS))]));
        extractor.inspect(&jar, "com.acme.Orders");
        extractor.inspect(&jar, "com.acme.Orders");
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);

        let _ = std::fs::remove_dir_all(base);
        Ok(())
    }
}
