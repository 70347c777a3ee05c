//! Recovering Java source text for a class, best provider first.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache::SourceStore;
use crate::cfr::Cfr;
use crate::javap::Javap;
use crate::probe::read_entry;
use crate::scan::{class_name_to_class_path, class_name_to_source_path, sources_jar_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    SourcesJar,
    Decompiler,
    Disassembly,
}

#[derive(Debug, Clone)]
pub struct RecoveredSource {
    pub origin: SourceOrigin,
    pub text: String,
}

/// One way of turning `(jar, class)` into text.
///
/// `Ok(None)` means "not available from here"; errors are reserved for
/// failures worth logging.
pub trait SourceProvider: Send + Sync {
    fn origin(&self) -> SourceOrigin;
    fn fetch(&self, jar: &Path, class_name: &str) -> Result<Option<String>>;
}

#[derive(Debug, Default)]
pub struct SourcesJarProvider;

impl SourceProvider for SourcesJarProvider {
    fn origin(&self) -> SourceOrigin {
        SourceOrigin::SourcesJar
    }

    fn fetch(&self, jar: &Path, class_name: &str) -> Result<Option<String>> {
        let Some(sources) = sources_jar_path(jar).filter(|p| p.is_file()) else {
            return Ok(None);
        };
        let entry = class_name_to_source_path(class_name);
        let bytes = read_entry(&sources, &entry)?;
        Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
    }
}

pub struct DecompilerProvider {
    cfr: Cfr,
    store: Option<SourceStore>,
}

impl DecompilerProvider {
    pub fn new(cfr: Cfr, store: Option<SourceStore>) -> Self {
        Self { cfr, store }
    }

    fn decompile(&self, jar: &Path, class_name: &str) -> Result<Option<String>> {
        let entry = class_name_to_class_path(class_name);
        let Some(bytes) = read_entry(jar, &entry)? else {
            return Ok(None);
        };

        let work = tempfile::tempdir().context("Failed to create decompiler work directory")?;
        let file_name = entry.rsplit('/').next().unwrap_or(&entry);
        let class_file = work.path().join(file_name);
        std::fs::write(&class_file, &bytes)
            .with_context(|| format!("Failed to write {}", class_file.display()))?;

        let out_dir = work.path().join("out");
        let Some(java_file) = self.cfr.decompile_class_file(&class_file, &out_dir)? else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(&java_file)
            .with_context(|| format!("Failed to read {}", java_file.display()))?;
        Ok(Some(text))
    }
}

impl SourceProvider for DecompilerProvider {
    fn origin(&self) -> SourceOrigin {
        SourceOrigin::Decompiler
    }

    fn fetch(&self, jar: &Path, class_name: &str) -> Result<Option<String>> {
        if let Some(store) = self.store.as_ref() {
            match store.get(jar, class_name) {
                Ok(Some(text)) => {
                    tracing::debug!(class = class_name, "decompiled source served from store");
                    return Ok(Some(text));
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "source store read failed"),
            }
        }

        let text = self.decompile(jar, class_name)?;
        if let (Some(store), Some(text)) = (self.store.as_ref(), text.as_deref())
            && let Err(e) = store.put(jar, class_name, text)
        {
            tracing::warn!(error = %e, "source store write failed");
        }
        Ok(text)
    }
}

pub struct DisassemblyProvider {
    javap: Javap,
}

impl DisassemblyProvider {
    pub fn new(javap: Javap) -> Self {
        Self { javap }
    }
}

impl SourceProvider for DisassemblyProvider {
    fn origin(&self) -> SourceOrigin {
        SourceOrigin::Disassembly
    }

    fn fetch(&self, jar: &Path, class_name: &str) -> Result<Option<String>> {
        let listing = self.javap.disassemble(jar, class_name)?;
        Ok((!listing.trim().is_empty()).then_some(listing))
    }
}

#[derive(Default)]
pub struct SourceChain {
    providers: Vec<Box<dyn SourceProvider>>,
}

impl SourceChain {
    pub fn new(providers: Vec<Box<dyn SourceProvider>>) -> Self {
        Self { providers }
    }

    pub fn recover(&self, jar: &Path, class_name: &str) -> Option<RecoveredSource> {
        for provider in &self.providers {
            match provider.fetch(jar, class_name) {
                Ok(Some(text)) => {
                    return Some(RecoveredSource {
                        origin: provider.origin(),
                        text,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        origin = ?provider.origin(),
                        class = class_name,
                        error = %format!("{e:#}"),
                        "source provider failed"
                    );
                }
            }
        }
        None
    }
}
