//! Composition root: owns the caches and source providers and exposes the
//! caller-facing operations.

use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{SourceStore, SourceStoreStats};
use crate::cfr::Cfr;
use crate::config::Settings;
use crate::deps::DependencyCache;
use crate::detail::{ClassDetail, ClassDetailExtractor, MethodInfo, Unavailable};
use crate::error::{ResolveError, SearchError};
use crate::jar_index::{JarIndexCache, JarIndexStats};
use crate::javap::Javap;
use crate::maven::{EffectiveSettingsRoot, FixedRoot, MavenBomResolver, RepositoryRoot};
use crate::probe::jar_contains_entry;
use crate::scan::{class_name_to_class_path, infer_scan_path, scan_jars};
use crate::search::{SearchEngine, SearchHit};
use crate::source::{
    DecompilerProvider, DisassemblyProvider, SourceChain, SourceOrigin, SourceProvider,
    SourcesJarProvider,
};

#[derive(Debug, Serialize)]
pub struct MethodUsage {
    pub class_name: String,
    pub definition: String,
    pub jar_path: Option<PathBuf>,
    pub origin: Option<SourceOrigin>,
    pub methods: Vec<MethodInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Unavailable>,
}

#[derive(Debug, Serialize)]
pub struct InspectorStats {
    pub descriptors: usize,
    pub known_jars: usize,
    pub jar_index: JarIndexStats,
    pub details_cached: usize,
    pub sources: Option<SourceStoreStats>,
}

pub struct Inspector {
    deps: Arc<DependencyCache>,
    jars: Arc<JarIndexCache>,
    search: SearchEngine,
    details: ClassDetailExtractor,
    repository: Arc<dyn RepositoryRoot>,
    store: Option<SourceStore>,
}

impl Inspector {
    pub fn new(
        deps: Arc<DependencyCache>,
        jars: Arc<JarIndexCache>,
        details: ClassDetailExtractor,
        repository: Arc<dyn RepositoryRoot>,
        store: Option<SourceStore>,
    ) -> Self {
        Self {
            search: SearchEngine::new(Arc::clone(&deps), Arc::clone(&jars)),
            deps,
            jars,
            details,
            repository,
            store,
        }
    }

    pub fn open(settings: &Settings) -> Self {
        let repository: Arc<dyn RepositoryRoot> = match settings.local_repo.clone() {
            Some(root) => Arc::new(FixedRoot(root)),
            None => Arc::new(EffectiveSettingsRoot::new(settings.mvn.clone())),
        };
        let deps = Arc::new(DependencyCache::open(
            settings.dependency_store(),
            Arc::new(MavenBomResolver::new(settings.mvn.clone())),
            Arc::clone(&repository),
        ));
        let jars = Arc::new(JarIndexCache::open(settings.jar_index_store()));

        let store = match SourceStore::open(settings.sources_db()) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "source store unavailable, decompiled sources will not be kept");
                None
            }
        };

        let mut providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(SourcesJarProvider)];
        if let Some(cfr_jar) = settings.cfr_jar.clone() {
            let cfr = Cfr::new(cfr_jar).with_java(settings.java.clone());
            providers.push(Box::new(DecompilerProvider::new(cfr, store.clone())));
        }
        if let Some(javap) = settings.javap.clone() {
            providers.push(Box::new(DisassemblyProvider::new(Javap::new(javap))));
        }
        tracing::debug!(providers = providers.len(), home = %settings.home.display(), "inspector ready");

        Self::new(
            deps,
            jars,
            ClassDetailExtractor::new(SourceChain::new(providers)),
            repository,
            store,
        )
    }

    pub fn resolve(&self, descriptor: &Path) -> Result<Vec<PathBuf>, ResolveError> {
        self.deps.resolve(descriptor)
    }

    pub fn refresh(&self, descriptor: &Path) -> Result<Vec<PathBuf>, ResolveError> {
        self.deps.invalidate(descriptor);
        self.deps.resolve(descriptor)
    }

    pub fn search_classes(
        &self,
        descriptor: &Path,
        pattern: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.search.search_classes(descriptor, pattern)
    }

    pub fn search_methods(
        &self,
        descriptor: &Path,
        pattern: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.search.search_methods(descriptor, pattern)
    }

    pub fn inspect(&self, jar: &Path, class_name: &str) -> Arc<ClassDetail> {
        self.details.inspect(jar, class_name)
    }

    /// First jar holding `class_name`: the known dependency jars in order,
    /// then the local repository below the class's package directory.
    pub fn locate(&self, class_name: &str) -> Option<PathBuf> {
        let entry = class_name_to_class_path(class_name);
        let contains = |jar: &PathBuf| matches!(jar_contains_entry(jar, &entry), Ok(true));

        let known = self.deps.known_jars();
        if let Some(jar) = known.par_iter().find_first(|j| contains(j)) {
            return Some(jar.clone());
        }

        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let root = self.repository.root(&cwd);
        let scan_root = infer_scan_path(&root, class_name);
        let candidates = match scan_jars(&scan_root) {
            Ok(jars) => jars,
            Err(e) => {
                tracing::warn!(root = %scan_root.display(), error = %e, "repository scan failed");
                return None;
            }
        };
        tracing::debug!(root = %scan_root.display(), jars = candidates.len(), "scanning local repository");
        candidates.par_iter().find_first(|j| contains(j)).cloned()
    }

    pub fn inspect_by_name(&self, class_name: &str) -> Arc<ClassDetail> {
        if let Some(hit) = self.details.cached(class_name) {
            return hit;
        }
        match self.locate(class_name) {
            Some(jar) => self.details.inspect(&jar, class_name),
            None => Arc::new(ClassDetail::unavailable(
                class_name,
                None,
                Unavailable::ClassNotFound,
            )),
        }
    }

    pub fn find_method_usage(&self, class_name: &str, definition: &str) -> MethodUsage {
        let detail = self.inspect_by_name(class_name);
        let wanted = strip_whitespace(definition);
        let methods = detail
            .methods
            .iter()
            .filter(|m| strip_whitespace(&m.normalized_definition) == wanted)
            .cloned()
            .collect();

        MethodUsage {
            class_name: class_name.to_string(),
            definition: definition.to_string(),
            jar_path: detail.jar_path.clone(),
            origin: detail.origin,
            methods,
            error: detail.error.clone(),
        }
    }

    pub fn stats(&self) -> InspectorStats {
        InspectorStats {
            descriptors: self.deps.len(),
            known_jars: self.deps.known_jars().len(),
            jar_index: self.jars.stats(),
            details_cached: self.details.cached_len(),
            sources: self.store.as_ref().and_then(|s| match s.stats() {
                Ok(stats) => Some(stats),
                Err(e) => {
                    tracing::warn!(error = %e, "source store stats failed");
                    None
                }
            }),
        }
    }
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}
