//! Descriptor -> dependency jar list, trusted while the descriptor's
//! modification time is unchanged.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ResolveError;
use crate::maven::{DependencyResolver, RepositoryRoot, artifact_path};
use crate::persist::{load_json, modified_nanos, save_json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Nanoseconds since the Unix epoch.
    pub last_modified: u64,
    pub jar_paths: Vec<PathBuf>,
}

pub struct DependencyCache {
    store: PathBuf,
    records: Mutex<BTreeMap<String, DependencyRecord>>,
    resolver: Arc<dyn DependencyResolver>,
    repository: Arc<dyn RepositoryRoot>,
}

impl DependencyCache {
    pub fn open(
        store: PathBuf,
        resolver: Arc<dyn DependencyResolver>,
        repository: Arc<dyn RepositoryRoot>,
    ) -> Self {
        let records = match load_json::<BTreeMap<String, DependencyRecord>>(&store) {
            Ok(Some(records)) => records,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(store = %store.display(), error = %e, "ignoring unreadable dependency store");
                BTreeMap::new()
            }
        };

        Self {
            store,
            records: Mutex::new(records),
            resolver,
            repository,
        }
    }

    pub fn resolve(&self, descriptor: &Path) -> Result<Vec<PathBuf>, ResolveError> {
        let current = modified_nanos(descriptor)
            .ok_or_else(|| ResolveError::NotFound(descriptor.to_path_buf()))?;
        let key = normalize_descriptor_key(&descriptor.to_string_lossy());

        {
            let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(record) = records.get(&key)
                && record.last_modified == current
                && !record.jar_paths.is_empty()
            {
                tracing::debug!(descriptor = %descriptor.display(), jars = record.jar_paths.len(), "dependency cache hit");
                return Ok(record.jar_paths.clone());
            }
        }

        let working_dir = descriptor
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let root = self.repository.root(&working_dir);

        tracing::info!(descriptor = %descriptor.display(), repository = %root.display(), "resolving dependencies");
        let coords = self.resolver.resolve(descriptor, &working_dir)?;

        let mut seen = HashSet::new();
        let jar_paths: Vec<PathBuf> = coords
            .iter()
            .map(|c| artifact_path(&root, c))
            .filter(|p| p.is_file())
            .filter(|p| seen.insert(p.clone()))
            .collect();
        tracing::info!(
            descriptor = %descriptor.display(),
            coordinates = coords.len(),
            jars = jar_paths.len(),
            "dependencies resolved"
        );

        let record = DependencyRecord {
            last_modified: modified_nanos(descriptor).unwrap_or(current),
            jar_paths: jar_paths.clone(),
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, record);

        if let Err(e) = self.save() {
            tracing::warn!(error = %e, "failed to persist dependency cache");
        }
        Ok(jar_paths)
    }

    pub fn invalidate(&self, descriptor: &Path) -> bool {
        let key = normalize_descriptor_key(&descriptor.to_string_lossy());
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some()
    }

    pub fn known_jars(&self) -> Vec<PathBuf> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut seen = HashSet::new();
        records
            .values()
            .flat_map(|r| r.jar_paths.iter())
            .filter(|p| seen.insert((*p).clone()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn record(&self, descriptor: &Path) -> Option<DependencyRecord> {
        let key = normalize_descriptor_key(&descriptor.to_string_lossy());
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    pub fn save(&self) -> Result<()> {
        let snapshot = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        save_json(&self.store, &snapshot)
            .with_context(|| format!("Failed to save dependency cache: {}", self.store.display()))
    }
}

pub fn normalize_descriptor_key(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '\\' || c == '/' {
            if !out.ends_with('/') {
                out.push('/');
            }
        } else {
            out.push(c);
        }
    }
    let mut key = out.to_lowercase();
    while key.len() > 1 && key.ends_with('/') {
        key.pop();
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maven::{Coordinate, FixedRoot};
    use crate::testutil::temp_path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeResolver {
        calls: AtomicUsize,
        coords: Vec<Coordinate>,
    }

    impl FakeResolver {
        fn new(coords: Vec<Coordinate>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                coords,
            })
        }
    }

    impl DependencyResolver for FakeResolver {
        fn resolve(&self, _: &Path, _: &Path) -> Result<Vec<Coordinate>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.coords.clone())
        }
    }

    struct FailingResolver;

    impl DependencyResolver for FailingResolver {
        fn resolve(&self, _: &Path, _: &Path) -> Result<Vec<Coordinate>, ResolveError> {
            Err(ResolveError::ResolutionFailed("[ERROR] BUILD FAILURE".to_string()))
        }
    }

    fn coord(group: &str, artifact: &str, version: &str) -> Coordinate {
        Coordinate {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.to_string(),
        }
    }

    struct Fixture {
        base: PathBuf,
        repo: PathBuf,
        pom: PathBuf,
        store: PathBuf,
    }

    fn fixture(name: &str) -> Fixture {
        let base = temp_path(name);
        let repo = base.join("repository");
        let project = base.join("Project");
        std::fs::create_dir_all(&project).unwrap();
        let pom = project.join("pom.xml");
        std::fs::write(&pom, "<project/>").unwrap();
        for c in [coord("org.acme", "alpha", "1.0"), coord("org.acme", "beta", "2.0")] {
            let jar = artifact_path(&repo, &c);
            std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
            std::fs::write(jar, b"jar").unwrap();
        }
        Fixture {
            store: base.join("dependency_cache.json"),
            base,
            repo,
            pom,
        }
    }

    #[test]
    fn second_resolve_uses_cache() -> Result<()> {
        let fx = fixture("deps_cache_hit");
        let resolver = FakeResolver::new(vec![
            coord("org.acme", "alpha", "1.0"),
            coord("org.acme", "missing", "9.9"),
            coord("org.acme", "beta", "2.0"),
        ]);
        let cache = DependencyCache::open(
            fx.store.clone(),
            resolver.clone(),
            Arc::new(FixedRoot(fx.repo.clone())),
        );

        let first = cache.resolve(&fx.pom)?;
        assert_eq!(first.len(), 2);
        assert!(first[0].ends_with("alpha-1.0.jar"));
        assert!(first[1].ends_with("beta-2.0.jar"));
        assert!(fx.store.exists());

        let second = cache.resolve(&fx.pom)?;
        assert_eq!(first, second);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);

        let _ = std::fs::remove_dir_all(fx.base);
        Ok(())
    }

    #[test]
    fn touching_descriptor_forces_reresolution() -> Result<()> {
        let fx = fixture("deps_stale");
        let resolver = FakeResolver::new(vec![coord("org.acme", "alpha", "1.0")]);
        let cache = DependencyCache::open(
            fx.store.clone(),
            resolver.clone(),
            Arc::new(FixedRoot(fx.repo.clone())),
        );

        cache.resolve(&fx.pom)?;
        std::thread::sleep(Duration::from_millis(20));
        std::fs::write(&fx.pom, "<project><!-- changed --></project>")?;
        cache.resolve(&fx.pom)?;
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);

        assert!(cache.invalidate(&fx.pom));
        cache.resolve(&fx.pom)?;
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);

        let _ = std::fs::remove_dir_all(fx.base);
        Ok(())
    }

    #[test]
    fn empty_result_is_not_trusted() -> Result<()> {
        let fx = fixture("deps_empty");
        let resolver = FakeResolver::new(vec![coord("org.acme", "missing", "9.9")]);
        let cache = DependencyCache::open(
            fx.store.clone(),
            resolver.clone(),
            Arc::new(FixedRoot(fx.repo.clone())),
        );

        assert!(cache.resolve(&fx.pom)?.is_empty());
        assert!(cache.resolve(&fx.pom)?.is_empty());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);

        let _ = std::fs::remove_dir_all(fx.base);
        Ok(())
    }

    #[test]
    fn key_ignores_separator_and_case() -> Result<()> {
        let fx = fixture("deps_key");
        let resolver = FakeResolver::new(vec![coord("org.acme", "alpha", "1.0")]);
        let cache = DependencyCache::open(
            fx.store.clone(),
            resolver.clone(),
            Arc::new(FixedRoot(fx.repo.clone())),
        );
        cache.resolve(&fx.pom)?;

        let key = normalize_descriptor_key(&fx.pom.to_string_lossy());
        let shouted = key.to_uppercase().replace('/', "\\");
        assert_eq!(normalize_descriptor_key(&shouted), key);
        assert_eq!(
            normalize_descriptor_key("C:\\Work\\\\Shop\\pom.xml"),
            "c:/work/shop/pom.xml"
        );
        assert_eq!(normalize_descriptor_key("/work/shop/"), "/work/shop");

        let _ = std::fs::remove_dir_all(fx.base);
        Ok(())
    }

    #[test]
    fn missing_descriptor_is_not_found() {
        let cache = DependencyCache::open(
            temp_path("deps_missing.json"),
            FakeResolver::new(Vec::new()),
            Arc::new(FixedRoot(PathBuf::from("/nowhere"))),
        );
        let err = cache.resolve(&temp_path("absent_pom.xml")).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn resolver_failure_is_surfaced() {
        let fx = fixture("deps_fail");
        let cache = DependencyCache::open(
            fx.store.clone(),
            Arc::new(FailingResolver),
            Arc::new(FixedRoot(fx.repo.clone())),
        );
        match cache.resolve(&fx.pom) {
            Err(ResolveError::ResolutionFailed(text)) => assert!(text.contains("BUILD FAILURE")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(cache.is_empty());
        let _ = std::fs::remove_dir_all(fx.base);
    }

    #[test]
    fn save_then_reopen_restores_records() -> Result<()> {
        let fx = fixture("deps_persist");
        let resolver = FakeResolver::new(vec![coord("org.acme", "beta", "2.0")]);
        let cache = DependencyCache::open(
            fx.store.clone(),
            resolver.clone(),
            Arc::new(FixedRoot(fx.repo.clone())),
        );
        let jars = cache.resolve(&fx.pom)?;

        let reopened = DependencyCache::open(
            fx.store.clone(),
            resolver.clone(),
            Arc::new(FixedRoot(fx.repo.clone())),
        );
        assert_eq!(reopened.record(&fx.pom), cache.record(&fx.pom));
        assert_eq!(reopened.known_jars(), jars);
        assert_eq!(reopened.resolve(&fx.pom)?, jars);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);

        let _ = std::fs::remove_dir_all(fx.base);
        Ok(())
    }
}
