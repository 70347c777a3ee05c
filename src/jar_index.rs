//! Content-hash-addressed index of the classes inside each jar.
//!
//! Lookups hash the archive first and only open it when the digest differs
//! from the cached one. The whole map is persisted on explicit `save()`.

use anyhow::{Context, Result};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use zip::ZipArchive;

use crate::classfile::{ClassEntry, parse_class};
use crate::hash::hash_file;
use crate::persist::{load_json, save_json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JarIndex {
    pub jar_path: PathBuf,
    pub content_hash: String,
    pub classes: Vec<ClassEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JarIndexStats {
    pub indexed_jars: u64,
    pub indexed_classes: u64,
    pub hits: u64,
    pub rebuilds: u64,
}

#[derive(Debug)]
pub struct JarIndexCache {
    store: PathBuf,
    entries: RwLock<HashMap<PathBuf, Arc<JarIndex>>>,
    hits: AtomicU64,
    rebuilds: AtomicU64,
}

impl JarIndexCache {
    pub fn open(store: PathBuf) -> Self {
        let mut entries = HashMap::new();
        match load_json::<Vec<JarIndex>>(&store) {
            Ok(Some(list)) => {
                for index in list {
                    entries.insert(index.jar_path.clone(), Arc::new(index));
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(store = %store.display(), error = %e, "ignoring unreadable jar index store");
            }
        }
        tracing::debug!(store = %store.display(), jars = entries.len(), "jar index cache opened");

        Self {
            store,
            entries: RwLock::new(entries),
            hits: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
        }
    }

    /// Returns the index for `jar`, rebuilding it when the bytes changed.
    ///
    /// `None` when the jar is missing or cannot be read at all.
    pub fn get(&self, jar: &Path) -> Option<Arc<JarIndex>> {
        let hash = match hash_file(jar) {
            Ok(h) => h,
            Err(e) => {
                tracing::debug!(jar = %jar.display(), error = %e, "jar not hashable");
                return None;
            }
        };

        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = entries.get(jar)
                && existing.content_hash == hash
            {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(existing));
            }
        }

        let index = Arc::new(build_index(jar, hash));
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(jar = %jar.display(), classes = index.classes.len(), "jar indexed");

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(jar.to_path_buf(), Arc::clone(&index));
        Some(index)
    }

    pub fn peek(&self, jar: &Path) -> Option<Arc<JarIndex>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(jar).cloned()
    }

    pub fn save(&self) -> Result<()> {
        let mut list: Vec<JarIndex> = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries.values().map(|i| (**i).clone()).collect()
        };
        list.sort_by(|a, b| a.jar_path.cmp(&b.jar_path));
        save_json(&self.store, &list)
            .with_context(|| format!("Failed to save jar index: {}", self.store.display()))
    }

    pub fn stats(&self) -> JarIndexStats {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        JarIndexStats {
            indexed_jars: entries.len() as u64,
            indexed_classes: entries.values().map(|i| i.classes.len() as u64).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
        }
    }
}

fn build_index(jar: &Path, content_hash: String) -> JarIndex {
    let classes = match read_classes(jar) {
        Ok(classes) => classes,
        Err(e) => {
            tracing::warn!(jar = %jar.display(), error = %e, "unreadable jar, indexing as empty");
            Vec::new()
        }
    };
    JarIndex {
        jar_path: jar.to_path_buf(),
        content_hash,
        classes,
    }
}

fn read_classes(jar: &Path) -> Result<Vec<ClassEntry>> {
    let file = File::open(jar).with_context(|| format!("Failed to open jar: {}", jar.display()))?;
    // SAFETY: The file is opened read-only and outlives the mapping.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap jar: {}", jar.display()))?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("Failed to read zip structure: {}", jar.display()))?;

    let mut classes = Vec::new();
    let mut buf = Vec::new();
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(jar = %jar.display(), index = i, error = %e, "skipping zip entry");
                continue;
            }
        };
        let name = entry.name().to_string();
        if !name.ends_with(".class") || name.ends_with("module-info.class") {
            continue;
        }

        buf.clear();
        if entry.read_to_end(&mut buf).is_err() {
            continue;
        }
        match parse_class(&buf) {
            Ok(class) => classes.push(class),
            Err(e) => tracing::trace!(jar = %jar.display(), entry = %name, error = %e, "class not parsed"),
        }
    }
    Ok(classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{class_bytes, temp_path, write_class_jar, write_jar};

    #[test]
    fn unchanged_jar_is_a_cache_hit() -> Result<()> {
        let jar = temp_path("index_hit.jar");
        write_class_jar(&jar, &[("com/acme/A", &["run"]), ("com/acme/B", &[])])?;
        let cache = JarIndexCache::open(temp_path("index_hit.json"));

        let first = cache.get(&jar).unwrap();
        assert_eq!(first.classes.len(), 2);
        let second = cache.get(&jar).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!(stats.rebuilds, 1);
        assert_eq!(stats.hits, 1);

        let _ = std::fs::remove_file(jar);
        Ok(())
    }

    #[test]
    fn changed_bytes_force_rebuild() -> Result<()> {
        let jar = temp_path("index_rebuild.jar");
        write_class_jar(&jar, &[("com/acme/A", &["run"])])?;
        let cache = JarIndexCache::open(temp_path("index_rebuild.json"));
        let before = cache.get(&jar).unwrap();

        write_class_jar(&jar, &[("com/acme/A", &["run"]), ("com/acme/C", &["stop"])])?;
        let after = cache.get(&jar).unwrap();

        assert_ne!(before.content_hash, after.content_hash);
        assert_eq!(after.classes.len(), 2);
        assert_eq!(cache.stats().rebuilds, 2);

        let _ = std::fs::remove_file(jar);
        Ok(())
    }

    #[test]
    fn malformed_entries_are_dropped_silently() -> Result<()> {
        let jar = temp_path("index_partial.jar");
        let good = class_bytes("com/acme/Good", &["ok"]);
        write_jar(
            &jar,
            &[
                ("com/acme/Good.class", good.as_slice()),
                ("com/acme/Bad.class", b"\xCA\xFE\xBA\xBE\x00"),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            ],
        )?;
        let cache = JarIndexCache::open(temp_path("index_partial.json"));
        let index = cache.get(&jar).unwrap();
        assert_eq!(index.classes.len(), 1);
        assert_eq!(index.classes[0].fully_qualified_name, "com.acme.Good");

        let _ = std::fs::remove_file(jar);
        Ok(())
    }

    #[test]
    fn missing_and_corrupt_jars_do_not_fail() -> Result<()> {
        let cache = JarIndexCache::open(temp_path("index_corrupt.json"));
        assert!(cache.get(&temp_path("absent.jar")).is_none());

        let corrupt = temp_path("corrupt.jar");
        std::fs::write(&corrupt, b"definitely not a zip")?;
        let index = cache.get(&corrupt).unwrap();
        assert!(index.classes.is_empty());

        let _ = std::fs::remove_file(corrupt);
        Ok(())
    }

    #[test]
    fn save_then_reopen_restores_entries() -> Result<()> {
        let jar = temp_path("index_persist.jar");
        let store = temp_path("index_persist.json");
        write_class_jar(&jar, &[("com/acme/A", &["run", "stop"])])?;

        let cache = JarIndexCache::open(store.clone());
        let original = cache.get(&jar).unwrap();
        cache.save()?;

        let reopened = JarIndexCache::open(store.clone());
        let restored = reopened.peek(&jar).unwrap();
        assert_eq!(*restored, *original);

        // Restored entry is valid, so the next lookup is a hit.
        reopened.get(&jar).unwrap();
        assert_eq!(reopened.stats().hits, 1);
        assert_eq!(reopened.stats().rebuilds, 0);

        let _ = std::fs::remove_file(jar);
        let _ = std::fs::remove_file(store);
        Ok(())
    }

    #[test]
    fn corrupt_store_opens_empty() -> Result<()> {
        let store = temp_path("index_bad_store.json");
        std::fs::write(&store, b"{not json")?;
        let cache = JarIndexCache::open(store.clone());
        assert_eq!(cache.stats().indexed_jars, 0);
        let _ = std::fs::remove_file(store);
        Ok(())
    }
}
