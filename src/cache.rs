//! Persistent store for decompiled class sources.
//!
//! Decompiling is the expensive step of class inspection, so its output is
//! kept in LMDB (via heed) keyed by jar and class. An entry is only served
//! while the jar's modification time matches the one recorded with it.

use anyhow::{Context, Result};
use heed::types::Str;
use heed::{Database, Env, EnvFlags, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::persist::modified_nanos;

pub const SOURCES_DB: &str = "sources";

const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024;
const DEFAULT_MAX_DBS: u32 = 4;

type StrDb = Database<Str, Str>;

#[derive(Debug, Serialize, Deserialize)]
struct StoredSource {
    jar_modified: u64,
    content: String,
}

#[derive(Debug, Clone)]
pub struct SourceStore {
    env: Arc<Env>,
    db_path: PathBuf,
    sources: StrDb,
}

#[derive(Debug, Serialize)]
pub struct SourceStoreStats {
    pub db_path: String,
    pub source_entries: u64,
}

impl SourceStore {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let env = Arc::new(open_env(&db_path)?);

        let mut wtxn = env.write_txn()?;
        let sources = env.create_database::<Str, Str>(&mut wtxn, Some(SOURCES_DB))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            db_path,
            sources,
        })
    }

    pub fn get(&self, jar: &Path, class_name: &str) -> Result<Option<String>> {
        let Some(current) = modified_nanos(jar) else {
            return Ok(None);
        };
        let rtxn = self.env.read_txn()?;
        let Some(raw) = self.sources.get(&rtxn, &source_key(jar, class_name))? else {
            return Ok(None);
        };
        let stored: StoredSource = match serde_json::from_str(raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(class = class_name, error = %e, "discarding unreadable stored source");
                return Ok(None);
            }
        };
        Ok((stored.jar_modified == current).then_some(stored.content))
    }

    pub fn put(&self, jar: &Path, class_name: &str, content: &str) -> Result<()> {
        let stored = StoredSource {
            jar_modified: modified_nanos(jar).unwrap_or_default(),
            content: content.to_string(),
        };
        let value = serde_json::to_string(&stored)?;

        let mut wtxn = self.env.write_txn()?;
        self.sources
            .put(&mut wtxn, &source_key(jar, class_name), &value)?;
        wtxn.commit()?;
        Ok(())
    }

    #[cfg(test)]
    fn clear(&self) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.sources.clear(&mut wtxn)?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<SourceStoreStats> {
        let rtxn = self.env.read_txn()?;
        Ok(SourceStoreStats {
            db_path: self.db_path.to_string_lossy().to_string(),
            source_entries: self.sources.len(&rtxn)?,
        })
    }
}

fn source_key(jar: &Path, class_name: &str) -> String {
    format!("{}::{class_name}", jar.to_string_lossy())
}

fn open_env(db_path: &Path) -> Result<Env> {
    let mut options = EnvOpenOptions::new();
    options.map_size(DEFAULT_MAP_SIZE);
    options.max_dbs(DEFAULT_MAX_DBS);
    // SAFETY: default LMDB locking is kept. NO_SUB_DIR makes db_path a single
    // file next to the JSON stores.
    unsafe {
        options.flags(EnvFlags::NO_SUB_DIR);
        options
            .open(db_path)
            .with_context(|| format!("Failed to create/open db env: {}", db_path.display()))
    }
}
