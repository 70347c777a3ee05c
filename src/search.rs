//! Bounded parallel search over the classes of a project's dependency jars.
//!
//! Each rayon worker takes one jar. Workers share a result vector and a stop
//! flag; the flag is raised once the cap is reached and is checked between
//! class entries, so large jars stop early too.

use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::classfile::ClassEntry;
use crate::deps::DependencyCache;
use crate::error::SearchError;
use crate::jar_index::JarIndexCache;

pub const CLASS_HIT_CAP: usize = 20;
pub const METHOD_HIT_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchHit {
    pub simple_name: String,
    pub fully_qualified_name: String,
    pub jar_path: PathBuf,
}

/// Name pattern: plain text is a case-insensitive substring, anything with
/// `*` is a case-insensitive glob anchored at both ends.
#[derive(Debug, Clone)]
pub enum Pattern {
    Contains(String),
    Glob(Regex),
}

impl Pattern {
    pub fn compile(raw: &str) -> Result<Self, regex::Error> {
        if !raw.contains('*') {
            return Ok(Pattern::Contains(raw.to_lowercase()));
        }
        let expr = format!("^{}$", regex::escape(raw).replace(r"\*", ".*"));
        let re = RegexBuilder::new(&expr).case_insensitive(true).build()?;
        Ok(Pattern::Glob(re))
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Pattern::Contains(needle) => text.to_lowercase().contains(needle.as_str()),
            Pattern::Glob(re) => re.is_match(text),
        }
    }
}

pub struct SearchEngine {
    deps: Arc<DependencyCache>,
    jars: Arc<JarIndexCache>,
}

impl SearchEngine {
    pub fn new(deps: Arc<DependencyCache>, jars: Arc<JarIndexCache>) -> Self {
        Self { deps, jars }
    }

    pub fn search_classes(
        &self,
        descriptor: &Path,
        pattern: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let pattern = Pattern::compile(pattern)?;
        let jars = self.deps.resolve(descriptor)?;
        Ok(self.search_jars(&jars, CLASS_HIT_CAP, |class| {
            pattern.matches(&class.simple_name) || pattern.matches(&class.fully_qualified_name)
        }))
    }

    pub fn search_methods(
        &self,
        descriptor: &Path,
        pattern: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let pattern = Pattern::compile(pattern)?;
        let jars = self.deps.resolve(descriptor)?;
        Ok(self.search_jars(&jars, METHOD_HIT_CAP, |class| {
            class.method_names.iter().any(|m| pattern.matches(m))
        }))
    }

    /// Runs `matcher` over every class of `jars`, keeping at most `cap` hits
    /// and at most one hit per (class, jar).
    pub fn search_jars<F>(&self, jars: &[PathBuf], cap: usize, matcher: F) -> Vec<SearchHit>
    where
        F: Fn(&ClassEntry) -> bool + Sync,
    {
        let hits: Mutex<Vec<SearchHit>> = Mutex::new(Vec::new());
        let stop = AtomicBool::new(cap == 0);

        jars.par_iter().for_each(|jar| {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            let Some(index) = self.jars.get(jar) else {
                return;
            };

            for class in &index.classes {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                if !matcher(class) {
                    continue;
                }

                let mut hits = hits.lock().unwrap_or_else(PoisonError::into_inner);
                if hits.len() >= cap {
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
                let duplicate = hits
                    .iter()
                    .any(|h| h.fully_qualified_name == class.fully_qualified_name && h.jar_path == *jar);
                if !duplicate {
                    hits.push(SearchHit {
                        simple_name: class.simple_name.clone(),
                        fully_qualified_name: class.fully_qualified_name.clone(),
                        jar_path: jar.clone(),
                    });
                }
                if hits.len() >= cap {
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
            }
        });

        if let Err(e) = self.jars.save() {
            tracing::warn!(error = %e, "failed to persist jar index");
        }

        let mut hits = hits.into_inner().unwrap_or_else(PoisonError::into_inner);
        hits.sort_by(|a, b| {
            a.fully_qualified_name
                .cmp(&b.fully_qualified_name)
                .then_with(|| a.jar_path.cmp(&b.jar_path))
        });
        tracing::debug!(jars = jars.len(), hits = hits.len(), cap, "search finished");
        hits
    }
}
