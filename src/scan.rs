use anyhow::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

pub fn default_m2_repository() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Failed to resolve home directory"))?;
    Ok(home.join(".m2").join("repository"))
}

pub fn infer_scan_path(m2_repo: &Path, class_name: &str) -> PathBuf {
    let parts: Vec<&str> = class_name.split('.').collect();
    if parts.len() < 3 {
        return m2_repo.to_path_buf();
    }

    for i in (2..parts.len().saturating_sub(1)).rev() {
        let prefix = parts[..i].join("/");
        let path = m2_repo.join(prefix);
        if path.exists() {
            return path;
        }
    }

    m2_repo.to_path_buf()
}

pub fn scan_jars(base_path: &Path) -> Result<Vec<PathBuf>> {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            if let Ok(entry) = entry {
                let path = entry.path();
                if is_binary_jar(path) {
                    let _ = tx.send(path.to_path_buf());
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    let mut jars: Vec<PathBuf> = rx.iter().collect();
    jars.sort();
    Ok(jars)
}

fn is_binary_jar(path: &Path) -> bool {
    if path.extension().is_none_or(|e| e != "jar") {
        return false;
    }
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    !stem.ends_with("-sources") && !stem.ends_with("-javadoc")
}

pub fn class_name_to_class_path(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}

/// `com.acme.Outer$Inner` -> `com/acme/Outer.java`
pub fn class_name_to_source_path(class_name: &str) -> String {
    let outer = class_name.split('$').next().unwrap_or(class_name);
    format!("{}.java", outer.replace('.', "/"))
}

/// `.../artifact/1.0/artifact-1.0.jar` -> `.../artifact/1.0/artifact-1.0-sources.jar`
pub fn sources_jar_path(jar_path: &Path) -> Option<PathBuf> {
    let stem = jar_path.file_stem()?.to_string_lossy();
    Some(jar_path.with_file_name(format!("{stem}-sources.jar")))
}

pub fn extract_version_from_maven_path(jar_path: &Path) -> Option<String> {
    jar_path
        .parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy().to_string())
}
