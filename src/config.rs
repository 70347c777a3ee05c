use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::cfr::JAVA_ENV;
use crate::cli::Cli;
use crate::maven::MavenCommand;

pub const HOME_ENV: &str = "MAVEN_INSPECTOR_HOME";
pub const LOCAL_REPO_ENV: &str = "MAVEN_INSPECTOR_LOCAL_REPO";
pub const MVN_ENV: &str = "MAVEN_INSPECTOR_MVN";
pub const SETTINGS_ENV: &str = "MAVEN_INSPECTOR_SETTINGS";
pub const JAVAP_ENV: &str = "MAVEN_INSPECTOR_JAVAP";
pub const CFR_ENV: &str = "CFR_JAR";
pub const LOG_ENV: &str = "MAVEN_INSPECTOR_LOG";

pub const DEPENDENCY_STORE: &str = "dependency_cache.json";
pub const JAR_INDEX_STORE: &str = "jar_index_cache.json";
pub const SOURCES_DB: &str = "sources.lmdb";

#[derive(Debug, Clone)]
pub struct Settings {
    pub home: PathBuf,
    /// `None` asks maven for its effective local repository.
    pub local_repo: Option<PathBuf>,
    pub mvn: MavenCommand,
    /// `None` disables the decompiler.
    pub cfr_jar: Option<PathBuf>,
    pub java: PathBuf,
    /// `None` disables disassembly.
    pub javap: Option<PathBuf>,
}

impl Settings {
    pub fn dependency_store(&self) -> PathBuf {
        self.home.join(DEPENDENCY_STORE)
    }

    pub fn jar_index_store(&self) -> PathBuf {
        self.home.join(JAR_INDEX_STORE)
    }

    pub fn sources_db(&self) -> PathBuf {
        self.home.join(SOURCES_DB)
    }
}

pub fn resolve_settings(cli: &Cli) -> Result<Settings> {
    resolve_settings_with(cli, |key| std::env::var(key).ok())
}

pub fn resolve_settings_with<F>(cli: &Cli, env: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let env_path = |key: &str| env(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

    let home = match cli.home.clone().or_else(|| env_path(HOME_ENV)) {
        Some(p) => p,
        None => inspector_home()?,
    };

    let cfr_jar = cli
        .cfr
        .clone()
        .or_else(|| env_path(CFR_ENV))
        .or_else(|| {
            let default_path = home.join("tools").join("cfr.jar");
            default_path.exists().then_some(default_path)
        });

    let javap = if cli.no_javap {
        None
    } else {
        Some(
            cli.javap
                .clone()
                .or_else(|| env_path(JAVAP_ENV))
                .unwrap_or_else(|| PathBuf::from("javap")),
        )
    };

    Ok(Settings {
        local_repo: cli.m2.clone().or_else(|| env_path(LOCAL_REPO_ENV)),
        mvn: MavenCommand {
            program: cli
                .mvn
                .clone()
                .or_else(|| env_path(MVN_ENV))
                .unwrap_or_else(|| PathBuf::from("mvn")),
            settings: cli.settings.clone().or_else(|| env_path(SETTINGS_ENV)),
        },
        cfr_jar,
        java: env_path(JAVA_ENV).unwrap_or_else(|| PathBuf::from("java")),
        javap,
        home,
    })
}

pub fn clear_stores(home: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for name in [DEPENDENCY_STORE, JAR_INDEX_STORE, SOURCES_DB] {
        let store = home.join(name);
        for suffix in ["", ".lock", ".tmp", "-lock"] {
            let mut os = store.as_os_str().to_os_string();
            os.push(suffix);
            let path = PathBuf::from(os);
            if remove_file_if_exists(&path)? {
                removed.push(path);
            }
        }
    }
    Ok(removed)
}

fn inspector_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("maven-inspector"))
}

fn remove_file_if_exists(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(path)
        .with_context(|| format!("Failed to remove store file: {}", path.display()))?;
    Ok(true)
}
