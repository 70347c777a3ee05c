//! Maven collaborators: dependency resolution through a CycloneDX bill of
//! materials and discovery of the local repository root.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;

use crate::error::ResolveError;
use crate::scan::default_m2_repository;

const BOM_GOAL: &str = "org.cyclonedx:cyclonedx-maven-plugin:makeAggregateBom";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

pub trait DependencyResolver: Send + Sync {
    fn resolve(&self, descriptor: &Path, working_dir: &Path)
    -> Result<Vec<Coordinate>, ResolveError>;
}

pub trait RepositoryRoot: Send + Sync {
    fn root(&self, working_dir: &Path) -> PathBuf;
}

/// `root/group/segments/artifact/version/artifact-version.jar`
pub fn artifact_path(root: &Path, coord: &Coordinate) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in coord.group.split('.') {
        path.push(segment);
    }
    path.push(&coord.artifact);
    path.push(&coord.version);
    path.push(format!("{}-{}.jar", coord.artifact, coord.version));
    path
}

#[derive(Debug, Clone)]
pub struct MavenCommand {
    pub program: PathBuf,
    pub settings: Option<PathBuf>,
}

impl Default for MavenCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("mvn"),
            settings: None,
        }
    }
}

impl MavenCommand {
    pub fn run(&self, working_dir: &Path, goal: &str) -> Result<Output> {
        let mut args: Vec<String> = vec!["-B".to_string()];
        if let Some(settings) = self.settings.as_ref() {
            args.push("-s".to_string());
            args.push(settings.to_string_lossy().into_owned());
        }
        args.push(goal.to_string());

        let mut cmd = self.command();
        cmd.args(&args).current_dir(working_dir);
        tracing::debug!(program = %self.program.display(), ?args, dir = %working_dir.display(), "running maven");
        cmd.output()
            .with_context(|| format!("Failed to execute {}", self.program.display()))
    }

    fn command(&self) -> Command {
        #[cfg(windows)]
        {
            let lower = self.program.to_string_lossy().to_ascii_lowercase();
            if lower.ends_with(".cmd") || lower.ends_with(".bat") || lower == "mvn" {
                let mut cmd = Command::new("cmd");
                cmd.arg("/C").arg(&self.program);
                return cmd;
            }
        }
        Command::new(&self.program)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MavenBomResolver {
    mvn: MavenCommand,
}

impl MavenBomResolver {
    pub fn new(mvn: MavenCommand) -> Self {
        Self { mvn }
    }
}

impl DependencyResolver for MavenBomResolver {
    fn resolve(
        &self,
        _descriptor: &Path,
        working_dir: &Path,
    ) -> Result<Vec<Coordinate>, ResolveError> {
        // Only a bom written by this invocation counts.
        let bom = working_dir.join("target").join("bom.xml");
        remove_stale_bom(&bom)?;

        let output = self
            .mvn
            .run(working_dir, BOM_GOAL)
            .map_err(|e| ResolveError::ResolutionFailed(format!("{e:#}")))?;
        let transcript = transcript(&output);

        if !output.status.success() {
            if !bom.exists() {
                return Err(ResolveError::ResolutionFailed(transcript));
            }
            tracing::warn!(status = ?output.status.code(), bom = %bom.display(), "maven exited with failure but a bom exists, using it");
        }

        if !bom.exists() {
            return Err(ResolveError::OutputMissing {
                path: bom,
                output: transcript,
            });
        }

        let xml = std::fs::read_to_string(&bom).map_err(|e| ResolveError::ParseFailed {
            path: bom.clone(),
            reason: e.to_string(),
        })?;
        parse_bom(&xml).map_err(|reason| ResolveError::ParseFailed { path: bom, reason })
    }
}

fn remove_stale_bom(bom: &Path) -> Result<(), ResolveError> {
    match std::fs::remove_file(bom) {
        Ok(()) => {
            tracing::debug!(bom = %bom.display(), "removed bom left by an earlier run");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ResolveError::ResolutionFailed(format!(
            "Failed to remove previous {}: {e}",
            bom.display()
        ))),
    }
}

fn transcript(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{}\n{}", stdout.trim(), stderr.trim()).trim().to_string()
}

pub fn parse_bom(xml: &str) -> std::result::Result<Vec<Coordinate>, String> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| e.to_string())?;

    let mut coords = Vec::new();
    for node in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "component")
    {
        if node.attribute("type") != Some("library") {
            continue;
        }
        let child = |name: &str| {
            node.children()
                .find(|c| c.is_element() && c.tag_name().name() == name)
                .and_then(|c| c.text())
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        };
        if let (Some(group), Some(artifact), Some(version)) =
            (child("group"), child("name"), child("version"))
        {
            coords.push(Coordinate {
                group,
                artifact,
                version,
            });
        }
    }
    Ok(coords)
}

#[derive(Debug, Clone)]
pub struct FixedRoot(pub PathBuf);

impl RepositoryRoot for FixedRoot {
    fn root(&self, _working_dir: &Path) -> PathBuf {
        self.0.clone()
    }
}

/// Asks `mvn help:effective-settings` once, then remembers the answer.
#[derive(Debug)]
pub struct EffectiveSettingsRoot {
    mvn: MavenCommand,
    resolved: OnceLock<PathBuf>,
}

impl EffectiveSettingsRoot {
    pub fn new(mvn: MavenCommand) -> Self {
        Self {
            mvn,
            resolved: OnceLock::new(),
        }
    }

    fn query(&self, working_dir: &Path) -> Option<PathBuf> {
        let output = match self.mvn.run(working_dir, "help:effective-settings") {
            Ok(o) if o.status.success() => o,
            Ok(o) => {
                tracing::warn!(status = ?o.status.code(), "effective-settings query failed");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "effective-settings query failed");
                return None;
            }
        };
        local_repository_from_settings(&String::from_utf8_lossy(&output.stdout))
    }
}

impl RepositoryRoot for EffectiveSettingsRoot {
    fn root(&self, working_dir: &Path) -> PathBuf {
        self.resolved
            .get_or_init(|| {
                self.query(working_dir)
                    .or_else(|| default_m2_repository().ok())
                    .unwrap_or_else(|| PathBuf::from(".m2").join("repository"))
            })
            .clone()
    }
}

pub fn local_repository_from_settings(text: &str) -> Option<PathBuf> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?is)<localRepository>(.*?)</localRepository>").expect("valid regex")
    });
    let value = re.captures(text)?.get(1)?.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}
